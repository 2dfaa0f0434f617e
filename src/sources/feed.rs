//! RSS and Atom feed collector.
//!
//! Feeds are parsed with `feed-rs`, which covers RSS 0.9/1.0/2.0, Atom and the
//! common namespaced extensions (Dublin Core, Media RSS). Descriptions are HTML
//! more often than not and are reduced to plain text.

use feed_rs::model::Entry;
use tracing::{debug, info, instrument};

use super::{CollectContext, get_with_rate_limit};
use crate::error::SourceError;
use crate::models::{CandidateItem, Source};
use crate::utils::strip_html;

/// Fetch and parse one feed source.
#[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.endpoint))]
pub async fn collect(ctx: &CollectContext, source: &Source) -> Result<Vec<CandidateItem>, SourceError> {
    let body = get_with_rate_limit(&ctx.client, &source.endpoint, &[], ctx.rate_limit_delay)
        .await?
        .bytes()
        .await?;
    let items = parse_feed(&body, source)?;
    info!(count = items.len(), "Parsed feed");
    Ok(items)
}

/// Parse an RSS or Atom document into candidate items.
///
/// Entries without a link are skipped.
pub fn parse_feed(xml: &[u8], source: &Source) -> Result<Vec<CandidateItem>, SourceError> {
    let feed = feed_rs::parser::parse(xml)?;
    Ok(feed
        .entries
        .into_iter()
        .filter_map(|entry| entry_item(entry, source))
        .collect())
}

fn entry_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|href| !href.is_empty())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))
}

fn entry_item(entry: Entry, source: &Source) -> Option<CandidateItem> {
    let link = entry_link(&entry)?;

    let title = entry
        .title
        .as_ref()
        .map(|t| strip_html(&t.content))
        .or_else(|| {
            entry
                .media
                .iter()
                .find_map(|m| m.title.as_ref().map(|t| strip_html(&t.content)))
        })
        .unwrap_or_default();

    let body = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .filter(|s| !s.trim().is_empty())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()))
        .or_else(|| {
            entry
                .media
                .iter()
                .find_map(|m| m.description.as_ref().map(|d| d.content.clone()))
        })
        .map(|s| strip_html(&s))
        .unwrap_or_default();

    let published_at = entry.published.or(entry.updated);
    if published_at.is_none() {
        debug!(%link, "Feed entry without a resolvable date");
    }

    let mut candidate = CandidateItem::new(source, &title, &body, &link, published_at);
    candidate.author = entry
        .authors
        .into_iter()
        .map(|a| a.name.trim().to_string())
        .find(|name| !name.is_empty());
    candidate.tags = entry
        .categories
        .into_iter()
        .map(|c| c.label.unwrap_or(c.term).trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    Some(candidate)
}
