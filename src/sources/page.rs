//! HTML listing page collector for blogs and newsrooms without a feed.
//!
//! The page is searched with a list of common article selectors; the first
//! selector that matches anything wins, and if none do every link on the page
//! is treated as a candidate. Only the first [`MAX_PAGE_ITEMS`] blocks are
//! considered and links leaving the page's domain are skipped.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use super::{CollectContext, get_with_rate_limit};
use crate::dates::{date_from_url, parse_date_text, parse_timestamp};
use crate::error::SourceError;
use crate::models::{CandidateItem, Source};
use crate::utils::{clip_chars, same_domain};

pub const MAX_PAGE_ITEMS: usize = 10;

const MAX_BODY_CHARS: usize = 1000;

fn selectors(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|s| Selector::parse(s).expect("static selector"))
        .collect()
}

static ARTICLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "article",
        ".post",
        ".blog-post",
        ".entry",
        ".news-item",
        ".article-item",
        "[class*=\"post\"]",
        "[class*=\"article\"]",
    ])
});

static DATE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    selectors(&[
        "time",
        ".date",
        ".published",
        ".post-date",
        ".article-date",
        "[datetime]",
        "[class*=\"date\"]",
        "[class*=\"time\"]",
    ])
});

static HEADING: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1, h2, h3, h4, a").expect("heading selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("link selector"));

/// Fetch and scrape one listing page.
#[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.endpoint))]
pub async fn collect(ctx: &CollectContext, source: &Source) -> Result<Vec<CandidateItem>, SourceError> {
    let html = get_with_rate_limit(&ctx.client, &source.endpoint, &[], ctx.rate_limit_delay)
        .await?
        .text()
        .await?;
    let items = parse_listing(&html, source, ctx.now)?;
    info!(count = items.len(), "Scraped listing page");
    Ok(items)
}

/// Extract article candidates from a listing page's HTML.
pub fn parse_listing(
    html: &str,
    source: &Source,
    now: DateTime<Utc>,
) -> Result<Vec<CandidateItem>, SourceError> {
    let base = Url::parse(&source.endpoint)?;
    let document = Html::parse_document(html);

    let blocks: Vec<ElementRef> = ARTICLE_SELECTORS
        .iter()
        .map(|sel| document.select(sel).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_else(|| document.select(&LINK).collect());

    let mut items = Vec::new();
    for block in blocks.into_iter().take(MAX_PAGE_ITEMS) {
        let Some((title, href)) = title_and_href(block) else {
            continue;
        };
        let Ok(resolved) = base.join(&href) else {
            continue;
        };
        let url = resolved.to_string();
        if !same_domain(&url, &source.endpoint) {
            debug!(%url, "Skipping off-site link");
            continue;
        }

        let body = if block.value().name() == "a" {
            String::new()
        } else {
            let text = collapse(block.text());
            let without_title = text.strip_prefix(title.as_str()).unwrap_or(&text).trim();
            clip_chars(without_title, MAX_BODY_CHARS)
        };
        let published_at = extract_date(block, &url, now);
        items.push(CandidateItem::new(source, &title, &body, &url, published_at));
    }
    Ok(items)
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_and_href(block: ElementRef) -> Option<(String, String)> {
    if block.value().name() == "a" {
        let href = block.value().attr("href")?.to_string();
        return Some((collapse(block.text()), href));
    }
    let title = collapse(block.select(&HEADING).next()?.text());
    let href = block.select(&LINK).next()?.value().attr("href")?.to_string();
    Some((title, href))
}

/// Resolve a block's publication date from markup, then from its URL.
fn extract_date(block: ElementRef, url: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    for sel in DATE_SELECTORS.iter() {
        if let Some(el) = block.select(sel).next() {
            if let Some(dt) = el.value().attr("datetime").and_then(parse_timestamp) {
                return Some(dt);
            }
            if let Some(dt) = parse_date_text(&collapse(el.text()), now) {
                return Some(dt);
            }
        }
    }
    date_from_url(url)
}
