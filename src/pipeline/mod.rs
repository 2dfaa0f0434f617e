//! Turns the raw collection batch into a ranked, deduplicated item list.
//!
//! Stages run in this order:
//!
//! 1. relevance scoring against the configured topics, and company
//!    attribution for items whose source names none
//! 2. lookback date filter (undated items are kept)
//! 3. quality gate on title, body and URL
//! 4. exact dedup on fingerprint and canonical id
//! 5. near dedup on title similarity
//! 6. relevance threshold, ordering and `top_n`
//!
//! Every stage records how many items it removed in [`CollectionStats`].

pub mod dedup;
pub mod relevance;
pub mod stats;

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::{debug, info, instrument};

use crate::config::PipelineSettings;
use crate::dates::within_lookback;
use crate::models::{CandidateItem, ScoredItem};

pub use stats::{CollectionStats, CollectionSummary};

/// Ranked items plus per-stage counts.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub items: Vec<ScoredItem>,
    pub stats: CollectionStats,
}

fn passes_quality_gate(item: &CandidateItem, settings: &PipelineSettings) -> bool {
    let title_chars = item.title.trim().chars().count();
    let title = item.title.to_lowercase();
    (settings.min_title_chars..=settings.max_title_chars).contains(&title_chars)
        && item.body.trim().chars().count() >= settings.min_body_chars
        && (item.url.starts_with("http://") || item.url.starts_with("https://"))
        && !settings
            .exclude_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .any(|k| !k.is_empty() && title.contains(&k))
}

/// `needle` occurs in `haystack` with no letter or digit on either side.
fn mentions(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(at, m)| {
        let before = haystack[..at].chars().next_back();
        let after = haystack[at + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// First configured company named in the title, in configuration order.
pub fn attribute_company(title: &str, companies: &[String]) -> Option<String> {
    let title = title.to_lowercase();
    companies
        .iter()
        .find(|c| {
            let c = c.trim().to_lowercase();
            !c.is_empty() && mentions(&title, &c)
        })
        .map(|c| c.trim().to_string())
}

/// Relevance descending, then newest first with undated items last, then id.
pub fn rank_order(a: &ScoredItem, b: &ScoredItem) -> Ordering {
    b.item
        .relevance
        .total_cmp(&a.item.relevance)
        .then_with(|| match (a.item.published_at, b.item.published_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.item.id.cmp(&b.item.id))
}

/// Score, filter, deduplicate and rank collected items.
#[instrument(level = "info", skip_all, fields(items = items.len(), topics = topics.len()))]
pub fn process(
    items: Vec<CandidateItem>,
    topics: &[String],
    settings: &PipelineSettings,
    now: DateTime<Utc>,
    lookback: chrono::Duration,
) -> PipelineOutput {
    let mut stats = CollectionStats {
        collected: items.len(),
        ..CollectionStats::default()
    };

    let mut items = items;
    for item in &mut items {
        item.relevance = relevance::score(&format!("{} {}", item.title, item.body), topics);
        if item.company.is_none() {
            item.company = attribute_company(&item.title, &settings.companies);
        }
    }

    let cutoff = now - lookback;
    let before = items.len();
    items.retain(|i| within_lookback(i.published_at, cutoff));
    stats.date_filtered = before - items.len();

    let before = items.len();
    items.retain(|i| passes_quality_gate(i, settings));
    stats.low_quality = before - items.len();

    let (unique, exact) = dedup::exact_dedup(items, settings.fingerprint_body_chars);
    stats.exact_duplicates = exact;

    let (mut clustered, near) = dedup::near_dedup(unique, settings.dedup_threshold);
    stats.near_duplicates = near;

    let before = clustered.len();
    clustered.retain(|s| s.item.relevance >= settings.relevance_threshold);
    stats.low_relevance = before - clustered.len();

    clustered.sort_by(rank_order);
    if clustered.len() > settings.top_n {
        stats.beyond_top_n = clustered.len() - settings.top_n;
        clustered.truncate(settings.top_n);
    }
    stats.final_count = clustered.len();

    debug!(?stats, "Stage counts");
    info!(
        collected = stats.collected,
        kept = stats.final_count,
        duplicates = stats.exact_duplicates + stats.near_duplicates,
        "Pipeline finished"
    );
    PipelineOutput {
        items: clustered,
        stats,
    }
}
