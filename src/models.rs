//! Data models for sources, collected items and their ranked representations.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Source`]: A configured place to collect news from
//! - [`CandidateItem`]: One article as collected, before deduplication
//! - [`ScoredItem`]: A surviving article with its fingerprint, cluster and summary
//! - [`Summary`]: The summary attached to an item and where it came from
//! - [`BriefReport`]: Everything one run produced, as written to disk

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pipeline::{CollectionStats, CollectionSummary};
use crate::sources::SourceOutcome;
use crate::utils::{canonical_url, item_id};

/// How a source is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// RSS 2.0 or Atom feed.
    Feed,
    /// NewsAPI-compatible search endpoint.
    Api,
    /// HTML listing page (company blog, newsroom).
    Page,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Feed => "feed",
            SourceKind::Api => "api",
            SourceKind::Page => "page",
        };
        f.write_str(s)
    }
}

/// Tag stamped on every item from a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    #[default]
    News,
    Academic,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::News => f.write_str("news"),
            ItemKind::Academic => f.write_str("academic"),
        }
    }
}

/// A configured news source.
///
/// Sources are declared in the YAML configuration. Everything except `name`,
/// `kind` and `endpoint` has a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
    /// Feed URL, API base URL or listing page URL.
    pub endpoint: String,
    /// 1-10; higher priority sources are dispatched first.
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// 0.0-1.0 editorial reliability, carried onto each item.
    #[serde(default = "default_reliability")]
    pub reliability: f64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_minutes: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub item_kind: ItemKind,
    /// Environment variable holding the key for `api` sources.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Company the source speaks for, stamped on each of its items.
    #[serde(default)]
    pub company: Option<String>,
}

fn default_priority() -> u8 {
    5
}

fn default_reliability() -> f64 {
    0.7
}

fn default_poll_interval() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

impl Source {
    pub fn new(name: &str, kind: SourceKind, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            endpoint: endpoint.to_string(),
            priority: default_priority(),
            reliability: default_reliability(),
            poll_interval_minutes: default_poll_interval(),
            enabled: true,
            item_kind: ItemKind::News,
            api_key_env: None,
            company: None,
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_reliability(mut self, reliability: f64) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_poll_interval(mut self, minutes: u32) -> Self {
        self.poll_interval_minutes = minutes;
        self
    }

    pub fn with_item_kind(mut self, kind: ItemKind) -> Self {
        self.item_kind = kind;
        self
    }

    pub fn with_company(mut self, company: &str) -> Self {
        self.company = Some(company.to_string());
        self
    }
}

/// One article as collected from a source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    /// First 16 hex chars of the SHA-256 of the canonical URL.
    pub id: String,
    pub title: String,
    pub body: String,
    pub url: String,
    /// Name of the source the item came from.
    pub source: String,
    pub source_reliability: f64,
    /// `None` when no date could be resolved.
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    /// Topical relevance in `[0, 1]`, set by the scoring stage.
    pub relevance: f64,
    pub kind: ItemKind,
    /// From the source, or attributed from the title during processing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl CandidateItem {
    /// Build an item for `source`, canonicalizing the URL and deriving the id.
    pub fn new(
        source: &Source,
        title: &str,
        body: &str,
        url: &str,
        published_at: Option<DateTime<Utc>>,
    ) -> Self {
        let url = canonical_url(url);
        Self {
            id: item_id(&url),
            title: title.trim().to_string(),
            body: body.trim().to_string(),
            url,
            source: source.name.clone(),
            source_reliability: source.reliability,
            published_at,
            collected_at: Utc::now(),
            relevance: 0.0,
            kind: source.item_kind,
            company: source.company.clone(),
            author: None,
            tags: Vec::new(),
        }
    }
}

/// Where a summary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryOrigin {
    /// Generated by the text-generation service during this run.
    Llm,
    /// Generated by the service during an earlier run.
    Cache,
    /// Derived from phrase tables because the service failed.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub text: String,
    pub origin: SummaryOrigin,
}

/// A surviving item after deduplication and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: CandidateItem,
    pub fingerprint: String,
    /// Id of the cluster representative, which is this item.
    pub cluster_id: String,
    /// Ids of near-duplicates folded into this item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

/// The lookback window a report covers.
#[derive(Debug, Clone, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct BriefReport {
    pub generated_at: DateTime<Utc>,
    pub period: Period,
    pub topics: Vec<String>,
    pub digest: Summary,
    pub items: Vec<ScoredItem>,
    pub stats: CollectionStats,
    pub summary: CollectionSummary,
    pub sources: Vec<SourceOutcome>,
}
