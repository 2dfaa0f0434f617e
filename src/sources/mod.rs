//! News source collectors and the bounded fan-out that drives them.
//!
//! Each source kind has its own submodule:
//!
//! | Kind | Module | Method | Notes |
//! |------|--------|--------|-------|
//! | `feed` | [`feed`] | RSS / Atom via `feed-rs` | Company blogs, tech press, arXiv |
//! | `api` | [`api`] | NewsAPI `/v2/everything` | Key read from an environment variable |
//! | `page` | [`page`] | HTML scraping | Listing pages without a feed |
//!
//! # Fan-out
//!
//! [`collect_all`] dispatches enabled sources in priority order with at most
//! `concurrent_sources` requests in flight. Every source resolves to its own
//! [`SourceOutcome`]; a failing source logs, reports zero items and never
//! aborts the batch. A whole-batch deadline abandons sources still running
//! and keeps everything that already finished.

pub mod api;
pub mod feed;
pub mod page;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::CollectionSettings;
use crate::error::SourceError;
use crate::models::{CandidateItem, Source, SourceKind};

/// Everything a collector needs besides the source itself.
#[derive(Debug, Clone)]
pub struct CollectContext {
    pub client: Client,
    pub topics: Vec<String>,
    /// Start of the lookback window.
    pub since: DateTime<Utc>,
    pub now: DateTime<Utc>,
    pub max_items_per_source: usize,
    pub rate_limit_delay: Duration,
    pub concurrent_sources: usize,
    pub max_collection_time: Duration,
}

impl CollectContext {
    pub fn new(
        client: Client,
        settings: &CollectionSettings,
        topics: Vec<String>,
        now: DateTime<Utc>,
        lookback: chrono::Duration,
    ) -> Self {
        Self {
            client,
            topics,
            since: now - lookback,
            now,
            max_items_per_source: settings.max_items_per_source,
            rate_limit_delay: Duration::from_millis(settings.rate_limit_delay_ms),
            concurrent_sources: settings.concurrent_sources.max(1),
            max_collection_time: Duration::from_secs(settings.max_collection_secs),
        }
    }
}

/// Result of collecting one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: String,
    pub kind: SourceKind,
    pub items: usize,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceOutcome {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Items from every source that finished, plus one outcome per source.
#[derive(Debug, Default)]
pub struct CollectionBatch {
    pub items: Vec<CandidateItem>,
    pub outcomes: Vec<SourceOutcome>,
}

/// Build the HTTP client shared by all collectors.
pub fn http_client(settings: &CollectionSettings) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(settings.user_agent.clone())
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
}

/// Send a GET, waiting once and re-attempting once if the server answers 429.
#[instrument(level = "debug", skip_all, fields(%url))]
pub(crate) async fn get_with_rate_limit(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    delay: Duration,
) -> Result<Response, SourceError> {
    let send = || client.get(url).query(query).send();

    let mut response = send().await?;
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        warn!(%url, ?delay, "Rate limited; waiting before a single re-attempt");
        sleep(delay).await;
        response = send().await?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
    }
    if !response.status().is_success() {
        return Err(SourceError::Status(response.status().as_u16()));
    }
    Ok(response)
}

/// Collect a single source according to its kind.
pub async fn collect_source(
    ctx: &CollectContext,
    source: &Source,
) -> Result<Vec<CandidateItem>, SourceError> {
    let mut items = match source.kind {
        SourceKind::Feed => feed::collect(ctx, source).await?,
        SourceKind::Api => api::collect(ctx, source).await?,
        SourceKind::Page => page::collect(ctx, source).await?,
    };
    items.truncate(ctx.max_items_per_source);
    Ok(items)
}

/// Collect every enabled source with bounded concurrency and a batch deadline.
///
/// Items are returned grouped by source in dispatch order, so ties in later
/// stages resolve toward higher-priority sources.
#[instrument(level = "info", skip_all, fields(sources = sources.len()))]
pub async fn collect_all(ctx: &CollectContext, sources: &[Source]) -> CollectionBatch {
    let mut active: Vec<&Source> = sources.iter().filter(|s| s.enabled).collect();
    active.sort_by(|a, b| b.priority.cmp(&a.priority));

    info!(
        active = active.len(),
        concurrency = ctx.concurrent_sources,
        deadline_secs = ctx.max_collection_time.as_secs(),
        "Starting collection"
    );

    let deadline = sleep(ctx.max_collection_time);
    let mut finished: Vec<(usize, SourceOutcome, Vec<CandidateItem>)> =
        stream::iter(active.iter().copied().enumerate())
            .map(|(index, source)| async move {
                let t0 = Instant::now();
                let result = collect_source(ctx, source).await;
                let elapsed_ms = t0.elapsed().as_millis();
                match result {
                    Ok(items) => {
                        info!(source = %source.name, kind = %source.kind, count = items.len(), elapsed_ms, "Collected source");
                        let outcome = SourceOutcome {
                            source: source.name.clone(),
                            kind: source.kind,
                            items: items.len(),
                            elapsed_ms,
                            error: None,
                        };
                        (index, outcome, items)
                    }
                    Err(e) => {
                        error!(source = %source.name, kind = %source.kind, error = %e, elapsed_ms, "Source failed; continuing without it");
                        let outcome = SourceOutcome {
                            source: source.name.clone(),
                            kind: source.kind,
                            items: 0,
                            elapsed_ms,
                            error: Some(e.to_string()),
                        };
                        (index, outcome, Vec::new())
                    }
                }
            })
            .buffer_unordered(ctx.concurrent_sources)
            .take_until(deadline)
            .collect()
            .await;

    finished.sort_by_key(|(index, _, _)| *index);

    let mut batch = CollectionBatch::default();
    let mut done = vec![false; active.len()];
    for (index, outcome, items) in finished {
        done[index] = true;
        batch.outcomes.push(outcome);
        batch.items.extend(items);
    }

    for (index, source) in active.iter().enumerate() {
        if !done[index] {
            warn!(source = %source.name, "Source still running at the collection deadline; abandoned");
            batch.outcomes.push(SourceOutcome {
                source: source.name.clone(),
                kind: source.kind,
                items: 0,
                elapsed_ms: ctx.max_collection_time.as_millis(),
                error: Some(SourceError::Deadline.to_string()),
            });
        }
    }

    let failed = batch.outcomes.iter().filter(|o| o.failed()).count();
    info!(
        items = batch.items.len(),
        sources = batch.outcomes.len(),
        failed,
        "Collection finished"
    );
    batch
}
