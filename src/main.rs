//! # Weekly Brief
//!
//! A news collection and summarization pipeline that gathers a week of
//! articles about a set of topics, removes duplicates, ranks what remains by
//! relevance and attaches a short summary to each item.
//!
//! ## Features
//!
//! - Collects from RSS/Atom feeds, a NewsAPI-compatible search API and HTML
//!   listing pages, with bounded concurrency and a whole-batch deadline
//! - Exact deduplication by content fingerprint and near deduplication by
//!   title similarity
//! - Keyword relevance scoring against configured topics
//! - Summaries from a local Ollama model, with a cache and a deterministic
//!   phrase-table fallback when the model is unavailable
//! - Writes one JSON report per run
//!
//! ## Usage
//!
//! ```sh
//! weekly_brief -o ./reports -c config/brief.yaml
//! ```
//!
//! ## Architecture
//!
//! 1. **Collection**: fetch every enabled source (5 at a time)
//! 2. **Pipeline**: score, date filter, quality gate, dedup, rank
//! 3. **Summarization**: one item at a time, then a digest
//! 4. **Output**: `{output_dir}/{date}/brief_{time}.json`

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod dates;
mod error;
mod models;
mod outputs;
mod pipeline;
mod sources;
mod summarize;
mod utils;

use cli::Cli;
use config::Config;
use models::{BriefReport, Period};
use outputs::json;
use pipeline::CollectionSummary;
use summarize::Summarizer;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("weekly_brief starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match &args.config {
        Some(path) => {
            let config = Config::load(Path::new(path))?;
            info!(config_path = %path, "Loaded configuration");
            config
        }
        None => {
            info!("No configuration file given; using defaults");
            Config::default()
        }
    };
    config.merge_with_args(&args);
    config.validate()?;
    info!(
        topics = ?config.topics,
        lookback_days = config.lookback_days,
        sources = config.sources.len(),
        llm = config.summarizer.enabled,
        "Effective configuration"
    );

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Collect ----
    let now = Utc::now();
    let client = sources::http_client(&config.collection)?;
    let ctx = sources::CollectContext::new(
        client,
        &config.collection,
        config.topics.clone(),
        now,
        config.lookback(),
    );
    let batch = sources::collect_all(&ctx, &config.sources).await;

    // ---- Filter, dedup, rank ----
    let mut output = pipeline::process(
        batch.items,
        &config.topics,
        &config.pipeline,
        now,
        config.lookback(),
    );
    output.stats.sources_total = batch.outcomes.len();
    output.stats.sources_failed = batch.outcomes.iter().filter(|o| o.failed()).count();

    // ---- Summarize ----
    let mut summarizer = Summarizer::connect(config.summarizer.clone(), config.phrases.clone()).await;
    info!(
        llm = summarizer.service_available(),
        items = output.items.len(),
        "Summarizing ranked items"
    );
    summarizer.summarize_all(&mut output.items).await;
    let digest = summarizer.digest(&output.items).await;
    summarizer.finish().await;

    // ---- Report ----
    let report = build_report(&config, now, digest, output, batch.outcomes);
    let path = json::write_report(&report, &args.output_dir).await?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        items = report.items.len(),
        path = %path.display(),
        "Execution complete"
    );

    Ok(())
}

fn build_report(
    config: &Config,
    now: chrono::DateTime<Utc>,
    digest: models::Summary,
    output: pipeline::PipelineOutput,
    outcomes: Vec<sources::SourceOutcome>,
) -> BriefReport {
    let summary = CollectionSummary::from_items(&output.items);
    BriefReport {
        generated_at: now,
        period: Period {
            start: now - config.lookback(),
            end: now,
        },
        topics: config.topics.clone(),
        digest,
        items: output.items,
        stats: output.stats,
        summary,
        sources: outcomes,
    }
}
