//! Configuration file handling.
//!
//! The pipeline is configured from a YAML file (see `config/brief.yaml`).
//! Every section has defaults, so an empty file yields a working setup that
//! watches a handful of AI news feeds. Command-line flags override the file
//! through [`Config::merge_with_args`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::models::{ItemKind, Source, SourceKind};
use crate::summarize::fallback::PhraseTables;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Topic keywords items are scored against.
    pub topics: Vec<String>,
    /// Items published before `now - lookback_days` are dropped.
    pub lookback_days: i64,
    pub collection: CollectionSettings,
    pub pipeline: PipelineSettings,
    pub summarizer: SummarizerSettings,
    pub sources: Vec<Source>,
    /// Substitution tables for fallback summaries.
    pub phrases: PhraseTables,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            topics: vec![
                "OpenAI".to_string(),
                "Anthropic".to_string(),
                "generative AI".to_string(),
            ],
            lookback_days: 7,
            collection: CollectionSettings::default(),
            pipeline: PipelineSettings::default(),
            summarizer: SummarizerSettings::default(),
            sources: default_sources(),
            phrases: PhraseTables::default(),
        }
    }
}

/// Fan-out and HTTP settings for the collection stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub max_items_per_source: usize,
    /// Sources fetched at the same time.
    pub concurrent_sources: usize,
    pub request_timeout_secs: u64,
    /// Whole-batch deadline.
    pub max_collection_secs: u64,
    /// Fixed wait before the single re-attempt after a 429.
    pub rate_limit_delay_ms: u64,
    pub user_agent: String,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            max_items_per_source: 50,
            concurrent_sources: 5,
            request_timeout_secs: 15,
            max_collection_secs: 300,
            rate_limit_delay_ms: 1500,
            user_agent: "WeeklyBrief-NewsCollector/1.0".to_string(),
        }
    }
}

/// Thresholds for the filter, dedup and ranking stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub relevance_threshold: f64,
    /// Title Jaccard similarity above which two items are near-duplicates.
    pub dedup_threshold: f64,
    /// Body characters included in the fingerprint.
    pub fingerprint_body_chars: usize,
    pub min_title_chars: usize,
    pub max_title_chars: usize,
    pub min_body_chars: usize,
    /// Items whose title contains any of these (case-insensitive) are dropped.
    pub exclude_keywords: Vec<String>,
    /// Company names matched against titles of items whose source names no company.
    pub companies: Vec<String>,
    /// Items handed to summarization.
    pub top_n: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            relevance_threshold: 0.3,
            dedup_threshold: 0.8,
            fingerprint_body_chars: 200,
            min_title_chars: 10,
            max_title_chars: 200,
            min_body_chars: 0,
            exclude_keywords: [
                "crypto",
                "bitcoin",
                "ethereum",
                "nft",
                "blockchain",
                "stock price",
                "株価",
                "market close",
                "earnings",
                "covid",
                "coronavirus",
                "pandemic",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            companies: [
                "OpenAI",
                "Anthropic",
                "Google",
                "Meta",
                "Microsoft",
                "Apple",
                "Perplexity",
                "ElevenLabs",
                "Stability AI",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            top_n: 20,
        }
    }
}

/// Text-generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    pub enabled: bool,
    pub ollama_url: String,
    pub model: String,
    /// Language summaries are written in.
    pub language: String,
    pub max_summary_chars: usize,
    pub digest_enabled: bool,
    pub digest_max_chars: usize,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Pause between calls that reach the service.
    pub inter_call_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub temperature: f32,
    /// Token cap for a single item summary.
    pub num_predict: u32,
    pub fallback_prefix: String,
    /// JSON file caching generated summaries between runs.
    pub cache_path: Option<String>,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ollama_url: "http://localhost:11434".to_string(),
            model: "qwen3:8b".to_string(),
            language: "Japanese".to_string(),
            max_summary_chars: 50,
            digest_enabled: true,
            digest_max_chars: 400,
            timeout_secs: 30,
            probe_timeout_secs: 5,
            inter_call_delay_ms: 1000,
            rate_limit_delay_ms: 1500,
            temperature: 0.1,
            num_predict: 80,
            fallback_prefix: "AI業界: ".to_string(),
            cache_path: None,
        }
    }
}

fn default_sources() -> Vec<Source> {
    vec![
        Source::new("TechCrunch", SourceKind::Feed, "https://techcrunch.com/feed/")
            .with_priority(8)
            .with_reliability(0.85),
        Source::new(
            "Ars Technica",
            SourceKind::Feed,
            "https://feeds.arstechnica.com/arstechnica/index",
        )
        .with_priority(9)
        .with_reliability(0.9)
        .with_poll_interval(120),
        Source::new("The Verge", SourceKind::Feed, "https://www.theverge.com/rss/index.xml")
            .with_priority(7)
            .with_reliability(0.8),
        Source::new(
            "AI News",
            SourceKind::Feed,
            "https://www.artificialintelligence-news.com/feed/",
        )
        .with_priority(8)
        .with_reliability(0.8)
        .with_poll_interval(180),
        Source::new("arXiv CS.AI", SourceKind::Feed, "http://export.arxiv.org/rss/cs.AI")
            .with_priority(6)
            .with_reliability(0.95)
            .with_poll_interval(1440)
            .with_item_kind(ItemKind::Academic),
    ]
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: display,
                source,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pipeline;
        if !(0.0..=1.0).contains(&p.relevance_threshold) {
            return Err(ConfigError::Invalid(format!(
                "relevance_threshold must be within 0..=1, got {}",
                p.relevance_threshold
            )));
        }
        if !(0.0..=1.0).contains(&p.dedup_threshold) {
            return Err(ConfigError::Invalid(format!(
                "dedup_threshold must be within 0..=1, got {}",
                p.dedup_threshold
            )));
        }
        if p.max_title_chars < p.min_title_chars {
            return Err(ConfigError::Invalid(format!(
                "max_title_chars ({}) is below min_title_chars ({})",
                p.max_title_chars, p.min_title_chars
            )));
        }
        if self.lookback_days < 0 {
            return Err(ConfigError::Invalid("lookback_days must not be negative".to_string()));
        }
        if self.collection.concurrent_sources == 0 {
            return Err(ConfigError::Invalid("concurrent_sources must be at least 1".to_string()));
        }
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid("no sources configured".to_string()));
        }
        for source in &self.sources {
            if !(0.0..=1.0).contains(&source.reliability) {
                return Err(ConfigError::Invalid(format!(
                    "source {} has reliability {} outside 0..=1",
                    source.name, source.reliability
                )));
            }
        }
        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &Cli) {
        if !args.topics.is_empty() {
            self.topics = args.topics.clone();
        }
        if let Some(days) = args.days {
            self.lookback_days = days;
        }
        if let Some(top_n) = args.top_n {
            self.pipeline.top_n = top_n;
        }
        if let Some(ref url) = args.ollama_url {
            self.summarizer.ollama_url = url.clone();
        }
        if let Some(ref model) = args.model {
            self.summarizer.model = model.clone();
        }
        if args.no_llm {
            self.summarizer.enabled = false;
        }
        if !args.kinds.is_empty() {
            self.sources.retain(|s| args.kinds.contains(&s.kind));
        }
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(self.lookback_days)
    }
}
