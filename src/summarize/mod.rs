//! Item summaries and the weekly digest.
//!
//! Summaries come from the text-generation service when it is reachable and
//! offers the configured model, from the cache when an earlier run already
//! produced one, and from the phrase-table fallback otherwise. Items are
//! summarized one at a time with a pause between calls that reach the
//! service. [`Summarizer::summarize`] never fails.

pub mod api;
pub mod cache;
pub mod fallback;

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{Instant, sleep_until};
use tracing::{info, instrument, warn};

use crate::config::SummarizerSettings;
use crate::error::SummarizeError;
use crate::models::{ScoredItem, Summary, SummaryOrigin};
use crate::utils::{clip_chars, truncate_for_log};
use api::{AskAsync, OllamaClient, Prompt, RateLimitRetry};
use cache::SummaryCache;
use fallback::PhraseTables;

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("think block regex"));

const LEAD_INS: &[&str] = &[
    "日本語要約:",
    "日本語要約：",
    "要約:",
    "要約：",
    "まとめ:",
    "まとめ：",
    "概要:",
    "概要：",
    "Summary:",
    "この記事は",
    "このニュースは",
];

/// Body characters included in an item prompt.
const PROMPT_BODY_CHARS: usize = 1000;

/// Items described in the digest prompt.
const DIGEST_ITEMS: usize = 10;

/// Remove reasoning blocks and lead-ins, then clip to `max_chars`.
///
/// An unterminated `<think>` block or an answer with nothing left is
/// malformed.
pub fn clean_response(raw: &str, max_chars: usize) -> Result<String, SummarizeError> {
    let without_think = THINK_BLOCK.replace_all(raw, "");
    if without_think.contains("<think>") {
        return Err(SummarizeError::Malformed("unterminated think block".to_string()));
    }

    let mut text = without_think.trim();
    while let Some(rest) = LEAD_INS.iter().find_map(|p| text.strip_prefix(p)) {
        text = rest.trim_start();
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(SummarizeError::Malformed("empty response".to_string()));
    }
    Ok(clip_chars(text, max_chars))
}

fn item_prompt(item: &ScoredItem, settings: &SummarizerSettings) -> Prompt {
    let body = clip_chars(&item.item.body, PROMPT_BODY_CHARS);
    Prompt {
        text: format!(
            "Summarize the following news in {lang} in at most {max} characters. \
             Answer with the summary only.\n\nTitle: {title}\nContent: {body}\n\n{lang} summary:",
            lang = settings.language,
            max = settings.max_summary_chars,
            title = item.item.title,
        ),
        num_predict: settings.num_predict,
        stop: ["\n", "Summary:", "要約:", "Title:", "Content:"]
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

fn digest_prompt(items: &[ScoredItem], settings: &SummarizerSettings) -> Prompt {
    let headlines = items
        .iter()
        .take(DIGEST_ITEMS)
        .map(|s| format!("- {} ({})", s.item.title, s.item.source))
        .collect::<Vec<_>>()
        .join("\n");
    Prompt {
        text: format!(
            "Write one paragraph in {lang} of at most {max} characters giving an overview \
             of this week's most important news.\n\nHeadlines:\n{headlines}\n\nOverview:",
            lang = settings.language,
            max = settings.digest_max_chars,
        ),
        num_predict: settings.num_predict.saturating_mul(5),
        stop: vec!["Headlines:".to_string()],
    }
}

/// Summarizes items with a generation backend and a deterministic fallback.
pub struct Summarizer<A> {
    backend: Option<A>,
    settings: SummarizerSettings,
    phrases: PhraseTables,
    cache: SummaryCache,
    model: String,
    next_call_at: Option<Instant>,
}

impl Summarizer<RateLimitRetry<OllamaClient>> {
    /// Build a summarizer for the configured Ollama server.
    ///
    /// The service is probed once; if it is disabled, unreachable or lacks
    /// the model, every summary uses the fallback without network calls.
    #[instrument(level = "info", skip_all, fields(url = %settings.ollama_url, model = %settings.model))]
    pub async fn connect(settings: SummarizerSettings, phrases: PhraseTables) -> Self {
        let cache = match &settings.cache_path {
            Some(path) => SummaryCache::load(PathBuf::from(path)).await,
            None => SummaryCache::in_memory(),
        };
        info!(cached = cache.len(), "Summary cache ready");

        let backend = match Self::probe_backend(&settings).await {
            Ok(client) => Some(RateLimitRetry::new(
                client,
                Duration::from_millis(settings.rate_limit_delay_ms),
            )),
            Err(e) => {
                warn!(error = %e, "Generation service not usable; summaries will use the fallback");
                None
            }
        };
        Self::with_backend(backend, settings, phrases, cache)
    }

    async fn probe_backend(settings: &SummarizerSettings) -> Result<OllamaClient, SummarizeError> {
        if !settings.enabled {
            return Err(SummarizeError::Disabled);
        }
        let client = OllamaClient::new(settings)?;
        if client.probe().await? {
            Ok(client)
        } else {
            Err(SummarizeError::Unavailable(format!(
                "model {} is not installed",
                client.model()
            )))
        }
    }
}

impl<A> Summarizer<A>
where
    A: AskAsync<Response = String>,
{
    pub fn with_backend(
        backend: Option<A>,
        settings: SummarizerSettings,
        phrases: PhraseTables,
        cache: SummaryCache,
    ) -> Self {
        Self {
            backend,
            model: settings.model.clone(),
            settings,
            phrases,
            cache,
            next_call_at: None,
        }
    }

    pub fn service_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Ask the backend, honoring the pause between calls that reach it.
    ///
    /// A timeout or lost connection drops the backend for the rest of the run.
    async fn generate(&mut self, prompt: &Prompt, max_chars: usize) -> Result<String, SummarizeError> {
        let Some(backend) = &self.backend else {
            return Err(SummarizeError::Disabled);
        };
        if let Some(at) = self.next_call_at {
            sleep_until(at).await;
        }
        let result = backend.ask(prompt).await;
        match &result {
            Err(e @ (SummarizeError::Timeout | SummarizeError::Unavailable(_))) => {
                warn!(error = %e, "Generation service stopped answering; remaining summaries use the fallback");
                self.backend = None;
            }
            _ => {
                self.next_call_at =
                    Some(Instant::now() + Duration::from_millis(self.settings.inter_call_delay_ms));
            }
        }
        clean_response(&result?, max_chars)
    }

    /// Summary for one item; falls back instead of failing.
    #[instrument(level = "info", skip_all, fields(id = %item.item.id))]
    pub async fn summarize(&mut self, item: &ScoredItem) -> Summary {
        if let Some(hit) = self.cache.get(&item.fingerprint) {
            return Summary {
                text: hit.text.clone(),
                origin: SummaryOrigin::Cache,
            };
        }

        let prompt = item_prompt(item, &self.settings);
        let max_chars = self.settings.max_summary_chars;
        match self.generate(&prompt, max_chars).await {
            Ok(text) => {
                self.cache.insert(&item.fingerprint, &text, &self.model);
                Summary {
                    text,
                    origin: SummaryOrigin::Llm,
                }
            }
            Err(e) => {
                if !matches!(e, SummarizeError::Disabled) {
                    warn!(
                        error = %e,
                        title = %truncate_for_log(&item.item.title, 80),
                        "Generation failed; using fallback summary"
                    );
                }
                Summary {
                    text: fallback::item_summary(
                        &item.item.title,
                        &self.phrases,
                        &self.settings.fallback_prefix,
                        self.settings.max_summary_chars,
                    ),
                    origin: SummaryOrigin::Fallback,
                }
            }
        }
    }

    /// Attach a summary to every item, sequentially.
    #[instrument(level = "info", skip_all, fields(items = items.len()))]
    pub async fn summarize_all(&mut self, items: &mut [ScoredItem]) {
        for item in items.iter_mut() {
            let summary = self.summarize(item).await;
            item.summary = Some(summary);
        }
        let llm = items
            .iter()
            .filter(|s| matches!(s.summary.as_ref().map(|x| x.origin), Some(SummaryOrigin::Llm)))
            .count();
        info!(total = items.len(), llm, "Summarization finished");
    }

    /// One overview paragraph for the ranked items.
    #[instrument(level = "info", skip_all, fields(items = items.len()))]
    pub async fn digest(&mut self, items: &[ScoredItem]) -> Summary {
        if self.settings.digest_enabled && !items.is_empty() {
            let prompt = digest_prompt(items, &self.settings);
            let max_chars = self.settings.digest_max_chars;
            match self.generate(&prompt, max_chars).await {
                Ok(text) => {
                    return Summary {
                        text,
                        origin: SummaryOrigin::Llm,
                    };
                }
                Err(SummarizeError::Disabled) => {}
                Err(e) => warn!(error = %e, "Digest generation failed; using fallback digest"),
            }
        }
        Summary {
            text: fallback::digest(
                items,
                &self.settings.fallback_prefix,
                self.settings.digest_max_chars,
            ),
            origin: SummaryOrigin::Fallback,
        }
    }

    /// Persist newly generated summaries.
    pub async fn finish(&mut self) {
        if let Err(e) = self.cache.save().await {
            warn!(error = %e, "Failed to save summary cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateItem, Source, SourceKind};
    use crate::sources::test_support::serve;
    use axum::http::StatusCode as AxumStatus;
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scored(title: &str) -> ScoredItem {
        let source = Source::new("TechCrunch", SourceKind::Feed, "https://techcrunch.com/feed/");
        let item = CandidateItem::new(&source, title, "Body text", &format!("https://techcrunch.com/{}", title.len()), None);
        ScoredItem {
            cluster_id: item.id.clone(),
            fingerprint: crate::pipeline::dedup::fingerprint(&item, 200),
            item,
            merged_ids: Vec::new(),
            summary: None,
        }
    }

    fn settings(addr: std::net::SocketAddr) -> SummarizerSettings {
        SummarizerSettings {
            ollama_url: format!("http://{addr}"),
            timeout_secs: 2,
            probe_timeout_secs: 1,
            inter_call_delay_ms: 5,
            rate_limit_delay_ms: 10,
            ..SummarizerSettings::default()
        }
    }

    fn tags_route() -> Router {
        Router::new().route("/api/tags", get(|| async { Json(json!({"models": [{"name": "qwen3:8b"}]})) }))
    }

    async fn fake_service(answer: &'static str, hits: Arc<AtomicUsize>) -> std::net::SocketAddr {
        let app = tags_route().route(
            "/api/generate",
            post(move || {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"response": answer, "done": true}))
                }
            }),
        );
        serve(app).await
    }

    #[test]
    fn test_clean_response() {
        assert_eq!(clean_response("要約: OpenAIが新モデル発表", 50).unwrap(), "OpenAIが新モデル発表");
        assert_eq!(
            clean_response("<think>reasoning\nsteps</think>\n日本語要約: 新モデル", 50).unwrap(),
            "新モデル"
        );
        assert_eq!(clean_response("このニュースは新モデルの話", 50).unwrap(), "新モデルの話");
        assert!(matches!(clean_response("<think>never ends", 50), Err(SummarizeError::Malformed(_))));
        assert!(matches!(clean_response("  要約:  ", 50), Err(SummarizeError::Malformed(_))));
        let long = "あ".repeat(80);
        let clipped = clean_response(&long, 50).unwrap();
        assert_eq!(clipped.chars().count(), 50);
        assert!(clipped.ends_with("..."));
    }

    #[tokio::test]
    async fn test_llm_summary_and_cache() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = fake_service("要約: OpenAIが新しいモデルを発表", hits.clone()).await;
        let mut summarizer = Summarizer::connect(settings(addr), PhraseTables::default()).await;
        assert!(summarizer.service_available());

        let item = scored("OpenAI releases new model");
        let first = summarizer.summarize(&item).await;
        assert_eq!(first.origin, SummaryOrigin::Llm);
        assert_eq!(first.text, "OpenAIが新しいモデルを発表");

        let second = summarizer.summarize(&item).await;
        assert_eq!(second.origin, SummaryOrigin::Cache);
        assert_eq!(second.text, first.text);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_once_then_success() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = tags_route().route(
            "/api/generate",
            post(move || {
                let counter = counter.clone();
                async move {
                    let response: Response = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        AxumStatus::TOO_MANY_REQUESTS.into_response()
                    } else {
                        Json(json!({"response": "新モデル発表"})).into_response()
                    };
                    response
                }
            }),
        );
        let addr = serve(app).await;
        let mut summarizer = Summarizer::connect(settings(addr), PhraseTables::default()).await;

        let summary = summarizer.summarize(&scored("OpenAI releases new model")).await;
        assert_eq!(summary.origin, SummaryOrigin::Llm);
        assert_eq!(summary.text, "新モデル発表");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut summarizer = Summarizer::connect(settings(addr), PhraseTables::default()).await;
        assert!(!summarizer.service_available());

        let mut items = vec![scored("Apple weighs AI search acquisition"), scored("")];
        summarizer.summarize_all(&mut items).await;
        for item in &items {
            let summary = item.summary.as_ref().unwrap();
            assert_eq!(summary.origin, SummaryOrigin::Fallback);
            assert!(!summary.text.trim().is_empty());
        }
        assert_eq!(items[0].summary.as_ref().unwrap().text, "AI業界: Apple weighs AI検索 買収");

        let digest = summarizer.digest(&items).await;
        assert_eq!(digest.origin, SummaryOrigin::Fallback);
        assert!(!digest.text.is_empty());
    }

    #[tokio::test]
    async fn test_timeout_disables_service_for_remaining_items() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = tags_route().route(
            "/api/generate",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    Json(json!({"response": "too late"}))
                }
            }),
        );
        let addr = serve(app).await;
        let s = SummarizerSettings {
            timeout_secs: 1,
            ..settings(addr)
        };
        let mut summarizer = Summarizer::connect(s, PhraseTables::default()).await;
        assert!(summarizer.service_available());

        let mut items = vec![scored("OpenAI releases new model"), scored("Anthropic opens Tokyo office")];
        summarizer.summarize_all(&mut items).await;
        for item in &items {
            assert_eq!(item.summary.as_ref().unwrap().origin, SummaryOrigin::Fallback);
        }
        assert!(!summarizer.service_available());

        let digest = summarizer.digest(&items).await;
        assert_eq!(digest.origin, SummaryOrigin::Fallback);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_model_falls_back() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = fake_service("unused", hits.clone()).await;
        let mut s = settings(addr);
        s.model = "mistral".to_string();
        let mut summarizer = Summarizer::connect(s, PhraseTables::default()).await;

        let summary = summarizer.summarize(&scored("OpenAI releases new model")).await;
        assert_eq!(summary.origin, SummaryOrigin::Fallback);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unterminated_think_falls_back() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = fake_service("<think>Let me consider", hits).await;
        let mut summarizer = Summarizer::connect(settings(addr), PhraseTables::default()).await;

        let summary = summarizer.summarize(&scored("OpenAI releases new model")).await;
        assert_eq!(summary.origin, SummaryOrigin::Fallback);
        assert!(summary.text.starts_with("AI業界: "));
    }

    #[tokio::test]
    async fn test_disabled_never_calls_service() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = fake_service("unused", hits.clone()).await;
        let s = SummarizerSettings {
            enabled: false,
            ..settings(addr)
        };
        let mut summarizer = Summarizer::connect(s, PhraseTables::default()).await;
        let mut items = vec![scored("OpenAI releases new model")];
        summarizer.summarize_all(&mut items).await;
        let digest = summarizer.digest(&items).await;
        assert_eq!(digest.origin, SummaryOrigin::Fallback);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_llm_digest() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = fake_service("今週はOpenAIの新モデルが話題となった。", hits).await;
        let mut summarizer = Summarizer::connect(settings(addr), PhraseTables::default()).await;
        let digest = summarizer.digest(&[scored("OpenAI releases new model")]).await;
        assert_eq!(digest.origin, SummaryOrigin::Llm);
        assert!(digest.text.contains("OpenAI"));
    }
}
