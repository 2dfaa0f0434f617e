//! Text-generation service client with a single rate-limit re-attempt.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for sending a prompt and receiving text
//! - [`OllamaClient`]: talks to an Ollama server's `/api/generate`
//! - [`RateLimitRetry`]: decorator that waits once and re-attempts once when
//!   the service answers `429`
//!
//! No other retry policy exists. Timeouts, connection failures and malformed
//! responses are returned to the caller, which falls back to a deterministic
//! summary.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::SummarizerSettings;
use crate::error::SummarizeError;

/// One generation request.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    /// Token cap for the answer.
    pub num_predict: u32,
    /// Sequences that end generation.
    pub stop: Vec<String>,
}

/// Trait for async text generation.
///
/// Implementors send a prompt and return the raw answer. Decorators like
/// [`RateLimitRetry`] wrap another implementor.
pub trait AskAsync {
    type Response;

    async fn ask(&self, prompt: &Prompt) -> Result<Self::Response, SummarizeError>;
}

/// Wrapper that re-attempts once, after a fixed delay, when the inner client
/// is rate limited.
pub struct RateLimitRetry<T> {
    inner: T,
    delay: Duration,
}

impl<T> RateLimitRetry<T>
where
    T: AskAsync,
{
    pub fn new(inner: T, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl<T> fmt::Debug for RateLimitRetry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitRetry")
            .field("delay", &self.delay)
            .finish()
    }
}

impl<T> AskAsync for RateLimitRetry<T>
where
    T: AskAsync,
{
    type Response = T::Response;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, prompt: &Prompt) -> Result<Self::Response, SummarizeError> {
        match self.inner.ask(prompt).await {
            Err(SummarizeError::RateLimited) => {
                warn!(delay = ?self.delay, "Generation service rate limited; waiting before a single re-attempt");
                sleep(self.delay).await;
                self.inner.ask(prompt).await
            }
            other => other,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    think: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    num_predict: u32,
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Client for an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    probe_timeout: Duration,
}

impl OllamaClient {
    pub fn new(settings: &SummarizerSettings) -> Result<Self, SummarizeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.ollama_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            probe_timeout: Duration::from_secs(settings.probe_timeout_secs),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the service answers and offers the configured model.
    #[instrument(level = "info", skip_all, fields(url = %self.base_url, model = %self.model))]
    pub async fn probe(&self) -> Result<bool, SummarizeError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(self.probe_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SummarizeError::Status(response.status().as_u16()));
        }
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::Malformed(e.to_string()))?;
        let available = tags.models.iter().any(|m| m.name.contains(&self.model));
        info!(available, models = tags.models.len(), "Probed generation service");
        Ok(available)
    }
}

impl AskAsync for OllamaClient {
    type Response = String;

    #[instrument(level = "info", skip_all, fields(model = %self.model))]
    async fn ask(&self, prompt: &Prompt) -> Result<Self::Response, SummarizeError> {
        let t0 = Instant::now();
        let body = GenerateRequest {
            model: &self.model,
            prompt: &prompt.text,
            stream: false,
            think: false,
            options: GenerateOptions {
                temperature: self.temperature,
                top_p: 0.9,
                top_k: 40,
                num_predict: prompt.num_predict,
                stop: &prompt.stop,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SummarizeError::RateLimited);
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), elapsed_ms = t0.elapsed().as_millis(), "Generation request failed");
            return Err(SummarizeError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| SummarizeError::Malformed(e.to_string()))?;
        debug!(elapsed_ms = t0.elapsed().as_millis(), chars = parsed.response.chars().count(), "Generation finished");
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_support::serve;
    use axum::Json;
    use axum::Router;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::Mutex;

    fn settings(addr: std::net::SocketAddr) -> SummarizerSettings {
        SummarizerSettings {
            ollama_url: format!("http://{addr}/"),
            timeout_secs: 2,
            probe_timeout_secs: 1,
            ..SummarizerSettings::default()
        }
    }

    fn prompt() -> Prompt {
        Prompt {
            text: "Summarize".to_string(),
            num_predict: 80,
            stop: vec!["\n".to_string()],
        }
    }

    #[tokio::test]
    async fn test_ask_sends_expected_request() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/api/generate",
            post(move |Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    *captured.lock().unwrap() = Some(body);
                    Json(json!({"model": "qwen3:8b", "response": "要約", "done": true}))
                }
            }),
        );
        let addr = serve(app).await;
        let client = OllamaClient::new(&settings(addr)).unwrap();

        let answer = client.ask(&prompt()).await.unwrap();
        assert_eq!(answer, "要約");

        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["model"], "qwen3:8b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["think"], false);
        assert_eq!(body["options"]["num_predict"], 80);
        assert_eq!(body["options"]["top_k"], 40);
        assert_eq!(body["options"]["stop"][0], "\n");
    }

    #[tokio::test]
    async fn test_status_and_malformed_errors() {
        let app = Router::new()
            .route("/api/generate", post(|| async { "not json" }));
        let addr = serve(app).await;
        let client = OllamaClient::new(&settings(addr)).unwrap();
        assert!(matches!(client.ask(&prompt()).await, Err(SummarizeError::Malformed(_))));

        let app = Router::new().route("/api/generate", post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }));
        let addr = serve(app).await;
        let client = OllamaClient::new(&settings(addr)).unwrap();
        assert!(matches!(client.ask(&prompt()).await, Err(SummarizeError::Status(500))));
    }

    #[tokio::test]
    async fn test_rate_limit_retry_once() {
        let app = Router::new().route("/api/generate", post(|| async { AxumStatus::TOO_MANY_REQUESTS }));
        let addr = serve(app).await;
        let client = RateLimitRetry::new(OllamaClient::new(&settings(addr)).unwrap(), Duration::from_millis(10));
        assert!(matches!(client.ask(&prompt()).await, Err(SummarizeError::RateLimited)));
    }

    #[tokio::test]
    async fn test_probe() {
        let app = Router::new().route(
            "/api/tags",
            get(|| async { Json(json!({"models": [{"name": "qwen3:8b"}, {"name": "llama3:latest"}]})) }),
        );
        let addr = serve(app).await;
        let client = OllamaClient::new(&settings(addr)).unwrap();
        assert!(client.probe().await.unwrap());

        let mut other = settings(addr);
        other.model = "mistral".to_string();
        let client = OllamaClient::new(&other).unwrap();
        assert!(!client.probe().await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = OllamaClient::new(&settings(addr)).unwrap();
        assert!(client.probe().await.is_err());
        assert!(client.ask(&prompt()).await.is_err());
    }
}
