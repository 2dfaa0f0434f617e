//! Error types for each pipeline stage.
//!
//! Errors are local to the stage that produced them. A [`SourceError`] costs the
//! batch one source, a [`SummarizeError`] costs one item its LLM summary, and
//! only a [`ConfigError`] stops a run before it begins.

use thiserror::Error;

/// Failure while collecting from a single source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("rate limited after one re-attempt")]
    RateLimited,

    #[error("feed could not be parsed: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),

    #[error("response was not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("API key variable {0} is not set")]
    MissingApiKey(String),

    #[error("API reported an error: {0}")]
    Api(String),

    #[error("gave up at the collection deadline")]
    Deadline,
}

/// Failure while asking the text-generation service for a summary.
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("generation service is disabled")]
    Disabled,

    #[error("generation service unavailable: {0}")]
    Unavailable(String),

    #[error("generation request timed out")]
    Timeout,

    #[error("generation service rate limited the request")]
    RateLimited,

    #[error("generation service returned HTTP status {0}")]
    Status(u16),

    #[error("malformed generation response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for SummarizeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SummarizeError::Timeout
        } else if e.is_decode() {
            SummarizeError::Malformed(e.to_string())
        } else {
            SummarizeError::Unavailable(e.to_string())
        }
    }
}

/// Failure while loading the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
