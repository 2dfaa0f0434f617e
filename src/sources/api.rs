//! NewsAPI-compatible search collector.
//!
//! Queries `{endpoint}?q=...&from=...` with the configured topics joined by
//! `OR`. The key is read from the environment variable named by the source's
//! `api_key_env`, so it never lives in the configuration file.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument};

use super::{CollectContext, get_with_rate_limit};
use crate::dates::parse_timestamp;
use crate::error::SourceError;
use crate::models::{CandidateItem, Source};
use crate::utils::strip_html;

/// NewsAPI rejects larger pages on the free tier.
const MAX_PAGE_SIZE: usize = 100;

static TRUNCATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*…?\s*\[\+\d+ chars\]\s*$").expect("truncation marker regex"));

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<SearchArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    source: Option<SearchArticleSource>,
}

#[derive(Debug, Deserialize)]
struct SearchArticleSource {
    #[serde(default)]
    name: Option<String>,
}

/// Query one search API source for the configured topics.
#[instrument(level = "info", skip_all, fields(source = %source.name))]
pub async fn collect(ctx: &CollectContext, source: &Source) -> Result<Vec<CandidateItem>, SourceError> {
    let key_var = source.api_key_env.as_deref().unwrap_or("NEWSAPI_KEY");
    let api_key = std::env::var(key_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| SourceError::MissingApiKey(key_var.to_string()))?;

    let query = [
        ("q", build_query(&ctx.topics)),
        ("from", ctx.since.format("%Y-%m-%d").to_string()),
        ("language", "en".to_string()),
        ("sortBy", "publishedAt".to_string()),
        ("pageSize", ctx.max_items_per_source.min(MAX_PAGE_SIZE).to_string()),
        ("apiKey", api_key),
    ];

    let body = get_with_rate_limit(&ctx.client, &source.endpoint, &query, ctx.rate_limit_delay)
        .await?
        .text()
        .await?;
    let items = parse_response(&body, source)?;
    info!(count = items.len(), "Parsed search results");
    Ok(items)
}

/// Join topics into an `OR` query, quoting multi-word topics.
pub fn build_query(topics: &[String]) -> String {
    topics
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.contains(char::is_whitespace) {
                format!("\"{t}\"")
            } else {
                t.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Parse a search response body into candidate items.
pub fn parse_response(body: &str, source: &Source) -> Result<Vec<CandidateItem>, SourceError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    if response.status != "ok" {
        return Err(SourceError::Api(
            response.message.unwrap_or_else(|| response.status.clone()),
        ));
    }

    Ok(response
        .articles
        .into_iter()
        .filter_map(|article| {
            let url = article.url.filter(|u| !u.trim().is_empty())?;
            let title = article.title.unwrap_or_default();
            let description = strip_html(article.description.as_deref().unwrap_or_default());
            let content = article
                .content
                .map(|c| TRUNCATION_MARKER.replace(&strip_html(&c), "").into_owned())
                .unwrap_or_default();
            let body = if description.is_empty() { content } else { description };

            let mut item = CandidateItem::new(
                source,
                &title,
                &body,
                &url,
                article.published_at.as_deref().and_then(parse_timestamp),
            );
            item.author = article.author.filter(|a| !a.trim().is_empty());
            if let Some(outlet) = article.source.and_then(|s| s.name) {
                item.tags.push(outlet);
            }
            Some(item)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use chrono::{TimeZone, Utc};

    fn source() -> Source {
        Source::new("NewsAPI", SourceKind::Api, "https://newsapi.org/v2/everything")
    }

    #[test]
    fn test_build_query() {
        let topics = vec![
            "OpenAI".to_string(),
            "machine learning".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(build_query(&topics), "OpenAI OR \"machine learning\"");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "source": {"id": null, "name": "The Verge"},
                    "author": "Jane Doe",
                    "title": "OpenAI releases new model",
                    "description": "",
                    "url": "https://www.theverge.com/openai-model",
                    "publishedAt": "2025-06-10T14:30:00Z",
                    "content": "The model is faster and cheaper… [+2345 chars]"
                },
                {
                    "title": "No URL here",
                    "url": null
                }
            ]
        }"#;
        let items = parse_response(body, &source()).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.title, "OpenAI releases new model");
        assert_eq!(item.body, "The model is faster and cheaper");
        assert_eq!(
            item.published_at,
            Some(Utc.with_ymd_and_hms(2025, 6, 10, 14, 30, 0).unwrap())
        );
        assert_eq!(item.author.as_deref(), Some("Jane Doe"));
        assert_eq!(item.tags, vec!["The Verge"]);
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"status": "error", "code": "apiKeyInvalid", "message": "Your API key is invalid."}"#;
        match parse_response(body, &source()) {
            Err(SourceError::Api(msg)) => assert_eq!(msg, "Your API key is invalid."),
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_key_fails_source() {
        let ctx = super::super::test_support::context(reqwest::Client::new());
        let mut source = source();
        source.api_key_env = Some("WEEKLY_BRIEF_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        let result = collect(&ctx, &source).await;
        assert!(matches!(result, Err(SourceError::MissingApiKey(_))));
    }
}
