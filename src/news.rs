//! Top headlines via `NewsAPI`

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::{Error, Result};

const TOP_HEADLINES_URL: &str = "https://newsapi.org/v2/top-headlines";

/// Keys shipped in sample configs that were never replaced
const PLACEHOLDER_KEYS: [&str; 2] = ["YOUR_NEWSAPI_KEY_HERE", "changeme"];

/// Source of news headlines
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    /// Fetch up to `limit` headline titles, optionally filtered by topic
    ///
    /// # Errors
    ///
    /// Returns error on a missing credential or a transport/service failure
    async fn fetch(&self, topic: Option<&str>, country: &str, limit: usize) -> Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
struct HeadlinesResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    title: Option<String>,
}

/// `NewsAPI` top-headlines client
pub struct NewsApi {
    client: reqwest::Client,
    api_key: Option<SecretString>,
}

impl NewsApi {
    /// Create a client; a missing key is reported on first fetch
    #[must_use]
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    fn key(&self) -> Result<&str> {
        let key = self
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().trim())
            .unwrap_or_default();

        if key.is_empty() || PLACEHOLDER_KEYS.contains(&key) {
            return Err(Error::Config("NEWS_API_KEY is not set".to_string()));
        }
        Ok(key)
    }
}

#[async_trait]
impl HeadlineSource for NewsApi {
    async fn fetch(&self, topic: Option<&str>, country: &str, limit: usize) -> Result<Vec<String>> {
        let key = self.key()?;
        let page_size = limit.clamp(1, 20).to_string();

        let mut query = vec![
            ("apiKey", key),
            ("country", country),
            ("pageSize", page_size.as_str()),
        ];
        if let Some(topic) = topic.filter(|t| !t.trim().is_empty()) {
            query.push(("q", topic));
        }

        tracing::debug!(?topic, country, limit, "fetching headlines");

        let response = self
            .client
            .get(TOP_HEADLINES_URL)
            .query(&query)
            .timeout(Duration::from_secs(12))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(400).collect();
            return Err(Error::News(format!("HTTP {status}: {body}")));
        }

        parse_headlines(&response.text().await?)
    }
}

/// Parse a headline response body into trimmed titles
fn parse_headlines(body: &str) -> Result<Vec<String>> {
    let data: HeadlinesResponse = serde_json::from_str(body)?;
    parse_titles(data)
}

fn parse_titles(data: HeadlinesResponse) -> Result<Vec<String>> {
    if data.status != "ok" {
        return Err(Error::News(
            data.message
                .unwrap_or_else(|| format!("unexpected status '{}'", data.status)),
        ));
    }

    Ok(data
        .articles
        .into_iter()
        .filter_map(|a| a.title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_titles_in_order_skipping_empty() {
        let titles = parse_headlines(
            r#"{"status":"ok","articles":[{"title":"First"},{"title":""},{"title":null},{"title":"Second"}]}"#,
        )
        .unwrap();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[test]
    fn test_malformed_body_is_serialization_error() {
        assert!(matches!(
            parse_headlines("<html>rate limited</html>"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_error_status_is_error() {
        let data: HeadlinesResponse =
            serde_json::from_str(r#"{"status":"error","message":"apiKeyInvalid"}"#).unwrap();
        assert!(matches!(parse_titles(data), Err(Error::News(m)) if m == "apiKeyInvalid"));
    }

    #[tokio::test]
    async fn test_missing_or_placeholder_key_fails_before_request() {
        let missing = NewsApi::new(None);
        assert!(matches!(
            missing.fetch(None, "us", 3).await,
            Err(Error::Config(_))
        ));

        let placeholder = NewsApi::new(Some(SecretString::from("YOUR_NEWSAPI_KEY_HERE")));
        assert!(matches!(
            placeholder.fetch(Some("tech"), "us", 3).await,
            Err(Error::Config(_))
        ));
    }
}
