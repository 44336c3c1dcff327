//! MangaDex chapter lookup through the `at-home/server` endpoint.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::ChapterLookup;
use crate::error::ChapterError;

const API_URL: &str = "https://api.mangadex.org";

static CHAPTER_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/chapter/([a-f0-9-]+)").expect("valid chapter regex"));

static CHAPTER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("valid chapter id regex")
});

/// Extract the chapter id from a chapter URL or accept a bare chapter id.
pub fn parse_chapter_id(reference: &str) -> Result<String, ChapterError> {
    let reference = reference.trim();
    if CHAPTER_ID.is_match(reference) {
        return Ok(reference.to_ascii_lowercase());
    }
    CHAPTER_URL
        .captures(reference)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .ok_or_else(|| ChapterError::InvalidReference(reference.to_string()))
}

/// Raw `at-home/server/{id}` payload. Every field is optional so that a
/// malformed response is reported as an upstream error rather than a
/// decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtHomeServer {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub chapter: Option<AtHomeChapter>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AtHomeChapter {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl AtHomeServer {
    /// Page locations in upstream order: `{baseUrl}/data/{hash}/{file}`.
    pub fn page_urls(&self) -> Result<Vec<String>, ChapterError> {
        let chapter = match (&self.result, &self.chapter) {
            (Some(result), Some(chapter)) if result == "ok" => chapter,
            _ => {
                return Err(ChapterError::UpstreamError(
                    "Invalid response from MangaDex API".into(),
                ));
            }
        };

        let malformed = || ChapterError::UpstreamError("Invalid chapter data structure".into());
        let base_url = self.base_url.as_deref().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let hash = chapter.hash.as_deref().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let files = chapter
            .data
            .as_ref()
            .and_then(|d| d.as_array())
            .ok_or_else(malformed)?;

        files
            .iter()
            .map(|f| {
                f.as_str()
                    .map(|name| format!("{base_url}/data/{hash}/{name}"))
                    .ok_or_else(malformed)
            })
            .collect()
    }
}

pub struct MangaDexClient {
    client: Client,
    base_url: String,
}

impl MangaDexClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::with_base_url(API_URL.to_string(), timeout)
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ChapterLookup for MangaDexClient {
    async fn at_home(&self, chapter_id: &str) -> Result<AtHomeServer, ChapterError> {
        let url = format!("{}/at-home/server/{chapter_id}", self.base_url);
        debug!(%url, "Looking up chapter");

        let response = self
            .client
            .get(&url)
            .query(&[("forcePort443", "false")])
            .header("accept", "*/*")
            .header("origin", "https://mangadex.org")
            .header("referer", "https://mangadex.org/")
            .header("cache-control", "no-cache")
            .send()
            .await
            .map_err(|e| ChapterError::UpstreamError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChapterError::UpstreamError(format!(
                "Failed to fetch chapter info: {status}"
            )));
        }

        response
            .json::<AtHomeServer>()
            .await
            .map_err(|_| ChapterError::UpstreamError("Invalid response from MangaDex API".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ID: &str = "5364d445-4774-4af7-8f88-a2d99d66465b";

    #[test]
    fn parses_chapter_url() {
        let id = parse_chapter_id(&format!("https://mangadex.org/chapter/{ID}/2")).unwrap();
        assert_eq!(id, ID);
    }

    #[test]
    fn parses_bare_id_case_insensitively() {
        let id = parse_chapter_id(&ID.to_uppercase()).unwrap();
        assert_eq!(id, ID);
    }

    #[test]
    fn rejects_other_shapes() {
        for bad in ["", "https://mangadex.org/title/abc", "hello world"] {
            assert!(matches!(
                parse_chapter_id(bad),
                Err(ChapterError::InvalidReference(_))
            ));
        }
    }

    #[test]
    fn page_urls_preserve_order() {
        let server: AtHomeServer = serde_json::from_value(serde_json::json!({
            "result": "ok",
            "baseUrl": "https://node.example",
            "chapter": {"hash": "h1", "data": ["3.png", "1.png", "2.png"]}
        }))
        .unwrap();
        assert_eq!(
            server.page_urls().unwrap(),
            vec![
                "https://node.example/data/h1/3.png",
                "https://node.example/data/h1/1.png",
                "https://node.example/data/h1/2.png",
            ]
        );
    }

    #[test]
    fn page_urls_reject_non_array_data() {
        let server: AtHomeServer = serde_json::from_value(serde_json::json!({
            "result": "ok",
            "baseUrl": "https://node.example",
            "chapter": {"hash": "h1", "data": "1.png"}
        }))
        .unwrap();
        assert!(matches!(
            server.page_urls(),
            Err(ChapterError::UpstreamError(_))
        ));
    }

    #[test]
    fn page_urls_reject_error_result() {
        let server: AtHomeServer =
            serde_json::from_value(serde_json::json!({"result": "error"})).unwrap();
        assert!(matches!(
            server.page_urls(),
            Err(ChapterError::UpstreamError(_))
        ));
    }

    #[tokio::test]
    async fn at_home_calls_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/at-home/server/{ID}")))
            .and(query_param("forcePort443", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": "ok",
                "baseUrl": "https://node.example",
                "chapter": {"hash": "h", "data": ["a.jpg"]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = MangaDexClient::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        let at_home = client.at_home(ID).await.unwrap();
        assert_eq!(at_home.page_urls().unwrap(), vec!["https://node.example/data/h/a.jpg"]);
    }

    #[tokio::test]
    async fn at_home_maps_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = MangaDexClient::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.at_home(ID).await.unwrap_err();
        assert_eq!(
            err,
            ChapterError::UpstreamError("Failed to fetch chapter info: 404 Not Found".into())
        );
    }

    #[tokio::test]
    async fn at_home_maps_garbage_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = MangaDexClient::with_base_url(server.uri(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.at_home(ID).await,
            Err(ChapterError::UpstreamError(_))
        ));
    }
}
