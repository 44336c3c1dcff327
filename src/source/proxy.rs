//! Fetches page images from chapter hosts, presenting the headers each host
//! expects and undoing MangaPlus scrambling.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use tracing::{debug, warn};

use super::descramble;
use super::{BinarySource, RemoteImage};
use crate::error::SourceError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "vi,en-GB;q=0.9,en-US;q=0.8,en;q=0.7";

/// Known upstream hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    MangaDex,
    MangaPlus,
    Generic,
}

impl Upstream {
    pub fn detect(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        if host.ends_with("mangaplus.shueisha.co.jp") || host.ends_with("tokyo-cdn.com") {
            Upstream::MangaPlus
        } else if host.contains("mangadex") || url.path().starts_with("/data/") {
            Upstream::MangaDex
        } else {
            Upstream::Generic
        }
    }

    fn apply_headers(self, req: RequestBuilder) -> RequestBuilder {
        let req = req
            .header("accept", "*/*")
            .header("accept-language", ACCEPT_LANGUAGE)
            .header("user-agent", USER_AGENT);
        match self {
            Upstream::MangaDex => req
                .header("origin", "https://mangadex.org")
                .header("referer", "https://mangadex.org/")
                .header("cache-control", "no-cache")
                .header("pragma", "no-cache"),
            Upstream::MangaPlus => req
                .header("origin", "https://mangaplus.shueisha.co.jp")
                .header("referer", "https://mangaplus.shueisha.co.jp/"),
            Upstream::Generic => req,
        }
    }
}

pub struct SourceProxy {
    client: Client,
}

impl SourceProxy {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch a page for display: raw bytes plus a content type. MangaPlus
    /// pages are unscrambled and always reported as JPEG.
    pub async fn proxy_binary(&self, reference: &str) -> Result<RemoteImage, SourceError> {
        let url = Url::parse(reference).map_err(|_| SourceError::InvalidUrl(reference.into()))?;
        let upstream = Upstream::detect(&url);

        let response = upstream.apply_headers(self.client.get(url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(%status, url = reference, "Upstream refused page");
            return Err(status_error(status));
        }

        let header_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        debug!(?upstream, bytes = bytes.len(), "Fetched page");

        Ok(match upstream {
            Upstream::MangaPlus => RemoteImage {
                bytes: descramble::unscramble(bytes),
                mime_type: "image/jpeg".to_string(),
            },
            _ => RemoteImage {
                bytes,
                mime_type: header_type.unwrap_or_else(|| mime_from_extension(reference).into()),
            },
        })
    }
}

impl BinarySource for SourceProxy {
    /// Like [`SourceProxy::proxy_binary`] but insists on an image payload
    /// and strips media-type parameters.
    async fn fetch_binary(&self, reference: &str) -> Result<RemoteImage, SourceError> {
        let image = self.proxy_binary(reference).await?;
        let mime = image
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !mime.starts_with("image/") {
            return Err(SourceError::NotAnImage(image.mime_type));
        }
        Ok(RemoteImage {
            bytes: image.bytes,
            mime_type: mime,
        })
    }
}

fn status_error(status: StatusCode) -> SourceError {
    let message = match status.as_u16() {
        410 => "Image URL has expired. Please refresh or use a new URL.".to_string(),
        403 => "Access forbidden. The image URL may be invalid or restricted.".to_string(),
        404 => "Image not found. The URL may be incorrect.".to_string(),
        _ => format!("Failed to fetch image: {status}"),
    };
    SourceError::Status {
        status: status.as_u16(),
        message,
    }
}

fn mime_from_extension(url: &str) -> &'static str {
    let lower = url.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "image/png"
    }
}

/// Local file name for a fetched page: the last path segment of the URL.
/// Query strings never reach the name, and `.`/`..` fall back to `page.jpg`.
pub fn file_name_for(reference: &str) -> String {
    Url::parse(reference)
        .ok()
        .and_then(|url| {
            url.path_segments()?
                .next_back()
                .filter(|segment| !matches!(*segment, "" | "." | ".."))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "page.jpg".to_string())
}
