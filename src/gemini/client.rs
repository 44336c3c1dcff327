use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use reqwest::Client;
use tracing::debug;

use super::error::GeminiError;
use super::prompt::build_prompt;
use super::types::{
    ApiErrorEnvelope, Content, GenerateContentRequest, GenerateContentResponse, InlineData,
    MediaResolution, ModelInfo, ModelList, Part, TranslateRequest, TranslatedImage,
};
use super::ImageTranslator;
use crate::config::AppConfig;
use crate::validate;

const API_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";

pub struct GeminiClient {
    api_key: String,
    client: Client,
    base_url: String,
    api_version: String,
    model: String,
    target_language: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self, GeminiError> {
        Self::with_base_url(api_key, API_URL.to_string())
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self, GeminiError> {
        Self::build(api_key, base_url, Duration::from_secs(120))
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GeminiError> {
        let mut client = Self::build(
            config.api_key.clone(),
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        client.api_version = config.api_version.clone();
        client.model = config.model.clone();
        client.target_language = config.target_language.clone();
        Ok(client)
    }

    fn build(api_key: String, base_url: String, timeout: Duration) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: "v1alpha".to_string(),
            model: DEFAULT_MODEL.to_string(),
            target_language: "Vietnamese".to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one page to the image model and return the edited page.
    pub async fn generate(&self, req: &TranslateRequest) -> Result<TranslatedImage, GeminiError> {
        if self.api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }
        validate::validate("image", &req.mime_type, req.image.len() as u64)?;

        let prompt = build_prompt(
            &self.target_language,
            req.series_hint.as_deref(),
            req.feedback.as_deref(),
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![
                    Part {
                        text: Some(prompt),
                        ..Default::default()
                    },
                    Part {
                        inline_data: Some(InlineData {
                            mime_type: req.mime_type.clone(),
                            data: BASE64_STANDARD.encode(&req.image),
                        }),
                        media_resolution: Some(MediaResolution {
                            level: "MEDIA_RESOLUTION_HIGH".into(),
                        }),
                        ..Default::default()
                    },
                ],
            }],
        };

        let url = format!(
            "{}/{}/models/{}:generateContent",
            self.base_url, self.api_version, self.model
        );
        debug!(model = %self.model, bytes = req.image.len(), "Sending page to image model");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        let body = response.json::<GenerateContentResponse>().await?;
        extract_image(body, &req.mime_type)
    }

    /// List the models exposed to this API key, following pagination.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, GeminiError> {
        if self.api_key.trim().is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        let url = format!("{}/v1beta/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "100")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(api_error(status, &text));
            }

            let page = response.json::<ModelList>().await?;
            models.extend(page.models);
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}

impl ImageTranslator for GeminiClient {
    async fn translate(&self, req: &TranslateRequest) -> Result<TranslatedImage, GeminiError> {
        self.generate(req).await
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> GeminiError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => GeminiError::Api {
            status: if envelope.error.code == 0 {
                status.as_u16()
            } else {
                envelope.error.code
            },
            provider_status: envelope.error.status,
            message: envelope.error.message,
        },
        Err(_) => GeminiError::Api {
            status: status.as_u16(),
            provider_status: None,
            message: if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                body.trim().to_string()
            },
        },
    }
}

fn extract_image(
    body: GenerateContentResponse,
    request_mime: &str,
) -> Result<TranslatedImage, GeminiError> {
    let content = body
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| GeminiError::Malformed("No response from Gemini API".into()))?;

    if content.parts.is_empty() {
        return Err(GeminiError::Malformed(
            "No content parts in Gemini API response".into(),
        ));
    }

    content
        .parts
        .into_iter()
        .filter_map(|p| p.inline_data)
        .find(|d| !d.data.is_empty())
        .map(|d| TranslatedImage {
            mime_type: if d.mime_type.is_empty() {
                request_mime.to_string()
            } else {
                d.mime_type
            },
            data_base64: d.data,
        })
        .ok_or(GeminiError::MissingImage)
}
