//! Translation client: turns one work item into a translated artifact.
//!
//! Materializes the page bytes (directly for local items, through a
//! [`BinarySource`] for remote ones), calls the [`ImageTranslator`] and
//! classifies failures into a [`FailureReason`]. A failed first attempt is
//! retried once after a fixed pause. The client never touches the store;
//! the dispatcher applies the returned [`TranslationOutcome`].

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::error::FailureReason;
use crate::gemini::{GeminiError, ImageTranslator, TranslateRequest, TranslatedImage};
use crate::source::BinarySource;
use crate::state_machine::{ItemSource, WorkItem};

const AUTH_FAILED: &str = "API authentication failed. Please check the API key.";

/// One-shot retry policy: at most `max_attempts` remote calls per cycle,
/// with a fixed `delay` before the retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.retry_delay_ms),
            ..Self::default()
        }
    }
}

/// Per-call context.
#[derive(Debug, Clone, Default)]
pub struct TranslateContext {
    pub series_hint: Option<String>,
    /// Numbered correction list; only set when regenerating.
    pub feedback: Option<String>,
    /// A caller-initiated retry. Counts as a retry before the policy runs.
    pub forced_retry: bool,
}

/// A translated page, addressable as a data URI.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub location: String,
    pub mime_type: String,
}

impl Artifact {
    pub fn from_image(image: TranslatedImage) -> Self {
        let mime_type = if image.mime_type.trim().is_empty() {
            "image/png".to_string()
        } else {
            image.mime_type
        };
        Self {
            location: format!("data:{mime_type};base64,{}", image.data_base64),
            mime_type,
        }
    }
}

/// Decode a `data:{mime};base64,{payload}` location into its media type
/// and bytes. Returns `None` for any other shape.
pub fn decode_data_uri(location: &str) -> Option<(String, Vec<u8>)> {
    let rest = location.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = BASE64_STANDARD.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    pub result: Result<Artifact, FailureReason>,
    /// Retry counter to record on the item if the result is a failure.
    pub retry_count: u32,
    /// Remote round trips made in this cycle.
    pub attempts: u32,
}

/// Map a collaborator error onto the user-facing failure taxonomy.
///
/// A status code or provider status wins; otherwise the message text is
/// searched for overload and rate-limit markers.
pub fn classify(err: &GeminiError) -> FailureReason {
    if let GeminiError::Api {
        status,
        provider_status,
        message,
    } = err
    {
        match (*status, provider_status.as_deref()) {
            (503, _) | (_, Some("UNAVAILABLE")) => return FailureReason::ServiceOverloaded,
            (429, _) => return FailureReason::RateLimited,
            (401 | 403, _) => return FailureReason::RemoteRejected(AUTH_FAILED.into()),
            _ => {}
        }
        return classify_text(message);
    }
    classify_text(&err.to_string())
}

fn classify_text(message: &str) -> FailureReason {
    let lower = message.to_ascii_lowercase();
    if lower.contains("503") || lower.contains("overloaded") {
        FailureReason::ServiceOverloaded
    } else if lower.contains("429") || lower.contains("rate limit") {
        FailureReason::RateLimited
    } else if message.trim().is_empty() {
        FailureReason::RemoteRejected("Error from Gemini API.".into())
    } else {
        FailureReason::RemoteRejected(message.to_string())
    }
}

pub struct TranslationClient<T, S> {
    translator: T,
    source: S,
    policy: RetryPolicy,
}

impl<T: ImageTranslator, S: BinarySource> TranslationClient<T, S> {
    pub fn new(translator: T, source: S) -> Self {
        Self::with_policy(translator, source, RetryPolicy::default())
    }

    pub fn with_policy(translator: T, source: S, policy: RetryPolicy) -> Self {
        Self {
            translator,
            source,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run one translate cycle for `item`.
    ///
    /// The automatic retry fires only while the effective retry count is
    /// zero, whatever the failure kind. A forced retry bumps the count
    /// first, so it gets exactly one remote call.
    pub async fn translate(&self, item: &WorkItem, ctx: &TranslateContext) -> TranslationOutcome {
        let mut retry_count = item.retry_count + u32::from(ctx.forced_retry);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.attempt(item, ctx).await {
                Ok(artifact) => {
                    debug!(item = %item.id, attempts, "Translation succeeded");
                    return TranslationOutcome {
                        result: Ok(artifact),
                        retry_count,
                        attempts,
                    };
                }
                Err(reason) if retry_count == 0 && attempts < self.policy.max_attempts => {
                    warn!(
                        item = %item.id,
                        attempt = attempts,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        reason = reason.kind(),
                        "Retrying translation: {reason}"
                    );
                    sleep(self.policy.delay).await;
                    retry_count += 1;
                }
                Err(reason) => {
                    warn!(item = %item.id, attempts, reason = reason.kind(), "Translation failed: {reason}");
                    return TranslationOutcome {
                        result: Err(reason),
                        retry_count,
                        attempts,
                    };
                }
            }
        }
    }

    async fn attempt(
        &self,
        item: &WorkItem,
        ctx: &TranslateContext,
    ) -> Result<Artifact, FailureReason> {
        let (image, mime_type) = match &item.source {
            ItemSource::Local { bytes, mime_type } => (Arc::clone(bytes), mime_type.clone()),
            ItemSource::Remote { url } => {
                let fetched = self
                    .source
                    .fetch_binary(url)
                    .await
                    .map_err(|e| FailureReason::SourceUnavailable(e.to_string()))?;
                (Arc::from(fetched.bytes), fetched.mime_type)
            }
        };

        let request = TranslateRequest {
            image,
            mime_type,
            series_hint: ctx.series_hint.clone(),
            feedback: ctx.feedback.clone(),
        };
        let image = self
            .translator
            .translate(&request)
            .await
            .map_err(|e| classify(&e))?;
        Ok(Artifact::from_image(image))
    }
}
