use thiserror::Error;

/// Top-level error for store and dispatcher operations.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("Image not found: {0}")]
    ItemNotFound(String),

    #[error("Image is already being translated: {0}")]
    ItemBusy(String),

    /// Manual retry is only offered for failed pages.
    #[error("Image has not failed, nothing to retry: {0}")]
    NotFailed(String),

    #[error("Please add feedback text to comments before regenerating.")]
    NoFeedbackProvided,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejection of a candidate file before it becomes a work item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid file type: {name}. Please select a .jpg, .png, or .webp image.")]
    InvalidType { name: String },

    #[error("File size exceeds 10MB: {name}. Please select a smaller image.")]
    TooLarge { name: String },
}

/// Why a single translate cycle failed. The `Display` text is what ends up
/// on the work item.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The original page of a remote-sourced item could not be fetched.
    #[error("Failed to fetch source image: {0}")]
    SourceUnavailable(String),

    #[error("Model is overloaded. Please try again in a few seconds.")]
    ServiceOverloaded,

    #[error("API rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("{0}")]
    RemoteRejected(String),
}

impl FailureReason {
    /// Short machine-friendly label, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::SourceUnavailable(_) => "source_unavailable",
            FailureReason::ServiceOverloaded => "service_overloaded",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::RemoteRejected(_) => "remote_rejected",
        }
    }
}

/// Chapter resolution failures. Never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChapterError {
    #[error("Invalid MangaDex chapter URL format: {0}")]
    InvalidReference(String),

    #[error("Failed to fetch chapter: {0}")]
    UpstreamError(String),

    #[error("No images found in this chapter")]
    EmptyChapter,
}

/// Failures of the binary fetch/proxy collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Invalid image format. Expected image/*, got {0}")]
    NotAnImage(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
