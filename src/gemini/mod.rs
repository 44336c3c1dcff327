pub mod client;
pub mod error;
pub mod prompt;
pub mod types;

pub use client::GeminiClient;
pub use error::GeminiError;
pub use types::{ModelInfo, TranslateRequest, TranslatedImage};

/// The remote image-editing service: one page in, one edited page out.
///
/// Implemented by [`GeminiClient`]; tests substitute scripted fakes.
#[allow(async_fn_in_trait)]
pub trait ImageTranslator {
    async fn translate(&self, req: &TranslateRequest) -> Result<TranslatedImage, GeminiError>;
}
