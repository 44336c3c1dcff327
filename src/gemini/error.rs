//! Tipos de erro para o cliente da API Gemini.
//!
//! Define [`GeminiError`] com variantes para erros da API, falhas de rede e
//! respostas sem imagem. A classificação em motivos de falha voltados ao
//! usuário fica no cliente de tradução.

use thiserror::Error;

use crate::error::ValidationError;

/// Erros que podem ocorrer ao interagir com a API Gemini.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// A chave da API não foi configurada.
    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,

    /// A imagem enviada não passou na validação do servidor.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// Erro retornado pela API (ex.: 429 limite de taxa, 503 sobrecarga).
    /// `provider_status` é o status textual do corpo, quando presente.
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        provider_status: Option<String>,
        message: String,
    },

    /// A resposta não trouxe a estrutura esperada.
    #[error("{0}")]
    Malformed(String),

    /// A resposta não contém nenhuma parte com imagem.
    #[error("No image data in Gemini API response")]
    MissingImage,

    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
