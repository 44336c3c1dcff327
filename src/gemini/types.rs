//! Tipos de dados para requisições e respostas da API Gemini `generateContent`.
//!
//! As structs de fio usam `camelCase` via `serde(rename_all)`, conforme o
//! formato JSON da API. [`TranslateRequest`] e [`TranslatedImage`] são o
//! contrato interno entre o cliente de tradução e o colaborador.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Entrada do colaborador de tradução: bytes da página e contexto opcional.
#[derive(Debug, Clone)]
pub struct TranslateRequest {
    /// Bytes brutos da imagem original.
    pub image: Arc<[u8]>,
    /// Tipo de mídia declarado (ex.: "image/png").
    pub mime_type: String,
    /// Nome da série, usado como contexto de tom e pronomes.
    pub series_hint: Option<String>,
    /// Lista numerada de correções; presente apenas em regenerações.
    pub feedback: Option<String>,
}

/// Imagem traduzida devolvida pelo colaborador.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedImage {
    /// Conteúdo em base64.
    pub data_base64: String,
    /// Tipo de mídia da imagem gerada.
    pub mime_type: String,
}

/// Corpo da requisição para `models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

/// Um turno de conversa composto por partes (texto e/ou dados inline).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Uma parte de conteúdo: texto, imagem inline, ou ambos ausentes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    /// Resolução de mídia solicitada para a imagem de entrada (v1alpha).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_resolution: Option<MediaResolution>,
}

/// Dados binários codificados em base64 com seu tipo de mídia.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaResolution {
    pub level: String,
}

/// Resposta de `generateContent`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

/// Envelope de erro devolvido pela API (`{"error": {...}}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    /// Status textual do provedor (ex.: "UNAVAILABLE", "RESOURCE_EXHAUSTED").
    #[serde(default)]
    pub status: Option<String>,
}

/// Página da listagem de modelos (`GET v1beta/models`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelList {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_serializes_camel_case_and_skips_empty_fields() {
        let part = Part {
            inline_data: Some(InlineData {
                mime_type: "image/png".into(),
                data: "AAAA".into(),
            }),
            media_resolution: Some(MediaResolution {
                level: "MEDIA_RESOLUTION_HIGH".into(),
            }),
            ..Default::default()
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains(r#""inlineData""#));
        assert!(json.contains(r#""mimeType":"image/png""#));
        assert!(json.contains(r#""mediaResolution""#));
        assert!(!json.contains(r#""text""#));
    }

    #[test]
    fn response_deserializes_from_api_format() {
        let api_json = r#"{
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Here is the page"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0K"}}
                    ]
                },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10}
        }"#;
        let resp: GenerateContentResponse = serde_json::from_str(api_json).unwrap();
        let parts = &resp.candidates[0].content.as_ref().unwrap().parts;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1].inline_data.as_ref().unwrap().data, "iVBORw0K");
    }

    #[test]
    fn error_envelope_deserializes() {
        let json = r#"{"error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}}"#;
        let env: ApiErrorEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(env.error.code, 503);
        assert_eq!(env.error.status.as_deref(), Some("UNAVAILABLE"));
    }

    #[test]
    fn model_list_with_token() {
        let json = r#"{
            "models": [{"name": "models/gemini-3-pro-image-preview", "displayName": "Gemini 3 Pro Image"}],
            "nextPageToken": "abc"
        }"#;
        let list: ModelList = serde_json::from_str(json).unwrap();
        assert_eq!(list.models[0].display_name.as_deref(), Some("Gemini 3 Pro Image"));
        assert_eq!(list.next_page_token.as_deref(), Some("abc"));
    }
}
