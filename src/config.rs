//! Configuração do mangalens carregada a partir de `mangalens.toml`.
//!
//! A struct [`AppConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `GEMINI_API_KEY` tem precedência sobre o arquivo.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "mangalens.toml";

/// Configuração de nível superior carregada de `mangalens.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Chave da API Gemini.
    #[serde(default)]
    pub api_key: String,

    /// Modelo de geração de imagem usado para traduzir as páginas.
    #[serde(default = "default_model")]
    pub model: String,

    /// URL base da API Gemini.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Versão da API (v1alpha é necessária para `mediaResolution`).
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Idioma de destino das traduções.
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Máximo de traduções simultâneas em um lote.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Pausa em milissegundos antes da retentativa automática.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Timeout de cada requisição remota, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// URL base da API do MangaDex.
    #[serde(default = "default_mangadex_api_url")]
    pub mangadex_api_url: String,

    /// Diretório onde as páginas traduzidas são gravadas.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Nível de log quando `RUST_LOG` não está definido.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_version() -> String {
    "v1alpha".to_string()
}

fn default_target_language() -> String {
    "Vietnamese".to_string()
}

// Teto de concorrência padrão: 10.
fn default_max_concurrent() -> usize {
    10
}

// Pausa padrão antes da retentativa: 1000ms.
fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_mangadex_api_url() -> String {
    "https://api.mangadex.org".to_string()
}

fn default_output_dir() -> String {
    "translated".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            target_language: default_target_language(),
            max_concurrent: default_max_concurrent(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            mangadex_api_url: default_mangadex_api_url(),
            output_dir: default_output_dir(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Carrega a configuração de `mangalens.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let parsed = toml::from_str::<AppConfig>(&contents)?;
            info!(path = %path.display(), "Loaded config");
            parsed
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para a chave API.
        if let Ok(key) = std::env::var("GEMINI_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        // Um teto zero nunca drenaria a fila.
        config.max_concurrent = config.max_concurrent.max(1);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.model, "gemini-3-pro-image-preview");
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.api_version, "v1alpha");
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_key = "test-123"
            max_concurrent = 4
            target_language = "English"
        "#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "test-123");
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.target_language, "English");
        assert_eq!(config.retry_delay_ms, 1000);
        assert_eq!(config.mangadex_api_url, "https://api.mangadex.org");
    }

    #[test]
    fn load_from_file_clamps_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "max_concurrent = 0\noutput_dir = \"out\"\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.output_dir, "out");
    }

    #[test]
    fn load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.max_concurrent, 10);
    }

    #[test]
    fn load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "max_concurrent = \"lots\"").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }
}
