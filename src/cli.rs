//! Interface de linha de comando do mangalens baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (translate, chapter,
//! feedback, fetch, models) e flags globais (--series, --concurrency,
//! --out, --view, --retry-failed, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::store::ViewMode;

/// mangalens: tradução de páginas de mangá com um modelo de imagem.
#[derive(Debug, Parser)]
#[command(name = "mangalens", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Nome da série, usado como contexto de tom e pronomes.
    #[arg(long, global = true)]
    pub series: Option<String>,

    /// Máximo de traduções simultâneas (sobrepõe o arquivo de configuração).
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Diretório de saída (sobrepõe o arquivo de configuração).
    #[arg(long, global = true)]
    pub out: Option<PathBuf>,

    /// Quais versões das páginas gravar.
    #[arg(long, global = true, value_enum, default_value_t = ViewArg::Translated)]
    pub view: ViewArg,

    /// Depois do lote, tenta de novo uma vez cada página que falhou.
    #[arg(long, global = true, default_value_t = false)]
    pub retry_failed: bool,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Modo de visualização aceito pela CLI, mapeado para [`ViewMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    /// Apenas as páginas traduzidas.
    Translated,
    /// Também as páginas originais.
    Original,
    /// Originais e traduzidas lado a lado.
    Compare,
}

impl From<ViewArg> for ViewMode {
    fn from(arg: ViewArg) -> Self {
        match arg {
            ViewArg::Translated => ViewMode::Translated,
            ViewArg::Original => ViewMode::Original,
            ViewArg::Compare => ViewMode::Compare,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Traduz arquivos locais (.jpg, .png, .webp).
    Translate {
        /// Arquivos de imagem a traduzir.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Importa um capítulo do MangaDex e traduz todas as páginas.
    Chapter {
        /// URL do capítulo ou o id do capítulo.
        reference: String,

        /// Traduz apenas as primeiras N páginas.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Traduz uma página e regenera com comentários posicionados.
    Feedback {
        /// Arquivo de imagem.
        file: PathBuf,

        /// Comentário no formato "X,Y:TEXTO" (X e Y em porcentagem).
        #[arg(long = "comment", required = true)]
        comments: Vec<String>,
    },

    /// Baixa uma página remota pelo proxy (com unscramble do MangaPlus).
    Fetch {
        /// URL da página.
        url: String,
    },

    /// Lista os modelos disponíveis para a chave de API.
    Models,
}

/// Um comentário posicionado lido de `--comment`.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentArg {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

/// Interpreta "X,Y:TEXTO". O texto pode conter vírgulas e dois-pontos.
pub fn parse_comment(raw: &str) -> Result<CommentArg, String> {
    let (position, text) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected X,Y:TEXT, got {raw:?}"))?;
    let (x, y) = position
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y before ':', got {position:?}"))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad X in {raw:?}: {e}"))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad Y in {raw:?}: {e}"))?;
    Ok(CommentArg {
        x,
        y,
        text: text.to_string(),
    })
}
