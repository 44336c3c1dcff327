//! Interface de terminal do mangalens: barra de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para a barra de progresso do lote e `console`
//! para estilização com cores. O [`BatchProgress`] acompanha visualmente
//! a execução de um lote implementando [`BatchObserver`].

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::orchestrator::{BatchObserver, BatchReport};
use crate::state_machine::{ItemState, WorkItem};

/// Indicador visual de progresso para um lote de traduções.
///
/// Exibe uma barra com o total de páginas e mensagens coloridas para
/// sucesso (verde) e falha (vermelho) de cada página.
pub struct BatchProgress {
    // Barra de progresso do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para avisos.
    yellow: Style,
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchProgress {
    /// Cria a barra, ainda sem tamanho; o tamanho chega em `batch_started`.
    pub fn new() -> Self {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style.progress_chars("=> "));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza a barra e imprime o resumo do lote.
    pub fn finish(&self, report: &BatchReport) {
        self.pb.finish_and_clear();
        let style = if report.failed == 0 {
            &self.green
        } else {
            &self.red
        };
        println!(
            "  {} {} translated, {} failed ({:.1}s)",
            style.apply_to("■"),
            report.succeeded,
            report.failed,
            report.duration_ms as f64 / 1000.0
        );
    }

    /// Imprime um aviso global (ex.: "No images to translate.").
    pub fn notice(&self, message: &str) {
        self.pb.finish_and_clear();
        for line in message.lines() {
            println!("  {} {line}", self.yellow.apply_to("!"));
        }
    }

    /// Imprime o resultado de uma página fora de um lote (regeneração, retry).
    pub fn item_line(&self, item: &WorkItem) {
        println!("{}", self.describe(item));
    }

    fn describe(&self, item: &WorkItem) -> String {
        match item.state() {
            ItemState::Succeeded => format!("  {} {}", self.green.apply_to("✓"), item.display_name),
            ItemState::Failed => format!(
                "  {} {}: {}",
                self.red.apply_to("✗"),
                item.display_name,
                item.error.as_deref().unwrap_or_default()
            ),
            state => format!("  {} {} ({state})", self.yellow.apply_to("…"), item.display_name),
        }
    }
}

impl BatchObserver for BatchProgress {
    fn batch_started(&self, total: usize) {
        self.pb.set_length(total as u64);
        self.pb.set_position(0);
        self.pb.enable_steady_tick(Duration::from_millis(100));
    }

    fn item_started(&self, item: &WorkItem) {
        self.pb.set_message(item.display_name.clone());
    }

    fn item_finished(&self, item: &WorkItem) {
        self.pb.println(self.describe(item));
        self.pb.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::Lifecycle;

    #[test]
    fn describe_failed_item_shows_error() {
        let progress = BatchProgress::new();
        let item = WorkItem::remote("u", "p1.jpg");
        let failed = Lifecycle::fail(&item, "API rate limit exceeded. Please try again later.".into(), 1);

        let line = console::strip_ansi_codes(&progress.describe(&failed)).to_string();
        assert!(line.contains("p1.jpg: API rate limit exceeded."));
    }

    #[test]
    fn observer_advances_bar() {
        let progress = BatchProgress::new();
        progress.batch_started(3);
        let item = Lifecycle::succeed(&WorkItem::remote("u", "p.jpg"), "data:x".into());
        progress.item_finished(&item);
        assert_eq!(progress.pb.position(), 1);
        assert_eq!(progress.pb.length(), Some(3));
    }
}
