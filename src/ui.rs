//! Interface de terminal do jobwait — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente
//! uma sessão no terminal e implementa [`SessionObserver`].

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::lifecycle::JobStatus;
use crate::orchestrator::{SessionObserver, SessionOutcome, SessionReport};
use crate::service::JobHandle;

/// Indicador visual de progresso para uma sessão no terminal.
///
/// Exibe um spinner animado enquanto o job é consultado e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e retentativa (amarelo).
pub struct JobProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para retentativas e saídas ambíguas.
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner com a instrução submetida e retorna a instância de progresso.
    pub fn start(statement: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("SUBMIT: {statement}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado final da sessão.
    pub fn complete(&self, report: &SessionReport) {
        self.pb.finish_and_clear();
        let attempts = format!("{}/{}", report.attempts, report.max_attempts);
        match report.outcome {
            SessionOutcome::Succeeded => {
                println!(
                    "  {} Job succeeded after {attempts} attempt(s)",
                    self.green.apply_to("✓")
                );
            }
            SessionOutcome::Failed | SessionOutcome::AttemptsExhausted => {
                let reason = report
                    .last_status
                    .as_ref()
                    .and_then(|s| s.reason.as_deref())
                    .unwrap_or("no reason given");
                println!(
                    "  {} Job {} ({attempts}): {reason}",
                    self.red.apply_to("✗"),
                    report.outcome
                );
            }
            SessionOutcome::TimedOut | SessionOutcome::Cancelled => {
                println!(
                    "  {} Session {} ({attempts})",
                    self.yellow.apply_to("…"),
                    report.outcome
                );
            }
        }
    }

    /// Finaliza o spinner quando a sessão foi abortada por um erro.
    pub fn abort(&self, error: &dyn std::fmt::Display) {
        self.pb.finish_and_clear();
        println!("  {} Session aborted: {error}", self.red.apply_to("✗"));
    }

    /// Imprime o relatório da sessão formatado em JSON com estilo colorido.
    pub fn print_report(&self, report: &SessionReport) {
        let style = match report.outcome {
            SessionOutcome::Succeeded => &self.green,
            SessionOutcome::Failed | SessionOutcome::AttemptsExhausted => &self.red,
            SessionOutcome::TimedOut | SessionOutcome::Cancelled => &self.yellow,
        };
        println!();
        println!("{}", style.apply_to("─── Session Report ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_default()
        );
    }
}

impl SessionObserver for JobProgress {
    fn on_attempt(&self, attempt: u32, max_attempts: u32, handle: &JobHandle) {
        self.pb
            .set_message(format!("attempt {attempt}/{max_attempts}: {}", handle.job_id));
    }

    fn on_status(&self, status: &JobStatus) {
        self.pb
            .set_message(format!("{}: {}", status.job_id, status.state));
    }

    /// Exibe uma falha retentável com o número da tentativa e o motivo.
    fn on_retry(&self, attempt: u32, max_attempts: u32, reason: &str) {
        self.pb.println(format!(
            "  {} Retryable failure on attempt {attempt}/{max_attempts}: {reason}",
            self.yellow.apply_to("↻")
        ));
    }
}
