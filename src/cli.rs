//! Interface de linha de comando do jobwait baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, check)
//! e flags globais que sobrescrevem os padrões de sessão por chamada.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::lifecycle::SessionSettings;

/// jobwait — submete jobs remotos, acompanha até o fim e retenta falhas transitórias.
#[derive(Debug, Parser)]
#[command(name = "jobwait", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./jobwait.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Tempo máximo de espera por um status terminal em cada tentativa (ms).
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub wait_timeout: Option<i64>,

    /// Intervalo entre consultas de status (ms).
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub delay: Option<i64>,

    /// Intervalo antes da primeira consulta de status (ms).
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub initial_delay: Option<i64>,

    /// Número máximo de submissões do job.
    #[arg(long, global = true, allow_negative_numbers = true)]
    pub max_attempts: Option<i64>,

    /// Política de retentativa: never, always, retryable ou generic,exhausted.
    #[arg(long, global = true)]
    pub retry: Option<String>,

    /// Reinicia o relógio de espera a cada nova tentativa.
    #[arg(long, global = true)]
    pub reset_wait_timeout_on_retry: Option<bool>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submete um job e acompanha seu ciclo de vida até o fim.
    Run {
        /// Instrução a executar (ex.: uma consulta SQL).
        statement: Option<String>,

        /// Caminho para um arquivo JSON ou TOML contendo a definição do job.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Parâmetro nomeado repassado ao serviço, no formato chave=valor.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Token de idempotência usado na primeira tentativa.
        #[arg(long)]
        client_request_token: Option<String>,
    },

    /// Resolve e mostra as configurações de sessão efetivas.
    Check,
}

impl Cli {
    /// Camada de sessão formada pelas flags da linha de comando.
    pub fn session_overrides(&self) -> SessionSettings {
        SessionSettings {
            wait_timeout_ms: self.wait_timeout,
            poll_delay_ms: self.delay,
            initial_poll_delay_ms: self.initial_delay,
            max_attempts: self.max_attempts,
            retry: self.retry.clone(),
            reset_wait_timeout_on_retry: self.reset_wait_timeout_on_retry,
        }
    }
}

// Converte "chave=valor" em um par.
fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}
