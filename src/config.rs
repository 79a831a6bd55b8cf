//! Configuração do jobwait carregada a partir de `jobwait.toml`.
//!
//! A struct [`JobwaitConfig`] contém o endereço do serviço de jobs e os
//! padrões de sessão. Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `JOBWAIT_SERVICE_URL` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::lifecycle::SessionSettings;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "jobwait.toml";

/// Variável de ambiente que sobrescreve `service.base_url`.
pub const SERVICE_URL_ENV: &str = "JOBWAIT_SERVICE_URL";

/// Configuração de nível superior carregada de `jobwait.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobwaitConfig {
    /// Endereço e timeouts do serviço de jobs.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Padrões de sessão da tabela `[session]`. Campos ausentes caem nos
    /// padrões embutidos em [`JobwaitConfig::session_defaults`].
    #[serde(default)]
    pub session: SessionSettings,
}

/// Parâmetros de conexão com o serviço de jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// URL base do serviço (sem o sufixo `/jobs`).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout por requisição HTTP, em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

// Valor padrão para a URL do serviço: um serviço local.
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

// Valor padrão para o timeout de requisição: 30s.
fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl JobwaitConfig {
    /// Carrega a configuração de `jobwait.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<JobwaitConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo de configuração para a URL.
        if let Ok(url) = std::env::var(SERVICE_URL_ENV)
            && !url.is_empty()
        {
            config.service.base_url = url;
        }

        Ok(config)
    }

    /// Padrões de sessão do arquivo, completados pelos padrões embutidos.
    pub fn session_defaults(&self) -> SessionSettings {
        self.session.clone().layered_over(&SessionSettings::builtin())
    }
}
