//! Tipos de erro para o serviço remoto de execução de jobs.
//!
//! Define [`ServiceError`] com variantes para falhas de submissão, falhas de
//! consulta de status e erros de rede. Estes erros nunca são retentados pela
//! sessão: eles abortam o ciclo de vida imediatamente.

use thiserror::Error;

/// Erros que podem ocorrer ao interagir com o serviço de jobs.
///
/// - [`Submission`](ServiceError::Submission) — o serviço recusou a submissão
/// - [`Poll`](ServiceError::Poll) — o serviço recusou a consulta de status
/// - [`Network`](ServiceError::Network) — falha na camada de rede
#[derive(Debug, Error)]
pub enum ServiceError {
    /// O serviço retornou um status HTTP de erro ao submeter o job.
    #[error("submission rejected (status {status}): {message}")]
    Submission { status: u16, message: String },

    /// O serviço retornou um status HTTP de erro ao consultar o job.
    #[error("poll of job {job_id} rejected (status {status}): {message}")]
    Poll {
        job_id: String,
        status: u16,
        message: String,
    },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, corpo inválido).
    /// Encapsula o erro original do `reqwest` via `#[from]`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_display() {
        let err = ServiceError::Submission {
            status: 400,
            message: "statement is empty".into(),
        };
        assert_eq!(
            err.to_string(),
            "submission rejected (status 400): statement is empty"
        );
    }

    #[test]
    fn poll_display() {
        let err = ServiceError::Poll {
            job_id: "q-9".into(),
            status: 404,
            message: "no such job".into(),
        };
        assert_eq!(
            err.to_string(),
            "poll of job q-9 rejected (status 404): no such job"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ServiceError>();
    }
}
