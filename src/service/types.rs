//! Tipos de dados para requisições e respostas do serviço de jobs.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato dos endpoints `POST /jobs` e `GET /jobs/{job_id}`.
//! A resposta de status é desserializada diretamente em
//! [`JobStatus`](crate::lifecycle::JobStatus).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Corpo da requisição para o endpoint `POST /jobs`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Instrução a executar remotamente (ex.: uma consulta SQL).
    pub statement: String,
    /// Parâmetros nomeados repassados ao serviço sem interpretação.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    /// Token de idempotência. Submissões com o mesmo token devolvem a mesma execução.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_request_token: Option<String>,
}

/// Identificador de uma execução remota, retornado por `POST /jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_omits_empty_fields() {
        let req = SubmitRequest {
            statement: "SELECT 1".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"statement":"SELECT 1"}"#);
    }

    #[test]
    fn submit_request_deserialize_with_parameters() {
        let json = r#"{
            "statement": "SELECT * FROM events WHERE day = :day",
            "parameters": {"day": "2026-10-01"},
            "client_request_token": "tok-1"
        }"#;
        let req: SubmitRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.parameters.get("day").map(String::as_str), Some("2026-10-01"));
        assert_eq!(req.client_request_token.as_deref(), Some("tok-1"));
    }

    #[test]
    fn job_handle_deserialize_from_service_format() {
        let handle: JobHandle = serde_json::from_str(r#"{"job_id": "q-42"}"#).unwrap();
        assert_eq!(handle.job_id, "q-42");
    }
}
