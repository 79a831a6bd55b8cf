use std::time::Duration;

use reqwest::{Client, Response};

use super::JobService;
use super::error::ServiceError;
use super::types::{JobHandle, SubmitRequest};
use crate::lifecycle::JobStatus;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// JSON-over-HTTP job service.
///
/// `POST {base_url}/jobs` submits, `GET {base_url}/jobs/{job_id}` polls.
pub struct HttpJobService {
    client: Client,
    base_url: String,
}

impl HttpJobService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a service client with a per-request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl JobService for HttpJobService {
    async fn submit(&self, request: &SubmitRequest) -> Result<JobHandle, ServiceError> {
        let response = self
            .client
            .post(format!("{}/jobs", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Submission {
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }

        Ok(response.json::<JobHandle>().await?)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, ServiceError> {
        let response = self
            .client
            .get(format!("{}/jobs/{}", self.base_url, handle.job_id))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Poll {
                job_id: handle.job_id.clone(),
                status: status.as_u16(),
                message: error_body(response).await,
            });
        }

        Ok(response.json::<JobStatus>().await?)
    }
}

async fn error_body(response: Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string())
}
