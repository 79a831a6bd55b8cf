pub mod client;
pub mod error;
pub mod types;

pub use client::HttpJobService;
pub use error::ServiceError;
pub use types::{JobHandle, SubmitRequest};

use std::future::Future;

use crate::lifecycle::JobStatus;

/// Remote job-execution service driven by a session.
pub trait JobService {
    fn submit(
        &self,
        request: &SubmitRequest,
    ) -> impl Future<Output = Result<JobHandle, ServiceError>> + Send;

    fn poll(
        &self,
        handle: &JobHandle,
    ) -> impl Future<Output = Result<JobStatus, ServiceError>> + Send;
}
