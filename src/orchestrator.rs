use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::JobwaitError;
use crate::lifecycle::{JobStatus, Phase, QuerySession, SessionSettings};
use crate::service::{JobHandle, JobService, SubmitRequest};

/// A job to run: what to submit plus per-call session overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(flatten)]
    pub submit: SubmitRequest,
    #[serde(default)]
    pub session: SessionSettings,
}

impl JobRequest {
    /// Load a job from a `.toml` file, or JSON for any other extension.
    pub fn load(path: &Path) -> Result<Self, JobwaitError> {
        let contents = std::fs::read_to_string(path)?;
        let request = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)?,
            _ => serde_json::from_str(&contents)?,
        };
        Ok(request)
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionOutcome {
    Succeeded,
    /// The last status was a failure the retry policy does not cover.
    Failed,
    /// Every attempt ended in a retryable failure.
    AttemptsExhausted,
    /// The wait timeout passed before a terminal status was seen.
    TimedOut,
    Cancelled,
}

impl SessionOutcome {
    fn of(session: &QuerySession) -> Self {
        if session.is_interrupted() {
            return SessionOutcome::Cancelled;
        }
        match session.phase() {
            Phase::Succeeded => SessionOutcome::Succeeded,
            Phase::Failed => SessionOutcome::Failed,
            Phase::RetryRequested => SessionOutcome::AttemptsExhausted,
            Phase::Pending => SessionOutcome::TimedOut,
        }
    }
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOutcome::Succeeded => write!(f, "succeeded"),
            SessionOutcome::Failed => write!(f, "failed"),
            SessionOutcome::AttemptsExhausted => write!(f, "attempts exhausted"),
            SessionOutcome::TimedOut => write!(f, "wait timeout exceeded"),
            SessionOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Structured record produced when a session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub outcome: SessionOutcome,
    pub attempts: u32,
    pub max_attempts: u32,
    pub elapsed_ms: u64,
    /// Job id of the last submission.
    pub job_id: Option<String>,
    pub last_status: Option<JobStatus>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Hooks invoked while a session runs.
pub trait SessionObserver {
    fn on_attempt(&self, _attempt: u32, _max_attempts: u32, _handle: &JobHandle) {}

    fn on_status(&self, _status: &JobStatus) {}

    fn on_retry(&self, _attempt: u32, _max_attempts: u32, _reason: &str) {}
}

impl SessionObserver for () {}

/// Run one job through submit / poll / retry until the session settles.
///
/// Submission and poll errors abort the session and are returned as is.
/// The first attempt carries the caller's client request token; each retry
/// carries a fresh one so the service starts a new execution.
pub async fn run_session<S, O>(
    service: &S,
    request: &SubmitRequest,
    settings: &SessionSettings,
    cancel: CancellationToken,
    observer: &O,
) -> Result<SessionReport, JobwaitError>
where
    S: JobService,
    O: SessionObserver + ?Sized,
{
    let mut session = QuerySession::from_settings(settings, cancel)?;
    let session_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(
        %session_id,
        max_attempts = session.max_attempts(),
        retry = %session.retry_policy(),
        "session started"
    );

    let mut last_handle: Option<JobHandle> = None;
    let mut last_status: Option<JobStatus> = None;

    while session.should_attempt() {
        let mut submission = request.clone();
        if session.attempts() > 0 {
            submission.client_request_token = Some(Uuid::new_v4().to_string());
        }

        let handle = service.submit(&submission).await?;
        session.mark_attempt();
        info!(
            %session_id,
            job_id = %handle.job_id,
            attempt = session.attempts(),
            "job submitted"
        );
        observer.on_attempt(session.attempts(), session.max_attempts(), &handle);

        while session.should_wait() {
            session.do_wait().await;
            if session.is_interrupted() {
                break;
            }

            let status = service.poll(&handle).await?;
            session.evaluate_status(&status);
            observer.on_status(&status);

            if session.is_retry_requested() {
                let reason = status.reason.as_deref().unwrap_or("no reason given");
                warn!(
                    %session_id,
                    job_id = %handle.job_id,
                    attempt = session.attempts(),
                    max_attempts = session.max_attempts(),
                    reason,
                    "retryable job failure"
                );
                observer.on_retry(session.attempts(), session.max_attempts(), reason);
            }
            last_status = Some(status);
        }
        last_handle = Some(handle);
    }

    let outcome = SessionOutcome::of(&session);
    let report = SessionReport {
        session_id,
        outcome,
        attempts: session.attempts(),
        max_attempts: session.max_attempts(),
        elapsed_ms: session.elapsed_millis(),
        job_id: last_handle.map(|h| h.job_id),
        last_status,
        started_at,
        completed_at: Utc::now(),
    };
    info!(
        %session_id,
        outcome = %report.outcome,
        attempts = report.attempts,
        elapsed_ms = report.elapsed_ms,
        "session finished"
    );
    Ok(report)
}
