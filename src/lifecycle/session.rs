use std::fmt;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::policy::RetryPolicy;
use super::settings::{ResolvedSettings, SessionSettings};
use super::status::JobStatus;
use crate::error::ConfigurationError;

/// Where the current attempt stands after the last status evaluation.
///
/// Reset to [`Phase::Pending`] at the start of every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No terminal status seen in this attempt yet.
    #[default]
    Pending,
    Succeeded,
    /// Terminal failure the retry policy does not cover.
    Failed,
    /// Terminal failure the retry policy covers; the next attempt may start.
    RetryRequested,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Pending => write!(f, "PENDING"),
            Phase::Succeeded => write!(f, "SUCCEEDED"),
            Phase::Failed => write!(f, "FAILED"),
            Phase::RetryRequested => write!(f, "RETRY_REQUESTED"),
        }
    }
}

/// Lifecycle controller for one logical job submission.
///
/// The session does not call the job service itself. It exposes the
/// primitives a caller drives in this shape:
///
/// ```text
/// while session.should_attempt() {
///     let handle = service.submit(..).await?;
///     session.mark_attempt();
///     while session.should_wait() {
///         session.do_wait().await;
///         let status = service.poll(&handle).await?;
///         session.evaluate_status(&status);
///     }
/// }
/// ```
///
/// Cancellation is cooperative: cancelling the session's token while
/// [`QuerySession::do_wait`] is sleeping sets a sticky interrupted flag and
/// both loop conditions turn false.
#[derive(Debug)]
pub struct QuerySession {
    settings: ResolvedSettings,
    attempts: u32,
    current_poll_interval: Duration,
    session_started_at: Instant,
    attempt_started_at: Option<Instant>,
    phase: Phase,
    interrupted: bool,
    cancel: CancellationToken,
}

impl QuerySession {
    pub fn new(settings: ResolvedSettings) -> Self {
        Self::with_cancellation(settings, CancellationToken::new())
    }

    /// Create a session that stops waiting once `cancel` is cancelled.
    pub fn with_cancellation(settings: ResolvedSettings, cancel: CancellationToken) -> Self {
        Self {
            current_poll_interval: settings.initial_poll_delay,
            settings,
            attempts: 0,
            session_started_at: Instant::now(),
            attempt_started_at: None,
            phase: Phase::Pending,
            interrupted: false,
            cancel,
        }
    }

    /// Resolve a settings layer and build a session from it.
    pub fn from_settings(
        settings: &SessionSettings,
        cancel: CancellationToken,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self::with_cancellation(settings.resolve()?, cancel))
    }

    /// Whether another submission should be made.
    ///
    /// The attempt budget is checked before anything else, so a pending
    /// retry request never buys an attempt beyond `max_attempts`.
    pub fn should_attempt(&self) -> bool {
        if self.attempts >= self.settings.max_attempts {
            trace!(
                attempts = self.attempts,
                max_attempts = self.settings.max_attempts,
                "attempt budget spent, not attempting"
            );
            return false;
        }
        if self.interrupted {
            trace!("session interrupted, not attempting");
            return false;
        }
        match self.phase {
            Phase::Failed => {
                trace!("permanent failure, not attempting");
                false
            }
            Phase::Succeeded => {
                trace!("job succeeded, not attempting");
                false
            }
            Phase::Pending | Phase::RetryRequested => true,
        }
    }

    /// Record that a submission was made and open a fresh evaluation window.
    pub fn mark_attempt(&mut self) {
        self.attempts += 1;
        if self.attempts == 1 || self.settings.reset_wait_timeout_on_retry {
            self.attempt_started_at = Some(Instant::now());
        }
        self.phase = Phase::Pending;
        debug!(
            attempt = self.attempts,
            max_attempts = self.settings.max_attempts,
            "attempt started"
        );
    }

    /// Whether the caller should sleep and poll again within this attempt.
    pub fn should_wait(&self) -> bool {
        if self.attempt_elapsed() >= self.settings.wait_timeout {
            trace!(
                wait_timeout_ms = self.settings.wait_timeout.as_millis() as u64,
                "wait timeout reached, not waiting"
            );
            return false;
        }
        if self.interrupted {
            trace!("session interrupted, not waiting");
            return false;
        }
        match self.phase {
            Phase::Pending => true,
            Phase::Succeeded | Phase::Failed | Phase::RetryRequested => {
                trace!(phase = %self.phase, "attempt settled, not waiting");
                false
            }
        }
    }

    /// Sleep for the current poll interval.
    ///
    /// The first call sleeps for the initial poll delay, every later call for
    /// the poll delay. Cancellation during the sleep marks the session
    /// interrupted and returns early.
    pub async fn do_wait(&mut self) {
        let interval = self.current_poll_interval;
        trace!(interval_ms = interval.as_millis() as u64, "waiting before poll");

        if sleep_with_cancellation(interval, &self.cancel).await {
            debug!(attempt = self.attempts, "wait cancelled, session interrupted");
            self.interrupted = true;
        }
        self.current_poll_interval = self.settings.poll_delay;
    }

    /// Fold a polled status into the session phase.
    ///
    /// Non-terminal statuses leave the phase untouched.
    pub fn evaluate_status(&mut self, status: &JobStatus) {
        if !status.is_terminal() {
            trace!(job_id = %status.job_id, state = %status.state, "job still in progress");
            return;
        }

        self.phase = if status.is_successful() {
            Phase::Succeeded
        } else if self.should_retry(status) {
            Phase::RetryRequested
        } else {
            Phase::Failed
        };
        debug!(
            job_id = %status.job_id,
            state = %status.state,
            reason = status.reason.as_deref().unwrap_or(""),
            phase = %self.phase,
            "terminal status evaluated"
        );
    }

    /// Whether an unsuccessful terminal status counts as transient.
    pub fn should_retry(&self, status: &JobStatus) -> bool {
        self.settings.retry_policy.should_retry(status)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Time since the session was created, across all attempts.
    pub fn elapsed(&self) -> Duration {
        self.session_started_at.elapsed()
    }

    pub fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Time counted against the wait timeout of the current attempt.
    pub fn attempt_elapsed(&self) -> Duration {
        self.attempt_started_at
            .unwrap_or(self.session_started_at)
            .elapsed()
    }

    pub fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    pub fn max_attempts(&self) -> u32 {
        self.settings.max_attempts
    }

    pub fn wait_timeout(&self) -> Duration {
        self.settings.wait_timeout
    }

    pub fn poll_delay(&self) -> Duration {
        self.settings.poll_delay
    }

    pub fn initial_poll_delay(&self) -> Duration {
        self.settings.initial_poll_delay
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry_policy
    }

    pub fn reset_wait_timeout_on_retry(&self) -> bool {
        self.settings.reset_wait_timeout_on_retry
    }

    /// Interval the next [`QuerySession::do_wait`] will sleep for.
    pub fn current_poll_interval(&self) -> Duration {
        self.current_poll_interval
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_success(&self) -> bool {
        self.phase == Phase::Succeeded
    }

    pub fn is_failure(&self) -> bool {
        self.phase == Phase::Failed
    }

    pub fn is_retry_requested(&self) -> bool {
        self.phase == Phase::RetryRequested
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Sleep for `duration` unless `cancel` fires first. Returns `true` when cancelled.
async fn sleep_with_cancellation(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::status::JobState;
    use tokio::time::advance;

    fn settings(max_attempts: u32, retry: RetryPolicy) -> ResolvedSettings {
        ResolvedSettings {
            wait_timeout: Duration::from_millis(1000),
            poll_delay: Duration::from_millis(200),
            initial_poll_delay: Duration::from_millis(50),
            max_attempts,
            retry_policy: retry,
            reset_wait_timeout_on_retry: true,
        }
    }

    fn status(state: JobState) -> JobStatus {
        JobStatus::new("q-1", state)
    }

    fn generic_failure() -> JobStatus {
        status(JobState::Failed).with_reason("GENERIC_INTERNAL_ERROR: node lost")
    }

    // The paused clock may land up to one timer tick past a deadline.
    fn assert_slept(before: Instant, expected: Duration) {
        let elapsed = before.elapsed();
        assert!(
            elapsed >= expected && elapsed <= expected + Duration::from_millis(1),
            "slept {elapsed:?}, expected {expected:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_session_state() {
        let session = QuerySession::new(settings(2, RetryPolicy::Never));
        assert_eq!(session.attempts(), 0);
        assert_eq!(session.phase(), Phase::Pending);
        assert!(!session.is_interrupted());
        assert!(session.should_attempt());
        assert_eq!(session.current_poll_interval(), Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn accessors_reflect_resolved_settings() {
        let layer = SessionSettings {
            wait_timeout_ms: Some(30_000),
            poll_delay_ms: Some(750),
            initial_poll_delay_ms: None,
            max_attempts: Some(4),
            retry: Some("exhausted".into()),
            reset_wait_timeout_on_retry: Some(false),
        };
        let session = QuerySession::from_settings(&layer, CancellationToken::new()).unwrap();
        assert_eq!(session.wait_timeout(), Duration::from_secs(30));
        assert_eq!(session.poll_delay(), Duration::from_millis(750));
        assert_eq!(session.initial_poll_delay(), Duration::from_millis(750));
        assert_eq!(session.max_attempts(), 4);
        assert_eq!(session.retry_policy().to_string(), "exhausted");
        assert!(!session.reset_wait_timeout_on_retry());
        assert_eq!(session.settings().to_settings().max_attempts, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_settings_fail_construction() {
        let layer = SessionSettings {
            retry: Some("retryable,exhausted".into()),
            ..SessionSettings::builtin()
        };
        let err = QuerySession::from_settings(&layer, CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ConfigurationError::ConflictingRetryTokens(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn mark_attempt_counts() {
        let mut session = QuerySession::new(settings(5, RetryPolicy::Always));
        for n in 1..=3 {
            session.mark_attempt();
            assert_eq!(session.attempts(), n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn budget_spent_stops_attempts_regardless_of_phase() {
        let mut session = QuerySession::new(settings(2, RetryPolicy::Always));
        session.mark_attempt();
        session.evaluate_status(&status(JobState::Failed));
        assert!(session.is_retry_requested());
        assert!(session.should_attempt());

        session.mark_attempt();
        session.evaluate_status(&status(JobState::Failed));
        assert!(session.is_retry_requested());
        assert_eq!(session.attempts(), 2);
        assert!(!session.should_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn success_and_failure_stop_attempts() {
        let mut session = QuerySession::new(settings(3, RetryPolicy::Never));
        session.mark_attempt();
        session.evaluate_status(&status(JobState::Succeeded));
        assert!(session.is_success());
        assert!(!session.should_attempt());
        assert!(!session.should_wait());

        let mut session = QuerySession::new(settings(3, RetryPolicy::Never));
        session.mark_attempt();
        session.evaluate_status(&generic_failure());
        assert!(session.is_failure());
        assert!(!session.should_attempt());
        assert!(!session.should_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn non_terminal_status_changes_nothing() {
        let mut session = QuerySession::new(settings(1, RetryPolicy::Always));
        session.mark_attempt();
        session.evaluate_status(&status(JobState::Queued));
        session.evaluate_status(&status(JobState::Running));
        assert_eq!(session.phase(), Phase::Pending);
        assert!(session.should_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_request_ends_wait_but_permits_next_attempt() {
        let mut session = QuerySession::new(settings(2, "generic".parse().unwrap()));
        session.mark_attempt();
        session.evaluate_status(&generic_failure());
        assert!(session.is_retry_requested());
        assert!(!session.should_wait());
        assert!(session.should_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn mark_attempt_clears_phase() {
        let mut session = QuerySession::new(settings(2, RetryPolicy::Always));
        session.mark_attempt();
        session.evaluate_status(&status(JobState::Cancelled));
        assert!(session.is_retry_requested());
        session.mark_attempt();
        assert_eq!(session.phase(), Phase::Pending);
        assert!(!session.is_success() && !session.is_failure() && !session.is_retry_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_wait_timeout_never_waits() {
        let mut s = settings(1, RetryPolicy::Never);
        s.wait_timeout = Duration::ZERO;
        let mut session = QuerySession::new(s);
        session.mark_attempt();
        assert!(!session.should_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout_expires() {
        let mut session = QuerySession::new(settings(1, RetryPolicy::Never));
        session.mark_attempt();
        advance(Duration::from_millis(999)).await;
        assert!(session.should_wait());
        advance(Duration::from_millis(1)).await;
        assert!(!session.should_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_clock_keeps_running_without_reset() {
        let mut s = settings(2, RetryPolicy::Always);
        s.reset_wait_timeout_on_retry = false;
        let mut session = QuerySession::new(s);

        session.mark_attempt();
        advance(Duration::from_millis(600)).await;
        session.evaluate_status(&status(JobState::Failed));
        assert!(session.should_attempt());

        session.mark_attempt();
        assert!(session.should_wait());
        assert_eq!(session.attempt_elapsed(), Duration::from_millis(600));
        advance(Duration::from_millis(400)).await;
        assert!(!session.should_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_clock_resets_on_retry() {
        let mut session = QuerySession::new(settings(2, RetryPolicy::Always));

        session.mark_attempt();
        advance(Duration::from_millis(600)).await;
        session.evaluate_status(&status(JobState::Failed));

        session.mark_attempt();
        assert_eq!(session.attempt_elapsed(), Duration::ZERO);
        advance(Duration::from_millis(400)).await;
        assert!(session.should_wait());
        advance(Duration::from_millis(600)).await;
        assert!(!session.should_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn first_wait_uses_initial_delay_then_poll_delay() {
        let mut session = QuerySession::new(settings(1, RetryPolicy::Never));
        session.mark_attempt();

        let before = Instant::now();
        session.do_wait().await;
        assert_slept(before, Duration::from_millis(50));
        assert_eq!(session.current_poll_interval(), Duration::from_millis(200));

        for _ in 0..2 {
            let before = Instant::now();
            session.do_wait().await;
            assert_slept(before, Duration::from_millis(200));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_wait_interrupts() {
        let cancel = CancellationToken::new();
        let mut s = settings(3, RetryPolicy::Always);
        s.initial_poll_delay = Duration::from_millis(500);
        let mut session = QuerySession::with_cancellation(s, cancel.clone());
        session.mark_attempt();

        let canceller = tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });

        let before = Instant::now();
        session.do_wait().await;
        canceller.await.unwrap();

        assert_slept(before, Duration::from_millis(100));
        assert!(session.is_interrupted());
        assert!(!session.should_wait());
        assert!(!session.should_attempt());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupted_is_sticky() {
        let mut session = QuerySession::new(settings(5, RetryPolicy::Always));
        session.cancellation_token().cancel();
        session.mark_attempt();
        session.do_wait().await;
        assert!(session.is_interrupted());

        session.mark_attempt();
        session.evaluate_status(&status(JobState::Running));
        assert!(session.is_interrupted());
        assert!(!session.should_attempt());
        assert!(!session.should_wait());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_spans_all_attempts() {
        let mut session = QuerySession::new(settings(2, RetryPolicy::Always));
        session.mark_attempt();
        advance(Duration::from_millis(300)).await;
        session.mark_attempt();
        advance(Duration::from_millis(200)).await;
        assert_eq!(session.elapsed_millis(), 500);
        assert_eq!(session.attempt_elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::RetryRequested.to_string(), "RETRY_REQUESTED");
        assert_eq!(Phase::Pending.to_string(), "PENDING");
    }
}
