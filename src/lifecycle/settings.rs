use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::policy::RetryPolicy;
use crate::error::ConfigurationError;

/// One layer of session settings.
///
/// Every field is optional so layers can be stacked: a per-call layer is
/// placed over the `[session]` table of `jobwait.toml`, which in turn sits on
/// [`SessionSettings::builtin`]. Numeric fields are signed so that negative
/// input survives until [`SessionSettings::resolve`] rejects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Maximum wait for a terminal status per attempt, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_ms: Option<i64>,
    /// Interval between polls after the first one, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_delay_ms: Option<i64>,
    /// Interval before the first poll. Falls back to `poll_delay_ms`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_poll_delay_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<i64>,
    /// Comma-separated retry tokens, e.g. `"generic,exhausted"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_wait_timeout_on_retry: Option<bool>,
}

/// Session settings after layering and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    pub wait_timeout: Duration,
    pub poll_delay: Duration,
    pub initial_poll_delay: Duration,
    pub max_attempts: u32,
    pub retry_policy: RetryPolicy,
    pub reset_wait_timeout_on_retry: bool,
}

impl SessionSettings {
    /// Built-in defaults: no waiting, one attempt, never retry.
    pub fn builtin() -> Self {
        Self {
            wait_timeout_ms: Some(0),
            poll_delay_ms: Some(2000),
            initial_poll_delay_ms: Some(1000),
            max_attempts: Some(1),
            retry: Some("never".to_string()),
            reset_wait_timeout_on_retry: Some(true),
        }
    }

    /// Fill every unset field of `self` from `defaults`.
    pub fn layered_over(self, defaults: &SessionSettings) -> SessionSettings {
        SessionSettings {
            wait_timeout_ms: self.wait_timeout_ms.or(defaults.wait_timeout_ms),
            poll_delay_ms: self.poll_delay_ms.or(defaults.poll_delay_ms),
            initial_poll_delay_ms: self.initial_poll_delay_ms.or(defaults.initial_poll_delay_ms),
            max_attempts: self.max_attempts.or(defaults.max_attempts),
            retry: self.retry.or_else(|| defaults.retry.clone()),
            reset_wait_timeout_on_retry: self
                .reset_wait_timeout_on_retry
                .or(defaults.reset_wait_timeout_on_retry),
        }
    }

    /// Validate this layer into settings a session can run with.
    pub fn resolve(&self) -> Result<ResolvedSettings, ConfigurationError> {
        let wait_timeout = required_millis("wait_timeout_ms", self.wait_timeout_ms)?;
        let poll_delay = required_millis("poll_delay_ms", self.poll_delay_ms)?;
        let initial_poll_delay = match self.initial_poll_delay_ms {
            Some(value) => non_negative_millis("initial_poll_delay_ms", value)?,
            None => poll_delay,
        };

        let max_attempts = self.max_attempts.ok_or(ConfigurationError::Missing {
            field: "max_attempts",
        })?;
        let max_attempts = u32::try_from(max_attempts)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(ConfigurationError::InvalidMaxAttempts(max_attempts))?;

        let retry_policy = RetryPolicy::parse(self.retry.as_deref())?;

        let reset_wait_timeout_on_retry =
            self.reset_wait_timeout_on_retry
                .ok_or(ConfigurationError::Missing {
                    field: "reset_wait_timeout_on_retry",
                })?;

        Ok(ResolvedSettings {
            wait_timeout,
            poll_delay,
            initial_poll_delay,
            max_attempts,
            retry_policy,
            reset_wait_timeout_on_retry,
        })
    }
}

impl ResolvedSettings {
    /// Render back into a fully populated settings layer.
    pub fn to_settings(&self) -> SessionSettings {
        SessionSettings {
            wait_timeout_ms: Some(as_millis(self.wait_timeout)),
            poll_delay_ms: Some(as_millis(self.poll_delay)),
            initial_poll_delay_ms: Some(as_millis(self.initial_poll_delay)),
            max_attempts: Some(i64::from(self.max_attempts)),
            retry: Some(self.retry_policy.to_string()),
            reset_wait_timeout_on_retry: Some(self.reset_wait_timeout_on_retry),
        }
    }
}

fn required_millis(field: &'static str, value: Option<i64>) -> Result<Duration, ConfigurationError> {
    let value = value.ok_or(ConfigurationError::Missing { field })?;
    non_negative_millis(field, value)
}

fn non_negative_millis(field: &'static str, value: i64) -> Result<Duration, ConfigurationError> {
    u64::try_from(value)
        .map(Duration::from_millis)
        .map_err(|_| ConfigurationError::Negative { field, value })
}

fn as_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
