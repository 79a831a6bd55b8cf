use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::status::JobStatus;
use crate::error::ConfigurationError;

/// Reason signature of an internal error on the service side.
pub const GENERIC_INTERNAL_ERROR: &str = "GENERIC_INTERNAL_ERROR";

/// Reason signature of a job that ran out of resources.
pub const RESOURCES_EXHAUSTED: &str = "exhausted resources at this scale factor";

const NEVER: &str = "never";
const ALWAYS: &str = "always";
const RETRYABLE: &str = "retryable";
const GENERIC: &str = "generic";
const EXHAUSTED: &str = "exhausted";

const VALID_TOKENS: &[&str] = &[NEVER, ALWAYS, RETRYABLE, EXHAUSTED, GENERIC];

// Each of these may only appear alone.
const EXCLUSIVE_TOKENS: &[&str] = &[NEVER, ALWAYS, RETRYABLE];

/// Conditions under which an unsuccessful terminal status is retried.
///
/// Parsed once from a comma-separated token list such as `"generic,exhausted"`.
/// `never`, `always` and `retryable` are exclusive; `generic` and `exhausted`
/// combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    #[default]
    Never,
    Always,
    /// Both the generic internal error and the resource exhaustion signatures.
    Retryable,
    Selective { generic: bool, exhausted: bool },
}

impl RetryPolicy {
    /// Parse an optional token list. Absent or blank input means [`RetryPolicy::Never`].
    pub fn parse(input: Option<&str>) -> Result<Self, ConfigurationError> {
        match input {
            Some(s) => s.parse(),
            None => Ok(RetryPolicy::Never),
        }
    }

    /// Decide whether an unsuccessful terminal status should be retried.
    ///
    /// First match wins: `never`, `always`, the generic internal error
    /// signature, the resource exhaustion signature.
    pub fn should_retry(&self, status: &JobStatus) -> bool {
        let (generic, exhausted) = match *self {
            RetryPolicy::Never => return false,
            RetryPolicy::Always => return true,
            RetryPolicy::Retryable => (true, true),
            RetryPolicy::Selective { generic, exhausted } => (generic, exhausted),
        };

        let reason = status.reason.as_deref().unwrap_or_default();
        if generic && reason.contains(GENERIC_INTERNAL_ERROR) {
            return true;
        }
        exhausted && reason.contains(RESOURCES_EXHAUSTED)
    }
}

impl FromStr for RetryPolicy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = BTreeSet::new();
        for raw in s.split(',') {
            let token = raw.trim();
            if token.is_empty() {
                continue;
            }
            if !VALID_TOKENS.contains(&token) {
                return Err(ConfigurationError::InvalidRetryToken(token.to_string()));
            }
            tokens.insert(token);
        }

        if tokens.len() > 1 && tokens.iter().any(|t| EXCLUSIVE_TOKENS.contains(t)) {
            return Err(ConfigurationError::ConflictingRetryTokens(
                s.trim().to_string(),
            ));
        }

        let policy = if tokens.is_empty() || tokens.contains(NEVER) {
            RetryPolicy::Never
        } else if tokens.contains(ALWAYS) {
            RetryPolicy::Always
        } else if tokens.contains(RETRYABLE) {
            RetryPolicy::Retryable
        } else {
            RetryPolicy::Selective {
                generic: tokens.contains(GENERIC),
                exhausted: tokens.contains(EXHAUSTED),
            }
        };
        Ok(policy)
    }
}

impl fmt::Display for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicy::Never => write!(f, "{NEVER}"),
            RetryPolicy::Always => write!(f, "{ALWAYS}"),
            RetryPolicy::Retryable => write!(f, "{RETRYABLE}"),
            RetryPolicy::Selective { generic, exhausted } => {
                let tokens: Vec<&str> = [(*generic, GENERIC), (*exhausted, EXHAUSTED)]
                    .into_iter()
                    .filter_map(|(on, token)| on.then_some(token))
                    .collect();
                write!(f, "{}", tokens.join(","))
            }
        }
    }
}
