//! Engine tuning knobs.

use crate::db::{config::parse_env_or, timeouts::DEFAULT_TRANSACTION_TIMEOUT};
use std::time::Duration;

/// Bracket engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketConfig {
    /// How long advancement waits for a node lock
    pub lock_timeout: Duration,

    /// Deadline for persisting a whole bracket
    pub transaction_timeout: Duration,
}

impl BracketConfig {
    /// Load configuration from environment variables
    ///
    /// - `BRACKET_LOCK_TIMEOUT_MS` (default: 5000)
    /// - `BRACKET_TRANSACTION_TIMEOUT_SECS` (default: 10)
    pub fn from_env() -> Self {
        Self {
            lock_timeout: Duration::from_millis(parse_env_or("BRACKET_LOCK_TIMEOUT_MS", 5000)),
            transaction_timeout: Duration::from_secs(parse_env_or(
                "BRACKET_TRANSACTION_TIMEOUT_SECS",
                DEFAULT_TRANSACTION_TIMEOUT.as_secs(),
            )),
        }
    }
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}
