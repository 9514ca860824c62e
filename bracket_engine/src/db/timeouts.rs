//! Timeout helpers for repository calls
//!
//! Wraps bracket repository futures so a stalled database cannot hang a
//! generation or an advancement indefinitely.

use crate::bracket::{BracketError, BracketResult};
use std::{future::Future, time::Duration};
use tokio::time::timeout;

/// Default timeout for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for transactions (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Run a repository call with a deadline
///
/// # Example
///
/// ```no_run
/// use bracket_engine::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// use bracket_engine::db::BracketRepository;
/// # async fn example(repo: &dyn BracketRepository) -> bracket_engine::bracket::BracketResult<()> {
///
/// let generated = with_timeout(DEFAULT_QUERY_TIMEOUT, repo.is_bracket_generated(1)).await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> BracketResult<T>
where
    F: Future<Output = BracketResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(BracketError::Timeout(duration)),
    }
}

/// Run a repository call with the default query timeout (5 seconds)
pub async fn with_default_timeout<F, T>(future: F) -> BracketResult<T>
where
    F: Future<Output = BracketResult<T>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}
