//! Wall-clock deadlines for long-running operations.

use std::future::Future;
use std::time::Duration;

use crate::core::DeadlineError;

/// Race `operation` against `deadline`.
///
/// If the timer fires first the result is [`DeadlineError::Timeout`] and the
/// operation future is dropped, which cancels it at its next suspend point.
/// Work it already handed to other tasks keeps running; whatever it produces
/// later has nowhere to go and is discarded. An operation error that arrives
/// first is returned as [`DeadlineError::Failed`] unchanged.
pub async fn run_with_deadline<F, T, E>(
    operation: F,
    deadline: Duration,
) -> Result<T, DeadlineError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DeadlineError::Failed(e)),
        Err(_) => {
            tracing::debug!(?deadline, "operation exceeded its deadline");
            Err(DeadlineError::Timeout(deadline))
        }
    }
}
