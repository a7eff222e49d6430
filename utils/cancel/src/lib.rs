// Utils - Cancel
// Cancellation utilities

use std::future::Future;
use std::time::Duration;

pub use tokio_util::sync::CancellationToken;

/// The operation was cancelled through its token
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Create a new cancellation token
pub fn cancel_token() -> CancellationToken {
  CancellationToken::new()
}

/// Sleep for `duration` unless `token` is cancelled first
pub async fn sleep_or_cancel(
  duration: Duration,
  token: &CancellationToken,
) -> Result<(), Cancelled> {
  if token.is_cancelled() {
    return Err(Cancelled);
  }
  tokio::select! {
    biased;
    _ = token.cancelled() => Err(Cancelled),
    _ = tokio::time::sleep(duration) => Ok(()),
  }
}

/// Drive `fut` to completion unless `token` is cancelled first
pub async fn run_until_cancelled<F>(
  token: &CancellationToken,
  fut: F,
) -> Result<F::Output, Cancelled>
where
  F: Future,
{
  if token.is_cancelled() {
    return Err(Cancelled);
  }
  tokio::select! {
    biased;
    _ = token.cancelled() => Err(Cancelled),
    output = fut => Ok(output),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Instant;

  #[tokio::test]
  async fn sleep_completes_without_cancel() {
    let token = cancel_token();
    assert_eq!(sleep_or_cancel(Duration::from_millis(5), &token).await, Ok(()));
  }

  #[tokio::test]
  async fn cancel_interrupts_long_sleep() {
    let token = cancel_token();
    let trigger = token.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      trigger.cancel();
    });

    let started = Instant::now();
    let result = sleep_or_cancel(Duration::from_secs(30), &token).await;
    assert_eq!(result, Err(Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
  }

  #[tokio::test]
  async fn already_cancelled_token_skips_future() {
    let token = cancel_token();
    token.cancel();
    let result = run_until_cancelled(&token, async { 42 }).await;
    assert_eq!(result, Err(Cancelled));
  }

  #[tokio::test]
  async fn child_tokens_follow_parent() {
    let parent = cancel_token();
    let child = parent.child_token();
    parent.cancel();
    assert_eq!(run_until_cancelled(&child, std::future::pending::<()>()).await, Err(Cancelled));
  }
}
