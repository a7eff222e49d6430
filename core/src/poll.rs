//! Cancellable status polling with exponential backoff
//!
//! Both run completion and talk rendering follow the same shape: submit a
//! job, then re-fetch its status until it is terminal. [`poll_until`] is
//! that loop, parameterized by the fetch call and the terminal predicate.

use std::future::Future;
use std::time::Duration;

use ava_cancel::{CancellationToken, run_until_cancelled, sleep_or_cancel};
use ava_config::PollSettings;
use tracing::debug;

use crate::error::{AvaError, Result};

/// Wait schedule between status checks
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
  /// Wait before the first check
  pub initial_interval: Duration,
  /// Growth factor after every non-terminal check
  pub multiplier: f64,
  /// Ceiling for a single wait
  pub max_interval: Duration,
  /// Checks before [`AvaError::PollExhausted`]
  pub max_attempts: u32,
}

impl PollPolicy {
  /// Constant interval, no backoff
  pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
    Self {
      initial_interval: interval,
      multiplier: 1.0,
      max_interval: interval,
      max_attempts,
    }
  }

  /// Next wait, capped at `max_interval`; overflow saturates to the cap
  pub fn next_delay(&self, current: Duration) -> Duration {
    let scaled = current.as_secs_f64() * self.multiplier.max(1.0);
    Duration::try_from_secs_f64(scaled)
      .unwrap_or(self.max_interval)
      .min(self.max_interval)
  }

  /// The waits this policy performs, in order
  pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
    std::iter::successors(Some(self.initial_interval), |d| Some(self.next_delay(*d)))
      .take(self.max_attempts as usize)
  }
}

impl Default for PollPolicy {
  fn default() -> Self {
    PollPolicy::from(&PollSettings::default())
  }
}

impl From<&PollSettings> for PollPolicy {
  fn from(settings: &PollSettings) -> Self {
    Self {
      initial_interval: settings.initial_interval(),
      multiplier: settings.multiplier,
      max_interval: settings.max_interval(),
      max_attempts: settings.max_attempts,
    }
  }
}

/// Re-run `fetch` on the policy's schedule until `is_terminal` accepts the
/// result.
///
/// A failed fetch is returned as-is, without retry. Cancelling `cancel`
/// interrupts both the wait and an in-flight fetch.
pub async fn poll_until<T, F, Fut, P>(
  policy: &PollPolicy,
  cancel: &CancellationToken,
  what: &str,
  mut fetch: F,
  is_terminal: P,
) -> Result<T>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T>>,
  P: Fn(&T) -> bool,
{
  let mut delay = policy.initial_interval;
  for attempt in 1..=policy.max_attempts {
    sleep_or_cancel(delay, cancel).await?;
    let value = run_until_cancelled(cancel, fetch()).await??;
    if is_terminal(&value) {
      debug!(what, attempt, "reached terminal status");
      return Ok(value);
    }
    debug!(what, attempt, ?delay, "still pending");
    delay = policy.next_delay(delay);
  }

  Err(AvaError::PollExhausted {
    what: what.to_string(),
    attempts: policy.max_attempts,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::sync::atomic::{AtomicU32, Ordering};

  fn fast(max_attempts: u32) -> PollPolicy {
    PollPolicy::fixed(Duration::from_millis(1), max_attempts)
  }

  #[test]
  fn backoff_grows_to_ceiling() {
    let policy = PollPolicy {
      initial_interval: Duration::from_millis(1000),
      multiplier: 2.0,
      max_interval: Duration::from_millis(5000),
      max_attempts: 5,
    };
    let delays: Vec<u128> = policy.delays().map(|d| d.as_millis()).collect();
    assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
  }

  #[test]
  fn huge_multiplier_saturates_at_ceiling() {
    let policy = PollPolicy {
      initial_interval: Duration::from_millis(1),
      multiplier: 1e300,
      max_interval: Duration::from_millis(5),
      max_attempts: 3,
    };
    let delays: Vec<u128> = policy.delays().map(|d| d.as_millis()).collect();
    assert_eq!(delays, vec![1, 5, 5]);
  }

  #[test]
  fn defaults_start_at_one_second() {
    let policy = PollPolicy::default();
    assert_eq!(policy.initial_interval, Duration::from_secs(1));
    assert_eq!(policy.max_attempts, 60);
  }

  #[tokio::test]
  async fn returns_first_terminal_value() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let result = poll_until(
      &fast(10),
      &CancellationToken::new(),
      "job",
      move || {
        let counter = counter.clone();
        async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
      },
      |n| *n == 3,
    )
    .await
    .expect("terminal value");

    assert_eq!(result, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn gives_up_after_max_attempts() {
    let err = poll_until(
      &fast(4),
      &CancellationToken::new(),
      "talk tlk_1",
      || async { Ok(()) },
      |_| false,
    )
    .await
    .unwrap_err();

    match err {
      AvaError::PollExhausted { what, attempts } => {
        assert_eq!(what, "talk tlk_1");
        assert_eq!(attempts, 4);
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[tokio::test]
  async fn fetch_errors_propagate_without_retry() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let err = poll_until(
      &fast(10),
      &CancellationToken::new(),
      "run",
      move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async {
          Err::<(), _>(AvaError::Http {
            status: 502,
            body: "bad gateway".to_string(),
          })
        }
      },
      |_| true,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AvaError::Http { status: 502, .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn cancellation_stops_polling() {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(20)).await;
      trigger.cancel();
    });

    let policy = PollPolicy::fixed(Duration::from_millis(5), u32::MAX);
    let err = poll_until(&policy, &cancel, "run", || async { Ok(()) }, |_| false)
      .await
      .unwrap_err();
    assert!(matches!(err, AvaError::Cancelled));
  }
}
