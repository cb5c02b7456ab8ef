//! Confirmation polling for asynchronously committed resources.
//!
//! Creating an asset or event returns before the service has durably
//! committed it; the record carries a `confirmation_status` of `PENDING`
//! until then. The poller re-reads the resource on a growing schedule
//! until a terminal state appears or the overall deadline passes.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::Result;
use crate::error::Error;
use crate::resources::ResourceRecord;

/// Field carrying the server-side commitment state.
pub const CONFIRMATION_STATUS: &str = "confirmation_status";

/// Still being committed.
pub const PENDING: &str = "PENDING";

/// Terminal success.
pub const CONFIRMED: &str = "CONFIRMED";

/// Terminal failure.
pub const FAILED: &str = "FAILED";

/// First wait between polls.
const INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Growth applied to the wait after every pending poll.
const DELAY_MULTIPLIER: f64 = 1.25;

/// Overall budget before a pending resource is reported unconfirmed.
const MAX_ELAPSED: Duration = Duration::from_secs(1200);

/// Tuning for confirmation polling.
///
/// The defaults poll after one second, growing the wait by a quarter
/// each round, and give up after twenty minutes.
#[derive(Debug, Clone)]
pub struct ConfirmOptions {
    /// Wait before the second read.
    pub initial_delay: Duration,
    /// Factor applied to the wait after each pending poll; at least 1.
    pub multiplier: f64,
    /// Overall deadline measured from the first read.
    pub max_elapsed: Duration,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            initial_delay: INITIAL_DELAY,
            multiplier: DELAY_MULTIPLIER,
            max_elapsed: MAX_ELAPSED,
        }
    }
}

/// The growing wait schedule between polls.
#[derive(Debug)]
struct Backoff {
    next: Duration,
    multiplier: f64,
}

impl Backoff {
    fn new(options: &ConfirmOptions) -> Self {
        Self {
            next: options.initial_delay,
            multiplier: options.multiplier,
        }
    }

    /// The next delay, clipped so the deadline is hit exactly.
    fn advance(&mut self, remaining: Duration) -> Duration {
        let delay = self.next.min(remaining);
        // Saturate once the grown delay no longer fits a Duration.
        self.next = Duration::try_from_secs_f64(self.next.as_secs_f64() * self.multiplier)
            .unwrap_or(Duration::MAX);
        delay
    }
}

/// Read access to one resource family, as needed by the poller.
#[async_trait]
pub(crate) trait ConfirmationReader: Send + Sync {
    /// Re-read the resource by identity.
    async fn read_record(&self, identity: &str) -> Result<ResourceRecord>;
}

/// Poll until `identity` reaches a terminal confirmation state.
///
/// Returns the final record on `CONFIRMED`. A record reporting `FAILED`,
/// or one with no `confirmation_status` at all, fails immediately; a
/// record still pending at the deadline fails with the elapsed time.
pub(crate) async fn wait_for_confirmation<R>(
    reader: &R,
    identity: &str,
    options: &ConfirmOptions,
) -> Result<ResourceRecord>
where
    R: ConfirmationReader + ?Sized,
{
    let started = Instant::now();
    let mut backoff = Backoff::new(options);

    loop {
        let record = reader.read_record(identity).await?;
        match record.confirmation_status() {
            Some(CONFIRMED) => {
                debug!(identity, "confirmed");
                return Ok(record);
            }
            Some(FAILED) => {
                return Err(Error::Unconfirmed {
                    reason: format!("{identity}: confirmation failed"),
                });
            }
            Some(status) => {
                trace!(identity, status, "not yet confirmed");
            }
            None => {
                return Err(Error::Unconfirmed {
                    reason: format!("{identity}: no {CONFIRMATION_STATUS} in response"),
                });
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= options.max_elapsed {
            return Err(Error::Unconfirmed {
                reason: format!(
                    "{identity}: still unconfirmed after {:.1}s",
                    elapsed.as_secs_f64()
                ),
            });
        }
        sleep(backoff.advance(options.max_elapsed - elapsed)).await;
    }
}

/// Poll `count_pending` until it reports zero, on the same schedule.
pub(crate) async fn wait_until_none_pending<F, Fut>(
    mut count_pending: F,
    options: &ConfirmOptions,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let started = Instant::now();
    let mut backoff = Backoff::new(options);

    loop {
        let pending = count_pending().await?;
        if pending == 0 {
            return Ok(());
        }
        trace!(pending, "records still pending");

        let elapsed = started.elapsed();
        if elapsed >= options.max_elapsed {
            return Err(Error::Unconfirmed {
                reason: format!(
                    "{pending} records still pending after {:.1}s",
                    elapsed.as_secs_f64()
                ),
            });
        }
        sleep(backoff.advance(options.max_elapsed - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[test]
    fn defaults_match_the_service_guidance() {
        let options = ConfirmOptions::default();
        assert_eq!(options.initial_delay, Duration::from_secs(1));
        assert_eq!(options.multiplier, 1.25);
        assert_eq!(options.max_elapsed, Duration::from_secs(1200));
    }

    #[test]
    fn backoff_grows_by_the_multiplier() {
        let options = ConfirmOptions::default();
        let mut backoff = Backoff::new(&options);
        let far = Duration::from_secs(10_000);
        assert_eq!(backoff.advance(far), Duration::from_secs_f64(1.0));
        assert_eq!(backoff.advance(far), Duration::from_secs_f64(1.25));
        assert_eq!(backoff.advance(far), Duration::from_secs_f64(1.5625));
    }

    #[test]
    fn backoff_is_clipped_to_the_remaining_budget() {
        let options = ConfirmOptions::default();
        let mut backoff = Backoff::new(&options);
        assert_eq!(backoff.advance(Duration::from_millis(300)), Duration::from_millis(300));
        // The schedule still advanced underneath the clip.
        assert_eq!(
            backoff.advance(Duration::from_secs(10)),
            Duration::from_secs_f64(1.25)
        );
    }

    #[test]
    fn extreme_growth_saturates_the_schedule() {
        let options = ConfirmOptions {
            multiplier: 1e300,
            ..ConfirmOptions::default()
        };
        let mut backoff = Backoff::new(&options);
        let remaining = Duration::from_secs(100);
        assert_eq!(backoff.advance(remaining), Duration::from_secs(1));
        // The grown delay overflowed; the clip still bounds every sleep.
        assert_eq!(backoff.advance(remaining), remaining);
        assert_eq!(backoff.advance(remaining), remaining);
    }

    /// Replays a scripted sequence of read results.
    struct ScriptedReader {
        responses: Mutex<VecDeque<Value>>,
    }

    impl ScriptedReader {
        fn new(responses: impl IntoIterator<Item = Value>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
            }
        }
    }

    #[async_trait]
    impl ConfirmationReader for ScriptedReader {
        async fn read_record(&self, _identity: &str) -> Result<ResourceRecord> {
            let next = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| json!({"confirmation_status": "PENDING"}));
            ResourceRecord::new(next)
        }
    }

    fn with_status(status: &str) -> Value {
        json!({"identity": "assets/1", "confirmation_status": status})
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_confirmed_on_the_backoff_schedule() {
        let reader = ScriptedReader::new([
            with_status("PENDING"),
            with_status("PENDING"),
            with_status("CONFIRMED"),
        ]);
        let started = Instant::now();

        let record = wait_for_confirmation(&reader, "assets/1", &ConfirmOptions::default())
            .await
            .unwrap();

        assert_eq!(record.confirmation_status(), Some("CONFIRMED"));
        // Two sleeps: 1.0s then 1.25s of virtual time.
        assert_eq!(started.elapsed(), Duration::from_secs_f64(2.25));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_state_stops_polling() {
        let reader = ScriptedReader::new([with_status("PENDING"), with_status("FAILED")]);

        let err = wait_for_confirmation(&reader, "assets/1", &ConfirmOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unconfirmed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_status_fails_without_polling() {
        let reader = ScriptedReader::new([json!({"identity": "assets/1"})]);
        let started = Instant::now();

        let err = wait_for_confirmation(&reader, "assets/1", &ConfirmOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unconfirmed { .. }));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_hit_exactly_thanks_to_clipping() {
        let reader = ScriptedReader::new([]);
        // Delays of 1s, 2s and 4s, then 8s clipped to the remaining 3s.
        let options = ConfirmOptions {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_elapsed: Duration::from_secs(10),
        };
        let started = Instant::now();

        let err = wait_for_confirmation(&reader, "assets/1", &options)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unconfirmed { .. }));
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn drains_pending_counts_on_the_same_schedule() {
        let counts = Mutex::new(VecDeque::from([2u64, 1, 0]));
        let started = Instant::now();

        wait_until_none_pending(
            || {
                let next = counts.lock().unwrap().pop_front().unwrap_or(0);
                async move { Ok(next) }
            },
            &ConfirmOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(started.elapsed(), Duration::from_secs_f64(2.25));
    }

    #[tokio::test(start_paused = true)]
    async fn drain_reports_the_stuck_count_at_the_deadline() {
        let options = ConfirmOptions {
            max_elapsed: Duration::from_secs(5),
            ..ConfirmOptions::default()
        };

        let err = wait_until_none_pending(|| async { Ok(3) }, &options)
            .await
            .unwrap_err();

        match err {
            Error::Unconfirmed { reason } => assert!(reason.contains("3 records")),
            other => panic!("expected Unconfirmed, got {other:?}"),
        }
    }
}
