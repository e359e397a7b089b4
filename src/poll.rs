//! The one bounded polling loop every resolver goes through.

use crate::{
    cancel::CancelToken,
    error::LedgerError,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    future::Future,
    time::Duration,
};
use tokio::time;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub interval: Duration,
}

impl PollPolicy {
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness<T> {
    NotReady,
    Ready(T),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Runs `check` up to `policy.max_attempts` times, sleeping `policy.interval`
/// between attempts. An error counts as a not-ready attempt. Once cancelled,
/// no value is delivered, even from a check already in flight.
pub async fn poll_bounded<T, F, Fut>(
    policy: &PollPolicy,
    cancel: &mut CancelToken,
    mut check: F,
) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Readiness<T>, LedgerError>>,
{
    let mut attempts = 0;
    while attempts < policy.max_attempts {
        if attempts > 0 {
            tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Cancelled { attempts },
                _ = time::sleep(policy.interval) => {}
            }
        }
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled { attempts };
        }
        attempts += 1;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return PollOutcome::Cancelled { attempts },
            result = check(attempts) => result,
        };
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled { attempts };
        }
        match result {
            Ok(Readiness::Ready(value)) => return PollOutcome::Ready { value, attempts },
            Ok(Readiness::NotReady) => {
                tracing::trace!(attempts, "not ready");
            }
            Err(err) => {
                tracing::warn!(attempts, %err, "result check failed");
            }
        }
    }
    PollOutcome::Exhausted { attempts }
}

pub(crate) mod millis {
    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
    };
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::cancel::cancellation;
    use std::{
        cell::Cell,
        rc::Rc,
    };

    const POLICY: PollPolicy = PollPolicy::new(5, Duration::from_millis(1_000));

    #[tokio::test(start_paused = true)]
    async fn poll_bounded__stops_on_the_ready_attempt() {
        for k in 1..=POLICY.max_attempts {
            // given
            let calls = Rc::new(Cell::new(0u32));
            let seen = calls.clone();

            // when
            let outcome = poll_bounded(&POLICY, &mut CancelToken::never(), |attempt| {
                seen.set(seen.get() + 1);
                async move {
                    Ok(if attempt == k {
                        Readiness::Ready(attempt * 10)
                    } else {
                        Readiness::NotReady
                    })
                }
            })
            .await;

            // then
            assert_eq!(
                outcome,
                PollOutcome::Ready {
                    value: k * 10,
                    attempts: k
                }
            );
            assert_eq!(calls.get(), k);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_bounded__never_exceeds_max_attempts() {
        // given
        let calls = Rc::new(Cell::new(0u32));
        let seen = calls.clone();
        let started = time::Instant::now();

        // when
        let outcome: PollOutcome<()> =
            poll_bounded(&POLICY, &mut CancelToken::never(), |_| {
                seen.set(seen.get() + 1);
                async { Ok(Readiness::NotReady) }
            })
            .await;

        // then
        assert_eq!(outcome, PollOutcome::Exhausted { attempts: 5 });
        assert_eq!(calls.get(), 5);
        assert_eq!(started.elapsed(), Duration::from_millis(4_000));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_bounded__check_errors_count_as_attempts() {
        let outcome = poll_bounded(&POLICY, &mut CancelToken::never(), |attempt| async move {
            if attempt < 3 {
                Err(LedgerError::Unavailable("gateway down".to_string()))
            } else {
                Ok(Readiness::Ready("done"))
            }
        })
        .await;
        assert_eq!(
            outcome,
            PollOutcome::Ready {
                value: "done",
                attempts: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_bounded__cancel_stops_further_checks() {
        // given
        let (canceller, mut token) = cancellation();
        let calls = Rc::new(Cell::new(0u32));
        let seen = calls.clone();
        let canceller = Rc::new(Cell::new(Some(canceller)));

        // when
        let outcome: PollOutcome<()> = poll_bounded(&POLICY, &mut token, |attempt| {
            seen.set(seen.get() + 1);
            if attempt == 2 {
                // owner navigates away mid-poll
                drop(canceller.take());
            }
            async { Ok(Readiness::NotReady) }
        })
        .await;

        // then
        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 2 });
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_bounded__cancel_during_check_discards_its_value() {
        // given
        let (canceller, mut token) = cancellation();

        // when
        let cancel_later = async {
            time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        };
        let (outcome, _) = tokio::join!(
            poll_bounded(&POLICY, &mut token, |_| async {
                time::sleep(Duration::from_millis(500)).await;
                Ok(Readiness::Ready("value"))
            }),
            cancel_later
        );

        // then
        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 1 });
    }
}
