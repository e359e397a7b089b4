//! Waiting out finality and polling for an action's result.
//!
//! ```text
//! Submitted --finality wait--> Settling --settle delay--> Polling --> Resolved
//!     |                                                      |-----> TimedOut
//!     '--session reported failed--> Failed      (any wait) -------> Cancelled
//! ```

use crate::{
    cancel::CancelToken,
    error::{
        ArenaError,
        LedgerError,
    },
    model::PendingAction,
    poll::{
        PollOutcome,
        PollPolicy,
        Readiness,
        poll_bounded,
    },
    wallet::{
        SessionStatus,
        Wallet,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    future::Future,
    time::Duration,
};
use tokio::time;
use tracing::{
    debug,
    info,
    warn,
};

/// Finality wait for accounts in shard 1. Empirical, not derived.
pub const SHARD_1_FINALITY_WAIT: Duration = Duration::from_millis(6_000);
/// Finality wait for every other shard. Empirical, not derived.
pub const DEFAULT_FINALITY_WAIT: Duration = Duration::from_millis(12_000);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(2_000);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardWaitTable {
    #[serde(with = "shard_millis")]
    pub by_shard: BTreeMap<u32, Duration>,
    #[serde(with = "crate::poll::millis")]
    pub fallback: Duration,
}

impl Default for ShardWaitTable {
    fn default() -> Self {
        Self {
            by_shard: BTreeMap::from([(1, SHARD_1_FINALITY_WAIT)]),
            fallback: DEFAULT_FINALITY_WAIT,
        }
    }
}

impl ShardWaitTable {
    pub fn wait_for(&self, shard: u32) -> Duration {
        self.by_shard.get(&shard).copied().unwrap_or(self.fallback)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverTimings {
    #[serde(default)]
    pub shard_waits: ShardWaitTable,
    #[serde(with = "crate::poll::millis", default = "default_settle_delay")]
    pub settle_delay: Duration,
}

fn default_settle_delay() -> Duration {
    DEFAULT_SETTLE_DELAY
}

impl Default for ResolverTimings {
    fn default() -> Self {
        Self {
            shard_waits: ShardWaitTable::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Submitted,
    Settling,
    Polling,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution<T> {
    Resolved(T),
    TimedOut { attempts: u32 },
    Failed { reason: String },
    Cancelled,
}

impl<T> Resolution<T> {
    pub fn into_result(self) -> Result<T, ArenaError> {
        match self {
            Resolution::Resolved(value) => Ok(value),
            Resolution::TimedOut { attempts } => {
                Err(ArenaError::ConfirmationTimeout { attempts })
            }
            Resolution::Failed { reason } => Err(ArenaError::ExecutionFailed(reason)),
            Resolution::Cancelled => Err(ArenaError::Cancelled),
        }
    }
}

pub struct Resolver<'a, W> {
    wallet: &'a W,
    timings: &'a ResolverTimings,
}

impl<'a, W: Wallet> Resolver<'a, W> {
    pub fn new(wallet: &'a W, timings: &'a ResolverTimings) -> Self {
        Self { wallet, timings }
    }

    pub async fn resolve<T, F, Fut>(
        &self,
        pending: &PendingAction,
        policy: &PollPolicy,
        cancel: &mut CancelToken,
        check: F,
    ) -> Resolution<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Readiness<T>, LedgerError>>,
    {
        let handle = &pending.handle;
        let finality = self.timings.shard_waits.wait_for(pending.shard);
        debug!(%handle, phase = ?Phase::Submitted, ?finality, "waiting for finality");
        if !sleep_unless_cancelled(finality, cancel).await {
            return Resolution::Cancelled;
        }

        match self.wallet.session_status(handle).await {
            Ok(SessionStatus::Failed(reason)) => {
                warn!(%handle, kind = %pending.kind, %reason, "session failed on chain");
                return Resolution::Failed { reason };
            }
            Ok(status) => debug!(%handle, ?status, "session status"),
            Err(err) => warn!(%handle, %err, "session status unavailable"),
        }

        debug!(%handle, phase = ?Phase::Settling, "settling");
        if !sleep_unless_cancelled(self.timings.settle_delay, cancel).await {
            return Resolution::Cancelled;
        }

        debug!(%handle, phase = ?Phase::Polling, max = policy.max_attempts, "polling");
        match poll_bounded(policy, cancel, check).await {
            PollOutcome::Ready { value, attempts } => {
                info!(%handle, kind = %pending.kind, attempts, "resolved");
                Resolution::Resolved(value)
            }
            PollOutcome::Exhausted { attempts } => {
                warn!(%handle, kind = %pending.kind, attempts, "result undetermined");
                Resolution::TimedOut { attempts }
            }
            PollOutcome::Cancelled { attempts } => {
                debug!(%handle, attempts, "poll abandoned");
                Resolution::Cancelled
            }
        }
    }
}

async fn sleep_unless_cancelled(duration: Duration, cancel: &mut CancelToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = time::sleep(duration) => true,
    }
}

mod shard_millis {
    use serde::{
        Deserialize,
        Deserializer,
        Serialize,
        Serializer,
    };
    use std::{
        collections::BTreeMap,
        time::Duration,
    };

    pub fn serialize<S: Serializer>(
        value: &BTreeMap<u32, Duration>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .iter()
            .map(|(shard, wait)| (*shard, wait.as_millis() as u64))
            .collect::<BTreeMap<_, _>>()
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<u32, Duration>, D::Error> {
        let raw = BTreeMap::<u32, u64>::deserialize(d)?;
        Ok(raw
            .into_iter()
            .map(|(shard, ms)| (shard, Duration::from_millis(ms)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        address::Address,
        cancel::cancellation,
        model::{
            ActionKind,
            SessionHandle,
        },
        test_helpers::FakeWallet,
    };
    use chrono::Utc;
    use std::{
        cell::Cell,
        rc::Rc,
    };

    const POLICY: PollPolicy = PollPolicy::new(4, Duration::from_millis(500));

    fn pending(shard: u32) -> PendingAction {
        PendingAction {
            handle: SessionHandle::new("session-1"),
            kind: ActionKind::JoinGame,
            shard,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn shard_wait_table__falls_back_for_unknown_shards() {
        let table = ShardWaitTable::default();
        assert_eq!(table.wait_for(1), SHARD_1_FINALITY_WAIT);
        assert_eq!(table.wait_for(0), DEFAULT_FINALITY_WAIT);
        assert_eq!(table.wait_for(2), DEFAULT_FINALITY_WAIT);
    }

    #[test]
    fn resolver_timings__deserialize_from_millis() {
        let timings: ResolverTimings = serde_json::from_str(
            r#"{"shard_waits":{"by_shard":{"0":3000},"fallback":9000},"settle_delay":250}"#,
        )
        .unwrap();
        assert_eq!(timings.shard_waits.wait_for(0), Duration::from_millis(3_000));
        assert_eq!(timings.shard_waits.wait_for(1), Duration::from_millis(9_000));
        assert_eq!(timings.settle_delay, Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn resolve__waits_finality_and_settle_before_first_check() {
        // given
        let wallet = FakeWallet::new(Address::new([1u8; 32]));
        let timings = ResolverTimings::default();
        let resolver = Resolver::new(&wallet, &timings);
        let started = time::Instant::now();
        let first_check_at = Rc::new(Cell::new(None));
        let seen = first_check_at.clone();

        // when
        let resolution = resolver
            .resolve(&pending(1), &POLICY, &mut CancelToken::never(), |_| {
                seen.set(Some(started.elapsed()));
                async { Ok(Readiness::Ready(())) }
            })
            .await;

        // then
        assert_eq!(resolution, Resolution::Resolved(()));
        assert_eq!(
            first_check_at.get(),
            Some(SHARD_1_FINALITY_WAIT + DEFAULT_SETTLE_DELAY)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn resolve__times_out_after_exactly_max_attempts() {
        // given
        let wallet = FakeWallet::new(Address::new([1u8; 32]));
        let timings = ResolverTimings::default();
        let resolver = Resolver::new(&wallet, &timings);
        let calls = Rc::new(Cell::new(0u32));
        let seen = calls.clone();

        // when
        let resolution: Resolution<()> = resolver
            .resolve(&pending(0), &POLICY, &mut CancelToken::never(), |_| {
                seen.set(seen.get() + 1);
                async { Ok(Readiness::NotReady) }
            })
            .await;

        // then
        assert_eq!(resolution, Resolution::TimedOut { attempts: 4 });
        assert_eq!(calls.get(), 4);
        assert!(matches!(
            resolution.into_result(),
            Err(ArenaError::ConfirmationTimeout { attempts: 4 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn resolve__reports_failed_session_without_polling() {
        // given
        let wallet = FakeWallet::new(Address::new([1u8; 32]));
        wallet.set_session_status(SessionStatus::Failed("out of gas".to_string()));
        let timings = ResolverTimings::default();
        let resolver = Resolver::new(&wallet, &timings);
        let calls = Rc::new(Cell::new(0u32));
        let seen = calls.clone();

        // when
        let resolution: Resolution<()> = resolver
            .resolve(&pending(0), &POLICY, &mut CancelToken::never(), |_| {
                seen.set(seen.get() + 1);
                async { Ok(Readiness::NotReady) }
            })
            .await;

        // then
        assert_eq!(
            resolution,
            Resolution::Failed {
                reason: "out of gas".to_string()
            }
        );
        assert_eq!(calls.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resolve__cancel_during_finality_wait_skips_polling() {
        // given
        let wallet = FakeWallet::new(Address::new([1u8; 32]));
        let timings = ResolverTimings::default();
        let resolver = Resolver::new(&wallet, &timings);
        let (canceller, mut token) = cancellation();
        let calls = Rc::new(Cell::new(0u32));
        let seen = calls.clone();

        // when
        let cancel_later = async {
            time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        };
        let action = pending(0);
        let (resolution, _) = tokio::join!(
            resolver.resolve(&action, &POLICY, &mut token, |_| {
                seen.set(seen.get() + 1);
                async { Ok(Readiness::Ready(())) }
            }),
            cancel_later
        );

        // then
        assert_eq!(resolution, Resolution::Cancelled);
        assert_eq!(calls.get(), 0);
    }
}
