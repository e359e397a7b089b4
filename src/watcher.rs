use crate::{
    client::ACTIVE_GAMES_VIEW,
    decoder::decode_active_games,
    error::LedgerError,
    ledger::{
        Ledger,
        QueryCall,
    },
    model::GameRecord,
};
use chrono::{
    DateTime,
    Utc,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    warn,
};

pub enum WatcherCommand {
    FetchNow,
    Shutdown,
}

/// One decoded read of the active list. Never mutated after it is sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveGamesSnapshot {
    pub games: Vec<GameRecord>,
    pub skipped: usize,
    pub fetched_at: DateTime<Utc>,
}

enum FetchError {
    Ledger(LedgerError),
    ReceiverDropped,
}

/// Fetches the active games now, then on every tick and on `FetchNow`.
pub async fn run_active_games_watcher<L: Ledger>(
    refresh_interval: Duration,
    ledger: Arc<L>,
    mut cmd_rx: mpsc::UnboundedReceiver<WatcherCommand>,
    snapshot_tx: mpsc::UnboundedSender<ActiveGamesSnapshot>,
) {
    async fn fetch_snapshot<L: Ledger>(
        ledger: &L,
        snapshot_tx: &mpsc::UnboundedSender<ActiveGamesSnapshot>,
    ) -> Result<(), FetchError> {
        let blobs = ledger
            .query(&QueryCall::new(ACTIVE_GAMES_VIEW))
            .await
            .map_err(FetchError::Ledger)?;
        let batch = decode_active_games(&blobs);
        debug!(
            games = batch.records.len(),
            skipped = batch.errors.len(),
            "active games fetched"
        );
        snapshot_tx
            .send(ActiveGamesSnapshot {
                games: batch.records,
                skipped: batch.errors.len(),
                fetched_at: Utc::now(),
            })
            .map_err(|_| FetchError::ReceiverDropped)
    }

    /// `false` once nobody is listening any more.
    async fn refresh<L: Ledger>(
        ledger: &L,
        snapshot_tx: &mpsc::UnboundedSender<ActiveGamesSnapshot>,
    ) -> bool {
        match fetch_snapshot(ledger, snapshot_tx).await {
            Ok(()) => true,
            Err(FetchError::Ledger(err)) => {
                warn!(?err, "active games fetch failed");
                true
            }
            Err(FetchError::ReceiverDropped) => false,
        }
    }

    if !refresh(ledger.as_ref(), &snapshot_tx).await {
        return;
    }
    let mut ticker = time::interval_at(time::Instant::now() + refresh_interval, refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let keep_going = tokio::select! {
            _ = ticker.tick() => refresh(ledger.as_ref(), &snapshot_tx).await,
            cmd = cmd_rx.recv() => match cmd {
                Some(WatcherCommand::FetchNow) => refresh(ledger.as_ref(), &snapshot_tx).await,
                Some(WatcherCommand::Shutdown) | None => false,
            },
        };
        if !keep_going {
            break;
        }
    }
    debug!("active games watcher stopped");
}

/// Handle on a spawned watcher task.
pub struct ActiveGamesWatch {
    commands: mpsc::UnboundedSender<WatcherCommand>,
    snapshots: mpsc::UnboundedReceiver<ActiveGamesSnapshot>,
    task: JoinHandle<()>,
}

impl ActiveGamesWatch {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<WatcherCommand>,
        snapshots: mpsc::UnboundedReceiver<ActiveGamesSnapshot>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            commands,
            snapshots,
            task,
        }
    }

    pub fn fetch_now(&self) {
        let _ = self.commands.send(WatcherCommand::FetchNow);
    }

    /// `None` once the watcher has stopped.
    pub async fn next(&mut self) -> Option<ActiveGamesSnapshot> {
        self.snapshots.recv().await
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send(WatcherCommand::Shutdown);
        if let Err(err) = self.task.await {
            warn!(?err, "active games watcher panicked");
        }
    }
}
