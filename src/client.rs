use crate::{
    address::Address,
    config::ArenaConfig,
    decoder::{
        DecodedBatch,
        decode_active_games,
    },
    eligibility::{
        self,
        BalanceView,
    },
    encoder::{
        CallPayload,
        encode_transfer,
    },
    error::{
        EligibilityError,
        EncodingError,
        LedgerError,
    },
    ledger::{
        Ledger,
        QueryCall,
    },
    model::{
        ActionKind,
        GameRecord,
        Stake,
    },
    orchestrator::{
        TransactionOrchestrator,
        TransactionSession,
    },
    resolver::Resolver,
    tokens::TokenIdentifier,
    wallet::Wallet,
    watcher::{
        ActiveGamesWatch,
        WatcherCommand,
        run_active_games_watcher,
    },
};
use num_bigint::BigUint;
use std::{
    collections::HashSet,
    sync::{
        Arc,
        Mutex,
        PoisonError,
    },
};
use tokio::sync::mpsc;

pub(crate) const ACTIVE_GAMES_VIEW: &str = "getActiveGames";

/// Entry point for every game action. Constructed explicitly by the caller
/// with the ledger and wallet it should talk to.
pub struct ArenaClient<L, W> {
    ledger: Arc<L>,
    wallet: W,
    config: ArenaConfig,
    joins_in_flight: Mutex<HashSet<u64>>,
}

impl<L: Ledger, W: Wallet> ArenaClient<L, W> {
    pub fn new(ledger: L, wallet: W, config: ArenaConfig) -> Self {
        Self::with_shared_ledger(Arc::new(ledger), wallet, config)
    }

    pub fn with_shared_ledger(ledger: Arc<L>, wallet: W, config: ArenaConfig) -> Self {
        Self {
            ledger,
            wallet,
            config,
            joins_in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn me(&self) -> Address {
        self.wallet.address()
    }

    pub(crate) fn orchestrator(&self) -> TransactionOrchestrator<'_, W> {
        TransactionOrchestrator::new(&self.wallet)
    }

    pub(crate) fn resolver(&self) -> Resolver<'_, W> {
        Resolver::new(&self.wallet, &self.config.timings)
    }

    pub async fn active_games(&self) -> Result<DecodedBatch, LedgerError> {
        let blobs = self.ledger.query(&QueryCall::new(ACTIVE_GAMES_VIEW)).await?;
        Ok(decode_active_games(&blobs))
    }

    pub fn display_amount(&self, game: &GameRecord) -> String {
        self.config.tokens.display_amount(&game.token, &game.amount)
    }

    /// A failed balance read leaves the view unknown rather than empty.
    pub async fn balance_view(&self, token: &TokenIdentifier) -> BalanceView {
        match self.ledger.balance(&self.me(), token).await {
            Ok(balance) => BalanceView::loaded(balance),
            Err(err) => {
                tracing::warn!(%token, %err, "balance unavailable");
                BalanceView::loading()
            }
        }
    }

    /// Native stakes also have to cover the protocol fee.
    pub fn required_balance(&self, stake: &Stake, with_fee: bool) -> BigUint {
        match (&self.config.protocol_fee, stake.token.is_native() && with_fee) {
            (Some(fee), true) => &stake.amount + &fee.amount,
            _ => stake.amount.clone(),
        }
    }

    pub(crate) async fn check_eligibility(
        &self,
        stake: &Stake,
        with_fee: bool,
    ) -> Result<(), EligibilityError> {
        let view = self.balance_view(&stake.token).await;
        eligibility::require(&view, &self.required_balance(stake, with_fee))
    }

    pub(crate) fn session(
        &self,
        kind: ActionKind,
        action: CallPayload,
        with_fee: bool,
    ) -> Result<TransactionSession, EncodingError> {
        let mut payloads = Vec::with_capacity(2);
        if with_fee && let Some(fee) = &self.config.protocol_fee {
            payloads.push(encode_transfer(
                &fee.receiver,
                &fee.amount,
                self.config.gas.fee_transfer,
            )?);
        }
        payloads.push(action);
        TransactionSession::new(kind, payloads)
    }

    /// Marks `game_id` as being joined until the returned guard drops.
    pub(crate) fn claim_join(&self, game_id: u64) -> Option<JoinGuard<'_>> {
        let mut in_flight = self
            .joins_in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(game_id) {
            return None;
        }
        Some(JoinGuard {
            set: &self.joins_in_flight,
            game_id,
        })
    }
}

impl<L, W> ArenaClient<L, W>
where
    L: Ledger + Send + Sync + 'static,
    W: Wallet,
{
    /// Starts the periodic active-games refresh on the current runtime.
    pub fn watch_active_games(&self) -> ActiveGamesWatch {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WatcherCommand>();
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_active_games_watcher(
            self.config.refresh_interval,
            self.ledger.clone(),
            cmd_rx,
            snapshot_tx,
        ));
        ActiveGamesWatch::new(cmd_tx, snapshot_rx, task)
    }
}

pub(crate) struct JoinGuard<'a> {
    set: &'a Mutex<HashSet<u64>>,
    game_id: u64,
}

impl Drop for JoinGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.game_id);
    }
}
