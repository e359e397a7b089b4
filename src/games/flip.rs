use super::undecodable;
use crate::{
    address::Address,
    cancel::CancelToken,
    client::ArenaClient,
    decoder::decode_winner,
    encoder::{
        ActionSpec,
        HexArg,
        encode_action,
    },
    error::{
        ArenaError,
        LedgerError,
        Result,
    },
    ledger::{
        Ledger,
        QueryCall,
    },
    model::{
        ActionKind,
        FlipOutcome,
        GameRecord,
        Side,
        Stake,
    },
    poll::Readiness,
    wallet::Wallet,
};
use futures::future::join_all;
use std::collections::HashSet;
use tracing::{
    info,
    warn,
};

const CREATE_GAME: &str = "createGame";
const JOIN_GAME: &str = "joinGame";
const CANCEL_GAME: &str = "cancelGame";
const WINNER_VIEW: &str = "getWinner";

impl<L: Ledger, W: Wallet> ArenaClient<L, W> {
    /// Opens a game on `side` and waits for it to show up in the active list.
    pub async fn create_game(
        &self,
        side: Side,
        stake: Stake,
        mut cancel: CancelToken,
    ) -> Result<GameRecord> {
        let spec = ActionSpec::new(CREATE_GAME, self.config().gas.create)
            .arg(HexArg::from_side(side))
            .with_stake(stake.clone());
        let payload = encode_action(&self.config().contract, &spec)?;
        self.check_eligibility(&stake, true).await?;

        let known: HashSet<u64> = self
            .active_games()
            .await?
            .records
            .iter()
            .map(|game| game.id)
            .collect();
        let session = self.session(ActionKind::CreateGame, payload, true)?;
        let pending = self.orchestrator().submit(session).await?;

        let me = self.me();
        let known = &known;
        let stake = &stake;
        let game = self
            .resolver()
            .resolve(&pending, &self.config().polls.create, &mut cancel, move |_| {
                self.find_new_game(known, me, side, stake)
            })
            .await
            .into_result()?;
        info!(id = game.id, token = %game.token, "game created");
        Ok(game)
    }

    /// Joins `game_id` with the exact stake its creator put up.
    pub async fn join_game(&self, game_id: u64, mut cancel: CancelToken) -> Result<FlipOutcome> {
        let Some(_claim) = self.claim_join(game_id) else {
            return Err(ArenaError::Rejected(format!(
                "a join for game {game_id} is already in flight"
            )));
        };
        let me = self.me();
        let game = self.open_game(game_id).await?;
        if game.creator == me {
            return Err(ArenaError::Rejected(format!(
                "game {game_id} is your own game"
            )));
        }

        let spec = ActionSpec::new(JOIN_GAME, self.config().gas.join)
            .arg(HexArg::from_u64(game.id))
            .with_stake(game.stake());
        let payload = encode_action(&self.config().contract, &spec)?;
        self.check_eligibility(&game.stake(), true).await?;

        let session = self.session(ActionKind::JoinGame, payload, true)?;
        let pending = self.orchestrator().submit(session).await?;

        let winner = self
            .resolver()
            .resolve(&pending, &self.config().polls.join, &mut cancel, move |_| {
                self.check_winner(game_id)
            })
            .await
            .into_result()?;
        let outcome = FlipOutcome {
            game_id,
            winner,
            won: winner == me,
        };
        info!(game_id, won = outcome.won, "game settled");
        Ok(outcome)
    }

    /// Withdraws an open game. Only its creator may do this.
    pub async fn cancel_game(&self, game_id: u64, mut cancel: CancelToken) -> Result<()> {
        let game = self.open_game(game_id).await?;
        if game.creator != self.me() {
            return Err(ArenaError::Rejected(format!(
                "only the creator can cancel game {game_id}"
            )));
        }

        let spec = ActionSpec::new(CANCEL_GAME, self.config().gas.cancel)
            .arg(HexArg::from_u64(game_id));
        let payload = encode_action(&self.config().contract, &spec)?;
        let session = self.session(ActionKind::CancelGame, payload, false)?;
        let pending = self.orchestrator().submit(session).await?;

        self.resolver()
            .resolve(&pending, &self.config().polls.cancel, &mut cancel, move |_| {
                self.check_game_gone(game_id)
            })
            .await
            .into_result()?;
        info!(game_id, "game cancelled");
        Ok(())
    }

    pub async fn winner(&self, game_id: u64) -> Result<Option<Address>> {
        let call = QueryCall::new(WINNER_VIEW).arg(HexArg::from_u64(game_id));
        let blobs = self.ledger().query(&call).await?;
        Ok(decode_winner(&blobs)?)
    }

    /// Looks up several winners concurrently. Each lookup fails on its own.
    pub async fn winners(&self, game_ids: &[u64]) -> Vec<(u64, Result<Option<Address>>)> {
        let lookups = game_ids
            .iter()
            .map(|id| async move { (*id, self.winner(*id).await) });
        join_all(lookups).await
    }

    /// Fresh read of `game_id`, which must still be waiting for a rival.
    async fn open_game(&self, game_id: u64) -> Result<GameRecord> {
        let batch = self.active_games().await?;
        match batch.records.into_iter().find(|game| game.id == game_id) {
            Some(game) if game.is_open() => Ok(game),
            Some(_) => Err(ArenaError::Rejected(format!(
                "game {game_id} already has a rival"
            ))),
            None => Err(ArenaError::Rejected(format!(
                "game {game_id} is no longer open"
            ))),
        }
    }

    async fn find_new_game(
        &self,
        known: &HashSet<u64>,
        creator: Address,
        side: Side,
        stake: &Stake,
    ) -> Result<Readiness<GameRecord>, LedgerError> {
        let batch = self.active_games().await?;
        let found = batch.records.into_iter().find(|game| {
            !known.contains(&game.id)
                && game.creator == creator
                && game.side == side
                && game.token == stake.token
                && game.amount == stake.amount
        });
        Ok(match found {
            Some(game) => Readiness::Ready(game),
            None => Readiness::NotReady,
        })
    }

    async fn check_winner(&self, game_id: u64) -> Result<Readiness<Address>, LedgerError> {
        let call = QueryCall::new(WINNER_VIEW).arg(HexArg::from_u64(game_id));
        let blobs = self.ledger().query(&call).await?;
        match decode_winner(&blobs).map_err(|e| undecodable(WINNER_VIEW, e))? {
            Some(winner) => Ok(Readiness::Ready(winner)),
            None => Ok(Readiness::NotReady),
        }
    }

    async fn check_game_gone(&self, game_id: u64) -> Result<Readiness<()>, LedgerError> {
        let batch = self.active_games().await?;
        if batch.records.iter().any(|game| game.id == game_id) {
            return Ok(Readiness::NotReady);
        }
        if batch.errors.is_empty() {
            Ok(Readiness::Ready(()))
        } else {
            // a skipped record might be the one we're waiting on
            warn!(game_id, skipped = batch.errors.len(), "active list incomplete");
            Ok(Readiness::NotReady)
        }
    }
}
