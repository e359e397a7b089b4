use super::undecodable;
use crate::{
    address::Address,
    cancel::CancelToken,
    client::ArenaClient,
    commitment::CommitmentGenerator,
    decoder::decode_spin,
    encoder::{
        ActionSpec,
        HexArg,
        encode_action,
    },
    error::{
        ConfigError,
        EncodingError,
        LedgerError,
        Result,
    },
    ledger::{
        Ledger,
        QueryCall,
    },
    model::{
        ActionKind,
        SpinOutcome,
        Stake,
    },
    poll::Readiness,
    wallet::Wallet,
};
use num_traits::Zero;
use tracing::{
    debug,
    info,
};

const SPIN: &str = "spin";
const LAST_SPIN_VIEW: &str = "getLastSpin";

impl<L: Ledger, W: Wallet> ArenaClient<L, W> {
    /// Spins the wheel for `stake`. The outcome is the first `getLastSpin`
    /// result that differs from the one seen before submission and is not
    /// older than the commitment epoch.
    pub async fn spin(&self, stake: Stake, mut cancel: CancelToken) -> Result<SpinOutcome> {
        if stake.amount.is_zero() {
            return Err(EncodingError::ZeroAmount.into());
        }
        let secret = self
            .config()
            .spin_secret
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid {
                field: "spin_secret",
                reason: "no shared secret configured".to_string(),
            })?;
        self.check_eligibility(&stake, true).await?;

        let me = self.me();
        let commitment =
            CommitmentGenerator::new(self.ledger(), secret, &self.config().address_hrp)
                .generate(&me)
                .await?;
        let previous = self.last_spin(&me).await?;
        let spec = ActionSpec::new(SPIN, self.config().gas.spin)
            .arg(commitment.as_arg())
            .with_stake(stake);
        let payload = encode_action(&self.config().contract, &spec)?;
        let session = self.session(ActionKind::Spin, payload, true)?;
        let pending = self.orchestrator().submit(session).await?;

        let epoch = commitment.epoch;
        let previous = previous.as_ref();
        let outcome = self
            .resolver()
            .resolve(&pending, &self.config().polls.spin, &mut cancel, move |_| {
                self.check_spin(me, epoch, previous)
            })
            .await
            .into_result()?;
        info!(epoch, prize = outcome.prize_index, "wheel settled");
        Ok(outcome)
    }

    pub async fn last_spin(&self, player: &Address) -> Result<Option<SpinOutcome>> {
        let call = QueryCall::new(LAST_SPIN_VIEW).arg(HexArg::from_address(player));
        let blobs = self.ledger().query(&call).await?;
        Ok(decode_spin(&blobs)?)
    }

    async fn check_spin(
        &self,
        player: Address,
        epoch: u64,
        previous: Option<&SpinOutcome>,
    ) -> Result<Readiness<SpinOutcome>, LedgerError> {
        let call = QueryCall::new(LAST_SPIN_VIEW).arg(HexArg::from_address(&player));
        let blobs = self.ledger().query(&call).await?;
        match decode_spin(&blobs).map_err(|e| undecodable(LAST_SPIN_VIEW, e))? {
            Some(outcome) if outcome.epoch >= epoch && Some(&outcome) != previous => {
                Ok(Readiness::Ready(outcome))
            }
            Some(stale) => {
                debug!(seen = stale.epoch, want = epoch, "stale spin result");
                Ok(Readiness::NotReady)
            }
            None => Ok(Readiness::NotReady),
        }
    }
}
