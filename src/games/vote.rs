use super::undecodable;
use crate::{
    address::Address,
    cancel::CancelToken,
    client::ArenaClient,
    decoder::{
        decode_tally,
        top_decode_bool,
    },
    encoder::{
        ActionSpec,
        HexArg,
        encode_action,
    },
    error::{
        LedgerError,
        Result,
    },
    ledger::{
        Ledger,
        QueryCall,
    },
    model::{
        ActionKind,
        VoteTally,
    },
    poll::Readiness,
    wallet::Wallet,
};

const VOTE: &str = "vote";
const HAS_VOTED_VIEW: &str = "hasVoted";
const RESULTS_VIEW: &str = "getVoteResults";

impl<L: Ledger, W: Wallet> ArenaClient<L, W> {
    /// Casts a vote and returns the tally once the vote is counted.
    pub async fn vote(
        &self,
        proposal: u64,
        option: u64,
        mut cancel: CancelToken,
    ) -> Result<VoteTally> {
        let spec = ActionSpec::new(VOTE, self.config().gas.vote)
            .arg(HexArg::from_u64(proposal))
            .arg(HexArg::from_u64(option));
        let payload = encode_action(&self.config().contract, &spec)?;
        let session = self.session(ActionKind::Vote, payload, false)?;
        let pending = self.orchestrator().submit(session).await?;

        let me = self.me();
        let tally = self
            .resolver()
            .resolve(&pending, &self.config().polls.vote, &mut cancel, move |_| {
                self.check_vote(proposal, me)
            })
            .await
            .into_result()?;
        tracing::info!(proposal, option, leading = ?tally.leading_option(), "vote counted");
        Ok(tally)
    }

    pub async fn vote_results(&self, proposal: u64) -> Result<VoteTally> {
        Ok(self.read_tally(proposal).await?)
    }

    async fn read_tally(&self, proposal: u64) -> Result<VoteTally, LedgerError> {
        let call = QueryCall::new(RESULTS_VIEW).arg(HexArg::from_u64(proposal));
        let blobs = self.ledger().query(&call).await?;
        Ok(decode_tally(proposal, &blobs))
    }

    async fn check_vote(
        &self,
        proposal: u64,
        voter: Address,
    ) -> Result<Readiness<VoteTally>, LedgerError> {
        let call = QueryCall::new(HAS_VOTED_VIEW)
            .arg(HexArg::from_u64(proposal))
            .arg(HexArg::from_address(&voter));
        let blobs = self.ledger().query(&call).await?;
        let voted = match blobs.first() {
            Some(blob) => top_decode_bool(blob).map_err(|e| undecodable(HAS_VOTED_VIEW, e))?,
            None => false,
        };
        if !voted {
            return Ok(Readiness::NotReady);
        }
        Ok(Readiness::Ready(self.read_tally(proposal).await?))
    }
}
