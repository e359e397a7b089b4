use crate::{
    encoder::CallPayload,
    error::{
        EncodingError,
        SubmissionError,
    },
    model::{
        ActionKind,
        PendingAction,
    },
    wallet::Wallet,
};
use chrono::Utc;
use tracing::{
    error,
    info,
};

/// Ordered payloads signed together, e.g. a fee transfer then the action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionSession {
    kind: ActionKind,
    payloads: Vec<CallPayload>,
}

impl TransactionSession {
    pub fn new(
        kind: ActionKind,
        payloads: Vec<CallPayload>,
    ) -> Result<Self, EncodingError> {
        if payloads.is_empty() {
            return Err(EncodingError::EmptySession);
        }
        Ok(Self { kind, payloads })
    }

    pub fn single(kind: ActionKind, payload: CallPayload) -> Self {
        Self {
            kind,
            payloads: vec![payload],
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn payloads(&self) -> &[CallPayload] {
        &self.payloads
    }
}

/// Hands sessions to the wallet. Returns as soon as a handle exists and
/// never retries: a resubmission is a new user action.
pub struct TransactionOrchestrator<'a, W> {
    wallet: &'a W,
}

impl<'a, W: Wallet> TransactionOrchestrator<'a, W> {
    pub fn new(wallet: &'a W) -> Self {
        Self { wallet }
    }

    pub async fn submit(
        &self,
        session: TransactionSession,
    ) -> Result<PendingAction, SubmissionError> {
        let kind = session.kind();
        let handle = match self.wallet.submit(session.payloads()).await {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                error!(%kind, "wallet returned no session");
                return Err(SubmissionError::NoSession);
            }
            Err(e) => {
                error!(%kind, error = %e, "submission failed");
                return Err(e);
            }
        };
        let shard = self.wallet.address().shard();
        info!(
            %kind,
            %handle,
            shard,
            payloads = session.payloads().len(),
            "session submitted"
        );
        Ok(PendingAction {
            handle,
            kind,
            shard,
            submitted_at: Utc::now(),
        })
    }
}
