use crate::{
    address::Address,
    encoder::CallPayload,
    error::SubmissionError,
    model::SessionHandle,
};
use std::future::Future;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Success,
    Failed(String),
}

/// Signing and broadcast, provided by the embedding application.
pub trait Wallet {
    fn address(&self) -> Address;

    /// Signs and broadcasts every payload as one session. `None` means the
    /// user closed the prompt or the wallet produced no session.
    fn submit(
        &self,
        payloads: &[CallPayload],
    ) -> impl Future<Output = Result<Option<SessionHandle>, SubmissionError>> + Send;

    fn session_status(
        &self,
        handle: &SessionHandle,
    ) -> impl Future<Output = Result<SessionStatus, SubmissionError>> + Send;
}
