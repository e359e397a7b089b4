//! Game actions built on [`crate::client::ArenaClient`]: each one encodes,
//! submits and then resolves its own result.

pub mod flip;
pub mod vote;
pub mod wheel;

use crate::error::{
    DecodeError,
    LedgerError,
};

/// A result that fails to decode mid-poll is treated like an unreachable one.
pub(crate) fn undecodable(function: &str, err: DecodeError) -> LedgerError {
    LedgerError::Payload(format!("{function}: {err}"))
}
