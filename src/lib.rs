//! Client library for the on-chain arena: coin flip games, the prize wheel
//! and proposal voting, driven through a ledger gateway and a signing wallet.

pub mod address;
pub mod cancel;
pub mod client;
pub mod commitment;
pub mod config;
pub mod decoder;
pub mod eligibility;
pub mod encoder;
pub mod error;
pub mod games;
pub mod ledger;
pub mod model;
pub mod orchestrator;
pub mod poll;
pub mod resolver;
pub mod tokens;
pub mod wallet;
pub mod watcher;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use address::Address;
pub use cancel::{
    CancelToken,
    Canceller,
    cancellation,
};
pub use client::ArenaClient;
pub use config::{
    ArenaConfig,
    Network,
};
pub use error::{
    ArenaError,
    Result,
};
pub use ledger::{
    GatewayLedger,
    Ledger,
};
pub use model::{
    FlipOutcome,
    GameRecord,
    Side,
    SpinOutcome,
    Stake,
    VoteTally,
};
pub use tokens::TokenIdentifier;
pub use wallet::Wallet;
