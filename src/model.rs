use crate::{
    address::Address,
    error::DecodeError,
    tokens::TokenIdentifier,
};
use chrono::{
    DateTime,
    Utc,
};
use num_bigint::BigUint;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Heads,
    Tails,
}

/// Same two selectors, labelled per game mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    CoinFlip,
    Fighters,
}

impl Side {
    pub fn selector(self) -> u8 {
        match self {
            Side::Heads => 0,
            Side::Tails => 1,
        }
    }

    pub fn from_selector(selector: u8) -> Result<Self, DecodeError> {
        match selector {
            0 => Ok(Side::Heads),
            1 => Ok(Side::Tails),
            other => Err(DecodeError::UnknownSide(other)),
        }
    }

    pub fn label(self, mode: GameMode) -> &'static str {
        match (mode, self) {
            (GameMode::CoinFlip, Side::Heads) => "Heads",
            (GameMode::CoinFlip, Side::Tails) => "Tails",
            (GameMode::Fighters, Side::Heads) => "Fighter A",
            (GameMode::Fighters, Side::Tails) => "Fighter B",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRecord {
    pub id: u64,
    pub side: Side,
    pub token: TokenIdentifier,
    pub amount: BigUint,
    pub creator: Address,
    pub rival: Option<Address>,
}

impl GameRecord {
    pub fn is_open(&self) -> bool {
        self.rival.is_none()
    }

    pub fn stake(&self) -> Stake {
        Stake {
            token: self.token.clone(),
            amount: self.amount.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stake {
    pub token: TokenIdentifier,
    pub amount: BigUint,
}

impl Stake {
    pub fn new(token: TokenIdentifier, amount: BigUint) -> Self {
        Self { token, amount }
    }

    pub fn native(amount: BigUint) -> Self {
        Self::new(TokenIdentifier::Native, amount)
    }
}

/// Opaque token the wallet hands back for a submitted session.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    CreateGame,
    JoinGame,
    CancelGame,
    Spin,
    Vote,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::CreateGame => "create game",
            ActionKind::JoinGame => "join game",
            ActionKind::CancelGame => "cancel game",
            ActionKind::Spin => "spin",
            ActionKind::Vote => "vote",
        };
        write!(f, "{name}")
    }
}

/// A submitted session awaiting its outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingAction {
    pub handle: SessionHandle,
    pub kind: ActionKind,
    pub shard: u32,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinCommitment {
    pub epoch: u64,
    pub requester: Address,
    pub hash: [u8; 32],
}

impl SpinCommitment {
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlipOutcome {
    pub game_id: u64,
    pub winner: Address,
    pub won: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinOutcome {
    pub epoch: u64,
    pub prize_index: u64,
    pub prize_amount: BigUint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteTally {
    pub proposal: u64,
    pub weights: Vec<BigUint>,
}

impl VoteTally {
    pub fn leading_option(&self) -> Option<usize> {
        self.weights
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(i, _)| i)
    }
}
