use num_bigint::BigUint;
use thiserror::Error;

pub type Result<T, E = ArenaError> = std::result::Result<T, E>;

/// A single malformed record in a query result. Never fatal to a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{field}: needs {needed} bytes at offset {offset}, only {available} left")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("unknown side selector {0:#04x}")]
    UnknownSide(u8),

    #[error("unknown rival marker {0:#04x}")]
    UnknownRivalMarker(u8),

    #[error("token identifier is not valid UTF-8")]
    InvalidUtf8,

    #[error("game amount is zero")]
    ZeroAmount,

    #[error("{field} does not fit in {bits} bits")]
    Overflow { field: &'static str, bits: u32 },

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("id blob says {key}, payload says {payload}")]
    IdMismatch { key: u64, payload: u64 },

    #[error("record group {0} has no payload blob")]
    MissingPayload(usize),

    #[error("address must be 32 bytes, got {0}")]
    AddressLength(usize),

    #[error("expected {expected} blobs, got {actual}")]
    BlobCount { expected: usize, actual: usize },

    #[error("invalid token identifier {0:?}")]
    InvalidToken(String),
}

/// Values the argument encoder refuses to turn into a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("amount must not be negative: {0}")]
    NegativeAmount(String),

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("malformed amount {0:?}")]
    MalformedAmount(String),

    #[error("amount {amount:?} has more than {decimals} fractional digits")]
    TooPrecise { amount: String, decimals: u32 },

    #[error("identifier must not be empty")]
    EmptyIdentifier,

    #[error("malformed token identifier {0:?}")]
    MalformedIdentifier(String),

    #[error("function name must not be empty")]
    EmptyFunction,

    #[error("function name {0:?} contains a separator")]
    SeparatorInFunction(String),

    #[error("session must carry at least one payload")]
    EmptySession,

    #[error("invalid bech32 address {0:?}")]
    InvalidAddress(String),
}

/// Signing or broadcast failed. Never retried automatically.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("wallet returned no session handle")]
    NoSession,

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("wallet failure: {0}")]
    Wallet(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EligibilityError {
    #[error("insufficient balance: need {required}, have {available}")]
    Insufficient {
        required: BigUint,
        available: BigUint,
    },

    #[error("balance is still loading")]
    Unknown,
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("query {function} failed with {code}: {message}")]
    Query {
        function: String,
        code: String,
        message: String,
    },

    #[error("invalid gateway payload: {0}")]
    Payload(String),

    #[error("invalid base64 blob: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Address(#[from] EncodingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum ArenaError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Eligibility(#[from] EligibilityError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("result undetermined after {attempts} attempts; refresh to check")]
    ConfirmationTimeout { attempts: u32 },

    #[error("transaction failed on chain: {0}")]
    ExecutionFailed(String),

    #[error("action rejected: {0}")]
    Rejected(String),

    #[error("cancelled")]
    Cancelled,
}
