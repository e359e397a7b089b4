use crate::error::EncodingError;
use bech32::{
    Bech32,
    Hrp,
};
use std::{
    fmt,
    str::FromStr,
};

pub const ADDRESS_LEN: usize = 32;
pub const DEFAULT_HRP: &str = "erd";
pub const METACHAIN_SHARD: u32 = u32::MAX;
const NUM_SHARDS: u32 = 3;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Human-readable form with the given network prefix.
    pub fn to_bech32(&self, hrp: &str) -> Result<String, EncodingError> {
        let hrp = Hrp::parse(hrp)
            .map_err(|_| EncodingError::InvalidAddress(hrp.to_string()))?;
        bech32::encode::<Bech32>(hrp, &self.0)
            .map_err(|e| EncodingError::InvalidAddress(e.to_string()))
    }

    pub fn from_bech32(raw: &str) -> Result<Self, EncodingError> {
        let (_, data) = bech32::decode(raw)
            .map_err(|_| EncodingError::InvalidAddress(raw.to_string()))?;
        Self::from_slice(&data).ok_or_else(|| EncodingError::InvalidAddress(raw.to_string()))
    }

    /// Contract addresses start with eight zero bytes.
    pub fn is_contract(&self) -> bool {
        self.0[..8].iter().all(|b| *b == 0)
    }

    /// Shard the account lives in, from the last byte of the address.
    pub fn shard(&self) -> u32 {
        if self.0.iter().all(|b| *b == 0) {
            return METACHAIN_SHARD;
        }
        let last = u32::from(self.0[ADDRESS_LEN - 1]);
        let mask_high = (1u32 << 2) - 1;
        let mask_low = (1u32 << 1) - 1;
        let shard = last & mask_high;
        if shard > NUM_SHARDS - 1 {
            last & mask_low
        } else {
            shard
        }
    }
}

impl FromStr for Address {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bech32(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_bech32(DEFAULT_HRP) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{}", hex::encode(self.0)),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}
