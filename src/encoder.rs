//! Hex argument encoding and call payload construction.

use crate::{
    address::Address,
    error::EncodingError,
    model::{
        Side,
        Stake,
    },
    tokens::TokenIdentifier,
};
use itertools::Itertools;
use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;
use std::fmt;

pub const ARG_SEPARATOR: char = '@';
pub const TOKEN_TRANSFER_FUNCTION: &str = "ESDTTransfer";

/// One even-length lowercase hex argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HexArg(String);

impl HexArg {
    pub fn from_u64(value: u64) -> Self {
        Self::from_biguint(&BigUint::from(value))
    }

    /// Big-endian with an even digit count; zero is `00`.
    pub fn from_biguint(value: &BigUint) -> Self {
        let digits = value.to_str_radix(16);
        if digits.len() % 2 == 1 {
            Self(format!("0{digits}"))
        } else {
            Self(digits)
        }
    }

    pub fn from_selector(selector: u8) -> Self {
        Self(format!("{selector:02x}"))
    }

    pub fn from_side(side: Side) -> Self {
        Self::from_selector(side.selector())
    }

    pub fn from_str_utf8(value: &str) -> Result<Self, EncodingError> {
        if value.is_empty() {
            return Err(EncodingError::EmptyIdentifier);
        }
        Ok(Self(hex::encode(value.as_bytes())))
    }

    pub fn from_token(token: &TokenIdentifier) -> Self {
        Self(hex::encode(token.as_str().as_bytes()))
    }

    pub fn from_address(address: &Address) -> Self {
        Self(hex::encode(address.as_bytes()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HexArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `function@arg@arg...`, the only way payload data gets built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallData {
    function: String,
    args: Vec<HexArg>,
}

impl CallData {
    pub fn new(function: &str) -> Result<Self, EncodingError> {
        if function.is_empty() {
            return Err(EncodingError::EmptyFunction);
        }
        if function.contains(ARG_SEPARATOR) {
            return Err(EncodingError::SeparatorInFunction(function.to_string()));
        }
        Ok(Self {
            function: function.to_string(),
            args: Vec::new(),
        })
    }

    pub fn arg(mut self, arg: HexArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = HexArg>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn encode(&self) -> String {
        std::iter::once(self.function.as_str())
            .chain(self.args.iter().map(HexArg::as_str))
            .join("@")
    }
}

/// What the wallet signs: one call against one receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallPayload {
    pub receiver: Address,
    pub value: BigUint,
    pub data: String,
    pub gas_limit: u64,
}

/// JSON shape of a [`CallPayload`] as handed to a signer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePayload {
    pub receiver: String,
    pub value: String,
    pub data: String,
    pub gas_limit: u64,
}

impl CallPayload {
    /// Renders the receiver with the network's address prefix `hrp`.
    pub fn to_wire(&self, hrp: &str) -> Result<WirePayload, EncodingError> {
        Ok(WirePayload {
            receiver: self.receiver.to_bech32(hrp)?,
            value: self.value.to_str_radix(10),
            data: self.data.clone(),
            gas_limit: self.gas_limit,
        })
    }
}

/// A contract call independent of how its stake is carried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionSpec {
    pub function: String,
    pub args: Vec<HexArg>,
    pub stake: Option<Stake>,
    pub gas_limit: u64,
}

impl ActionSpec {
    pub fn new(function: impl Into<String>, gas_limit: u64) -> Self {
        Self {
            function: function.into(),
            args: Vec::new(),
            stake: None,
            gas_limit,
        }
    }

    pub fn arg(mut self, arg: HexArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_stake(mut self, stake: Stake) -> Self {
        self.stake = Some(stake);
        self
    }
}

/// Builds the payload for `spec` against `contract`. Native stakes travel as
/// the transaction value, token stakes wrap the call in a token transfer.
pub fn encode_action(
    contract: &Address,
    spec: &ActionSpec,
) -> Result<CallPayload, EncodingError> {
    let inner = CallData::new(&spec.function)?.args(spec.args.iter().cloned());
    let (value, data) = match &spec.stake {
        None => (BigUint::zero(), inner),
        Some(stake) => {
            if stake.amount.is_zero() {
                return Err(EncodingError::ZeroAmount);
            }
            match &stake.token {
                TokenIdentifier::Native => (stake.amount.clone(), inner),
                TokenIdentifier::Fungible(id) => {
                    let wrapped = CallData::new(TOKEN_TRANSFER_FUNCTION)?
                        .arg(HexArg::from_str_utf8(id)?)
                        .arg(HexArg::from_biguint(&stake.amount))
                        .arg(HexArg::from_str_utf8(inner.function())?)
                        .args(inner.args);
                    (BigUint::zero(), wrapped)
                }
            }
        }
    };
    Ok(CallPayload {
        receiver: *contract,
        value,
        data: data.encode(),
        gas_limit: spec.gas_limit,
    })
}

/// Plain native transfer, used for the protocol fee leg of a session.
pub fn encode_transfer(
    receiver: &Address,
    amount: &BigUint,
    gas_limit: u64,
) -> Result<CallPayload, EncodingError> {
    if amount.is_zero() {
        return Err(EncodingError::ZeroAmount);
    }
    Ok(CallPayload {
        receiver: *receiver,
        value: amount.clone(),
        data: String::new(),
        gas_limit,
    })
}
