use crate::error::EncodingError;
use num_bigint::BigUint;
use num_traits::{
    ToPrimitive,
    Zero,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::HashMap,
    fmt,
};

pub const NATIVE_TICKER: &str = "EGLD";
pub const DEFAULT_DECIMALS: u32 = 18;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenIdentifier {
    Native,
    Fungible(String),
}

impl TokenIdentifier {
    pub fn parse(raw: &str) -> Result<Self, EncodingError> {
        if raw.is_empty() {
            return Err(EncodingError::EmptyIdentifier);
        }
        if raw == NATIVE_TICKER {
            return Ok(Self::Native);
        }
        let valid = raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !raw.starts_with('-')
            && !raw.ends_with('-');
        if !valid {
            return Err(EncodingError::MalformedIdentifier(raw.to_string()));
        }
        Ok(Self::Fungible(raw.to_string()))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Native => NATIVE_TICKER,
            Self::Fungible(id) => id,
        }
    }
}

impl fmt::Display for TokenIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TokenIdentifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TokenIdentifier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TokenIdentifier::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Decimal scale per token, for display and amount parsing only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenDecimalsTable {
    decimals: HashMap<TokenIdentifier, u32>,
}

impl Default for TokenDecimalsTable {
    fn default() -> Self {
        let mut decimals = HashMap::new();
        decimals.insert(TokenIdentifier::Native, DEFAULT_DECIMALS);
        Self { decimals }
    }
}

impl TokenDecimalsTable {
    pub fn with_entries(
        entries: impl IntoIterator<Item = (TokenIdentifier, u32)>,
    ) -> Self {
        let mut table = Self::default();
        table.decimals.extend(entries);
        table
    }

    pub fn insert(&mut self, token: TokenIdentifier, decimals: u32) {
        self.decimals.insert(token, decimals);
    }

    pub fn decimals(&self, token: &TokenIdentifier) -> u32 {
        self.decimals.get(token).copied().unwrap_or(DEFAULT_DECIMALS)
    }

    /// Native amounts keep two (truncated) fractional digits, everything else
    /// is floored to a whole number.
    pub fn display_amount(&self, token: &TokenIdentifier, amount: &BigUint) -> String {
        let scale = BigUint::from(10u32).pow(self.decimals(token));
        let whole = amount / &scale;
        if !token.is_native() {
            return whole.to_string();
        }
        let cents = ((amount % &scale) * 100u32 / &scale)
            .to_u32()
            .unwrap_or_default();
        format!("{whole}.{cents:02}")
    }

    /// Parses a user-entered decimal amount such as `"10"` or `"0.25"` into
    /// smallest units of `token`.
    pub fn parse_amount(
        &self,
        token: &TokenIdentifier,
        raw: &str,
    ) -> Result<BigUint, EncodingError> {
        scale_amount(raw, self.decimals(token))
    }
}

pub fn scale_amount(raw: &str, decimals: u32) -> Result<BigUint, EncodingError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('-') {
        return Err(EncodingError::NegativeAmount(raw.to_string()));
    }
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty())
        || !digits_only(whole)
        || !digits_only(fraction)
    {
        return Err(EncodingError::MalformedAmount(raw.to_string()));
    }
    if fraction.len() > decimals as usize {
        return Err(EncodingError::TooPrecise {
            amount: raw.to_string(),
            decimals,
        });
    }
    let padded = format!(
        "{whole}{fraction}{}",
        "0".repeat(decimals as usize - fraction.len())
    );
    let amount = BigUint::parse_bytes(padded.as_bytes(), 10).unwrap_or_default();
    if amount.is_zero() {
        return Err(EncodingError::ZeroAmount);
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    fn esdt(id: &str) -> TokenIdentifier {
        TokenIdentifier::parse(id).unwrap()
    }

    #[test]
    fn parse__native_ticker_is_the_sentinel() {
        assert_eq!(TokenIdentifier::parse("EGLD").unwrap(), TokenIdentifier::Native);
        assert_eq!(
            TokenIdentifier::parse("ARENA-1a2b3c").unwrap(),
            TokenIdentifier::Fungible("ARENA-1a2b3c".to_string())
        );
    }

    #[test]
    fn parse__rejects_empty_and_separator_identifiers() {
        assert_eq!(TokenIdentifier::parse(""), Err(EncodingError::EmptyIdentifier));
        assert!(matches!(
            TokenIdentifier::parse("AB@CD"),
            Err(EncodingError::MalformedIdentifier(_))
        ));
    }

    #[test]
    fn display_amount__unknown_token_defaults_to_18_decimals() {
        // given
        let table = TokenDecimalsTable::default();
        let amount = BigUint::from(3_500_000_000_000_000_000u128);

        // when
        let shown = table.display_amount(&esdt("MEX-455c57"), &amount);

        // then
        assert_eq!(shown, "3");
    }

    #[test]
    fn display_amount__native_truncates_to_two_digits() {
        let table = TokenDecimalsTable::default();
        let amount = BigUint::from(1_239_000_000_000_000_000u128);
        assert_eq!(table.display_amount(&TokenIdentifier::Native, &amount), "1.23");
    }

    #[test]
    fn scale_amount__handles_whole_and_fractional_input() {
        assert_eq!(scale_amount("10", 2).unwrap(), BigUint::from(1000u32));
        assert_eq!(scale_amount("0.25", 2).unwrap(), BigUint::from(25u32));
        assert_eq!(scale_amount(".5", 1).unwrap(), BigUint::from(5u32));
    }

    #[test]
    fn scale_amount__rejects_unrepresentable_input() {
        assert!(matches!(
            scale_amount("-1", 18),
            Err(EncodingError::NegativeAmount(_))
        ));
        assert_eq!(scale_amount("0", 18), Err(EncodingError::ZeroAmount));
        assert!(matches!(
            scale_amount("1.234", 2),
            Err(EncodingError::TooPrecise { .. })
        ));
        assert!(matches!(
            scale_amount("1e5", 2),
            Err(EncodingError::MalformedAmount(_))
        ));
    }

    proptest! {
        #[test]
        fn display_amount__follows_scale_law(
            raw in any::<u128>(),
            decimals in 0u32..24,
            native in any::<bool>(),
        ) {
            let token = if native { TokenIdentifier::Native } else { esdt("TKN-abcdef") };
            let table = TokenDecimalsTable::with_entries([(token.clone(), decimals)]);
            let amount = BigUint::from(raw);
            let scale = BigUint::from(10u32).pow(decimals);

            let shown = table.display_amount(&token, &amount);

            let whole = (&amount / &scale).to_string();
            if native {
                let cents = (&amount % &scale) * 100u32 / &scale;
                prop_assert_eq!(shown, format!("{}.{:0>2}", whole, cents.to_string()));
            } else {
                prop_assert_eq!(shown, whole);
            }
        }
    }
}
