//! Decoding of packed contract query results.
//!
//! Active games come back as `[id, payload, id, payload, ...]`. Each payload
//! is laid out as
//!
//! ```text
//! id: u64 BE | side: u8 | len: u32 BE | token | len: u32 BE | amount BE | creator: [u8; 32] | rival?
//! ```
//!
//! where the optional rival is either absent, `0x00`, or `0x01` followed by
//! 32 address bytes.

use crate::{
    address::{
        ADDRESS_LEN,
        Address,
    },
    error::DecodeError,
    model::{
        GameRecord,
        Side,
        SpinOutcome,
        VoteTally,
    },
    tokens::TokenIdentifier,
};
use num_bigint::BigUint;
use num_traits::Zero;

const ID_WIDTH: usize = 8;
const LEN_WIDTH: usize = 4;
const RIVAL_ABSENT: u8 = 0;
const RIVAL_PRESENT: u8 = 1;

/// Forward-only cursor over a payload.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                field,
                offset: self.offset,
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn read_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, field)?[0])
    }

    fn read_u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        top_decode_u64(self.take(ID_WIDTH, field)?, field)
    }

    fn read_len(&mut self, field: &'static str) -> Result<usize, DecodeError> {
        let raw = self.take(LEN_WIDTH, field)?;
        let len = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
        Ok(len as usize)
    }

    fn read_prefixed(&mut self, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.read_len(field)?;
        self.take(len, field)
    }

    fn read_address(&mut self, field: &'static str) -> Result<Address, DecodeError> {
        let raw = self.take(ADDRESS_LEN, field)?;
        Address::from_slice(raw).ok_or(DecodeError::AddressLength(raw.len()))
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Big-endian unsigned integer with any number of leading zero bytes.
pub fn top_decode_u64(bytes: &[u8], field: &'static str) -> Result<u64, DecodeError> {
    let significant = strip_leading_zeros(bytes);
    if significant.len() > 8 {
        return Err(DecodeError::Overflow { field, bits: 64 });
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

pub fn top_decode_biguint(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(strip_leading_zeros(bytes))
}

pub fn top_decode_bool(bytes: &[u8]) -> Result<bool, DecodeError> {
    match top_decode_u64(bytes, "bool")? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(DecodeError::Overflow {
            field: "bool",
            bits: 1,
        }),
    }
}

pub fn decode_address(bytes: &[u8]) -> Result<Address, DecodeError> {
    Address::from_slice(bytes).ok_or(DecodeError::AddressLength(bytes.len()))
}

/// Decodes one game payload.
pub fn decode_game(payload: &[u8]) -> Result<GameRecord, DecodeError> {
    let mut reader = Reader::new(payload);
    let id = reader.read_u64("id")?;
    let side = Side::from_selector(reader.read_u8("side")?)?;
    let token = std::str::from_utf8(reader.read_prefixed("token")?)
        .map_err(|_| DecodeError::InvalidUtf8)?;
    let token = TokenIdentifier::parse(token)
        .map_err(|_| DecodeError::InvalidToken(token.to_string()))?;
    let amount = top_decode_biguint(reader.read_prefixed("amount")?);
    if amount.is_zero() {
        return Err(DecodeError::ZeroAmount);
    }
    let creator = reader.read_address("creator")?;
    let rival = match reader.remaining() {
        0 => None,
        _ => match reader.read_u8("rival")? {
            RIVAL_ABSENT => None,
            RIVAL_PRESENT => Some(reader.read_address("rival")?),
            other => return Err(DecodeError::UnknownRivalMarker(other)),
        },
    };
    if reader.remaining() > 0 {
        return Err(DecodeError::TrailingBytes(reader.remaining()));
    }
    Ok(GameRecord {
        id,
        side,
        token,
        amount,
        creator,
        rival,
    })
}

/// Result of decoding a batch: the good records, and each bad group's index
/// with the reason it was skipped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DecodedBatch {
    pub records: Vec<GameRecord>,
    pub errors: Vec<(usize, DecodeError)>,
}

pub fn decode_active_games(blobs: &[Vec<u8>]) -> DecodedBatch {
    let mut batch = DecodedBatch::default();
    for (index, group) in blobs.chunks(2).enumerate() {
        let decoded = match group {
            [key, payload] => decode_keyed_game(key, payload),
            _ => Err(DecodeError::MissingPayload(index)),
        };
        match decoded {
            Ok(record) => batch.records.push(record),
            Err(err) => {
                tracing::warn!(group = index, %err, "skipping malformed game record");
                batch.errors.push((index, err));
            }
        }
    }
    batch
}

fn decode_keyed_game(key: &[u8], payload: &[u8]) -> Result<GameRecord, DecodeError> {
    let key = top_decode_u64(key, "key")?;
    let record = decode_game(payload)?;
    if record.id != key {
        return Err(DecodeError::IdMismatch {
            key,
            payload: record.id,
        });
    }
    Ok(record)
}

/// `getWinner` answers with an empty blob until the game is settled.
pub fn decode_winner(blobs: &[Vec<u8>]) -> Result<Option<Address>, DecodeError> {
    match blobs.first() {
        None => Ok(None),
        Some(blob) if blob.is_empty() => Ok(None),
        Some(blob) => decode_address(blob).map(Some),
    }
}

/// `getLastSpin` answers `[epoch, prize index, prize amount]`, or nothing for
/// an account that never spun.
pub fn decode_spin(blobs: &[Vec<u8>]) -> Result<Option<SpinOutcome>, DecodeError> {
    match blobs {
        [] => Ok(None),
        [epoch, prize_index, prize_amount] => Ok(Some(SpinOutcome {
            epoch: top_decode_u64(epoch, "epoch")?,
            prize_index: top_decode_u64(prize_index, "prize index")?,
            prize_amount: top_decode_biguint(prize_amount),
        })),
        other => Err(DecodeError::BlobCount {
            expected: 3,
            actual: other.len(),
        }),
    }
}

pub fn decode_tally(proposal: u64, blobs: &[Vec<u8>]) -> VoteTally {
    VoteTally {
        proposal,
        weights: blobs.iter().map(|blob| top_decode_biguint(blob)).collect(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn game_payload(
        id: u64,
        selector: u8,
        token: &str,
        amount: &BigUint,
        creator: [u8; 32],
    ) -> Vec<u8> {
        let amount = amount.to_bytes_be();
        let mut bytes = id.to_be_bytes().to_vec();
        bytes.push(selector);
        bytes.extend((token.len() as u32).to_be_bytes());
        bytes.extend(token.as_bytes());
        bytes.extend((amount.len() as u32).to_be_bytes());
        bytes.extend(amount);
        bytes.extend(creator);
        bytes
    }

    fn keyed(id: u64, payload: Vec<u8>) -> Vec<Vec<u8>> {
        vec![id.to_be_bytes()[7..].to_vec(), payload]
    }

    #[test]
    fn decode_game__reads_fields_in_order() {
        // given
        let amount = BigUint::from(10u32) * BigUint::from(10u32).pow(18);
        let payload = game_payload(7, 0, "X", &amount, [9u8; 32]);

        // when
        let record = decode_game(&payload).unwrap();

        // then
        assert_eq!(
            record,
            GameRecord {
                id: 7,
                side: Side::Heads,
                token: TokenIdentifier::Fungible("X".to_string()),
                amount,
                creator: Address::new([9u8; 32]),
                rival: None,
            }
        );
    }

    #[test]
    fn decode_game__reads_native_sentinel_and_rival() {
        // given
        let mut payload = game_payload(3, 1, "EGLD", &BigUint::from(5u32), [1u8; 32]);
        payload.push(RIVAL_PRESENT);
        payload.extend([2u8; 32]);

        // when
        let record = decode_game(&payload).unwrap();

        // then
        assert_eq!(record.token, TokenIdentifier::Native);
        assert_eq!(record.side, Side::Tails);
        assert_eq!(record.rival, Some(Address::new([2u8; 32])));
        assert!(!record.is_open());
    }

    #[test]
    fn decode_game__rejects_empty_or_malformed_token() {
        for token in ["", "a@b", "-ARENA"] {
            let payload = game_payload(4, 0, token, &BigUint::from(5u32), [1u8; 32]);
            assert_eq!(
                decode_game(&payload),
                Err(DecodeError::InvalidToken(token.to_string())),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn decode_game__rejects_length_past_buffer_end() {
        // given
        let mut payload = 1u64.to_be_bytes().to_vec();
        payload.push(0);
        payload.extend(200u32.to_be_bytes());
        payload.extend(b"EGLD");

        // when
        let err = decode_game(&payload).unwrap_err();

        // then
        assert_eq!(
            err,
            DecodeError::Truncated {
                field: "token",
                offset: 13,
                needed: 200,
                available: 4,
            }
        );
    }

    #[test]
    fn decode_game__rejects_unknown_selector_and_zero_amount() {
        let bad_side = game_payload(1, 4, "EGLD", &BigUint::from(1u32), [1u8; 32]);
        assert_eq!(decode_game(&bad_side), Err(DecodeError::UnknownSide(4)));

        let zero = game_payload(1, 0, "EGLD", &BigUint::from(0u32), [1u8; 32]);
        assert_eq!(decode_game(&zero), Err(DecodeError::ZeroAmount));
    }

    #[test]
    fn decode_game__rejects_trailing_bytes() {
        let mut payload = game_payload(1, 0, "EGLD", &BigUint::from(1u32), [1u8; 32]);
        payload.extend([RIVAL_ABSENT, 0xff]);
        assert_eq!(decode_game(&payload), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn decode_active_games__truncated_record_is_skipped_alone() {
        // given
        let amount = BigUint::from(1_000u32);
        let mut blobs = Vec::new();
        for id in 1..=3u64 {
            blobs.extend(keyed(id, game_payload(id, 0, "EGLD", &amount, [4u8; 32])));
        }
        let full = decode_active_games(&blobs);
        let last = blobs.last_mut().unwrap();
        last.truncate(last.len() - 5);

        // when
        let truncated = decode_active_games(&blobs);

        // then
        assert_eq!(full.records.len(), 3);
        assert!(full.errors.is_empty());
        assert_eq!(truncated.records.len(), full.records.len() - 1);
        assert_eq!(truncated.records[..], full.records[..2]);
        assert_eq!(truncated.errors.len(), 1);
        assert_eq!(truncated.errors[0].0, 2);
    }

    #[test]
    fn decode_active_games__continues_after_bad_group() {
        // given
        let amount = BigUint::from(1u32);
        let mut blobs = keyed(1, vec![0, 1, 2]);
        blobs.extend(keyed(2, game_payload(2, 1, "EGLD", &amount, [4u8; 32])));
        blobs.push(vec![9]);

        // when
        let batch = decode_active_games(&blobs);

        // then
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].id, 2);
        assert_eq!(batch.errors.len(), 2);
        assert_eq!(batch.errors[1], (2, DecodeError::MissingPayload(2)));
    }

    #[test]
    fn decode_active_games__flags_id_mismatch() {
        let payload = game_payload(5, 0, "EGLD", &BigUint::from(1u32), [4u8; 32]);
        let batch = decode_active_games(&keyed(6, payload));
        assert_eq!(
            batch.errors,
            vec![(0, DecodeError::IdMismatch { key: 6, payload: 5 })]
        );
    }

    #[test]
    fn top_decode_u64__strips_leading_zeros_and_bounds_width() {
        assert_eq!(top_decode_u64(&[0, 0, 0, 1, 2], "n").unwrap(), 0x0102);
        assert_eq!(top_decode_u64(&[], "n").unwrap(), 0);
        assert_eq!(
            top_decode_u64(&[1; 9], "n"),
            Err(DecodeError::Overflow { field: "n", bits: 64 })
        );
    }

    #[test]
    fn decode_spin__reads_three_blobs() {
        let blobs = vec![vec![0x01, 0x2c], vec![3], vec![0x0f, 0x42, 0x40]];
        let spin = decode_spin(&blobs).unwrap().unwrap();
        assert_eq!(spin.epoch, 300);
        assert_eq!(spin.prize_index, 3);
        assert_eq!(spin.prize_amount, BigUint::from(1_000_000u32));
        assert_eq!(decode_spin(&[]).unwrap(), None);
    }

    #[test]
    fn decode_winner__empty_blob_means_unsettled() {
        assert_eq!(decode_winner(&[vec![]]).unwrap(), None);
        assert_eq!(
            decode_winner(&[vec![8u8; 32]]).unwrap(),
            Some(Address::new([8u8; 32]))
        );
        assert_eq!(
            decode_winner(&[vec![8u8; 3]]),
            Err(DecodeError::AddressLength(3))
        );
    }
}
