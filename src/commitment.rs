use crate::{
    address::Address,
    encoder::HexArg,
    error::Result,
    ledger::{
        Freshness,
        Ledger,
    },
    model::SpinCommitment,
};
use num_bigint::BigUint;
use sha2::{
    Digest,
    Sha256,
};

/// `sha256(dec(epoch^3) || secret || bech32)`, where `bech32` is the
/// requester's address rendered with the network's prefix.
pub fn commit(epoch: u64, secret: &str, bech32: &str) -> [u8; 32] {
    let cubed = BigUint::from(epoch).pow(3u32);
    let mut hasher = Sha256::new();
    hasher.update(cubed.to_str_radix(10).as_bytes());
    hasher.update(secret.as_bytes());
    hasher.update(bech32.as_bytes());
    hasher.finalize().into()
}

pub struct CommitmentGenerator<'a, L> {
    ledger: &'a L,
    secret: &'a str,
    hrp: &'a str,
}

impl<'a, L: Ledger> CommitmentGenerator<'a, L> {
    pub fn new(ledger: &'a L, secret: &'a str, hrp: &'a str) -> Self {
        Self { ledger, secret, hrp }
    }

    /// Binds `requester` to the current epoch. The epoch is always fetched
    /// fresh; a cached one would not verify.
    pub async fn generate(&self, requester: &Address) -> Result<SpinCommitment> {
        let bech32 = requester.to_bech32(self.hrp)?;
        let epoch = self.ledger.epoch(Freshness::Fresh).await?;
        let hash = commit(epoch, self.secret, &bech32);
        tracing::debug!(epoch, %requester, "spin commitment generated");
        Ok(SpinCommitment {
            epoch,
            requester: *requester,
            hash,
        })
    }
}

impl SpinCommitment {
    pub fn as_arg(&self) -> HexArg {
        HexArg::from_bytes(&self.hash)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::test_helpers::FakeLedger;
    use proptest::prelude::*;

    #[test]
    fn commit__matches_manual_preimage() {
        // given
        let requester = Address::new([5u8; 32]).to_bech32("erd").unwrap();
        let preimage = format!("{}{}{}", 27u64, "s3cret", requester);

        // when
        let hash = commit(3, "s3cret", &requester);

        // then
        let expected: [u8; 32] = Sha256::digest(preimage.as_bytes()).into();
        assert_eq!(hash, expected);
    }

    #[tokio::test]
    async fn generate__always_reads_a_fresh_epoch() {
        // given
        let ledger = FakeLedger::new();
        ledger.set_epoch(10);
        let _ = ledger.epoch(Freshness::Cached).await.unwrap();
        ledger.set_epoch(11);
        let requester = Address::new([5u8; 32]);
        let generator = CommitmentGenerator::new(&ledger, "salt", "erd");

        // when
        let commitment = generator.generate(&requester).await.unwrap();

        // then
        assert_eq!(commitment.epoch, 11);
        assert_eq!(commitment.hash, commit(11, "salt", &requester.to_string()));
        assert_eq!(commitment.as_arg().as_str().len(), 64);
    }

    #[tokio::test]
    async fn generate__hashes_the_address_under_the_configured_prefix() {
        // given
        let ledger = FakeLedger::new();
        ledger.set_epoch(4);
        let requester = Address::new([5u8; 32]);

        // when
        let commitment = CommitmentGenerator::new(&ledger, "salt", "tst")
            .generate(&requester)
            .await
            .unwrap();

        // then
        let rendered = requester.to_bech32("tst").unwrap();
        assert!(rendered.starts_with("tst1"));
        assert_eq!(commitment.hash, commit(4, "salt", &rendered));
        assert_ne!(commitment.hash, commit(4, "salt", &requester.to_string()));
    }

    proptest! {
        #[test]
        fn commit__is_deterministic_and_epoch_sensitive(
            epoch in 0u64..u64::MAX,
            secret in "[a-z0-9]{0,16}",
            seed in any::<[u8; 32]>(),
        ) {
            let requester = Address::new(seed).to_string();
            prop_assert_eq!(
                commit(epoch, &secret, &requester),
                commit(epoch, &secret, &requester)
            );
            prop_assert_ne!(
                commit(epoch, &secret, &requester),
                commit(epoch + 1, &secret, &requester)
            );
        }
    }
}
