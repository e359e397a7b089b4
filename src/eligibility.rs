use crate::error::EligibilityError;
use num_bigint::BigUint;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Eligibility {
    /// Balance not loaded yet. Not a negative answer.
    Unknown,
    Insufficient { missing: BigUint },
    Sufficient,
}

impl Eligibility {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Eligibility::Sufficient)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceView {
    pub loading: bool,
    pub balance: Option<BigUint>,
}

impl BalanceView {
    pub fn loading() -> Self {
        Self {
            loading: true,
            balance: None,
        }
    }

    pub fn loaded(balance: BigUint) -> Self {
        Self {
            loading: false,
            balance: Some(balance),
        }
    }
}

pub fn evaluate(view: &BalanceView, required: &BigUint) -> Eligibility {
    match (&view.balance, view.loading) {
        (_, true) | (None, false) => Eligibility::Unknown,
        (Some(balance), false) if balance >= required => Eligibility::Sufficient,
        (Some(balance), false) => Eligibility::Insufficient {
            missing: required - balance,
        },
    }
}

pub fn require(view: &BalanceView, required: &BigUint) -> Result<(), EligibilityError> {
    match evaluate(view, required) {
        Eligibility::Sufficient => Ok(()),
        Eligibility::Unknown => Err(EligibilityError::Unknown),
        Eligibility::Insufficient { .. } => Err(EligibilityError::Insufficient {
            required: required.clone(),
            available: view.balance.clone().unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn evaluate__reports_missing_amount() {
        let view = BalanceView::loaded(BigUint::from(40u32));
        assert_eq!(
            evaluate(&view, &BigUint::from(100u32)),
            Eligibility::Insufficient {
                missing: BigUint::from(60u32)
            }
        );
    }

    #[test]
    fn require__unknown_is_not_an_insufficient_claim() {
        assert_eq!(
            require(&BalanceView::loading(), &BigUint::from(1u32)),
            Err(EligibilityError::Unknown)
        );
    }

    proptest! {
        #[test]
        fn evaluate__unknown_while_loading(balance in any::<u64>(), required in any::<u64>()) {
            let view = BalanceView { loading: true, balance: Some(BigUint::from(balance)) };
            prop_assert_eq!(evaluate(&view, &BigUint::from(required)), Eligibility::Unknown);
        }

        #[test]
        fn evaluate__sufficient_iff_balance_covers_stake(
            balance in any::<u64>(),
            required in any::<u64>(),
        ) {
            let view = BalanceView::loaded(BigUint::from(balance));
            let state = evaluate(&view, &BigUint::from(required));
            prop_assert_eq!(state.is_enabled(), balance >= required);
            prop_assert_ne!(state, Eligibility::Unknown);
        }
    }
}
