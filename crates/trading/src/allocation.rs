use rust_decimal::Decimal;
use thiserror::Error;

/// Number of take-profit slots that can be configured.
pub const MAX_TAKE_PROFITS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    #[error("at most 8 take-profit weights are supported, got {0}")]
    TooManyWeights(usize),

    #[error("TP{slot} weight {weight} is negative")]
    NegativeWeight { slot: usize, weight: Decimal },

    #[error("take-profit weights sum to {0}%, which exceeds 100%")]
    SumExceeds100(Decimal),

    #[error("at least one take-profit weight must be greater than 0")]
    AllZero,
}

/// Percentage of the entry quantity closed at each take-profit, by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationConfig {
    weights: Vec<Decimal>,
}

impl AllocationConfig {
    pub fn new(weights: Vec<Decimal>) -> Result<Self, AllocationError> {
        if weights.len() > MAX_TAKE_PROFITS {
            return Err(AllocationError::TooManyWeights(weights.len()));
        }
        if let Some((i, weight)) = weights.iter().enumerate().find(|(_, w)| **w < Decimal::ZERO) {
            return Err(AllocationError::NegativeWeight {
                slot: i + 1,
                weight: *weight,
            });
        }

        let total: Decimal = weights.iter().sum();
        if total > Decimal::ONE_HUNDRED {
            return Err(AllocationError::SumExceeds100(total));
        }
        if weights.iter().all(|w| w.is_zero()) {
            return Err(AllocationError::AllZero);
        }

        Ok(Self { weights })
    }

    pub fn weights(&self) -> &[Decimal] {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_valid_allocation() {
        let config = AllocationConfig::new(vec![
            dec!(50),
            dec!(50),
            dec!(0),
            dec!(0),
            dec!(0),
            dec!(0),
            dec!(0),
            dec!(0),
        ])
        .unwrap();
        assert_eq!(config.weights().len(), 8);
    }

    #[test]
    fn test_partial_allocation_below_100_is_fine() {
        assert!(AllocationConfig::new(vec![dec!(25), dec!(25), dec!(12.5)]).is_ok());
    }

    #[test]
    fn test_sum_above_100_fails() {
        assert_eq!(
            AllocationConfig::new(vec![dec!(60), dec!(40.5)]),
            Err(AllocationError::SumExceeds100(dec!(100.5)))
        );
    }

    #[test]
    fn test_all_zero_fails() {
        assert_eq!(
            AllocationConfig::new(vec![Decimal::ZERO; MAX_TAKE_PROFITS]),
            Err(AllocationError::AllZero)
        );
        assert_eq!(AllocationConfig::new(vec![]), Err(AllocationError::AllZero));
    }

    #[test]
    fn test_negative_weight_fails() {
        assert_eq!(
            AllocationConfig::new(vec![dec!(50), dec!(-10)]),
            Err(AllocationError::NegativeWeight {
                slot: 2,
                weight: dec!(-10)
            })
        );
    }

    #[test]
    fn test_more_than_eight_slots_fails() {
        assert_eq!(
            AllocationConfig::new(vec![dec!(10); 9]),
            Err(AllocationError::TooManyWeights(9))
        );
    }
}
