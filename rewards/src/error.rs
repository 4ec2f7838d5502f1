//! Reward accounting errors.

use accrue_types::{AmountError, FixedPointAmount, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    #[error("clock moved backwards: now {now}, last update {last_update}")]
    NonMonotonicTime {
        now: Timestamp,
        last_update: Timestamp,
    },

    #[error("insufficient stake: requested {requested}, staked {available}")]
    InsufficientStake {
        requested: FixedPointAmount,
        available: FixedPointAmount,
    },

    #[error("reward {requested} exceeds pending reward {available}")]
    InsufficientReward {
        requested: FixedPointAmount,
        available: FixedPointAmount,
    },

    #[error(transparent)]
    Amount(#[from] AmountError),
}
