use accrue_rewards::RewardError;
use accrue_types::{AmountError, FixedPointAmount, Timestamp};
use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("insufficient stake: requested {requested}, staked {available}")]
    InsufficientStake {
        requested: FixedPointAmount,
        available: FixedPointAmount,
    },

    #[error("no reward available to claim")]
    NoRewardAvailable,

    #[error("reward pool exhausted: requested {requested}, available {available}")]
    PoolExhausted {
        requested: FixedPointAmount,
        available: FixedPointAmount,
    },

    #[error("clock moved backwards: now {now}, last update {last_update}")]
    NonMonotonicTime {
        now: Timestamp,
        last_update: Timestamp,
    },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("conversion would lose precision")]
    PrecisionLoss,

    #[error("scale mismatch: ledger uses {expected} decimals, got {actual}")]
    ScaleMismatch { expected: u8, actual: u8 },

    #[error("gateway transfer failed: {0}")]
    GatewayTransferFailed(#[from] GatewayError),

    #[error("unauthorized: {0} is not a reward funder")]
    Unauthorized(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error("ledger task failed: {0}")]
    TaskFailed(String),
}

impl LedgerError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::InsufficientStake { .. } => "insufficient_stake",
            LedgerError::NoRewardAvailable => "no_reward_available",
            LedgerError::PoolExhausted { .. } => "pool_exhausted",
            LedgerError::NonMonotonicTime { .. } => "non_monotonic_time",
            LedgerError::Overflow => "overflow",
            LedgerError::Underflow => "underflow",
            LedgerError::PrecisionLoss => "precision_loss",
            LedgerError::ScaleMismatch { .. } => "scale_mismatch",
            LedgerError::GatewayTransferFailed(_) => "gateway_transfer_failed",
            LedgerError::Unauthorized(_) => "unauthorized",
            LedgerError::Snapshot(_) => "snapshot",
            LedgerError::InvariantViolation(_) => "invariant_violation",
            LedgerError::TaskFailed(_) => "task_failed",
        }
    }
}

impl From<AmountError> for LedgerError {
    fn from(e: AmountError) -> Self {
        match e {
            AmountError::Overflow => LedgerError::Overflow,
            AmountError::Underflow => LedgerError::Underflow,
            AmountError::PrecisionLoss => LedgerError::PrecisionLoss,
            AmountError::ScaleMismatch { expected, actual } => {
                LedgerError::ScaleMismatch { expected, actual }
            }
            // Only reachable through a zero total stake, which the index guards.
            AmountError::DivisionByZero => LedgerError::Overflow,
            other @ (AmountError::InvalidDecimals(_) | AmountError::Parse(_)) => {
                LedgerError::InvalidAmount(other.to_string())
            }
        }
    }
}

impl From<RewardError> for LedgerError {
    fn from(e: RewardError) -> Self {
        match e {
            RewardError::NonMonotonicTime { now, last_update } => {
                LedgerError::NonMonotonicTime { now, last_update }
            }
            RewardError::InsufficientStake {
                requested,
                available,
            } => LedgerError::InsufficientStake {
                requested,
                available,
            },
            RewardError::InsufficientReward { .. } => LedgerError::NoRewardAvailable,
            RewardError::Amount(e) => e.into(),
        }
    }
}
