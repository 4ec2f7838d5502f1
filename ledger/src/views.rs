//! Read-only views returned by ledger operations and queries.

use accrue_types::{AccountId, FixedPointAmount, Timestamp};
use serde::{Deserialize, Serialize};

/// A participant's balances as seen after an operation or query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub owner: AccountId,
    pub staked_balance: FixedPointAmount,
    /// Reward that a claim would pay right now.
    pub pending_reward: FixedPointAmount,
}

/// Pool-wide figures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolView {
    pub total_staked: FixedPointAmount,
    pub reward_pool: FixedPointAmount,
    pub reward_rate_per_second: FixedPointAmount,
    pub cumulative_reward_per_share: FixedPointAmount,
    /// Rewards already owed to stakers and not yet claimed.
    pub accrued_liability: FixedPointAmount,
    pub last_update_time: Timestamp,
    pub staker_count: usize,
}
