//! Reward accrual accounting.
//!
//! Rewards are a deterministic function of time, the emission rate, and who
//! had how much staked over each interval:
//! `earned(p) = pending(p) + staked(p) × (index_now − index_at_last_settle(p))`
//!
//! This crate handles:
//! - The global reward-per-share index and its settlement over time
//! - Capping emission at the funded reward pool
//! - Rate changes (accrual before the change is preserved)
//! - Per-position settlement, stake and reward bookkeeping

pub mod error;
pub mod index;
pub mod position;

pub use error::RewardError;
pub use index::{RewardAccrualIndex, INDEX_DECIMALS};
pub use position::StakePosition;
