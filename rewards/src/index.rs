//! The global reward accrual index.
//!
//! `cumulative_reward_per_share` is the total reward one staked unit would
//! have earned since the ledger started. Positions remember the value they
//! last settled at; the difference times their balance is what they are owed.
//! Distributing a new interval of emission is therefore O(1) regardless of
//! the number of stakers.

use accrue_types::{mul_div, mul_div_ceil, pow10, FixedPointAmount, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::RewardError;

/// Fractional digits of `cumulative_reward_per_share`.
///
/// The index is a ratio (reward units per staked unit), independent of the
/// token scale.
pub const INDEX_DECIMALS: u8 = 18;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAccrualIndex {
    cumulative_reward_per_share: FixedPointAmount,
    last_update_time: Timestamp,
    reward_rate_per_second: FixedPointAmount,
    total_staked: FixedPointAmount,
    /// Rewards issued into the index and not yet claimed. Never exceeds the
    /// reward pool, which is what caps emission.
    accrued_liability: FixedPointAmount,
}

impl RewardAccrualIndex {
    /// Start an index at `start` with nothing staked.
    pub fn new(reward_rate_per_second: FixedPointAmount, start: Timestamp) -> Result<Self, RewardError> {
        let decimals = reward_rate_per_second.decimals();
        Ok(Self {
            cumulative_reward_per_share: FixedPointAmount::zero(INDEX_DECIMALS)?,
            last_update_time: start,
            reward_rate_per_second,
            total_staked: FixedPointAmount::zero(decimals)?,
            accrued_liability: FixedPointAmount::zero(decimals)?,
        })
    }

    pub fn cumulative_reward_per_share(&self) -> FixedPointAmount {
        self.cumulative_reward_per_share
    }

    pub fn last_update_time(&self) -> Timestamp {
        self.last_update_time
    }

    pub fn reward_rate_per_second(&self) -> FixedPointAmount {
        self.reward_rate_per_second
    }

    pub fn total_staked(&self) -> FixedPointAmount {
        self.total_staked
    }

    pub fn accrued_liability(&self) -> FixedPointAmount {
        self.accrued_liability
    }

    /// Fold the emission since `last_update_time` into the index.
    ///
    /// With nothing staked the clock still moves forward and the emission for
    /// that interval is not issued. Emission is capped at the part of
    /// `reward_pool` not already owed to stakers; the excess is not issued
    /// either. An emission too small to move the index by one unit leaves
    /// `last_update_time` where it was, so it is carried into the next
    /// settlement instead of dropped. Returns the amount newly owed to stakers.
    pub fn settle(
        &mut self,
        now: Timestamp,
        reward_pool: FixedPointAmount,
    ) -> Result<FixedPointAmount, RewardError> {
        self.accrue(now, reward_pool, true)
    }

    fn accrue(
        &mut self,
        now: Timestamp,
        reward_pool: FixedPointAmount,
        carry_dust: bool,
    ) -> Result<FixedPointAmount, RewardError> {
        let elapsed = now
            .checked_since(self.last_update_time)
            .ok_or(RewardError::NonMonotonicTime {
                now,
                last_update: self.last_update_time,
            })?;
        let mut issued = FixedPointAmount::zero(self.total_staked.decimals())?;
        if elapsed == 0 || self.total_staked.is_zero() {
            self.last_update_time = now;
            return Ok(issued);
        }

        let headroom = reward_pool.sub(self.accrued_liability)?;
        let emission = mul_div(self.reward_rate_per_second.raw(), elapsed as u128, 1)?;
        let emission = emission.min(headroom.raw());

        let one = pow10(INDEX_DECIMALS)?;
        let advance = mul_div(emission, one, self.total_staked.raw())?;
        if advance == 0 && emission > 0 && carry_dust {
            return Ok(issued);
        }
        if advance > 0 {
            // Positions round their share down; rounding the liability up
            // keeps their sum within it.
            let owed = mul_div_ceil(advance, self.total_staked.raw(), one)?;
            issued = FixedPointAmount::from_raw(owed, issued.decimals())?;
            let advance = FixedPointAmount::from_raw(advance, INDEX_DECIMALS)?;
            let cumulative = self.cumulative_reward_per_share.add(advance)?;
            let liability = self.accrued_liability.add(issued)?;
            self.cumulative_reward_per_share = cumulative;
            self.accrued_liability = liability;
        }
        self.last_update_time = now;
        Ok(issued)
    }

    /// A settled copy of the index, leaving `self` untouched.
    pub fn projected(
        &self,
        now: Timestamp,
        reward_pool: FixedPointAmount,
    ) -> Result<Self, RewardError> {
        let mut copy = self.clone();
        copy.settle(now, reward_pool)?;
        Ok(copy)
    }

    /// Change the emission rate from `now` on. Accrual up to `now` is settled
    /// at the old rate first; emission too small to carry is dropped here so
    /// the new rate never applies to time before `now`.
    pub fn set_rate(
        &mut self,
        rate: FixedPointAmount,
        now: Timestamp,
        reward_pool: FixedPointAmount,
    ) -> Result<(), RewardError> {
        self.reward_rate_per_second.ensure_same_scale(&rate)?;
        self.accrue(now, reward_pool, false)?;
        self.reward_rate_per_second = rate;
        Ok(())
    }

    /// Must follow a `settle` at the current time.
    pub fn add_stake(&mut self, amount: FixedPointAmount) -> Result<(), RewardError> {
        self.total_staked = self.total_staked.add(amount)?;
        Ok(())
    }

    /// Must follow a `settle` at the current time.
    pub fn remove_stake(&mut self, amount: FixedPointAmount) -> Result<(), RewardError> {
        self.total_staked = self.total_staked.sub(amount)?;
        Ok(())
    }

    /// A claim of `amount` has been paid out of the pool.
    pub fn release_liability(&mut self, amount: FixedPointAmount) -> Result<(), RewardError> {
        self.accrued_liability = self.accrued_liability.sub(amount)?;
        Ok(())
    }

    /// Drop the rounding surplus left in the liability once no position is
    /// owed anything. Returns the amount released back to pool headroom.
    pub fn release_rounding_surplus(&mut self) -> FixedPointAmount {
        let surplus = self.accrued_liability;
        self.accrued_liability = surplus.with_raw(0);
        surplus
    }
}
