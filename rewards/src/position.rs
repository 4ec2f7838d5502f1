//! Per-participant stake positions.

use accrue_types::{mul_div, pow10, AccountId, FixedPointAmount};
use serde::{Deserialize, Serialize};

use crate::error::RewardError;
use crate::index::{RewardAccrualIndex, INDEX_DECIMALS};

/// One participant's staked balance and reward bookkeeping.
///
/// `reward_index_snapshot` is the index value the position last settled at.
/// Everything earned before that point has been moved into `pending_reward`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    owner: AccountId,
    staked_balance: FixedPointAmount,
    reward_index_snapshot: FixedPointAmount,
    pending_reward: FixedPointAmount,
    /// Lifetime rewards paid out to this owner.
    total_claimed: FixedPointAmount,
}

impl StakePosition {
    /// A fresh, empty position that starts earning from the current index.
    pub fn open(owner: AccountId, index: &RewardAccrualIndex) -> Result<Self, RewardError> {
        let decimals = index.total_staked().decimals();
        Ok(Self {
            owner,
            staked_balance: FixedPointAmount::zero(decimals)?,
            reward_index_snapshot: index.cumulative_reward_per_share(),
            pending_reward: FixedPointAmount::zero(decimals)?,
            total_claimed: FixedPointAmount::zero(decimals)?,
        })
    }

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn staked_balance(&self) -> FixedPointAmount {
        self.staked_balance
    }

    pub fn reward_index_snapshot(&self) -> FixedPointAmount {
        self.reward_index_snapshot
    }

    pub fn pending_reward(&self) -> FixedPointAmount {
        self.pending_reward
    }

    pub fn total_claimed(&self) -> FixedPointAmount {
        self.total_claimed
    }

    /// Nothing staked and nothing owed; the ledger drops such positions.
    pub fn is_empty(&self) -> bool {
        self.staked_balance.is_zero() && self.pending_reward.is_zero()
    }

    /// Reward accrued since the last settlement, rounded down.
    fn accrued_since_snapshot(&self, index: &RewardAccrualIndex) -> Result<FixedPointAmount, RewardError> {
        let delta = index
            .cumulative_reward_per_share()
            .sub(self.reward_index_snapshot)?;
        let raw = mul_div(self.staked_balance.raw(), delta.raw(), pow10(INDEX_DECIMALS)?)?;
        Ok(FixedPointAmount::from_raw(raw, self.staked_balance.decimals())?)
    }

    /// Move accrual up to `index` into `pending_reward`.
    ///
    /// `index` must already be settled at the current time.
    pub fn settle(&mut self, index: &RewardAccrualIndex) -> Result<FixedPointAmount, RewardError> {
        let accrued = self.accrued_since_snapshot(index)?;
        self.pending_reward = self.pending_reward.add(accrued)?;
        self.reward_index_snapshot = index.cumulative_reward_per_share();
        Ok(accrued)
    }

    /// What a claim against `index` would pay, without settling.
    pub fn earned_at(&self, index: &RewardAccrualIndex) -> Result<FixedPointAmount, RewardError> {
        Ok(self.pending_reward.add(self.accrued_since_snapshot(index)?)?)
    }

    /// Must follow `settle`.
    pub fn credit_stake(&mut self, amount: FixedPointAmount) -> Result<(), RewardError> {
        self.staked_balance = self.staked_balance.add(amount)?;
        Ok(())
    }

    /// Must follow `settle`.
    pub fn debit_stake(&mut self, amount: FixedPointAmount) -> Result<(), RewardError> {
        self.staked_balance.ensure_same_scale(&amount)?;
        if amount.raw() > self.staked_balance.raw() {
            return Err(RewardError::InsufficientStake {
                requested: amount,
                available: self.staked_balance,
            });
        }
        self.staked_balance = self.staked_balance.sub(amount)?;
        Ok(())
    }

    /// Record a payout of `amount` from the pending reward.
    pub fn take_reward(&mut self, amount: FixedPointAmount) -> Result<(), RewardError> {
        self.pending_reward.ensure_same_scale(&amount)?;
        if amount.raw() > self.pending_reward.raw() {
            return Err(RewardError::InsufficientReward {
                requested: amount,
                available: self.pending_reward,
            });
        }
        let pending = self.pending_reward.sub(amount)?;
        let claimed = self.total_claimed.add(amount)?;
        self.pending_reward = pending;
        self.total_claimed = claimed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_types::Timestamp;

    const D: u8 = 6;

    fn units(n: u128) -> FixedPointAmount {
        FixedPointAmount::from_units(n, D).unwrap()
    }

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    #[test]
    fn test_open_position_is_empty() {
        let index = RewardAccrualIndex::new(units(1), Timestamp::new(0)).unwrap();
        let pos = StakePosition::open(account("x"), &index).unwrap();
        assert!(pos.is_empty());
        assert_eq!(pos.owner().as_str(), "x");
    }

    #[test]
    fn test_pro_rata_settlement() {
        // X stakes 100 and Y stakes 300 at a total rate of 4/s for 40s.
        let mut index = RewardAccrualIndex::new(units(4), Timestamp::new(0)).unwrap();
        let mut x = StakePosition::open(account("x"), &index).unwrap();
        let mut y = StakePosition::open(account("y"), &index).unwrap();
        x.credit_stake(units(100)).unwrap();
        y.credit_stake(units(300)).unwrap();
        index.add_stake(units(400)).unwrap();

        index.settle(Timestamp::new(40), units(1_000)).unwrap();
        assert_eq!(x.earned_at(&index).unwrap(), units(40));
        assert_eq!(y.earned_at(&index).unwrap(), units(120));

        x.settle(&index).unwrap();
        assert_eq!(x.pending_reward(), units(40));
        assert_eq!(x.reward_index_snapshot(), index.cumulative_reward_per_share());
        // Settling twice at the same index adds nothing.
        assert!(x.settle(&index).unwrap().is_zero());
    }

    #[test]
    fn test_late_joiner_does_not_earn_past_rewards() {
        let mut index = RewardAccrualIndex::new(units(1), Timestamp::new(0)).unwrap();
        index.add_stake(units(10)).unwrap();
        index.settle(Timestamp::new(100), units(1_000)).unwrap();

        let late = StakePosition::open(account("late"), &index).unwrap();
        assert!(late.earned_at(&index).unwrap().is_zero());
    }

    #[test]
    fn test_debit_more_than_staked() {
        let index = RewardAccrualIndex::new(units(1), Timestamp::new(0)).unwrap();
        let mut pos = StakePosition::open(account("x"), &index).unwrap();
        pos.credit_stake(units(5)).unwrap();
        let err = pos.debit_stake(units(6)).unwrap_err();
        assert_eq!(
            err,
            RewardError::InsufficientStake {
                requested: units(6),
                available: units(5)
            }
        );
        assert_eq!(pos.staked_balance(), units(5));
    }

    #[test]
    fn test_take_reward_tracks_claimed_total() {
        let mut index = RewardAccrualIndex::new(units(1), Timestamp::new(0)).unwrap();
        let mut pos = StakePosition::open(account("x"), &index).unwrap();
        pos.credit_stake(units(10)).unwrap();
        index.add_stake(units(10)).unwrap();
        index.settle(Timestamp::new(10), units(100)).unwrap();
        pos.settle(&index).unwrap();

        pos.take_reward(units(10)).unwrap();
        assert!(pos.pending_reward().is_zero());
        assert_eq!(pos.total_claimed(), units(10));
        assert!(matches!(
            pos.take_reward(units(1)),
            Err(RewardError::InsufficientReward { .. })
        ));
    }
}
