//! The ledger's owned state and its synchronous transitions.
//!
//! Every transition is computed on copies of the index and the one affected
//! position (a [`Settlement`]) and only written back by [`LedgerState::store`].
//! A failed computation therefore never leaves partial changes behind, and
//! the same computation doubles as a dry run before a token transfer.

use std::collections::HashMap;

use accrue_rewards::{RewardAccrualIndex, StakePosition};
use accrue_types::{AccountId, FixedPointAmount, Timestamp};
use tracing::debug;

use crate::error::LedgerError;
use crate::views::{PoolView, PositionView};

#[derive(Clone, Debug)]
pub(crate) struct LedgerState {
    pub(crate) index: RewardAccrualIndex,
    pub(crate) positions: HashMap<AccountId, StakePosition>,
    pub(crate) reward_pool: FixedPointAmount,
    /// Claims validated and waiting on their payout transfer.
    pub(crate) reserved_claims: FixedPointAmount,
    /// Latest clock reading any mutation has accepted. Never behind the
    /// index's `last_update_time`.
    pub(crate) latest_reading: Timestamp,
}

/// The post-operation index, position, and pool, not yet stored.
#[derive(Debug)]
pub(crate) struct Settlement {
    index: RewardAccrualIndex,
    position: StakePosition,
    reward_pool: FixedPointAmount,
}

impl Settlement {
    pub(crate) fn view(&self) -> PositionView {
        PositionView {
            owner: self.position.owner().clone(),
            staked_balance: self.position.staked_balance(),
            pending_reward: self.position.pending_reward(),
        }
    }
}

impl LedgerState {
    pub(crate) fn new(rate: FixedPointAmount, start: Timestamp) -> Result<Self, LedgerError> {
        let zero = FixedPointAmount::zero(rate.decimals())?;
        Ok(Self {
            index: RewardAccrualIndex::new(rate, start)?,
            positions: HashMap::new(),
            reward_pool: zero,
            reserved_claims: zero,
            latest_reading: start,
        })
    }

    /// Accept a clock reading for a mutation. A reading older than one
    /// already accepted is rejected and leaves the state untouched.
    pub(crate) fn observe(&mut self, now: Timestamp) -> Result<Timestamp, LedgerError> {
        if now < self.latest_reading {
            return Err(LedgerError::NonMonotonicTime {
                now,
                last_update: self.latest_reading,
            });
        }
        self.latest_reading = now;
        Ok(now)
    }

    /// Settle the index and `owner`'s position (opening one if absent) at `now`.
    fn settled(&self, owner: &AccountId, now: Timestamp) -> Result<Settlement, LedgerError> {
        let mut index = self.index.clone();
        index.settle(now, self.reward_pool)?;
        let mut position = match self.positions.get(owner) {
            Some(existing) => existing.clone(),
            None => StakePosition::open(owner.clone(), &index)?,
        };
        position.settle(&index)?;
        Ok(Settlement {
            index,
            position,
            reward_pool: self.reward_pool,
        })
    }

    pub(crate) fn plan_deposit(
        &self,
        owner: &AccountId,
        amount: FixedPointAmount,
        now: Timestamp,
    ) -> Result<Settlement, LedgerError> {
        let mut s = self.settled(owner, now)?;
        s.position.credit_stake(amount)?;
        s.index.add_stake(amount)?;
        Ok(s)
    }

    pub(crate) fn plan_withdraw(
        &self,
        owner: &AccountId,
        amount: FixedPointAmount,
        now: Timestamp,
    ) -> Result<Settlement, LedgerError> {
        let staked = self.staked(owner);
        if amount.raw() > staked.raw() {
            return Err(LedgerError::InsufficientStake {
                requested: amount,
                available: staked,
            });
        }
        let mut s = self.settled(owner, now)?;
        s.position.debit_stake(amount)?;
        s.index.remove_stake(amount)?;
        Ok(s)
    }

    /// Pay `amount` of `owner`'s pending reward out of the pool.
    pub(crate) fn plan_claim(
        &self,
        owner: &AccountId,
        amount: FixedPointAmount,
        now: Timestamp,
    ) -> Result<Settlement, LedgerError> {
        let mut s = self.settled(owner, now)?;
        s.position.take_reward(amount)?;
        s.index.release_liability(amount)?;
        s.reward_pool = s.reward_pool.sub(amount)?;
        Ok(s)
    }

    /// What a claim by `owner` would pay at `now`, checked against the pool.
    ///
    /// Returns the amount to reserve for the payout.
    pub(crate) fn plan_claim_amount(
        &self,
        owner: &AccountId,
        now: Timestamp,
    ) -> Result<FixedPointAmount, LedgerError> {
        let earned = self.earned(owner, now)?;
        if earned.is_zero() {
            return Err(LedgerError::NoRewardAvailable);
        }
        let available = self.reward_pool.sub(self.reserved_claims)?;
        if earned.raw() > available.raw() {
            return Err(LedgerError::PoolExhausted {
                requested: earned,
                available,
            });
        }
        Ok(earned)
    }

    pub(crate) fn reserve_claim(&mut self, amount: FixedPointAmount) -> Result<(), LedgerError> {
        self.reserved_claims = self.reserved_claims.add(amount)?;
        Ok(())
    }

    pub(crate) fn release_claim(&mut self, amount: FixedPointAmount) -> Result<(), LedgerError> {
        self.reserved_claims = self.reserved_claims.sub(amount)?;
        Ok(())
    }

    /// Write a settlement back. Positions with nothing staked and nothing
    /// owed are dropped.
    pub(crate) fn store(&mut self, s: Settlement) -> PositionView {
        let view = s.view();
        self.index = s.index;
        self.reward_pool = s.reward_pool;
        if s.position.is_empty() {
            self.positions.remove(s.position.owner());
        } else {
            self.positions.insert(s.position.owner().clone(), s.position);
        }
        if self.positions.is_empty() && !self.index.accrued_liability().is_zero() {
            let surplus = self.index.release_rounding_surplus();
            debug!(%surplus, "last position closed, rounding surplus returned to the pool");
        }
        view
    }

    /// Grow the pool. Accrual up to `now` is capped by the pool as it was.
    pub(crate) fn plan_funding(
        &self,
        amount: FixedPointAmount,
        now: Timestamp,
    ) -> Result<(RewardAccrualIndex, FixedPointAmount), LedgerError> {
        let mut index = self.index.clone();
        index.settle(now, self.reward_pool)?;
        let pool = self.reward_pool.add(amount)?;
        Ok((index, pool))
    }

    pub(crate) fn plan_rate(
        &self,
        rate: FixedPointAmount,
        now: Timestamp,
    ) -> Result<RewardAccrualIndex, LedgerError> {
        let mut index = self.index.clone();
        index.set_rate(rate, now, self.reward_pool)?;
        Ok(index)
    }

    pub(crate) fn staked(&self, owner: &AccountId) -> FixedPointAmount {
        self.positions
            .get(owner)
            .map(|p| p.staked_balance())
            .unwrap_or_else(|| self.index.total_staked().with_raw(0))
    }

    /// Projection of `owner`'s claimable reward at `now`. Mutates nothing.
    pub(crate) fn earned(&self, owner: &AccountId, now: Timestamp) -> Result<FixedPointAmount, LedgerError> {
        let projected = self.index.projected(now, self.reward_pool)?;
        match self.positions.get(owner) {
            Some(position) => Ok(position.earned_at(&projected)?),
            None => Ok(self.reward_pool.with_raw(0)),
        }
    }

    pub(crate) fn position_view(&self, owner: &AccountId, now: Timestamp) -> Result<PositionView, LedgerError> {
        Ok(PositionView {
            owner: owner.clone(),
            staked_balance: self.staked(owner),
            pending_reward: self.earned(owner, now)?,
        })
    }

    pub(crate) fn pool_view(&self) -> PoolView {
        PoolView {
            total_staked: self.index.total_staked(),
            reward_pool: self.reward_pool,
            reward_rate_per_second: self.index.reward_rate_per_second(),
            cumulative_reward_per_share: self.index.cumulative_reward_per_share(),
            accrued_liability: self.index.accrued_liability(),
            last_update_time: self.index.last_update_time(),
            staker_count: self.positions.len(),
        }
    }

    /// Verify the accounting identities against the last settled index.
    pub(crate) fn check_invariants(&self) -> Result<(), LedgerError> {
        let mut staked = 0u128;
        let mut owed = 0u128;
        for position in self.positions.values() {
            staked = staked
                .checked_add(position.staked_balance().raw())
                .ok_or(LedgerError::Overflow)?;
            owed = owed
                .checked_add(position.earned_at(&self.index)?.raw())
                .ok_or(LedgerError::Overflow)?;
        }
        let total = self.index.total_staked();
        if staked != total.raw() {
            return Err(LedgerError::InvariantViolation(format!(
                "positions hold {} staked, index tracks {}",
                total.with_raw(staked),
                total
            )));
        }
        if owed > self.index.accrued_liability().raw() {
            return Err(LedgerError::InvariantViolation(format!(
                "positions are owed {}, index issued {}",
                total.with_raw(owed),
                self.index.accrued_liability()
            )));
        }
        if self.index.accrued_liability().raw() > self.reward_pool.raw() {
            return Err(LedgerError::InvariantViolation(format!(
                "issued rewards {} exceed pool {}",
                self.index.accrued_liability(),
                self.reward_pool
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: u8 = 6;

    fn units(n: u128) -> FixedPointAmount {
        FixedPointAmount::from_units(n, D).unwrap()
    }

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    fn ts(secs: u64) -> Timestamp {
        Timestamp::new(secs)
    }

    fn funded_state(rate: u128, pool: u128) -> LedgerState {
        let mut state = LedgerState::new(units(rate), ts(0)).unwrap();
        state.reward_pool = units(pool);
        state
    }

    #[test]
    fn test_plan_does_not_mutate_until_stored() {
        let state = funded_state(1, 1_000);
        let plan = state.plan_deposit(&account("x"), units(100), ts(0)).unwrap();
        assert!(state.positions.is_empty());
        assert!(state.index.total_staked().is_zero());

        let mut state = state;
        let view = state.store(plan);
        assert_eq!(view.staked_balance, units(100));
        assert_eq!(state.index.total_staked(), units(100));
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_withdraw_more_than_staked() {
        let mut state = funded_state(1, 1_000);
        let plan = state.plan_deposit(&account("x"), units(10), ts(0)).unwrap();
        state.store(plan);
        let err = state.plan_withdraw(&account("x"), units(11), ts(5)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientStake {
                requested: units(11),
                available: units(10)
            }
        );
    }

    #[test]
    fn test_full_exit_removes_position() {
        let mut state = funded_state(1, 1_000);
        let plan = state.plan_deposit(&account("x"), units(10), ts(0)).unwrap();
        state.store(plan);

        let plan = state.plan_withdraw(&account("x"), units(10), ts(10)).unwrap();
        let view = state.store(plan);
        assert_eq!(view.pending_reward, units(10));
        assert_eq!(state.positions.len(), 1);

        let amount = state.plan_claim_amount(&account("x"), ts(10)).unwrap();
        let plan = state.plan_claim(&account("x"), amount, ts(10)).unwrap();
        state.store(plan);
        assert!(state.positions.is_empty());
        assert_eq!(state.reward_pool, units(990));
        state.check_invariants().unwrap();
    }

    #[test]
    fn test_reserved_claims_reduce_available_pool() {
        let mut state = funded_state(10, 100);
        let plan = state.plan_deposit(&account("x"), units(1), ts(0)).unwrap();
        state.store(plan);
        let plan = state.plan_deposit(&account("y"), units(1), ts(0)).unwrap();
        state.store(plan);

        state.reserve_claim(units(60)).unwrap();
        let err = state.plan_claim_amount(&account("x"), ts(10)).unwrap_err();
        assert!(matches!(err, LedgerError::PoolExhausted { .. }));
        state.release_claim(units(60)).unwrap();
        assert_eq!(state.plan_claim_amount(&account("x"), ts(10)).unwrap(), units(50));
    }

    #[test]
    fn test_observe_rejects_older_reading() {
        let mut state = funded_state(1, 10);
        assert_eq!(state.observe(ts(50)).unwrap(), ts(50));
        let err = state.observe(ts(40)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NonMonotonicTime {
                now: ts(40),
                last_update: ts(50)
            }
        );
        assert_eq!(state.latest_reading, ts(50));
        assert_eq!(state.observe(ts(50)).unwrap(), ts(50));
    }

    #[test]
    fn test_last_exit_releases_rounding_surplus() {
        // 1 raw unit per second over 3 raw units: liability rounds up to 1
        // while each position's share rounds down to 0.
        let rate = FixedPointAmount::from_raw(1, D).unwrap();
        let mut state = LedgerState::new(rate, ts(0)).unwrap();
        state.reward_pool = units(1);
        let three = FixedPointAmount::from_raw(3, D).unwrap();
        let plan = state.plan_deposit(&account("x"), three, ts(0)).unwrap();
        state.store(plan);

        let plan = state.plan_withdraw(&account("x"), three, ts(1)).unwrap();
        let view = state.store(plan);
        assert!(view.pending_reward.is_zero());
        assert!(state.positions.is_empty());
        assert!(state.index.accrued_liability().is_zero());
        state.check_invariants().unwrap();
    }
}
