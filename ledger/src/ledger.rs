//! The staking ledger: deposits, withdrawals, and reward claims against a
//! token gateway.
//!
//! Every mutation follows the same sequence while holding the owner's
//! account lock:
//!
//! 1. validate against current state (a dry run of the transition),
//! 2. perform the token transfer with the state lock released,
//! 3. re-run the transition at commit time and store it.
//!
//! Nothing is stored unless the transfer succeeded. A clock reading older
//! than one the ledger already accepted fails with `NonMonotonicTime`; at a
//! deposit or funding commit that means the pulled tokens are refunded. Mutations run on their
//! own task, so a caller that stops waiting does not interrupt a transfer
//! between steps 2 and 3.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use accrue_types::{AccountId, FixedPointAmount, LedgerParams};
use accrue_utils::stats::StatsCounter;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::gateway::TokenGateway;
use crate::locks::AccountLocks;
use crate::snapshot::LedgerSnapshot;
use crate::state::LedgerState;
use crate::views::{PoolView, PositionView};

/// Counter names tracked by [`StakingLedger::stats`].
pub const LEDGER_STATS: &[&str] = &[
    "deposits",
    "withdrawals",
    "claims",
    "pool_fundings",
    "rate_changes",
    "gateway_failures",
    "refunds",
];

struct Inner<G, C> {
    gateway: G,
    clock: C,
    decimals: u8,
    funders: Vec<AccountId>,
    state: Mutex<LedgerState>,
    locks: AccountLocks,
    events: broadcast::Sender<LedgerEvent>,
    stats: StatsCounter,
}

/// Shared handle to a staking ledger. Cloning is cheap; clones operate on
/// the same state.
pub struct StakingLedger<G, C> {
    inner: Arc<Inner<G, C>>,
}

impl<G, C> Clone for StakingLedger<G, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<G: TokenGateway, C: Clock> StakingLedger<G, C> {
    /// Create an empty ledger. The token scale is read from the gateway once.
    pub fn new(gateway: G, clock: C, params: LedgerParams) -> Result<Self, LedgerError> {
        let decimals = gateway.decimals();
        let rate = params.reward_rate_per_second;
        if rate.decimals() != decimals {
            return Err(LedgerError::ScaleMismatch {
                expected: decimals,
                actual: rate.decimals(),
            });
        }
        let state = LedgerState::new(rate, clock.now())?;
        info!(decimals, %rate, funders = params.funders.len(), "staking ledger created");
        Ok(Self::assemble(gateway, clock, decimals, params, state))
    }

    /// Resume from a snapshot. The snapshot's reward rate wins over the one
    /// in `params`; funders and event capacity come from `params`.
    pub fn from_snapshot(
        gateway: G,
        clock: C,
        params: LedgerParams,
        snapshot: LedgerSnapshot,
    ) -> Result<Self, LedgerError> {
        let decimals = gateway.decimals();
        if snapshot.decimals != decimals {
            return Err(LedgerError::ScaleMismatch {
                expected: decimals,
                actual: snapshot.decimals,
            });
        }
        let hash = snapshot.hash_hex();
        let state = snapshot.into_state()?;
        info!(
            decimals,
            positions = state.positions.len(),
            pool = %state.reward_pool,
            %hash,
            "staking ledger restored from snapshot"
        );
        Ok(Self::assemble(gateway, clock, decimals, params, state))
    }

    fn assemble(gateway: G, clock: C, decimals: u8, params: LedgerParams, state: LedgerState) -> Self {
        let (events, _) = broadcast::channel(params.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                gateway,
                clock,
                decimals,
                funders: params.funders,
                state: Mutex::new(state),
                locks: AccountLocks::new(),
                events,
                stats: StatsCounter::new(LEDGER_STATS),
            }),
        }
    }

    /// Stake `amount` for `owner`, pulling it through the gateway.
    pub async fn deposit(&self, owner: &AccountId, amount: FixedPointAmount) -> Result<PositionView, LedgerError> {
        self.check_amount(amount)?;
        let inner = Arc::clone(&self.inner);
        let owner = owner.clone();
        run(async move { inner.deposit(owner, amount).await }).await
    }

    /// Unstake `amount` and send it back to `owner`.
    pub async fn withdraw(&self, owner: &AccountId, amount: FixedPointAmount) -> Result<PositionView, LedgerError> {
        self.check_amount(amount)?;
        let inner = Arc::clone(&self.inner);
        let owner = owner.clone();
        run(async move { inner.withdraw(owner, amount).await }).await
    }

    /// Pay out everything `owner` has earned so far.
    pub async fn claim_reward(&self, owner: &AccountId) -> Result<PositionView, LedgerError> {
        let inner = Arc::clone(&self.inner);
        let owner = owner.clone();
        run(async move { inner.claim(owner).await }).await
    }

    /// Add `amount` to the reward pool. Only configured funders may call this.
    pub async fn fund_pool(&self, funder: &AccountId, amount: FixedPointAmount) -> Result<PoolView, LedgerError> {
        self.authorize(funder)?;
        self.check_amount(amount)?;
        let inner = Arc::clone(&self.inner);
        let funder = funder.clone();
        run(async move { inner.fund(funder, amount).await }).await
    }

    /// Change the emission rate. Accrual up to now is settled at the old rate.
    pub async fn set_reward_rate(&self, caller: &AccountId, rate: FixedPointAmount) -> Result<PoolView, LedgerError> {
        self.authorize(caller)?;
        self.check_scale(rate)?;
        let mut state = self.inner.state.lock().await;
        let now = state.observe(self.inner.clock.now())?;
        let index = state.plan_rate(rate, now)?;
        state.index = index;
        let pool = state.pool_view();
        drop(state);

        self.inner.stats.increment("rate_changes");
        info!(%caller, %rate, "reward rate changed");
        self.inner.emit(LedgerEvent::RateChanged {
            funder: caller.clone(),
            pool: pool.clone(),
        });
        Ok(pool)
    }

    pub async fn get_staked(&self, owner: &AccountId) -> FixedPointAmount {
        self.inner.state.lock().await.staked(owner)
    }

    /// Reward `owner` could claim right now. Read-only.
    pub async fn earned(&self, owner: &AccountId) -> Result<FixedPointAmount, LedgerError> {
        let state = self.inner.state.lock().await;
        state.earned(owner, self.inner.clock.now())
    }

    /// Same as [`earned`](Self::earned); kept for clients using the older name.
    pub async fn calculate_earned_rewards(&self, owner: &AccountId) -> Result<FixedPointAmount, LedgerError> {
        self.earned(owner).await
    }

    pub async fn position(&self, owner: &AccountId) -> Result<PositionView, LedgerError> {
        let state = self.inner.state.lock().await;
        state.position_view(owner, self.inner.clock.now())
    }

    /// Pool totals as of the last settlement.
    pub async fn pool(&self) -> PoolView {
        self.inner.state.lock().await.pool_view()
    }

    pub fn decimals(&self) -> u8 {
        self.inner.decimals
    }

    pub fn is_funder(&self, account: &AccountId) -> bool {
        self.inner.funders.contains(account)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.inner.events.subscribe()
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    pub fn stats(&self) -> BTreeMap<&'static str, u64> {
        self.inner.stats.snapshot()
    }

    pub async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let state = self.inner.state.lock().await;
        LedgerSnapshot::capture(&state, self.inner.decimals, self.inner.clock.now())
    }

    pub async fn check_invariants(&self) -> Result<(), LedgerError> {
        self.inner.state.lock().await.check_invariants()
    }

    fn check_scale(&self, amount: FixedPointAmount) -> Result<(), LedgerError> {
        if amount.decimals() != self.inner.decimals {
            return Err(LedgerError::ScaleMismatch {
                expected: self.inner.decimals,
                actual: amount.decimals(),
            });
        }
        Ok(())
    }

    fn check_amount(&self, amount: FixedPointAmount) -> Result<(), LedgerError> {
        self.check_scale(amount)?;
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount("amount must be positive".into()));
        }
        Ok(())
    }

    fn authorize(&self, caller: &AccountId) -> Result<(), LedgerError> {
        if !self.is_funder(caller) {
            warn!(%caller, "rejected privileged call");
            return Err(LedgerError::Unauthorized(caller.to_string()));
        }
        Ok(())
    }
}

impl<G: TokenGateway, C: Clock> Inner<G, C> {
    fn emit(&self, event: LedgerEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    async fn deposit(&self, owner: AccountId, amount: FixedPointAmount) -> Result<PositionView, LedgerError> {
        let _account = self.locks.acquire(&owner).await;
        {
            let mut state = self.state.lock().await;
            let now = state.observe(self.clock.now())?;
            state.plan_deposit(&owner, amount, now)?;
        }
        debug!(%owner, %amount, "deposit validated, pulling stake");

        if let Err(e) = self.gateway.pull(&owner, amount).await {
            self.stats.increment("gateway_failures");
            warn!(%owner, %amount, error = %e, "deposit pull failed");
            return Err(e.into());
        }

        let committed = {
            let mut state = self.state.lock().await;
            let stored = state
                .observe(self.clock.now())
                .and_then(|now| state.plan_deposit(&owner, amount, now))
                .map(|plan| state.store(plan));
            stored
        };
        match committed {
            Ok(view) => {
                self.stats.increment("deposits");
                info!(%owner, %amount, staked = %view.staked_balance, "stake deposited");
                self.emit(LedgerEvent::Staked {
                    amount,
                    position: view.clone(),
                });
                Ok(view)
            }
            Err(e) => {
                self.refund(&owner, amount, &e).await;
                Err(e)
            }
        }
    }

    /// Payouts cannot be recalled, so withdrawals and claims commit at the
    /// latest accepted reading instead of asking the clock again.
    async fn withdraw(&self, owner: AccountId, amount: FixedPointAmount) -> Result<PositionView, LedgerError> {
        let _account = self.locks.acquire(&owner).await;
        {
            let mut state = self.state.lock().await;
            let now = state.observe(self.clock.now())?;
            state.plan_withdraw(&owner, amount, now)?;
        }
        debug!(%owner, %amount, "withdrawal validated, pushing stake");

        if let Err(e) = self.gateway.push(&owner, amount).await {
            self.stats.increment("gateway_failures");
            warn!(%owner, %amount, error = %e, "withdrawal push failed");
            return Err(e.into());
        }

        let view = {
            let mut state = self.state.lock().await;
            let at = state.latest_reading;
            match state.plan_withdraw(&owner, amount, at) {
                Ok(plan) => state.store(plan),
                Err(e) => {
                    error!(%owner, %amount, error = %e, "withdrawal paid out but could not be recorded");
                    return Err(e);
                }
            }
        };
        self.stats.increment("withdrawals");
        info!(%owner, %amount, staked = %view.staked_balance, "stake withdrawn");
        self.emit(LedgerEvent::Withdrawn {
            amount,
            position: view.clone(),
        });
        Ok(view)
    }

    async fn claim(&self, owner: AccountId) -> Result<PositionView, LedgerError> {
        let _account = self.locks.acquire(&owner).await;
        let amount = {
            let mut state = self.state.lock().await;
            let now = state.observe(self.clock.now())?;
            let amount = state.plan_claim_amount(&owner, now)?;
            state.reserve_claim(amount)?;
            amount
        };
        debug!(%owner, %amount, "claim reserved, pushing reward");

        let pushed = self.gateway.push(&owner, amount).await;

        let mut state = self.state.lock().await;
        state.release_claim(amount)?;
        if let Err(e) = pushed {
            drop(state);
            self.stats.increment("gateway_failures");
            warn!(%owner, %amount, error = %e, "reward push failed, reservation released");
            return Err(e.into());
        }
        // Every settlement since validation ran at a reading no older than
        // the one `amount` was computed at, so at least `amount` is pending.
        let at = state.latest_reading;
        let view = match state.plan_claim(&owner, amount, at) {
            Ok(plan) => state.store(plan),
            Err(e) => {
                error!(%owner, %amount, error = %e, "reward paid out but could not be recorded");
                return Err(e);
            }
        };
        drop(state);

        self.stats.increment("claims");
        info!(%owner, %amount, "reward paid");
        self.emit(LedgerEvent::RewardPaid {
            amount,
            position: view.clone(),
        });
        Ok(view)
    }

    async fn fund(&self, funder: AccountId, amount: FixedPointAmount) -> Result<PoolView, LedgerError> {
        let _account = self.locks.acquire(&funder).await;
        {
            let mut state = self.state.lock().await;
            let now = state.observe(self.clock.now())?;
            state.plan_funding(amount, now)?;
        }

        if let Err(e) = self.gateway.pull(&funder, amount).await {
            self.stats.increment("gateway_failures");
            warn!(%funder, %amount, error = %e, "pool funding pull failed");
            return Err(e.into());
        }

        let committed = {
            let mut state = self.state.lock().await;
            let funded = state
                .observe(self.clock.now())
                .and_then(|now| state.plan_funding(amount, now))
                .map(|(index, pool)| {
                    state.index = index;
                    state.reward_pool = pool;
                    state.pool_view()
                });
            funded
        };
        match committed {
            Ok(pool) => {
                self.stats.increment("pool_fundings");
                info!(%funder, %amount, reward_pool = %pool.reward_pool, "reward pool funded");
                self.emit(LedgerEvent::PoolFunded {
                    funder,
                    amount,
                    pool: pool.clone(),
                });
                Ok(pool)
            }
            Err(e) => {
                self.refund(&funder, amount, &e).await;
                Err(e)
            }
        }
    }

    /// Return pulled tokens whose ledger commit failed.
    async fn refund(&self, owner: &AccountId, amount: FixedPointAmount, cause: &LedgerError) {
        warn!(%owner, %amount, error = %cause, "commit failed after pull, refunding");
        match self.gateway.push(owner, amount).await {
            Ok(()) => self.stats.increment("refunds"),
            Err(e) => error!(%owner, %amount, error = %e, "refund failed"),
        }
    }
}

/// Drive a mutation to completion on its own task.
async fn run<F, T>(task: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(task)
        .await
        .map_err(|e| LedgerError::TaskFailed(e.to_string()))?
}
