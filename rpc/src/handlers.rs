//! RPC request handlers.
//!
//! Amounts travel as decimal strings in whole-token units (`"12.5"`) and are
//! converted at the token's scale.

use std::future::Future;
use std::sync::Arc;

use accrue_ledger::{Clock, MemoryToken, PoolView, PositionView, StakingLedger};
use accrue_types::{AccountId, FixedPointAmount, RequestId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::dedup::{Admission, ReceiptCache, ReceiptKey};
use crate::error::RpcError;

/// Everything the handlers need, shared across requests.
pub struct RpcState<C> {
    pub ledger: StakingLedger<MemoryToken, C>,
    receipts: Arc<Mutex<ReceiptCache>>,
    allow_mint: bool,
}

impl<C: Clock> RpcState<C> {
    pub fn new(ledger: StakingLedger<MemoryToken, C>, dedup_capacity: usize, allow_mint: bool) -> Self {
        Self {
            ledger,
            receipts: Arc::new(Mutex::new(ReceiptCache::new(dedup_capacity))),
            allow_mint,
        }
    }

    fn token(&self) -> &MemoryToken {
        self.ledger.gateway()
    }

    fn amount(&self, raw: &str) -> Result<FixedPointAmount, RpcError> {
        Ok(FixedPointAmount::parse_units(raw.trim(), self.ledger.decimals())?)
    }
}

// ── Requests ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RpcRequest {
    Stake {
        account: String,
        amount: String,
        #[serde(default)]
        request_id: Option<String>,
    },
    Withdraw {
        account: String,
        amount: String,
        #[serde(default)]
        request_id: Option<String>,
    },
    ClaimReward {
        account: String,
        #[serde(default)]
        request_id: Option<String>,
    },
    GetStaked {
        account: String,
    },
    Earned {
        account: String,
    },
    CalculateEarnedRewards {
        account: String,
    },
    Decimals,
    FundPool {
        funder: String,
        amount: String,
        #[serde(default)]
        request_id: Option<String>,
    },
    SetRewardRate {
        caller: String,
        rate: String,
    },
    PoolInfo,
    Approve {
        account: String,
        amount: String,
    },
    BalanceOf {
        account: String,
    },
    Mint {
        account: String,
        amount: String,
    },
}

impl RpcRequest {
    pub fn action(&self) -> &'static str {
        match self {
            RpcRequest::Stake { .. } => "stake",
            RpcRequest::Withdraw { .. } => "withdraw",
            RpcRequest::ClaimReward { .. } => "claim_reward",
            RpcRequest::GetStaked { .. } => "get_staked",
            RpcRequest::Earned { .. } => "earned",
            RpcRequest::CalculateEarnedRewards { .. } => "calculate_earned_rewards",
            RpcRequest::Decimals => "decimals",
            RpcRequest::FundPool { .. } => "fund_pool",
            RpcRequest::SetRewardRate { .. } => "set_reward_rate",
            RpcRequest::PoolInfo => "pool_info",
            RpcRequest::Approve { .. } => "approve",
            RpcRequest::BalanceOf { .. } => "balance_of",
            RpcRequest::Mint { .. } => "mint",
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct PositionResponse {
    pub account: String,
    pub staked: String,
    pub pending_reward: String,
}

impl From<PositionView> for PositionResponse {
    fn from(view: PositionView) -> Self {
        Self {
            account: view.owner.to_string(),
            staked: view.staked_balance.to_string(),
            pending_reward: view.pending_reward.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account: String,
    pub amount: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DecimalsResponse {
    pub decimals: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolInfoResponse {
    pub total_staked: String,
    pub reward_pool: String,
    pub reward_rate_per_second: String,
    pub accrued_liability: String,
    pub last_update_time: u64,
    pub staker_count: usize,
}

impl From<PoolView> for PoolInfoResponse {
    fn from(pool: PoolView) -> Self {
        Self {
            total_staked: pool.total_staked.to_string(),
            reward_pool: pool.reward_pool.to_string(),
            reward_rate_per_second: pool.reward_rate_per_second.to_string(),
            accrued_liability: pool.accrued_liability.to_string(),
            last_update_time: pool.last_update_time.as_secs(),
            staker_count: pool.staker_count,
        }
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────────

fn account(raw: &str) -> Result<AccountId, RpcError> {
    AccountId::new(raw.trim()).ok_or_else(|| RpcError::InvalidRequest("account must not be empty".into()))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::Server(e.to_string()))
}

fn balance(account: &AccountId, amount: FixedPointAmount) -> Result<Value, RpcError> {
    to_value(BalanceResponse {
        account: account.to_string(),
        amount: amount.to_string(),
    })
}

/// Execute one request and return its `result` payload.
pub async fn dispatch<C: Clock>(state: &RpcState<C>, request: RpcRequest) -> Result<Value, RpcError> {
    let action = request.action();
    debug!(action, "rpc request");
    match request {
        RpcRequest::Stake {
            account: owner,
            amount,
            request_id,
        } => {
            let owner = account(&owner)?;
            let amount = state.amount(&amount)?;
            let (ledger, staker) = (state.ledger.clone(), owner.clone());
            deduplicated(state, &owner, request_id, async move {
                let view = ledger.deposit(&staker, amount).await?;
                to_value(PositionResponse::from(view))
            })
            .await
        }
        RpcRequest::Withdraw {
            account: owner,
            amount,
            request_id,
        } => {
            let owner = account(&owner)?;
            let amount = state.amount(&amount)?;
            let (ledger, staker) = (state.ledger.clone(), owner.clone());
            deduplicated(state, &owner, request_id, async move {
                let view = ledger.withdraw(&staker, amount).await?;
                to_value(PositionResponse::from(view))
            })
            .await
        }
        RpcRequest::ClaimReward {
            account: owner,
            request_id,
        } => {
            let owner = account(&owner)?;
            let (ledger, staker) = (state.ledger.clone(), owner.clone());
            deduplicated(state, &owner, request_id, async move {
                let view = ledger.claim_reward(&staker).await?;
                to_value(PositionResponse::from(view))
            })
            .await
        }
        RpcRequest::GetStaked { account: owner } => {
            let owner = account(&owner)?;
            let staked = state.ledger.get_staked(&owner).await;
            balance(&owner, staked)
        }
        RpcRequest::Earned { account: owner } | RpcRequest::CalculateEarnedRewards { account: owner } => {
            let owner = account(&owner)?;
            let earned = state.ledger.earned(&owner).await?;
            balance(&owner, earned)
        }
        RpcRequest::Decimals => to_value(DecimalsResponse {
            decimals: state.ledger.decimals(),
        }),
        RpcRequest::FundPool {
            funder,
            amount,
            request_id,
        } => {
            let funder = account(&funder)?;
            let amount = state.amount(&amount)?;
            let (ledger, caller) = (state.ledger.clone(), funder.clone());
            deduplicated(state, &funder, request_id, async move {
                let pool = ledger.fund_pool(&caller, amount).await?;
                to_value(PoolInfoResponse::from(pool))
            })
            .await
        }
        RpcRequest::SetRewardRate { caller, rate } => {
            let caller = account(&caller)?;
            let rate = state.amount(&rate)?;
            let pool = state.ledger.set_reward_rate(&caller, rate).await?;
            to_value(PoolInfoResponse::from(pool))
        }
        RpcRequest::PoolInfo => to_value(PoolInfoResponse::from(state.ledger.pool().await)),
        RpcRequest::Approve { account: owner, amount } => {
            let owner = account(&owner)?;
            let amount = state.amount(&amount)?;
            state.token().approve(&owner, amount).await?;
            balance(&owner, state.token().allowance(&owner).await)
        }
        RpcRequest::BalanceOf { account: owner } => {
            let owner = account(&owner)?;
            balance(&owner, state.token().balance_of(&owner).await)
        }
        RpcRequest::Mint { account: owner, amount } => {
            if !state.allow_mint {
                return Err(RpcError::Disabled("mint"));
            }
            let owner = account(&owner)?;
            let amount = state.amount(&amount)?;
            state.token().mint(&owner, amount).await?;
            info!(%owner, %amount, "dev mint");
            balance(&owner, state.token().balance_of(&owner).await)
        }
    }
}

/// Run `operation` once per `(owner, request_id)`. Requests without an id
/// always run.
///
/// The operation and its receipt update run on their own task, so a client
/// that disconnects mid-request still leaves a receipt its retry can replay.
async fn deduplicated<C, F>(
    state: &RpcState<C>,
    owner: &AccountId,
    request_id: Option<String>,
    operation: F,
) -> Result<Value, RpcError>
where
    F: Future<Output = Result<Value, RpcError>> + Send + 'static,
{
    let Some(id) = request_id else {
        return operation.await;
    };
    let key: ReceiptKey = (owner.clone(), RequestId::new(id));

    match state.receipts.lock().await.begin(&key) {
        Admission::Fresh => {}
        Admission::InFlight => return Err(RpcError::RequestInFlight(key.1.to_string())),
        Admission::Replay(value) => {
            debug!(%owner, request_id = %key.1, "replaying recorded response");
            return Ok(value);
        }
    }

    let receipts = Arc::clone(&state.receipts);
    let task_key = key.clone();
    let task = tokio::spawn(async move {
        let result = operation.await;
        let mut receipts = receipts.lock().await;
        match &result {
            Ok(value) => receipts.complete(&task_key, value.clone()),
            Err(_) => receipts.abandon(&task_key),
        }
        result
    });
    match task.await {
        Ok(result) => result,
        Err(e) => {
            state.receipts.lock().await.abandon(&key);
            Err(RpcError::Server(e.to_string()))
        }
    }
}
