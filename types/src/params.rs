//! Ledger parameters fixed at construction time.

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::amount::FixedPointAmount;

/// Default capacity of the ledger event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Parameters a `StakingLedger` is created with.
///
/// The token scale is not part of the parameters: it is read once from the
/// token gateway. `reward_rate_per_second` must already be expressed at that
/// scale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerParams {
    /// Total emission shared by all stakers, in token units per second.
    pub reward_rate_per_second: FixedPointAmount,

    /// Accounts allowed to fund the reward pool and change the rate.
    pub funders: Vec<AccountId>,

    /// Buffered events per subscriber before lagging subscribers drop events.
    pub event_capacity: usize,
}

impl LedgerParams {
    pub fn new(reward_rate_per_second: FixedPointAmount, funders: Vec<AccountId>) -> Self {
        Self {
            reward_rate_per_second,
            funders,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    pub fn is_funder(&self, account: &AccountId) -> bool {
        self.funders.iter().any(|f| f == account)
    }
}
