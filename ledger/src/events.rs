//! Events published after each committed ledger mutation.

use accrue_types::{AccountId, FixedPointAmount};
use serde::{Deserialize, Serialize};

use crate::views::{PoolView, PositionView};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    Staked {
        amount: FixedPointAmount,
        position: PositionView,
    },
    Withdrawn {
        amount: FixedPointAmount,
        position: PositionView,
    },
    RewardPaid {
        amount: FixedPointAmount,
        position: PositionView,
    },
    PoolFunded {
        funder: AccountId,
        amount: FixedPointAmount,
        pool: PoolView,
    },
    RateChanged {
        funder: AccountId,
        pool: PoolView,
    },
}
