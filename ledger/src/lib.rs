//! Token staking ledger with continuous reward accrual.
//!
//! Participants deposit tokens, earn a share of a global emission rate in
//! proportion to their stake, and claim rewards out of a funded pool. Token
//! movement goes through a [`TokenGateway`]; the ledger records a change only
//! after the gateway reports success.

pub mod clock;
pub mod error;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod locks;
pub mod snapshot;
mod state;
pub mod token;
pub mod views;

pub use clock::{Clock, SystemClock};
pub use error::LedgerError;
pub use events::LedgerEvent;
pub use gateway::{GatewayError, TokenGateway};
pub use ledger::{StakingLedger, LEDGER_STATS};
pub use locks::AccountLocks;
pub use snapshot::{LedgerSnapshot, SNAPSHOT_VERSION};
pub use token::MemoryToken;
pub use views::{PoolView, PositionView};
