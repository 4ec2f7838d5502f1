//! Fundamental types for the Accrue staking ledger.
//!
//! This crate defines the types shared across every other crate in the
//! workspace: fixed-point amounts, timestamps, account and request ids, and
//! ledger parameters.

pub mod account;
pub mod amount;
pub mod error;
pub mod params;
pub mod time;

pub use account::{AccountId, RequestId};
pub use amount::{mul_div, mul_div_ceil, pow10, FixedPointAmount, MAX_DECIMALS};
pub use error::AmountError;
pub use params::LedgerParams;
pub use time::Timestamp;
