//! The token-transfer capability the ledger depends on.
//!
//! The ledger never moves value itself. Deposits pull tokens from the owner,
//! withdrawals and reward claims push tokens to them, and the outcome of that
//! transfer decides whether the ledger commits the operation.

use std::future::Future;

use accrue_types::{AccountId, FixedPointAmount};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("insufficient balance for {account}: need {needed}, have {available}")]
    InsufficientBalance {
        account: String,
        needed: FixedPointAmount,
        available: FixedPointAmount,
    },

    #[error("insufficient allowance for {account}: need {needed}, approved {approved}")]
    InsufficientAllowance {
        account: String,
        needed: FixedPointAmount,
        approved: FixedPointAmount,
    },

    #[error("token uses {expected} decimals, transfer used {actual}")]
    ScaleMismatch { expected: u8, actual: u8 },

    #[error("token backend unavailable: {0}")]
    Unavailable(String),
}

/// Moves tokens between participants and the ledger's custody.
///
/// Implementations may suspend on I/O. A returned `Ok` means the transfer
/// happened; any error means it did not.
pub trait TokenGateway: Send + Sync + 'static {
    /// The token's fixed decimal scale. Read once when a ledger is built.
    fn decimals(&self) -> u8;

    /// Move `amount` from `owner` into ledger custody.
    fn pull(
        &self,
        owner: &AccountId,
        amount: FixedPointAmount,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Move `amount` from ledger custody to `owner`.
    fn push(
        &self,
        owner: &AccountId,
        amount: FixedPointAmount,
    ) -> impl Future<Output = Result<(), GatewayError>> + Send;
}
