//! Fixed-point arithmetic errors shared across crates.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("conversion would lose precision")]
    PrecisionLoss,

    #[error("scale mismatch: expected {expected} decimals, got {actual}")]
    ScaleMismatch { expected: u8, actual: u8 },

    #[error("division by zero")]
    DivisionByZero,

    #[error("unsupported number of decimals: {0}")]
    InvalidDecimals(u8),

    #[error("invalid amount string: {0:?}")]
    Parse(String),
}
