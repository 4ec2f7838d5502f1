//! Nullable infrastructure for deterministic testing.
//!
//! The ledger's external dependencies (time and token transfers) sit behind
//! the `Clock` and `TokenGateway` traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod gateway;

pub use clock::NullClock;
pub use gateway::{CallKind, GatewayCall, NullGateway};
