//! JSON RPC server for the staking ledger.
//!
//! Exposes the ledger (`stake`, `withdraw`, `claim_reward`, `get_staked`,
//! `earned`, `fund_pool`, `set_reward_rate`, `pool_info`) and the token
//! surface a wallet needs (`decimals`, `approve`, `balance_of`, and `mint` in
//! development) over `POST /`.

pub mod dedup;
pub mod error;
pub mod handlers;
pub mod server;

pub use dedup::{ReceiptCache, DEFAULT_DEDUP_CAPACITY};
pub use error::RpcError;
pub use handlers::{dispatch, RpcRequest, RpcState};
pub use server::{router, RpcServer};
