//! Ledger snapshots: the complete accounting state at a point in time.
//!
//! A snapshot lets a restarted ledger resume exactly where it stopped: the
//! accrual index, every open position, and the reward pool. The snapshot
//! hash is a Blake2b-256 digest over the serialized contents so a corrupted
//! or hand-edited file is rejected on load.

use accrue_rewards::{RewardAccrualIndex, StakePosition};
use accrue_types::{FixedPointAmount, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::state::LedgerState;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Blake2b-256 of the contents below (excluding `created_at`).
    pub hash: [u8; 32],
    pub version: u32,
    pub created_at: Timestamp,
    /// Token scale the ledger ran with.
    pub decimals: u8,
    pub index: RewardAccrualIndex,
    pub reward_pool: FixedPointAmount,
    /// Open positions, ordered by owner.
    pub positions: Vec<StakePosition>,
}

impl LedgerSnapshot {
    pub(crate) fn capture(
        state: &LedgerState,
        decimals: u8,
        created_at: Timestamp,
    ) -> Result<Self, LedgerError> {
        let mut positions: Vec<StakePosition> = state.positions.values().cloned().collect();
        positions.sort_by(|a, b| a.owner().cmp(b.owner()));
        let mut snap = Self {
            hash: [0u8; 32],
            version: SNAPSHOT_VERSION,
            created_at,
            decimals,
            index: state.index.clone(),
            reward_pool: state.reward_pool,
            positions,
        };
        snap.hash = snap.compute_hash()?;
        Ok(snap)
    }

    fn compute_hash(&self) -> Result<[u8; 32], LedgerError> {
        use blake2::digest::consts::U32;
        use blake2::{Blake2b, Digest};

        let mut hasher = Blake2b::<U32>::new();
        hasher.update(self.version.to_le_bytes());
        hasher.update([self.decimals]);
        hasher.update(encode(&self.index)?);
        hasher.update(encode(&self.reward_pool)?);
        for position in &self.positions {
            hasher.update(encode(position)?);
        }

        let result = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&result);
        Ok(out)
    }

    /// Whether the stored hash matches the contents.
    pub fn verify(&self) -> bool {
        matches!(self.compute_hash(), Ok(hash) if hash == self.hash)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        bincode::deserialize(bytes).map_err(|e| LedgerError::Snapshot(e.to_string()))
    }

    /// Rebuild ledger state. Checks the hash, the version, and the
    /// accounting invariants.
    pub(crate) fn into_state(self) -> Result<LedgerState, LedgerError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(LedgerError::Snapshot(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        if !self.verify() {
            return Err(LedgerError::Snapshot("hash mismatch".into()));
        }
        let reserved_claims = self.reward_pool.with_raw(0);
        let mut positions = std::collections::HashMap::with_capacity(self.positions.len());
        for position in self.positions {
            let owner = position.owner().clone();
            if positions.insert(owner.clone(), position).is_some() {
                return Err(LedgerError::Snapshot(format!("duplicate position for {owner}")));
            }
        }
        let latest_reading = self.index.last_update_time();
        let state = LedgerState {
            index: self.index,
            positions,
            reward_pool: self.reward_pool,
            reserved_claims,
            latest_reading,
        };
        state.check_invariants()?;
        Ok(state)
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, LedgerError> {
    bincode::serialize(value).map_err(|e| LedgerError::Snapshot(e.to_string()))
}
