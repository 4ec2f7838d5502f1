//! Time source for reward settlement.

use accrue_types::Timestamp;

/// Where the ledger reads "now" from.
///
/// Readings are expected to be non-decreasing. The ledger rejects a reading
/// older than one it already accepted instead of clamping it.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in whole seconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
