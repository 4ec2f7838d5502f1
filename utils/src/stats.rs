//! Counters for ledger operations, reported in name order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operation counts keyed by a fixed set of names.
///
/// The set is closed at construction: bumping a name that was not
/// registered does nothing, and reading it gives zero.
pub struct StatsCounter {
    slots: BTreeMap<&'static str, AtomicU64>,
}

impl StatsCounter {
    pub fn new(names: &[&'static str]) -> Self {
        Self {
            slots: names.iter().map(|&name| (name, AtomicU64::default())).collect(),
        }
    }

    pub fn increment(&self, name: &str) {
        if let Some(slot) = self.slots.get(name) {
            slot.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get(&self, name: &str) -> u64 {
        self.slots.get(name).map_or(0, |slot| slot.load(Ordering::Relaxed))
    }

    /// Every registered counter, zero or not.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.slots
            .iter()
            .map(|(&name, slot)| (name, slot.load(Ordering::Relaxed)))
            .collect()
    }
}
