//! Bounded receipt cache for mutating request de-duplication.
//!
//! A client that retries a `stake`, `withdraw`, `claim_reward`, or
//! `fund_pool` call with the same request id gets the recorded response back
//! instead of having the operation applied twice. Only successful responses
//! are recorded; a failed attempt may be retried.

use std::collections::{HashMap, VecDeque};

use accrue_types::{AccountId, RequestId};
use serde_json::Value;

/// Default number of receipts remembered.
pub const DEFAULT_DEDUP_CAPACITY: usize = 10_000;

/// Receipts are scoped to the account making the request.
pub type ReceiptKey = (AccountId, RequestId);

#[derive(Clone, Debug, PartialEq)]
enum Receipt {
    InFlight,
    Done(Value),
}

/// Outcome of [`ReceiptCache::begin`].
#[derive(Clone, Debug, PartialEq)]
pub enum Admission {
    /// First time this key is seen; the caller must `complete` or `abandon` it.
    Fresh,
    /// Another request with the same key is still running.
    InFlight,
    /// Already applied; this is the recorded response.
    Replay(Value),
}

/// Keeps the last `capacity` receipts in insertion order and evicts the
/// oldest once full.
pub struct ReceiptCache {
    capacity: usize,
    receipts: HashMap<ReceiptKey, Receipt>,
    order: VecDeque<ReceiptKey>,
}

impl ReceiptCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            receipts: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Claim `key` for a new request, or report what is already recorded.
    pub fn begin(&mut self, key: &ReceiptKey) -> Admission {
        match self.receipts.get(key) {
            Some(Receipt::InFlight) => return Admission::InFlight,
            Some(Receipt::Done(value)) => return Admission::Replay(value.clone()),
            None => {}
        }
        while self.receipts.len() >= self.capacity {
            match self.order.pop_front() {
                Some(old) => {
                    self.receipts.remove(&old);
                }
                None => break,
            }
        }
        self.receipts.insert(key.clone(), Receipt::InFlight);
        self.order.push_back(key.clone());
        Admission::Fresh
    }

    /// Record the successful response for `key`.
    pub fn complete(&mut self, key: &ReceiptKey, response: Value) {
        if let Some(receipt) = self.receipts.get_mut(key) {
            *receipt = Receipt::Done(response);
        }
    }

    /// Forget `key` after a failed attempt.
    pub fn abandon(&mut self, key: &ReceiptKey) {
        if self.receipts.remove(key).is_some() {
            self.order.retain(|k| k != key);
        }
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

impl Default for ReceiptCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
