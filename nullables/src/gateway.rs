//! Nullable token gateway. Scripted transfers for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use accrue_ledger::{GatewayError, TokenGateway};
use accrue_types::{AccountId, AmountError, FixedPointAmount};
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    Pull,
    Push,
}

/// One transfer the ledger asked for, and whether it went through.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayCall {
    pub kind: CallKind,
    pub owner: AccountId,
    pub amount: FixedPointAmount,
    pub succeeded: bool,
}

struct Book {
    custody: u128,
    calls: Vec<GatewayCall>,
}

struct Shared {
    decimals: u8,
    zero: FixedPointAmount,
    fail_pulls: AtomicBool,
    fail_pushes: AtomicBool,
    /// `true` while pulls may proceed.
    pull_gate: watch::Sender<bool>,
    /// `true` while pushes may proceed.
    push_gate: watch::Sender<bool>,
    /// Transfers that have started, including ones held at the gate.
    started: watch::Sender<usize>,
    book: Mutex<Book>,
}

/// A token gateway that records transfers instead of moving real tokens.
///
/// Pulls always have funds; pushes are paid from what was pulled so far.
/// Failures can be switched on per direction, and [`pause`](Self::pause)
/// holds transfers mid-flight until [`resume`](Self::resume). Clones share
/// the same script and log.
#[derive(Clone)]
pub struct NullGateway {
    shared: Arc<Shared>,
}

impl NullGateway {
    pub fn new(decimals: u8) -> Result<Self, AmountError> {
        let zero = FixedPointAmount::zero(decimals)?;
        let (pull_gate, _) = watch::channel(true);
        let (push_gate, _) = watch::channel(true);
        let (started, _) = watch::channel(0);
        Ok(Self {
            shared: Arc::new(Shared {
                decimals,
                zero,
                fail_pulls: AtomicBool::new(false),
                fail_pushes: AtomicBool::new(false),
                pull_gate,
                push_gate,
                started,
                book: Mutex::new(Book {
                    custody: 0,
                    calls: Vec::new(),
                }),
            }),
        })
    }

    pub fn fail_pulls(&self, fail: bool) {
        self.shared.fail_pulls.store(fail, Ordering::SeqCst);
    }

    pub fn fail_pushes(&self, fail: bool) {
        self.shared.fail_pushes.store(fail, Ordering::SeqCst);
    }

    /// Hold new and waiting transfers until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.shared.pull_gate.send_replace(false);
        self.shared.push_gate.send_replace(false);
    }

    /// Hold pushes only; pulls keep going through.
    pub fn pause_pushes(&self) {
        self.shared.push_gate.send_replace(false);
    }

    pub fn resume(&self) {
        self.shared.pull_gate.send_replace(true);
        self.shared.push_gate.send_replace(true);
    }

    /// Wait until at least `count` transfers have started.
    pub async fn wait_for_started(&self, count: usize) {
        let mut started = self.shared.started.subscribe();
        let _ = started.wait_for(|n| *n >= count).await;
    }

    /// Net tokens held: everything pulled minus everything pushed.
    pub fn custody(&self) -> FixedPointAmount {
        let raw = self.book().custody;
        self.amount(raw)
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.book().calls.clone()
    }

    /// Total successfully moved in one direction.
    pub fn total(&self, kind: CallKind) -> FixedPointAmount {
        let raw = self
            .book()
            .calls
            .iter()
            .filter(|c| c.kind == kind && c.succeeded)
            .map(|c| c.amount.raw())
            .sum();
        self.amount(raw)
    }

    fn amount(&self, raw: u128) -> FixedPointAmount {
        self.shared.zero.with_raw(raw)
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.shared.book.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn transfer(
        &self,
        kind: CallKind,
        owner: &AccountId,
        amount: FixedPointAmount,
    ) -> Result<(), GatewayError> {
        self.shared.started.send_modify(|n| *n += 1);
        let mut gate = match kind {
            CallKind::Pull => self.shared.pull_gate.subscribe(),
            CallKind::Push => self.shared.push_gate.subscribe(),
        };
        let _ = gate.wait_for(|open| *open).await;

        let result = self.apply(kind, amount);
        self.book().calls.push(GatewayCall {
            kind,
            owner: owner.clone(),
            amount,
            succeeded: result.is_ok(),
        });
        result
    }

    fn apply(&self, kind: CallKind, amount: FixedPointAmount) -> Result<(), GatewayError> {
        if amount.decimals() != self.shared.decimals {
            return Err(GatewayError::ScaleMismatch {
                expected: self.shared.decimals,
                actual: amount.decimals(),
            });
        }
        let mut book = self.book();
        match kind {
            CallKind::Pull => {
                if self.shared.fail_pulls.load(Ordering::SeqCst) {
                    return Err(GatewayError::Unavailable("scripted pull failure".into()));
                }
                book.custody = book
                    .custody
                    .checked_add(amount.raw())
                    .ok_or_else(|| GatewayError::Unavailable("custody overflow".into()))?;
            }
            CallKind::Push => {
                if self.shared.fail_pushes.load(Ordering::SeqCst) {
                    return Err(GatewayError::Unavailable("scripted push failure".into()));
                }
                if book.custody < amount.raw() {
                    return Err(GatewayError::InsufficientBalance {
                        account: "custody".into(),
                        needed: amount,
                        available: amount.with_raw(book.custody),
                    });
                }
                book.custody -= amount.raw();
            }
        }
        Ok(())
    }
}

impl TokenGateway for NullGateway {
    fn decimals(&self) -> u8 {
        self.shared.decimals
    }

    async fn pull(&self, owner: &AccountId, amount: FixedPointAmount) -> Result<(), GatewayError> {
        self.transfer(CallKind::Pull, owner, amount).await
    }

    async fn push(&self, owner: &AccountId, amount: FixedPointAmount) -> Result<(), GatewayError> {
        self.transfer(CallKind::Push, owner, amount).await
    }
}
