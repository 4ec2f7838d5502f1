//! In-memory token used as the ledger's gateway in development and tests.
//!
//! Behaves like a minimal fungible token: balances, a per-owner allowance
//! granted to the staking ledger (`approve`), and a custody vault that
//! pulled stake and funded rewards sit in. Staked tokens and reward tokens
//! are the same token.

use std::collections::HashMap;

use accrue_types::{AccountId, AmountError, FixedPointAmount};
use tokio::sync::Mutex;
use tracing::debug;

use crate::gateway::{GatewayError, TokenGateway};

#[derive(Default)]
struct TokenBook {
    balances: HashMap<AccountId, u128>,
    /// Amount each owner has approved the ledger to pull.
    allowances: HashMap<AccountId, u128>,
    vault: u128,
    total_supply: u128,
}

pub struct MemoryToken {
    decimals: u8,
    zero: FixedPointAmount,
    book: Mutex<TokenBook>,
}

impl MemoryToken {
    pub fn new(decimals: u8) -> Result<Self, AmountError> {
        Ok(Self {
            decimals,
            zero: FixedPointAmount::zero(decimals)?,
            book: Mutex::new(TokenBook::default()),
        })
    }

    fn amount(&self, raw: u128) -> FixedPointAmount {
        self.zero.with_raw(raw)
    }

    fn check_scale(&self, amount: &FixedPointAmount) -> Result<(), GatewayError> {
        if amount.decimals() != self.decimals {
            return Err(GatewayError::ScaleMismatch {
                expected: self.decimals,
                actual: amount.decimals(),
            });
        }
        Ok(())
    }

    pub async fn balance_of(&self, owner: &AccountId) -> FixedPointAmount {
        let book = self.book.lock().await;
        self.amount(book.balances.get(owner).copied().unwrap_or(0))
    }

    pub async fn allowance(&self, owner: &AccountId) -> FixedPointAmount {
        let book = self.book.lock().await;
        self.amount(book.allowances.get(owner).copied().unwrap_or(0))
    }

    /// Allow the ledger to pull up to `amount` from `owner`. Replaces any
    /// previous allowance.
    pub async fn approve(&self, owner: &AccountId, amount: FixedPointAmount) -> Result<(), GatewayError> {
        self.check_scale(&amount)?;
        let mut book = self.book.lock().await;
        book.allowances.insert(owner.clone(), amount.raw());
        debug!(%owner, %amount, "allowance set");
        Ok(())
    }

    /// Create new tokens for `owner`.
    pub async fn mint(&self, owner: &AccountId, amount: FixedPointAmount) -> Result<(), GatewayError> {
        self.check_scale(&amount)?;
        let mut book = self.book.lock().await;
        let supply = book
            .total_supply
            .checked_add(amount.raw())
            .ok_or_else(|| GatewayError::Unavailable("total supply overflow".into()))?;
        let balance = book.balances.entry(owner.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount.raw())
            .ok_or_else(|| GatewayError::Unavailable("balance overflow".into()))?;
        book.total_supply = supply;
        debug!(%owner, %amount, "minted");
        Ok(())
    }

    /// Place `amount` directly into custody, e.g. to back a ledger restored
    /// from a snapshot. Counts toward total supply.
    pub async fn fund_vault(&self, amount: FixedPointAmount) -> Result<(), GatewayError> {
        self.check_scale(&amount)?;
        let mut book = self.book.lock().await;
        let supply = book
            .total_supply
            .checked_add(amount.raw())
            .ok_or_else(|| GatewayError::Unavailable("total supply overflow".into()))?;
        book.vault = book
            .vault
            .checked_add(amount.raw())
            .ok_or_else(|| GatewayError::Unavailable("vault overflow".into()))?;
        book.total_supply = supply;
        Ok(())
    }

    /// Tokens currently in ledger custody.
    pub async fn vault_balance(&self) -> FixedPointAmount {
        self.amount(self.book.lock().await.vault)
    }

    pub async fn total_supply(&self) -> FixedPointAmount {
        self.amount(self.book.lock().await.total_supply)
    }
}

impl TokenGateway for MemoryToken {
    fn decimals(&self) -> u8 {
        self.decimals
    }

    async fn pull(&self, owner: &AccountId, amount: FixedPointAmount) -> Result<(), GatewayError> {
        self.check_scale(&amount)?;
        let mut book = self.book.lock().await;
        let approved = book.allowances.get(owner).copied().unwrap_or(0);
        if approved < amount.raw() {
            return Err(GatewayError::InsufficientAllowance {
                account: owner.to_string(),
                needed: amount,
                approved: self.amount(approved),
            });
        }
        let balance = book.balances.get(owner).copied().unwrap_or(0);
        if balance < amount.raw() {
            return Err(GatewayError::InsufficientBalance {
                account: owner.to_string(),
                needed: amount,
                available: self.amount(balance),
            });
        }
        book.allowances.insert(owner.clone(), approved - amount.raw());
        book.balances.insert(owner.clone(), balance - amount.raw());
        book.vault += amount.raw();
        Ok(())
    }

    async fn push(&self, owner: &AccountId, amount: FixedPointAmount) -> Result<(), GatewayError> {
        self.check_scale(&amount)?;
        let mut book = self.book.lock().await;
        if book.vault < amount.raw() {
            return Err(GatewayError::InsufficientBalance {
                account: "vault".into(),
                needed: amount,
                available: self.amount(book.vault),
            });
        }
        book.vault -= amount.raw();
        *book.balances.entry(owner.clone()).or_insert(0) += amount.raw();
        Ok(())
    }
}
