//! # Custody Pool
//!
//! The vault's live holdings of real assets, per currency. This is the
//! seam between the accounting engine and the host's asset-transfer
//! primitives, which are external collaborators:
//!
//! - [`CustodyPool::deposit`] is what a physical transfer *into* the vault
//!   looks like from in here. It raises the held balance and nothing else
//!   — deliberately. Only reconciliation (diffing against an armed
//!   snapshot) turns a deposit into ledger credit, so a depositor cannot
//!   lie about amounts.
//! - [`CustodyPool::transfer_out`] lowers the held balance and journals
//!   the outbound movement per recipient, so collaborators and tests can
//!   observe what actually left.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::currency::{Address, Currency};
use crate::error::{Result, VaultError};

/// The vault's held asset balances and outbound journal.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CustodyPool {
    /// Held balance per currency.
    #[serde(with = "crate::currency::keyed_map")]
    held: HashMap<Currency, u128>,

    /// Cumulative amount transferred out, per `(recipient, currency)`.
    #[serde(with = "crate::currency::keyed_map")]
    outbound: HashMap<(Address, Currency), u128>,
}

impl CustodyPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// The vault's held balance of a currency.
    pub fn balance_of(&self, currency: Currency) -> u128 {
        self.held.get(&currency).copied().unwrap_or(0)
    }

    /// Cumulative amount sent to `recipient` in `currency`.
    pub fn paid_out(&self, recipient: Address, currency: Currency) -> u128 {
        self.outbound
            .get(&(recipient, currency))
            .copied()
            .unwrap_or(0)
    }

    /// Records a physical transfer into the vault.
    ///
    /// # Errors
    ///
    /// [`VaultError::AmountOverflow`] on `u128` overflow.
    pub fn deposit(&mut self, currency: Currency, amount: u128) -> Result<u128> {
        let entry = self.held.entry(currency).or_insert(0);
        let new = entry
            .checked_add(amount)
            .ok_or(VaultError::AmountOverflow { currency })?;
        *entry = new;
        Ok(new)
    }

    /// Transfers `amount` of `currency` out of the vault to `to`.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientVaultBalance`] if the pool holds less
    /// than `amount`.
    pub fn transfer_out(&mut self, currency: Currency, to: Address, amount: u128) -> Result<u128> {
        let available = self.balance_of(currency);
        let new = available
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientVaultBalance {
                currency,
                available,
                requested: amount,
            })?;
        self.held.insert(currency, new);

        let sent = self.outbound.entry((to, currency)).or_insert(0);
        *sent = sent.saturating_add(amount);
        Ok(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usdc() -> Currency {
        Currency::token(Address::derive("usdc"))
    }

    fn recipient() -> Address {
        Address::derive("recipient")
    }

    #[test]
    fn deposit_accumulates() {
        let mut pool = CustodyPool::new();
        assert_eq!(pool.deposit(usdc(), 100).unwrap(), 100);
        assert_eq!(pool.deposit(usdc(), 50).unwrap(), 150);
        assert_eq!(pool.balance_of(usdc()), 150);
        assert_eq!(pool.balance_of(Currency::NATIVE), 0);
    }

    #[test]
    fn transfer_out_debits_and_journals() {
        let mut pool = CustodyPool::new();
        pool.deposit(usdc(), 100).unwrap();

        let remaining = pool.transfer_out(usdc(), recipient(), 60).unwrap();
        assert_eq!(remaining, 40);
        assert_eq!(pool.balance_of(usdc()), 40);
        assert_eq!(pool.paid_out(recipient(), usdc()), 60);

        pool.transfer_out(usdc(), recipient(), 10).unwrap();
        assert_eq!(pool.paid_out(recipient(), usdc()), 70);
    }

    #[test]
    fn transfer_out_past_holdings_rejected() {
        let mut pool = CustodyPool::new();
        pool.deposit(usdc(), 10).unwrap();

        let result = pool.transfer_out(usdc(), recipient(), 11);
        assert!(matches!(
            result,
            Err(VaultError::InsufficientVaultBalance {
                available: 10,
                requested: 11,
                ..
            })
        ));
        assert_eq!(pool.balance_of(usdc()), 10);
        assert_eq!(pool.paid_out(recipient(), usdc()), 0);
    }

    #[test]
    fn deposit_overflow_rejected() {
        let mut pool = CustodyPool::new();
        pool.deposit(usdc(), u128::MAX).unwrap();
        assert!(matches!(
            pool.deposit(usdc(), 1),
            Err(VaultError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn serialization_roundtrip() {
        let mut pool = CustodyPool::new();
        pool.deposit(usdc(), 80).unwrap();
        pool.transfer_out(usdc(), recipient(), 30).unwrap();

        let json = serde_json::to_string(&pool).expect("serialize");
        let recovered: CustodyPool = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered.balance_of(usdc()), 50);
        assert_eq!(recovered.paid_out(recipient(), usdc()), 30);
    }
}
