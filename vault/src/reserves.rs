//! # Reserve Accounting
//!
//! Each registered app's private view of "funds currently backing my
//! positions": a `(app, currency) → u128` book of settled balances,
//! distinct from the global custody pool. Reserves move only as the
//! mirror image of deltas the app records (double-entry discipline) and
//! when the app withdraws accrued fees.
//!
//! A reserve can never go negative. A debit past zero is a hard error —
//! this is the mechanism that stops an app from crediting a locker with
//! more than the app actually holds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::currency::{Address, Currency};
use crate::error::{Result, VaultError};

/// Settled per-app, per-currency balances.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReserveBook {
    #[serde(with = "crate::currency::keyed_map")]
    reserves: HashMap<(Address, Currency), u128>,
}

impl ReserveBook {
    /// Creates an empty reserve book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an app's reserve for a currency (zero if never touched).
    pub fn get(&self, app: Address, currency: Currency) -> u128 {
        self.reserves.get(&(app, currency)).copied().unwrap_or(0)
    }

    /// Credits an app's reserve.
    ///
    /// # Errors
    ///
    /// [`VaultError::AmountOverflow`] if the credit would exceed `u128::MAX`.
    pub fn credit(&mut self, app: Address, currency: Currency, amount: u128) -> Result<u128> {
        let entry = self.reserves.entry((app, currency)).or_insert(0);
        let new = entry
            .checked_add(amount)
            .ok_or(VaultError::AmountOverflow { currency })?;
        *entry = new;
        Ok(new)
    }

    /// Debits an app's reserve.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientReserve`] if the debit would go negative.
    pub fn debit(&mut self, app: Address, currency: Currency, amount: u128) -> Result<u128> {
        let available = self.get(app, currency);
        let new = available
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientReserve {
                app,
                currency,
                available,
                requested: amount,
            })?;
        self.reserves.insert((app, currency), new);
        Ok(new)
    }

    /// Dry-run of [`debit`](Self::debit): the value the reserve would hold
    /// afterwards, without mutating anything. Used by validate-then-commit
    /// entry points.
    pub fn checked_debit(&self, app: Address, currency: Currency, amount: u128) -> Result<u128> {
        let available = self.get(app, currency);
        available
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientReserve {
                app,
                currency,
                available,
                requested: amount,
            })
    }

    /// Dry-run of [`credit`](Self::credit).
    pub fn checked_credit(&self, app: Address, currency: Currency, amount: u128) -> Result<u128> {
        self.get(app, currency)
            .checked_add(amount)
            .ok_or(VaultError::AmountOverflow { currency })
    }

    /// Overwrites a reserve with a precomputed value. Pairs with the
    /// `checked_*` dry-runs to commit a validated multi-leg update.
    pub fn set(&mut self, app: Address, currency: Currency, value: u128) {
        self.reserves.insert((app, currency), value);
    }
}
