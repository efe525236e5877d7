//! # Claim-Token Ledger
//!
//! Durable, transferable internal credits against the vault. A claim
//! balance is what a party gets when it converts a settled positive delta
//! into something that outlives the envelope (a mint), and what it spends
//! to re-open a settleable debit later (a burn). No real assets move in
//! either direction — claims are bookkeeping over custody that already
//! happened.
//!
//! The spending model is the familiar token triple: per-currency balances,
//! per-spender allowances, and an operator override. An allowance of
//! [`PERMANENT_ALLOWANCE`] (`u128::MAX`) is the "infinite approval"
//! sentinel and is never decremented by spends. Operators bypass
//! allowances entirely.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::currency::{Address, Currency};
use crate::error::{Result, VaultError};

/// Allowance sentinel meaning "unlimited, never decremented".
pub const PERMANENT_ALLOWANCE: u128 = u128::MAX;

/// Claim balances, allowances, and operator flags.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClaimLedger {
    /// `(owner, currency) → balance`.
    #[serde(with = "crate::currency::keyed_map")]
    balances: HashMap<(Address, Currency), u128>,

    /// `(owner, spender, currency) → allowance`.
    #[serde(with = "crate::currency::keyed_map")]
    allowances: HashMap<(Address, Address, Currency), u128>,

    /// `(owner, operator)` pairs with the operator flag set.
    operators: HashSet<(Address, Address)>,
}

impl ClaimLedger {
    /// Creates an empty claim ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Balances
    // -----------------------------------------------------------------------

    /// Returns an owner's claim balance for a currency.
    pub fn balance(&self, owner: Address, currency: Currency) -> u128 {
        self.balances.get(&(owner, currency)).copied().unwrap_or(0)
    }

    /// Mints `amount` of claim balance to `owner`.
    ///
    /// # Errors
    ///
    /// [`VaultError::AmountOverflow`] on `u128` overflow.
    pub fn mint(&mut self, owner: Address, currency: Currency, amount: u128) -> Result<u128> {
        let entry = self.balances.entry((owner, currency)).or_insert(0);
        let new = entry
            .checked_add(amount)
            .ok_or(VaultError::AmountOverflow { currency })?;
        *entry = new;
        Ok(new)
    }

    /// Burns `amount` of claim balance from `owner`.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientClaimBalance`] if the balance falls short.
    pub fn burn(&mut self, owner: Address, currency: Currency, amount: u128) -> Result<u128> {
        let available = self.balance(owner, currency);
        let new = available
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientClaimBalance {
                owner,
                currency,
                available,
                requested: amount,
            })?;
        self.balances.insert((owner, currency), new);
        Ok(new)
    }

    /// Moves claim balance between owners. Validates both legs before
    /// writing either, so a failed transfer mutates nothing.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        currency: Currency,
        amount: u128,
    ) -> Result<()> {
        let from_available = self.balance(from, currency);
        let from_new =
            from_available
                .checked_sub(amount)
                .ok_or(VaultError::InsufficientClaimBalance {
                    owner: from,
                    currency,
                    available: from_available,
                    requested: amount,
                })?;
        let to_new = self
            .balance(to, currency)
            .checked_add(amount)
            .ok_or(VaultError::AmountOverflow { currency })?;

        self.balances.insert((from, currency), from_new);
        self.balances.insert((to, currency), to_new);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Allowances & Operators
    // -----------------------------------------------------------------------

    /// Returns the recorded allowance for `(owner, spender, currency)`.
    pub fn allowance(&self, owner: Address, spender: Address, currency: Currency) -> u128 {
        self.allowances
            .get(&(owner, spender, currency))
            .copied()
            .unwrap_or(0)
    }

    /// Sets an allowance. `PERMANENT_ALLOWANCE` makes it unlimited.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        currency: Currency,
        amount: u128,
    ) {
        self.allowances.insert((owner, spender, currency), amount);
    }

    /// Returns `true` if `operator` may act for `owner` without allowance.
    pub fn is_operator(&self, owner: Address, operator: Address) -> bool {
        self.operators.contains(&(owner, operator))
    }

    /// Sets or clears the operator flag for `(owner, operator)`.
    pub fn set_operator(&mut self, owner: Address, operator: Address, approved: bool) {
        if approved {
            self.operators.insert((owner, operator));
        } else {
            self.operators.remove(&(owner, operator));
        }
    }

    /// Authorizes `spender` to move `amount` of `owner`'s claims.
    ///
    /// The owner and operators pass without touching allowances. Anyone
    /// else consumes allowance, except the permanent sentinel which is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// [`VaultError::InsufficientAllowance`] if the recorded allowance is
    /// smaller than `amount`.
    pub fn authorize_spend(
        &mut self,
        owner: Address,
        spender: Address,
        currency: Currency,
        amount: u128,
    ) -> Result<()> {
        if spender == owner || self.is_operator(owner, spender) {
            return Ok(());
        }

        let available = self.allowance(owner, spender, currency);
        if available == PERMANENT_ALLOWANCE {
            return Ok(());
        }

        let remaining =
            available
                .checked_sub(amount)
                .ok_or(VaultError::InsufficientAllowance {
                    owner,
                    spender,
                    currency,
                    available,
                    requested: amount,
                })?;
        self.allowances.insert((owner, spender, currency), remaining);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
