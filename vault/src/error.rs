//! # Error Taxonomy
//!
//! Every fallible vault operation returns [`VaultError`]. The variants map
//! one-to-one onto the failure classes of the accounting engine:
//! authorization, session, settlement, write-off, and checked arithmetic.
//!
//! All of these are fatal to the enclosing envelope. There is no partial
//! application and no retry: an error that escapes the envelope callback
//! rolls the whole session back, because a half-settled ledger would break
//! the conservation invariant the close-time check exists to enforce.

use thiserror::Error;

use crate::currency::{Address, Currency};

/// Errors produced by the vault's accounting engine.
#[derive(Debug, Error)]
pub enum VaultError {
    // -- authorization ------------------------------------------------------
    /// The caller is not the vault owner.
    #[error("unauthorized: {caller} is not the vault owner")]
    NotOwner {
        /// The address that attempted the owner-gated call.
        caller: Address,
    },

    /// The acting app is not in the registry.
    #[error("app not registered: {app}")]
    AppUnregistered {
        /// The address that was expected to be a registered app.
        app: Address,
    },

    /// A spender tried to move more claim balance than its allowance covers.
    #[error(
        "insufficient allowance: {spender} may spend {available} of {currency} \
         for {owner}, requested {requested}"
    )]
    InsufficientAllowance {
        /// The claim owner.
        owner: Address,
        /// The spender whose allowance fell short.
        spender: Address,
        /// The currency being spent.
        currency: Currency,
        /// The recorded allowance.
        available: u128,
        /// The amount the spender tried to move.
        requested: u128,
    },

    // -- session ------------------------------------------------------------
    /// A ledger-mutating call arrived with no envelope open.
    #[error("no locker: operation requires an open envelope")]
    NoLocker,

    /// A second top-level envelope was attempted while one is active.
    #[error("locker already set: {holder} holds the envelope")]
    LockerAlreadySet {
        /// The party currently holding the envelope.
        holder: Address,
    },

    // -- settlement ---------------------------------------------------------
    /// The envelope closed with a nonzero outstanding delta.
    #[error("currency not settled at envelope close: {currency}")]
    CurrencyNotSettled {
        /// A currency with a nonzero delta left on the books.
        currency: Currency,
    },

    /// Native value was attached to a reconciliation whose armed currency
    /// is not the native asset (or nothing is armed at all).
    #[error("native value attached but armed currency is {armed:?}")]
    SettleNonNativeCurrencyWithValue {
        /// The currently armed currency, if any.
        armed: Option<Currency>,
    },

    /// A fee withdrawal targeted the currently armed currency, which would
    /// corrupt the in-flight balance snapshot.
    #[error("fee currency is armed for reconciliation: {currency}")]
    FeeCurrencySynced {
        /// The armed currency the fee collection collided with.
        currency: Currency,
    },

    // -- write-off ----------------------------------------------------------
    /// A write-off did not match an exactly-positive outstanding delta.
    #[error(
        "write-off must clear an exact positive delta: outstanding {outstanding}, \
         requested {requested} ({currency})"
    )]
    MustClearExactPositiveDelta {
        /// The currency whose delta was targeted.
        currency: Currency,
        /// The locker's current outstanding delta.
        outstanding: i128,
        /// The amount the caller tried to write off.
        requested: u128,
    },

    // -- arithmetic ---------------------------------------------------------
    /// An app's reserve would go negative.
    #[error(
        "insufficient reserve: app {app} holds {available} of {currency}, \
         requested {requested}"
    )]
    InsufficientReserve {
        /// The app whose reserve fell short.
        app: Address,
        /// The currency being debited.
        currency: Currency,
        /// The current reserve.
        available: u128,
        /// The amount of the attempted debit.
        requested: u128,
    },

    /// A claim balance would go negative.
    #[error(
        "insufficient claim balance: {owner} holds {available} of {currency}, \
         requested {requested}"
    )]
    InsufficientClaimBalance {
        /// The claim owner.
        owner: Address,
        /// The currency being burned or transferred.
        currency: Currency,
        /// The current claim balance.
        available: u128,
        /// The amount of the attempted debit.
        requested: u128,
    },

    /// The custody pool holds less of a currency than a transfer-out needs.
    #[error(
        "insufficient vault balance: pool holds {available} of {currency}, \
         requested {requested}"
    )]
    InsufficientVaultBalance {
        /// The currency being transferred out.
        currency: Currency,
        /// The pool's held balance.
        available: u128,
        /// The amount of the attempted transfer.
        requested: u128,
    },

    /// A checked addition overflowed its integer type.
    ///
    /// Amounts are `u128`/`i128`; hitting this in practice means a caller
    /// is feeding in adversarial values, and aborting the envelope is the
    /// correct response.
    #[error("amount overflow while accounting {currency}")]
    AmountOverflow {
        /// The currency whose book overflowed.
        currency: Currency,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_render() {
        let e = VaultError::InsufficientReserve {
            app: Address::derive("app"),
            currency: Currency::NATIVE,
            available: 10,
            requested: 25,
        };
        let msg = e.to_string();
        assert!(msg.contains("insufficient reserve"));
        assert!(msg.contains("10"));
        assert!(msg.contains("25"));
    }

    #[test]
    fn settle_with_value_mentions_armed_state() {
        let e = VaultError::SettleNonNativeCurrencyWithValue { armed: None };
        assert!(e.to_string().contains("None"));
    }
}
