//! # Settlement Sync Slot
//!
//! A single-slot register holding the one currency currently "armed" for
//! reconciliation, together with the vault's held balance of that currency
//! at the moment it was armed. Reconciliation later diffs the live balance
//! against this snapshot to infer how much was physically deposited —
//! the vault observes transfers rather than trusting declared amounts.
//!
//! At most one currency is armed at a time. Re-arming with a different
//! currency silently replaces the previous snapshot; only the most recent
//! arm matters.

use serde::{Deserialize, Serialize};

use crate::currency::Currency;

/// The armed currency and its balance at arm time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// The currency armed for reconciliation.
    pub currency: Currency,
    /// The vault's held balance of `currency` when it was armed.
    pub balance: u128,
}

/// Single-slot holder for the armed snapshot.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SyncSlot {
    armed: Option<SyncSnapshot>,
}

impl SyncSlot {
    /// Creates a disarmed slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a currency, replacing any prior snapshot without validation.
    pub fn arm(&mut self, currency: Currency, balance: u128) {
        self.armed = Some(SyncSnapshot { currency, balance });
    }

    /// Takes the snapshot out of the slot, disarming it.
    pub fn disarm(&mut self) -> Option<SyncSnapshot> {
        self.armed.take()
    }

    /// The current snapshot, if armed.
    pub fn armed(&self) -> Option<SyncSnapshot> {
        self.armed
    }

    /// Returns `true` if `currency` is the currently armed currency.
    pub fn is_armed_for(&self, currency: Currency) -> bool {
        matches!(self.armed, Some(snap) if snap.currency == currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Address;

    fn usdc() -> Currency {
        Currency::token(Address::derive("usdc"))
    }

    #[test]
    fn starts_disarmed() {
        let slot = SyncSlot::new();
        assert!(slot.armed().is_none());
        assert!(!slot.is_armed_for(usdc()));
    }

    #[test]
    fn arm_and_disarm() {
        let mut slot = SyncSlot::new();
        slot.arm(usdc(), 500);

        let snap = slot.armed().unwrap();
        assert_eq!(snap.currency, usdc());
        assert_eq!(snap.balance, 500);
        assert!(slot.is_armed_for(usdc()));

        let taken = slot.disarm().unwrap();
        assert_eq!(taken.balance, 500);
        assert!(slot.armed().is_none());
    }

    #[test]
    fn rearm_replaces_snapshot() {
        let mut slot = SyncSlot::new();
        slot.arm(usdc(), 500);
        slot.arm(Currency::NATIVE, 9);

        let snap = slot.armed().unwrap();
        assert_eq!(snap.currency, Currency::NATIVE);
        assert_eq!(snap.balance, 9);
        assert!(!slot.is_armed_for(usdc()));
    }
}
