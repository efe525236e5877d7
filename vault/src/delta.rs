//! # Signed-Delta Ledger
//!
//! The per-session heart of flash accounting: a `(party, currency) → i128`
//! book of outstanding obligations. Positive means the vault owes the
//! party; negative means the party owes the vault. Deltas accumulate
//! freely while an envelope is open and must all return to zero before it
//! may close.
//!
//! ## Session Generations
//!
//! Deltas are logically transient — they exist only inside one envelope.
//! Rather than trusting an external reset, every slot is tagged with the
//! session generation that wrote it, and reads of a slot from an older
//! generation return zero. A host that restores serialized state with
//! stale entries (or a session that aborted without cleanup) therefore
//! cannot leak obligations into the next envelope.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::currency::{Address, Currency};
use crate::error::{Result, VaultError};

// ---------------------------------------------------------------------------
// DeltaSlot
// ---------------------------------------------------------------------------

/// One obligation slot, tagged with the generation that wrote it.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct DeltaSlot {
    /// Session generation at the time of the last write.
    session: u64,
    /// Signed outstanding obligation.
    value: i128,
}

// ---------------------------------------------------------------------------
// DeltaLedger
// ---------------------------------------------------------------------------

/// Session-scoped signed obligations for every party and currency.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DeltaLedger {
    /// The current session generation. Zero means no session has opened.
    session: u64,

    /// Obligation slots, created lazily on first touch.
    #[serde(with = "crate::currency::keyed_map")]
    slots: HashMap<(Address, Currency), DeltaSlot>,
}

impl DeltaLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current session generation.
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Starts a new session generation.
    ///
    /// Slots left at zero by prior sessions are pruned; anything nonzero
    /// is kept (it is unreadable thanks to the generation guard, but it is
    /// evidence of a session that did not exit cleanly, so we don't erase
    /// it silently).
    pub fn begin_session(&mut self, session: u64) {
        self.slots.retain(|_, slot| slot.value != 0);
        self.session = session;
    }

    /// Returns the outstanding delta for a party and currency.
    ///
    /// Slots written by an older generation read as zero.
    pub fn get(&self, party: Address, currency: Currency) -> i128 {
        match self.slots.get(&(party, currency)) {
            Some(slot) if slot.session == self.session => slot.value,
            _ => 0,
        }
    }

    /// Applies a signed delta to a party's obligation for a currency.
    ///
    /// Returns `(previous, new)` values. A stale slot counts as zero
    /// before the delta is applied.
    ///
    /// # Errors
    ///
    /// [`VaultError::AmountOverflow`] if the addition overflows `i128`.
    pub fn apply(
        &mut self,
        party: Address,
        currency: Currency,
        delta: i128,
    ) -> Result<(i128, i128)> {
        let previous = self.get(party, currency);
        let new = previous
            .checked_add(delta)
            .ok_or(VaultError::AmountOverflow { currency })?;

        self.slots.insert(
            (party, currency),
            DeltaSlot {
                session: self.session,
                value: new,
            },
        );
        Ok((previous, new))
    }

    /// The distinct currencies written during the current session.
    pub fn touched(&self) -> Vec<Currency> {
        let mut currencies: Vec<Currency> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.session == self.session)
            .map(|((_, currency), _)| *currency)
            .collect();
        currencies.sort();
        currencies.dedup();
        currencies
    }

    /// Returns a currency with a nonzero obligation this session, if any.
    ///
    /// This is the envelope's close-time settlement check. The smallest
    /// offending currency is returned so that the failure is deterministic
    /// regardless of map iteration order.
    pub fn unsettled(&self) -> Option<Currency> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.session == self.session && slot.value != 0)
            .map(|((_, currency), _)| *currency)
            .min()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
