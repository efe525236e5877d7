//! # Event Journal
//!
//! State transitions that external collaborators index — app registration,
//! claim-token movement, approvals, fee collection — are recorded as
//! [`VaultEvent`]s. The journal lives *inside* the vault state on purpose:
//! an envelope that fails and rolls back also rolls back the events it
//! emitted, so indexers never see transitions that didn't happen.
//!
//! Each record is mirrored to `tracing` at debug level when it is written,
//! which is the live observability path; the journal itself is the
//! queryable history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::currency::{Address, Currency};

// ---------------------------------------------------------------------------
// VaultEvent
// ---------------------------------------------------------------------------

/// A state transition worth indexing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// An app was added to the registry (first registration only).
    AppRegistered {
        /// The newly registered app.
        app: Address,
    },

    /// An operator flag was set or cleared.
    OperatorSet {
        /// The claim owner granting the flag.
        owner: Address,
        /// The operator address.
        operator: Address,
        /// The new flag value.
        approved: bool,
    },

    /// A spending allowance was set.
    Approval {
        /// The claim owner.
        owner: Address,
        /// The approved spender.
        spender: Address,
        /// The currency the allowance covers.
        currency: Currency,
        /// The allowance amount (`u128::MAX` is the permanent sentinel).
        amount: u128,
    },

    /// Claim balance moved. Covers mint (`from: None`), burn (`to: None`),
    /// and owner-to-owner transfer (both set).
    ClaimTransfer {
        /// The caller that triggered the movement.
        by: Address,
        /// Source owner; `None` for a mint.
        from: Option<Address>,
        /// Destination owner; `None` for a burn.
        to: Option<Address>,
        /// The claim currency.
        currency: Currency,
        /// The amount moved.
        amount: u128,
    },

    /// A registered app withdrew accrued fees from its reserve.
    FeeCollected {
        /// The app whose reserve was debited.
        app: Address,
        /// The fee currency.
        currency: Currency,
        /// The amount withdrawn.
        amount: u128,
        /// The recipient of the transfer.
        to: Address,
    },
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// A journaled event with the time it was recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// The transition that occurred.
    pub event: VaultEvent,
    /// When it was recorded (UTC).
    pub at: DateTime<Utc>,
}

/// Append-only journal of vault events.
///
/// Cheap to clone (it is part of the envelope snapshot) and fully
/// serializable with the rest of the vault state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and mirrors it to `tracing`.
    pub fn record(&mut self, event: VaultEvent) {
        tracing::debug!(?event, "vault event");
        self.records.push(EventRecord {
            event,
            at: Utc::now(),
        });
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Number of journaled events.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been journaled.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
