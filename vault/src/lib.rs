// Copyright (c) 2026 FlashVault Contributors. MIT License.
// See LICENSE for details.

//! # FlashVault — Flash-Accounting Settlement Vault
//!
//! A shared settlement ledger that lets independent accounting engines
//! ("apps") and their extension callbacks ("hooks") transact against a
//! common pool of custodied assets using deferred, batched accounting
//! instead of per-operation transfers.
//!
//! The core idea: inside one *envelope* (a lock/unlock session held by a
//! single top-level caller), obligations accumulate as signed deltas on a
//! per-party, per-currency ledger. Assets only physically move through a
//! handful of primitives — withdraw, deposit-then-reconcile, fee
//! collection — and the envelope refuses to close until every delta
//! written during the session is back to zero. Flash-style overdrafts are
//! legal mid-session precisely because the close-time check, not any
//! per-call limit, is what enforces conservation.
//!
//! ## Architecture
//!
//! ```text
//! currency.rs — Address & Currency identifiers, map-key serde helpers
//! error.rs    — VaultError taxonomy
//! events.rs   — journaled vault events, mirrored to tracing
//! delta.rs    — session-scoped signed-delta ledger (generation-guarded)
//! reserves.rs — per-app settled reserve book
//! sync.rs     — single-slot armed balance snapshot
//! claims.rs   — claim-token ledger: balances, allowances, operators
//! custody.rs  — the vault's held assets; transfer-in/out seam
//! registry.rs — owner-gated app allow-list
//! vault.rs    — the Vault: envelope + every entry point
//! shared.rs   — Arc<RwLock<Vault>> handle for multi-owner access
//! ```
//!
//! ## Design Principles
//!
//! 1. **All amounts are integers in smallest units.** Balances are `u128`,
//!    obligations are `i128`, every operation is checked arithmetic, and
//!    an overflow aborts the envelope instead of wrapping.
//!
//! 2. **Observed, not declared.** Reconciliation infers deposits by
//!    diffing an armed balance snapshot against the live balance; callers
//!    never get to claim how much they transferred.
//!
//! 3. **All-or-nothing envelopes.** Any failure rolls the whole session
//!    back — books, custody, events, the lock flag itself.
//!
//! 4. **Serializable state.** The entire [`VaultState`] round-trips
//!    through serde so a host can persist it between envelopes.

pub mod claims;
pub mod currency;
pub mod custody;
pub mod delta;
pub mod error;
pub mod events;
pub mod registry;
pub mod reserves;
pub mod shared;
pub mod sync;
pub mod vault;

pub use claims::{ClaimLedger, PERMANENT_ALLOWANCE};
pub use currency::{Address, Currency};
pub use custody::CustodyPool;
pub use delta::DeltaLedger;
pub use error::{Result, VaultError};
pub use events::{EventLog, EventRecord, VaultEvent};
pub use registry::AppRegistry;
pub use reserves::ReserveBook;
pub use shared::SharedVault;
pub use sync::{SyncSlot, SyncSnapshot};
pub use vault::{Vault, VaultState};
