//! # Shared Vault Handle
//!
//! The [`Vault`] itself is `Send` but deliberately not internally
//! synchronized — the envelope's locker slot guards *accounting* sessions,
//! not memory. When multiple owners (a node, an RPC layer, background
//! jobs) need the same vault, they share a [`SharedVault`]:
//! `Arc<parking_lot::RwLock<Vault>>` with the write lock held for the full
//! duration of an envelope, so an in-flight session is never observed
//! half-way by a concurrent reader.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::currency::Address;
use crate::error::Result;
use crate::vault::Vault;

/// Cloneable, thread-safe handle to a single vault.
#[derive(Clone)]
pub struct SharedVault {
    inner: Arc<RwLock<Vault>>,
}

impl SharedVault {
    /// Creates a fresh vault behind a shared handle.
    pub fn new(owner: Address) -> Self {
        Self::from_vault(Vault::new(owner))
    }

    /// Wraps an existing vault.
    pub fn from_vault(vault: Vault) -> Self {
        Self {
            inner: Arc::new(RwLock::new(vault)),
        }
    }

    /// Runs a full envelope under the write lock.
    ///
    /// The in-process lock composes with (does not replace) the envelope's
    /// locker slot: the former serializes threads, the latter rejects
    /// nested sessions on the same call stack.
    pub fn unlock<T, F>(&self, locker: Address, callback: F) -> Result<T>
    where
        F: FnOnce(&mut Vault) -> Result<T>,
    {
        self.inner.write().unlock(locker, callback)
    }

    /// Runs a non-envelope mutation (fee collection, approvals, registry
    /// changes, deposits) under the write lock.
    pub fn write<T>(&self, f: impl FnOnce(&mut Vault) -> T) -> T {
        f(&mut self.inner.write())
    }

    /// Runs read-only queries under the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&Vault) -> T) -> T {
        f(&self.inner.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;

    fn owner() -> Address {
        Address::derive("owner")
    }

    #[test]
    fn handle_clones_share_state() {
        let shared = SharedVault::new(owner());
        let other = shared.clone();

        shared.write(|v| v.deposit(Currency::NATIVE, 100).unwrap());
        assert_eq!(other.read(|v| v.vault_balance(Currency::NATIVE)), 100);
    }

    #[test]
    fn envelope_runs_under_write_lock() {
        let app = Address::derive("app");
        let caller = Address::derive("caller");
        let usdc = Currency::token(Address::derive("usdc"));

        let shared = SharedVault::new(owner());
        shared.write(|v| v.register_app(owner(), app)).unwrap();

        shared
            .unlock(caller, |v| {
                v.arm(usdc);
                v.deposit(usdc, 10)?;
                v.reconcile(0)?;
                v.issue(caller, usdc, 10)?;
                Ok(())
            })
            .unwrap();

        assert_eq!(shared.read(|v| v.claim_balance_of(caller, usdc)), 10);
    }

    #[test]
    fn handle_is_send_across_threads() {
        let shared = SharedVault::new(owner());
        let worker = shared.clone();

        let handle = std::thread::spawn(move || {
            worker.write(|v| v.deposit(Currency::NATIVE, 7).unwrap());
        });
        handle.join().expect("worker thread");

        assert_eq!(shared.read(|v| v.vault_balance(Currency::NATIVE)), 7);
    }
}
