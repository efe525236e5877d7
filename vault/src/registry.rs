//! # App Registry
//!
//! Owner-gated allow-list of the accounting engines ("apps") permitted to
//! move the delta ledger. Apps are dynamic identities, unregistered by
//! default — every ledger-mutating entry point checks membership before
//! touching state, rather than trusting any address by construction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::currency::Address;
use crate::error::{Result, VaultError};

/// The vault owner and its registered apps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppRegistry {
    owner: Address,
    apps: HashSet<Address>,
}

impl AppRegistry {
    /// Creates a registry with the given owner and no registered apps.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            apps: HashSet::new(),
        }
    }

    /// The vault owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Returns `true` if `app` is registered.
    pub fn is_registered(&self, app: Address) -> bool {
        self.apps.contains(&app)
    }

    /// Registers `app`. Idempotent; returns `true` only on the first
    /// registration so the caller knows whether to emit an event.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotOwner`] unless `caller` is the vault owner.
    pub fn register(&mut self, caller: Address, app: Address) -> Result<bool> {
        if caller != self.owner {
            return Err(VaultError::NotOwner { caller });
        }
        Ok(self.apps.insert(app))
    }

    /// Fails with [`VaultError::AppUnregistered`] unless `app` is
    /// registered. Guard helper for ledger-mutating entry points.
    pub fn require_registered(&self, app: Address) -> Result<()> {
        if self.is_registered(app) {
            Ok(())
        } else {
            Err(VaultError::AppUnregistered { app })
        }
    }
}
