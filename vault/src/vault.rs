//! # The Vault
//!
//! The flash-accounting engine itself: one struct that owns every book
//! (deltas, reserves, claims, custody, sync slot, registry, events) and
//! exposes the full entry-point surface inside a lock/unlock envelope.
//!
//! ## The Envelope
//!
//! All deferred accounting happens inside [`Vault::unlock`]: exactly one
//! top-level caller (the *locker*) opens a session, gets called back with
//! mutable access to the vault, and may re-enter every entry point any
//! number of times — but never `unlock` itself. When the callback returns,
//! the vault walks every obligation written during the session; if any is
//! nonzero, the whole envelope is rejected and rolled back.
//!
//! ## Atomicity
//!
//! The host this engine is modeled on rolls back a failed transaction
//! wholesale. Here that contract is kept explicitly: `unlock` snapshots
//! the entire state on entry and restores it on *any* failure path — the
//! callback erroring, or the close-time settlement check failing. On top
//! of that, each entry point validates all of its legs before committing
//! any of them, so a callback that swallows an error mid-session can never
//! observe half-applied accounting.

use serde::{Deserialize, Serialize};

use crate::claims::ClaimLedger;
use crate::currency::{Address, Currency};
use crate::custody::CustodyPool;
use crate::delta::DeltaLedger;
use crate::error::{Result, VaultError};
use crate::events::{EventLog, EventRecord, VaultEvent};
use crate::registry::AppRegistry;
use crate::reserves::ReserveBook;
use crate::sync::SyncSlot;

// ---------------------------------------------------------------------------
// VaultState
// ---------------------------------------------------------------------------

/// The complete persistent + session state of a vault.
///
/// Cloneable as a unit — the envelope snapshot — and fully serializable,
/// so a host can persist it between envelopes. The session-scoped parts
/// (locker, delta slots, sync snapshot) are guarded by the session
/// generation and the lifecycle rules in [`Vault::unlock`], so restoring a
/// serialized state cannot resurrect a dead session's obligations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultState {
    locker: Option<Address>,
    deltas: DeltaLedger,
    reserves: ReserveBook,
    claims: ClaimLedger,
    custody: CustodyPool,
    sync: SyncSlot,
    registry: AppRegistry,
    events: EventLog,
}

impl VaultState {
    fn new(owner: Address) -> Self {
        Self {
            locker: None,
            deltas: DeltaLedger::new(),
            reserves: ReserveBook::new(),
            claims: ClaimLedger::new(),
            custody: CustodyPool::new(),
            sync: SyncSlot::new(),
            registry: AppRegistry::new(owner),
            events: EventLog::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The shared settlement vault.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vault {
    state: VaultState,
}

impl Vault {
    /// Creates a vault with the given owner and empty books.
    ///
    /// The envelope guard starts disengaged; constructors guarantee the
    /// lock slot is empty on every fresh instance.
    pub fn new(owner: Address) -> Self {
        Self {
            state: VaultState::new(owner),
        }
    }

    /// Rebuilds a vault from persisted state.
    pub fn from_state(state: VaultState) -> Self {
        Self { state }
    }

    /// Borrow the full state, e.g. for persistence.
    pub fn state(&self) -> &VaultState {
        &self.state
    }

    // -----------------------------------------------------------------------
    // Envelope
    // -----------------------------------------------------------------------

    /// Opens the transaction envelope for `locker` and runs `callback`
    /// with mutable access to the vault.
    ///
    /// The callback may re-enter every other entry point, in any order
    /// and any number of times, but a nested `unlock` fails with
    /// [`VaultError::LockerAlreadySet`]. When the callback returns, every
    /// obligation written during the session must be zero or the envelope
    /// fails with [`VaultError::CurrencyNotSettled`].
    ///
    /// Any failure — from the callback or from the close-time check —
    /// restores the vault to its exact state before the envelope opened.
    /// The lock is released on every exit path.
    pub fn unlock<T, F>(&mut self, locker: Address, callback: F) -> Result<T>
    where
        F: FnOnce(&mut Vault) -> Result<T>,
    {
        if let Some(holder) = self.state.locker {
            return Err(VaultError::LockerAlreadySet { holder });
        }

        let snapshot = self.state.clone();
        let session = self.state.deltas.session() + 1;
        self.state.deltas.begin_session(session);
        self.state.locker = Some(locker);
        tracing::debug!(%locker, session, "envelope opened");

        let outcome = callback(self).and_then(|value| match self.state.deltas.unsettled() {
            Some(currency) => Err(VaultError::CurrencyNotSettled { currency }),
            None => Ok(value),
        });

        match outcome {
            Ok(value) => {
                self.state.locker = None;
                // Session state does not outlive the envelope.
                self.state.sync = SyncSlot::new();
                tracing::debug!(session, "envelope closed");
                Ok(value)
            }
            Err(err) => {
                self.state = snapshot;
                tracing::debug!(session, error = %err, "envelope rolled back");
                Err(err)
            }
        }
    }

    /// The party currently holding the envelope, if any.
    pub fn locker(&self) -> Option<Address> {
        self.state.locker
    }

    /// The current session generation.
    pub fn session(&self) -> u64 {
        self.state.deltas.session()
    }

    fn require_locker(&self) -> Result<Address> {
        self.state.locker.ok_or(VaultError::NoLocker)
    }

    // -----------------------------------------------------------------------
    // Signed-Delta Ledger
    // -----------------------------------------------------------------------

    /// Records a two-currency obligation change for `target`, mirrored
    /// against `app`'s reserves.
    ///
    /// `delta0` is applied to `target`'s obligation for `currency0` and
    /// `delta1` to `currency1`; the negated amounts hit `app`'s reserves
    /// for the same currencies. Crediting the target debits the app's
    /// backing reserve and vice versa — the double-entry discipline that
    /// keeps global reserves consistent with net ledger position.
    ///
    /// `target` is normally the current locker but is deliberately not
    /// checked against it; attribution is the app's business.
    ///
    /// # Errors
    ///
    /// [`VaultError::NoLocker`] outside an envelope,
    /// [`VaultError::AppUnregistered`] for an unknown app, and
    /// [`VaultError::InsufficientReserve`] when a mirrored reserve debit
    /// would go negative — which is exactly what stops an app from
    /// crediting beyond what it holds. A failing call mutates nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn record_delta(
        &mut self,
        app: Address,
        target: Address,
        currency0: Currency,
        currency1: Currency,
        delta0: i128,
        delta1: i128,
    ) -> Result<()> {
        self.require_locker()?;
        self.state.registry.require_registered(app)?;
        self.account(
            app,
            &[(target, currency0, delta0), (target, currency1, delta1)],
        )
    }

    /// [`record_delta`](Self::record_delta), with an extra pair of deltas
    /// booked against `hook`'s own obligations and mirrored against the
    /// same app's reserves. Lets an extension callback claim or contribute
    /// a share of the flow without a second envelope.
    #[allow(clippy::too_many_arguments)]
    pub fn record_delta_with_hook_adjustment(
        &mut self,
        app: Address,
        target: Address,
        currency0: Currency,
        currency1: Currency,
        delta0: i128,
        delta1: i128,
        hook_delta0: i128,
        hook_delta1: i128,
        hook: Address,
    ) -> Result<()> {
        self.require_locker()?;
        self.state.registry.require_registered(app)?;
        self.account(
            app,
            &[
                (target, currency0, delta0),
                (target, currency1, delta1),
                (hook, currency0, hook_delta0),
                (hook, currency1, hook_delta1),
            ],
        )
    }

    /// Validates every leg of a delta-recording call, then commits.
    ///
    /// Legs are combined per `(party, currency)` and per currency for the
    /// reserve mirror, so the same slot is never written twice and a call
    /// either applies completely or not at all.
    fn account(&mut self, app: Address, legs: &[(Address, Currency, i128)]) -> Result<()> {
        // Combine obligation legs per (party, currency).
        let mut party_totals: Vec<(Address, Currency, i128)> = Vec::new();
        // Combine the reserve mirror per currency.
        let mut reserve_totals: Vec<(Currency, i128)> = Vec::new();

        for &(party, currency, delta) in legs {
            if delta == 0 {
                continue;
            }
            match party_totals
                .iter_mut()
                .find(|(p, c, _)| *p == party && *c == currency)
            {
                Some(slot) => {
                    slot.2 = slot
                        .2
                        .checked_add(delta)
                        .ok_or(VaultError::AmountOverflow { currency })?;
                }
                None => party_totals.push((party, currency, delta)),
            }
            match reserve_totals.iter_mut().find(|(c, _)| *c == currency) {
                Some(slot) => {
                    slot.1 = slot
                        .1
                        .checked_add(delta)
                        .ok_or(VaultError::AmountOverflow { currency })?;
                }
                None => reserve_totals.push((currency, delta)),
            }
        }

        // Validate the reserve mirror: reserve moves by the negated total.
        let mut reserve_commits: Vec<(Currency, u128)> = Vec::new();
        for &(currency, total) in &reserve_totals {
            let new = if total > 0 {
                self.state
                    .reserves
                    .checked_debit(app, currency, total.unsigned_abs())?
            } else if total < 0 {
                self.state
                    .reserves
                    .checked_credit(app, currency, total.unsigned_abs())?
            } else {
                continue;
            };
            reserve_commits.push((currency, new));
        }

        // Validate the obligation legs.
        for &(party, currency, total) in &party_totals {
            self.state
                .deltas
                .get(party, currency)
                .checked_add(total)
                .ok_or(VaultError::AmountOverflow { currency })?;
        }

        // Commit. Nothing below can fail.
        for (currency, new) in reserve_commits {
            self.state.reserves.set(app, currency, new);
        }
        for (party, currency, total) in party_totals {
            let (_, new) = self.state.deltas.apply(party, currency, total)?;
            tracing::trace!(%party, %currency, delta = total, outstanding = new, "delta recorded");
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Settlement Reconciler
    // -----------------------------------------------------------------------

    /// Arms `currency` for reconciliation, snapshotting the vault's held
    /// balance. Replaces any prior snapshot without validation — only the
    /// most recent arm matters.
    pub fn arm(&mut self, currency: Currency) {
        let balance = self.state.custody.balance_of(currency);
        self.state.sync.arm(currency, balance);
    }

    /// Reconciles the armed currency: credits `observed − snapshot` to the
    /// locker's obligation and disarms. `value` is native asset attached
    /// to the call; it is deposited into custody before the diff, so it is
    /// part of the observed balance exactly once.
    ///
    /// With nothing armed, reconciliation is a defined no-op crediting
    /// zero — unless value is attached, which has nowhere to go.
    ///
    /// # Errors
    ///
    /// [`VaultError::NoLocker`] outside an envelope;
    /// [`VaultError::SettleNonNativeCurrencyWithValue`] if `value > 0`
    /// while the armed currency is not native (or nothing is armed);
    /// [`VaultError::AmountOverflow`] if the held balance dropped below
    /// the snapshot (the armed currency was withdrawn mid-flight).
    pub fn reconcile(&mut self, value: u128) -> Result<u128> {
        let locker = self.require_locker()?;

        let snap = match self.state.sync.armed() {
            None => {
                if value > 0 {
                    return Err(VaultError::SettleNonNativeCurrencyWithValue { armed: None });
                }
                return Ok(0);
            }
            Some(snap) => snap,
        };

        if value > 0 && !snap.currency.is_native() {
            return Err(VaultError::SettleNonNativeCurrencyWithValue {
                armed: Some(snap.currency),
            });
        }
        if value > 0 {
            self.state.custody.deposit(Currency::NATIVE, value)?;
        }

        let observed = self.state.custody.balance_of(snap.currency);
        let paid = observed
            .checked_sub(snap.balance)
            .ok_or(VaultError::AmountOverflow {
                currency: snap.currency,
            })?;
        let credit = i128::try_from(paid).map_err(|_| VaultError::AmountOverflow {
            currency: snap.currency,
        })?;

        self.state.deltas.apply(locker, snap.currency, credit)?;
        self.state.sync.disarm();
        tracing::debug!(currency = %snap.currency, paid, "reconciled");
        Ok(paid)
    }

    // -----------------------------------------------------------------------
    // Withdrawal & Write-off
    // -----------------------------------------------------------------------

    /// Withdraws `amount` of `currency` from custody to `to`, debiting the
    /// locker's obligation by the same amount.
    ///
    /// Flash-style by design: nothing here checks any app's reserve, so a
    /// locker may take more than any single reserve backs — the envelope
    /// simply will not close until the debit is repaid.
    pub fn withdraw(&mut self, currency: Currency, to: Address, amount: u128) -> Result<()> {
        let locker = self.require_locker()?;

        let debit = i128::try_from(amount)
            .map_err(|_| VaultError::AmountOverflow { currency })?;
        // Validate the obligation leg before custody commits.
        self.state
            .deltas
            .get(locker, currency)
            .checked_sub(debit)
            .ok_or(VaultError::AmountOverflow { currency })?;

        self.state.custody.transfer_out(currency, to, amount)?;
        self.state.deltas.apply(locker, currency, -debit)?;
        tracing::debug!(%currency, %to, amount, "withdrawn");
        Ok(())
    }

    /// Writes off the locker's outstanding positive delta for `currency`,
    /// which must equal `amount` exactly. No assets move.
    ///
    /// Partial or mismatched write-offs are rejected rather than adjusted
    /// — forgiving the wrong quantity silently is the footgun this guards
    /// against.
    pub fn write_off(&mut self, currency: Currency, amount: u128) -> Result<()> {
        let locker = self.require_locker()?;

        let outstanding = self.state.deltas.get(locker, currency);
        let exact = outstanding > 0 && outstanding.unsigned_abs() == amount;
        if !exact {
            return Err(VaultError::MustClearExactPositiveDelta {
                currency,
                outstanding,
                requested: amount,
            });
        }

        self.state.deltas.apply(locker, currency, -outstanding)?;
        tracing::debug!(%currency, amount, "delta written off");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Claim Tokens
    // -----------------------------------------------------------------------

    /// Mints `amount` of claim balance to `owner`, consuming the locker's
    /// settleable credit: the locker's obligation for `currency` decreases
    /// by `amount`.
    pub fn issue(&mut self, owner: Address, currency: Currency, amount: u128) -> Result<()> {
        let locker = self.require_locker()?;

        let delta = i128::try_from(amount)
            .map_err(|_| VaultError::AmountOverflow { currency })?;
        self.state
            .deltas
            .get(locker, currency)
            .checked_sub(delta)
            .ok_or(VaultError::AmountOverflow { currency })?;

        self.state.claims.mint(owner, currency, amount)?;
        self.state.deltas.apply(locker, currency, -delta)?;
        self.state.events.record(VaultEvent::ClaimTransfer {
            by: locker,
            from: None,
            to: Some(owner),
            currency,
            amount,
        });
        Ok(())
    }

    /// Burns `amount` of `owner`'s claim balance, re-opening a settleable
    /// debit: the locker's obligation for `currency` increases by
    /// `amount` (typically followed by a withdrawal).
    ///
    /// A caller other than the owner needs the operator flag or spends
    /// allowance; the permanent sentinel allowance is never decremented.
    pub fn redeem(
        &mut self,
        caller: Address,
        owner: Address,
        currency: Currency,
        amount: u128,
    ) -> Result<()> {
        let locker = self.require_locker()?;

        let delta = i128::try_from(amount)
            .map_err(|_| VaultError::AmountOverflow { currency })?;
        self.state
            .deltas
            .get(locker, currency)
            .checked_add(delta)
            .ok_or(VaultError::AmountOverflow { currency })?;

        // Balance check up front so a doomed redeem never burns allowance.
        let available = self.state.claims.balance(owner, currency);
        if available < amount {
            return Err(VaultError::InsufficientClaimBalance {
                owner,
                currency,
                available,
                requested: amount,
            });
        }

        self.state
            .claims
            .authorize_spend(owner, caller, currency, amount)?;
        self.state.claims.burn(owner, currency, amount)?;
        self.state.deltas.apply(locker, currency, delta)?;
        self.state.events.record(VaultEvent::ClaimTransfer {
            by: caller,
            from: Some(owner),
            to: None,
            currency,
            amount,
        });
        Ok(())
    }

    /// Moves claim balance from the caller to `to`. Persistent; no
    /// envelope required.
    pub fn transfer_claim(
        &mut self,
        caller: Address,
        to: Address,
        currency: Currency,
        amount: u128,
    ) -> Result<()> {
        self.state.claims.transfer(caller, to, currency, amount)?;
        self.state.events.record(VaultEvent::ClaimTransfer {
            by: caller,
            from: Some(caller),
            to: Some(to),
            currency,
            amount,
        });
        Ok(())
    }

    /// Moves claim balance from `owner` to `to` on the caller's authority
    /// (operator flag or allowance). Persistent; no envelope required.
    pub fn transfer_claim_from(
        &mut self,
        caller: Address,
        owner: Address,
        to: Address,
        currency: Currency,
        amount: u128,
    ) -> Result<()> {
        let available = self.state.claims.balance(owner, currency);
        if available < amount {
            return Err(VaultError::InsufficientClaimBalance {
                owner,
                currency,
                available,
                requested: amount,
            });
        }
        self.state
            .claims
            .authorize_spend(owner, caller, currency, amount)?;
        self.state.claims.transfer(owner, to, currency, amount)?;
        self.state.events.record(VaultEvent::ClaimTransfer {
            by: caller,
            from: Some(owner),
            to: Some(to),
            currency,
            amount,
        });
        Ok(())
    }

    /// Sets `owner`'s allowance for `spender`. `u128::MAX` is permanent.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        currency: Currency,
        amount: u128,
    ) {
        self.state.claims.approve(owner, spender, currency, amount);
        self.state.events.record(VaultEvent::Approval {
            owner,
            spender,
            currency,
            amount,
        });
    }

    /// Sets or clears the operator flag for `(owner, operator)`.
    pub fn set_operator(&mut self, owner: Address, operator: Address, approved: bool) {
        self.state.claims.set_operator(owner, operator, approved);
        self.state.events.record(VaultEvent::OperatorSet {
            owner,
            operator,
            approved,
        });
    }

    // -----------------------------------------------------------------------
    // Registry & Fees
    // -----------------------------------------------------------------------

    /// Registers `app` as an accounting engine. Owner-only, idempotent;
    /// the registration event fires only the first time.
    pub fn register_app(&mut self, caller: Address, app: Address) -> Result<()> {
        if self.state.registry.register(caller, app)? {
            self.state.events.record(VaultEvent::AppRegistered { app });
        }
        Ok(())
    }

    /// Returns `true` if `app` is a registered accounting engine.
    pub fn is_registered(&self, app: Address) -> bool {
        self.state.registry.is_registered(app)
    }

    /// Withdraws `amount` of accrued fees from the caller app's reserve to
    /// `to`. Callable with or without an open envelope.
    ///
    /// # Errors
    ///
    /// [`VaultError::AppUnregistered`] for an unknown caller;
    /// [`VaultError::FeeCurrencySynced`] if `currency` is currently armed
    /// (the withdrawal would corrupt the in-flight snapshot);
    /// [`VaultError::InsufficientReserve`] past the caller's reserve.
    pub fn collect_fee(
        &mut self,
        caller: Address,
        currency: Currency,
        amount: u128,
        to: Address,
    ) -> Result<()> {
        self.state.registry.require_registered(caller)?;
        if self.state.sync.is_armed_for(currency) {
            return Err(VaultError::FeeCurrencySynced { currency });
        }

        let new_reserve = self.state.reserves.checked_debit(caller, currency, amount)?;
        self.state.custody.transfer_out(currency, to, amount)?;
        self.state.reserves.set(caller, currency, new_reserve);
        self.state.events.record(VaultEvent::FeeCollected {
            app: caller,
            currency,
            amount,
            to,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Custody seam
    // -----------------------------------------------------------------------

    /// Records a physical asset transfer into the vault. This is the
    /// collaborator-side primitive a settling party uses between `arm` and
    /// `reconcile`; it raises the held balance and touches no ledger.
    pub fn deposit(&mut self, currency: Currency, amount: u128) -> Result<u128> {
        self.state.custody.deposit(currency, amount)
    }

    // -----------------------------------------------------------------------
    // Read-only queries
    // -----------------------------------------------------------------------

    /// The outstanding obligation between `party` and the vault.
    pub fn currency_delta(&self, party: Address, currency: Currency) -> i128 {
        self.state.deltas.get(party, currency)
    }

    /// The distinct currencies written during the current session.
    pub fn touched(&self) -> Vec<Currency> {
        self.state.deltas.touched()
    }

    /// A registered app's settled reserve.
    pub fn reserve_of(&self, app: Address, currency: Currency) -> u128 {
        self.state.reserves.get(app, currency)
    }

    /// An owner's claim balance.
    pub fn claim_balance_of(&self, owner: Address, currency: Currency) -> u128 {
        self.state.claims.balance(owner, currency)
    }

    /// The recorded allowance for `(owner, spender, currency)`.
    pub fn allowance(&self, owner: Address, spender: Address, currency: Currency) -> u128 {
        self.state.claims.allowance(owner, spender, currency)
    }

    /// Returns `true` if `operator` may act for `owner`.
    pub fn is_operator(&self, owner: Address, operator: Address) -> bool {
        self.state.claims.is_operator(owner, operator)
    }

    /// The armed currency and its snapshot balance, if any.
    pub fn armed(&self) -> Option<(Currency, u128)> {
        self.state.sync.armed().map(|s| (s.currency, s.balance))
    }

    /// The vault's held balance of a currency.
    pub fn vault_balance(&self, currency: Currency) -> u128 {
        self.state.custody.balance_of(currency)
    }

    /// Cumulative amount transferred out to `recipient`.
    pub fn paid_out(&self, recipient: Address, currency: Currency) -> u128 {
        self.state.custody.paid_out(recipient, currency)
    }

    /// The vault owner.
    pub fn owner(&self) -> Address {
        self.state.registry.owner()
    }

    /// The journaled events, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        self.state.events.records()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::derive("owner")
    }

    fn app() -> Address {
        Address::derive("app")
    }

    fn caller() -> Address {
        Address::derive("caller")
    }

    fn usdc() -> Currency {
        Currency::token(Address::derive("usdc"))
    }

    fn weth() -> Currency {
        Currency::token(Address::derive("weth"))
    }

    /// A vault with one registered app and some custody to play with.
    fn setup() -> Vault {
        let mut vault = Vault::new(owner());
        vault.register_app(owner(), app()).unwrap();
        vault.deposit(usdc(), 1_000).unwrap();
        vault.deposit(weth(), 1_000).unwrap();
        vault
    }

    // -- envelope -----------------------------------------------------------

    #[test]
    fn lock_is_held_only_inside_envelope() {
        let mut vault = setup();
        assert_eq!(vault.locker(), None);

        vault
            .unlock(caller(), |v| {
                assert_eq!(v.locker(), Some(caller()));
                Ok(())
            })
            .unwrap();

        assert_eq!(vault.locker(), None);
    }

    #[test]
    fn nested_unlock_rejected() {
        let mut vault = setup();
        let result = vault.unlock(caller(), |v| {
            let nested = v.unlock(Address::derive("second"), |_| Ok(()));
            assert!(matches!(
                nested,
                Err(VaultError::LockerAlreadySet { holder }) if holder == caller()
            ));
            Ok(())
        });
        result.unwrap();
        assert_eq!(vault.locker(), None);
    }

    #[test]
    fn mutations_require_open_envelope() {
        let mut vault = setup();
        assert!(matches!(
            vault.record_delta(app(), caller(), usdc(), weth(), -1, 1),
            Err(VaultError::NoLocker)
        ));
        assert!(matches!(vault.reconcile(0), Err(VaultError::NoLocker)));
        assert!(matches!(
            vault.withdraw(usdc(), caller(), 1),
            Err(VaultError::NoLocker)
        ));
        assert!(matches!(
            vault.write_off(usdc(), 1),
            Err(VaultError::NoLocker)
        ));
        assert!(matches!(
            vault.issue(caller(), usdc(), 1),
            Err(VaultError::NoLocker)
        ));
        assert!(matches!(
            vault.redeem(caller(), caller(), usdc(), 1),
            Err(VaultError::NoLocker)
        ));
    }

    #[test]
    fn callback_error_rolls_back_everything() {
        let mut vault = setup();
        let before = vault.vault_balance(usdc());

        let result: Result<()> = vault.unlock(caller(), |v| {
            v.deposit(usdc(), 500).unwrap();
            v.register_app(owner(), Address::derive("new-app")).unwrap();
            Err(VaultError::NoLocker) // arbitrary failure from the callback
        });

        assert!(result.is_err());
        assert_eq!(vault.vault_balance(usdc()), before);
        assert!(!vault.is_registered(Address::derive("new-app")));
        assert_eq!(vault.locker(), None);
        // The rolled-back envelope left no events behind.
        assert_eq!(vault.events().len(), 1); // only the setup registration
    }

    #[test]
    fn unsettled_close_rolls_back() {
        let mut vault = setup();
        let result: Result<()> = vault.unlock(caller(), |v| {
            v.record_delta(app(), caller(), usdc(), weth(), -10, -10)?;
            Ok(())
        });

        assert!(matches!(
            result,
            Err(VaultError::CurrencyNotSettled { .. })
        ));
        // Reserve credits from the unsettled session were rolled back too.
        assert_eq!(vault.reserve_of(app(), usdc()), 0);
        assert_eq!(vault.locker(), None);
    }

    // -- record_delta -------------------------------------------------------

    #[test]
    fn record_delta_mirrors_reserves() {
        let mut vault = setup();
        vault
            .unlock(caller(), |v| {
                v.record_delta(app(), caller(), usdc(), weth(), -10, -20)?;
                assert_eq!(v.currency_delta(caller(), usdc()), -10);
                assert_eq!(v.currency_delta(caller(), weth()), -20);
                assert_eq!(v.reserve_of(app(), usdc()), 10);
                assert_eq!(v.reserve_of(app(), weth()), 20);

                // Settle by reconciling physical deposits.
                v.arm(usdc());
                v.deposit(usdc(), 10)?;
                assert_eq!(v.reconcile(0)?, 10);
                v.arm(weth());
                v.deposit(weth(), 20)?;
                assert_eq!(v.reconcile(0)?, 20);
                Ok(())
            })
            .unwrap();

        assert_eq!(vault.reserve_of(app(), usdc()), 10);
        assert_eq!(vault.reserve_of(app(), weth()), 20);
    }

    #[test]
    fn record_delta_unregistered_app_rejected() {
        let mut vault = setup();
        let rogue = Address::derive("rogue");
        let result: Result<()> = vault.unlock(caller(), |v| {
            v.record_delta(rogue, caller(), usdc(), weth(), -1, 1)
        });
        assert!(matches!(
            result,
            Err(VaultError::AppUnregistered { app }) if app == rogue
        ));
    }

    #[test]
    fn positive_delta_needs_backing_reserve() {
        let mut vault = setup();
        // Crediting the target debits the app's reserve, which is empty.
        let result: Result<()> = vault.unlock(caller(), |v| {
            v.record_delta(app(), caller(), usdc(), weth(), 10, 0)
        });
        assert!(matches!(
            result,
            Err(VaultError::InsufficientReserve { .. })
        ));
    }

    #[test]
    fn failed_record_delta_mutates_nothing_mid_session() {
        let mut vault = setup();
        vault
            .unlock(caller(), |v| {
                // First leg would pass, second leg underflows the reserve;
                // the call must leave no trace of either.
                let result = v.record_delta(app(), caller(), usdc(), weth(), -10, 20);
                assert!(matches!(
                    result,
                    Err(VaultError::InsufficientReserve { .. })
                ));
                assert_eq!(v.currency_delta(caller(), usdc()), 0);
                assert_eq!(v.reserve_of(app(), usdc()), 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn hook_adjustment_books_against_hook() {
        let mut vault = setup();
        let hook = Address::derive("hook");
        vault
            .unlock(caller(), |v| {
                // App owes the target 10 usdc and grants the hook 3 of it.
                v.record_delta_with_hook_adjustment(
                    app(),
                    caller(),
                    usdc(),
                    weth(),
                    -13,
                    0,
                    3,
                    0,
                    hook,
                )?;
                assert_eq!(v.currency_delta(caller(), usdc()), -13);
                assert_eq!(v.currency_delta(hook, usdc()), 3);
                // Reserve mirror nets the two: -(-13 + 3) = 10.
                assert_eq!(v.reserve_of(app(), usdc()), 10);

                // Hook converts its credit into a durable claim; target
                // settles its debit by deposit.
                v.arm(usdc());
                v.deposit(usdc(), 13)?;
                v.reconcile(0)?;
                assert_eq!(v.currency_delta(caller(), usdc()), 0);

                // The hook's delta is still open; write it off from the
                // hook's perspective is not possible (hook is not locker),
                // so the app hands it back.
                v.record_delta(app(), hook, usdc(), weth(), -3, 0)?;
                assert_eq!(v.currency_delta(hook, usdc()), 0);
                Ok(())
            })
            .unwrap();
    }

    // -- reconcile ----------------------------------------------------------

    #[test]
    fn reconcile_without_arm_is_noop() {
        let mut vault = setup();
        vault
            .unlock(caller(), |v| {
                assert_eq!(v.reconcile(0)?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn reconcile_value_on_non_native_rejected() {
        let mut vault = setup();
        let result: Result<()> = vault.unlock(caller(), |v| {
            v.arm(usdc());
            v.reconcile(5).map(|_| ())
        });
        assert!(matches!(
            result,
            Err(VaultError::SettleNonNativeCurrencyWithValue {
                armed: Some(c)
            }) if c == usdc()
        ));
    }

    #[test]
    fn reconcile_value_with_nothing_armed_rejected() {
        let mut vault = setup();
        let result: Result<()> =
            vault.unlock(caller(), |v| v.reconcile(5).map(|_| ()));
        assert!(matches!(
            result,
            Err(VaultError::SettleNonNativeCurrencyWithValue { armed: None })
        ));
    }

    #[test]
    fn reconcile_native_value_credits_locker() {
        let mut vault = setup();
        vault
            .unlock(caller(), |v| {
                v.arm(Currency::NATIVE);
                let paid = v.reconcile(25)?;
                assert_eq!(paid, 25);
                assert_eq!(v.currency_delta(caller(), Currency::NATIVE), 25);
                assert_eq!(v.vault_balance(Currency::NATIVE), 25);
                // Leave the books clean so the envelope can close.
                v.issue(caller(), Currency::NATIVE, 25)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(vault.claim_balance_of(caller(), Currency::NATIVE), 25);
    }

    #[test]
    fn rearm_discards_previous_snapshot() {
        let mut vault = setup();
        vault
            .unlock(caller(), |v| {
                v.arm(usdc());
                v.deposit(usdc(), 40)?;
                // Re-arming weth forgets the usdc snapshot entirely.
                v.arm(weth());
                assert_eq!(v.armed(), Some((weth(), 1_000)));
                assert_eq!(v.reconcile(0)?, 0);
                Ok(())
            })
            .unwrap();
        // The 40 usdc deposited are in custody but never became credit.
        assert_eq!(vault.vault_balance(usdc()), 1_040);
    }

    // -- withdraw / write_off ----------------------------------------------

    #[test]
    fn withdraw_opens_debit_and_moves_assets() {
        let mut vault = setup();
        let to = Address::derive("recipient");
        let result: Result<()> = vault.unlock(caller(), |v| {
            v.withdraw(usdc(), to, 300)?;
            assert_eq!(v.currency_delta(caller(), usdc()), -300);
            assert_eq!(v.vault_balance(usdc()), 700);
            assert_eq!(v.paid_out(to, usdc()), 300);

            // Repay and close.
            v.arm(usdc());
            v.deposit(usdc(), 300)?;
            v.reconcile(0)?;
            Ok(())
        });
        result.unwrap();
        assert_eq!(vault.vault_balance(usdc()), 1_000);
    }

    #[test]
    fn write_off_requires_exact_positive_delta() {
        let mut vault = setup();
        vault
            .unlock(caller(), |v| {
                v.arm(usdc());
                v.deposit(usdc(), 50)?;
                v.reconcile(0)?;
                assert_eq!(v.currency_delta(caller(), usdc()), 50);

                // Wrong amounts are rejected, exact amount clears.
                assert!(matches!(
                    v.write_off(usdc(), 49),
                    Err(VaultError::MustClearExactPositiveDelta {
                        outstanding: 50,
                        requested: 49,
                        ..
                    })
                ));
                assert!(v.write_off(usdc(), 51).is_err());
                v.write_off(usdc(), 50)?;
                assert_eq!(v.currency_delta(caller(), usdc()), 0);

                // Zero and negative deltas cannot be written off.
                assert!(v.write_off(usdc(), 0).is_err());
                v.withdraw(usdc(), caller(), 10)?;
                assert!(v.write_off(usdc(), 10).is_err());

                // Repay the probe withdrawal so the envelope closes.
                v.arm(usdc());
                v.deposit(usdc(), 10)?;
                v.reconcile(0)?;
                Ok(())
            })
            .unwrap();
    }

    // -- registry / fees ----------------------------------------------------

    #[test]
    fn register_app_is_owner_gated_and_idempotent() {
        let mut vault = Vault::new(owner());
        let events_before = vault.events().len();

        assert!(matches!(
            vault.register_app(caller(), app()),
            Err(VaultError::NotOwner { .. })
        ));

        vault.register_app(owner(), app()).unwrap();
        vault.register_app(owner(), app()).unwrap();
        assert!(vault.is_registered(app()));
        // One registration event despite two calls.
        assert_eq!(vault.events().len(), events_before + 1);
    }

    #[test]
    fn collect_fee_outside_envelope() {
        let mut vault = setup();
        let treasury = Address::derive("treasury");

        // Accrue a reserve for the app first.
        vault
            .unlock(caller(), |v| {
                v.record_delta(app(), caller(), usdc(), weth(), -30, 0)?;
                v.arm(usdc());
                v.deposit(usdc(), 30)?;
                v.reconcile(0)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(vault.reserve_of(app(), usdc()), 30);

        vault.collect_fee(app(), usdc(), 12, treasury).unwrap();
        assert_eq!(vault.reserve_of(app(), usdc()), 18);
        assert_eq!(vault.paid_out(treasury, usdc()), 12);

        assert!(matches!(
            vault.collect_fee(app(), usdc(), 100, treasury),
            Err(VaultError::InsufficientReserve { .. })
        ));
        assert!(matches!(
            vault.collect_fee(caller(), usdc(), 1, treasury),
            Err(VaultError::AppUnregistered { .. })
        ));
    }

    #[test]
    fn collect_fee_on_armed_currency_rejected() {
        let mut vault = setup();
        let treasury = Address::derive("treasury");
        vault
            .unlock(caller(), |v| {
                v.record_delta(app(), caller(), usdc(), weth(), -5, 0)?;
                v.arm(usdc());
                let result = v.collect_fee(app(), usdc(), 5, treasury);
                assert!(matches!(
                    result,
                    Err(VaultError::FeeCurrencySynced { currency }) if currency == usdc()
                ));

                // Disarm by completing the reconciliation, then retry.
                v.deposit(usdc(), 5)?;
                v.reconcile(0)?;
                v.collect_fee(app(), usdc(), 5, treasury)?;
                assert_eq!(v.reserve_of(app(), usdc()), 0);
                Ok(())
            })
            .unwrap();
    }

    // -- persistence --------------------------------------------------------

    #[test]
    fn vault_state_serialization_roundtrip() {
        let mut vault = setup();
        vault
            .unlock(caller(), |v| {
                v.arm(usdc());
                v.deposit(usdc(), 10)?;
                v.reconcile(0)?;
                v.issue(caller(), usdc(), 10)?;
                Ok(())
            })
            .unwrap();

        let json = serde_json::to_string(vault.state()).expect("serialize");
        let state: VaultState = serde_json::from_str(&json).expect("deserialize");
        let recovered = Vault::from_state(state);

        assert_eq!(recovered.claim_balance_of(caller(), usdc()), 10);
        assert_eq!(recovered.vault_balance(usdc()), 1_010);
        assert_eq!(recovered.locker(), None);
        assert!(recovered.is_registered(app()));
    }
}
