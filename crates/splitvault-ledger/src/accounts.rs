//! Wallet store — the single write path for balances.
//!
//! Tracks per-user wallets with available/pending accounting. All mutations
//! are atomic: either the full operation succeeds or the wallet is
//! unchanged, and a balance never goes negative.
//!
//! Operations on the same wallet serialize on that wallet's lock; operations
//! on different wallets proceed in parallel. A transfer touches two wallets
//! and always acquires them in ascending `UserId` order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rust_decimal::Decimal;
use splitvault_types::{Result, UserId, VaultError, Wallet};

fn poisoned(what: &str) -> VaultError {
    VaultError::ConcurrencyConflict {
        reason: format!("{what} lock poisoned"),
    }
}

/// The source of truth for all wallet state.
///
/// Internally synchronized: share it behind an `Arc` and call from any
/// thread.
pub struct AccountStore {
    wallets: RwLock<HashMap<UserId, Arc<Mutex<Wallet>>>>,
}

impl AccountStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
        }
    }

    /// Create a zero-balance wallet for a new user.
    ///
    /// # Errors
    /// Returns [`VaultError::DuplicateAccount`] if the user already has one.
    pub fn open_account(&self, user_id: UserId, currency: &str) -> Result<()> {
        let mut map = self.wallets.write().map_err(|_| poisoned("account map"))?;
        if map.contains_key(&user_id) {
            return Err(VaultError::DuplicateAccount(user_id));
        }
        map.insert(user_id, Arc::new(Mutex::new(Wallet::new(user_id, currency))));
        Ok(())
    }

    /// Deactivate a wallet. Wallets are never deleted.
    pub fn deactivate(&self, user_id: UserId) -> Result<()> {
        let handle = self.handle(user_id)?;
        let mut wallet = handle.lock().map_err(|_| poisoned("wallet"))?;
        wallet.active = false;
        Ok(())
    }

    /// Attach external routing info to a wallet.
    pub fn set_virtual_account(&self, user_id: UserId, number: &str, bank: &str) -> Result<()> {
        let handle = self.handle(user_id)?;
        let mut wallet = handle.lock().map_err(|_| poisoned("wallet"))?;
        wallet.virtual_account_number = Some(number.to_string());
        wallet.virtual_account_bank = Some(bank.to_string());
        Ok(())
    }

    /// Credit available balance. Returns the new available balance.
    ///
    /// # Errors
    /// `AccountNotFound` / `AccountInactive` / `Validation` on a
    /// non-positive amount.
    pub fn credit(&self, user_id: UserId, amount: Decimal) -> Result<Decimal> {
        let handle = self.handle(user_id)?;
        let mut wallet = self.lock_active(&handle)?;
        check_positive(amount)?;
        wallet.available += amount;
        Ok(wallet.available)
    }

    /// Debit available balance. Returns the new available balance.
    ///
    /// # Errors
    /// Returns [`VaultError::InsufficientFunds`] if available < amount;
    /// the wallet is unchanged.
    pub fn debit(&self, user_id: UserId, amount: Decimal) -> Result<Decimal> {
        let handle = self.handle(user_id)?;
        let mut wallet = self.lock_active(&handle)?;
        check_positive(amount)?;
        if wallet.available < amount {
            return Err(VaultError::InsufficientFunds {
                needed: amount,
                available: wallet.available,
            });
        }
        wallet.available -= amount;
        Ok(wallet.available)
    }

    /// Earmark funds (available → pending). Used while a multi-step
    /// operation is settling.
    ///
    /// # Errors
    /// Returns [`VaultError::InsufficientFunds`] if available < amount.
    pub fn hold(&self, user_id: UserId, amount: Decimal) -> Result<()> {
        let handle = self.handle(user_id)?;
        let mut wallet = self.lock_active(&handle)?;
        check_positive(amount)?;
        if wallet.available < amount {
            return Err(VaultError::InsufficientFunds {
                needed: amount,
                available: wallet.available,
            });
        }
        wallet.available -= amount;
        wallet.pending += amount;
        Ok(())
    }

    /// Release earmarked funds back to available (pending → available).
    ///
    /// # Errors
    /// Returns [`VaultError::BalanceUnderflow`] if pending < amount.
    pub fn release_hold(&self, user_id: UserId, amount: Decimal) -> Result<()> {
        let handle = self.handle(user_id)?;
        let mut wallet = handle.lock().map_err(|_| poisoned("wallet"))?;
        check_positive(amount)?;
        if wallet.pending < amount {
            return Err(VaultError::BalanceUnderflow);
        }
        wallet.pending -= amount;
        wallet.available += amount;
        Ok(())
    }

    /// Consume earmarked funds (they leave the wallet entirely — e.g. into
    /// a room pool). Returns the new available balance.
    ///
    /// # Errors
    /// Returns [`VaultError::BalanceUnderflow`] if pending < amount.
    pub fn consume_hold(&self, user_id: UserId, amount: Decimal) -> Result<Decimal> {
        let handle = self.handle(user_id)?;
        let mut wallet = handle.lock().map_err(|_| poisoned("wallet"))?;
        check_positive(amount)?;
        if wallet.pending < amount {
            return Err(VaultError::BalanceUnderflow);
        }
        wallet.pending -= amount;
        Ok(wallet.available)
    }

    /// Atomically move funds between two wallets. Both the debit and the
    /// credit commit together or neither does. Returns the new available
    /// balances as `(from, to)`.
    ///
    /// Locks are acquired in ascending user-id order, so two transfers
    /// crossing the same pair of wallets in opposite directions cannot
    /// deadlock.
    ///
    /// # Errors
    /// `Validation` / `SelfTransfer` / `AccountNotFound` /
    /// `AccountInactive` / `CurrencyMismatch` / `InsufficientFunds` — in
    /// every case neither wallet changes.
    pub fn transfer(&self, from: UserId, to: UserId, amount: Decimal) -> Result<(Decimal, Decimal)> {
        check_positive(amount)?;
        if from == to {
            return Err(VaultError::SelfTransfer);
        }

        let from_handle = self.handle(from)?;
        let to_handle = self.handle(to)?;

        // Deterministic lock order by user id.
        let (mut from_guard, mut to_guard) = if from < to {
            let a = from_handle.lock().map_err(|_| poisoned("wallet"))?;
            let b = to_handle.lock().map_err(|_| poisoned("wallet"))?;
            (a, b)
        } else {
            let b = to_handle.lock().map_err(|_| poisoned("wallet"))?;
            let a = from_handle.lock().map_err(|_| poisoned("wallet"))?;
            (a, b)
        };
        let from_wallet: &mut Wallet = &mut from_guard;
        let to_wallet: &mut Wallet = &mut to_guard;

        if !from_wallet.active {
            return Err(VaultError::AccountInactive(from));
        }
        if !to_wallet.active {
            return Err(VaultError::AccountInactive(to));
        }
        if from_wallet.currency != to_wallet.currency {
            return Err(VaultError::CurrencyMismatch {
                from: from_wallet.currency.clone(),
                to: to_wallet.currency.clone(),
            });
        }
        if from_wallet.available < amount {
            return Err(VaultError::InsufficientFunds {
                needed: amount,
                available: from_wallet.available,
            });
        }

        from_wallet.available -= amount;
        to_wallet.available += amount;
        Ok((from_wallet.available, to_wallet.available))
    }

    /// Point-in-time copy of a wallet.
    pub fn snapshot(&self, user_id: UserId) -> Result<Wallet> {
        let handle = self.handle(user_id)?;
        let wallet = handle.lock().map_err(|_| poisoned("wallet"))?;
        Ok(wallet.clone())
    }

    /// Available balance shortcut.
    pub fn available(&self, user_id: UserId) -> Result<Decimal> {
        Ok(self.snapshot(user_id)?.available)
    }

    /// Total funds across all wallets (available + pending). The engine's
    /// conservation checks compare this against pool balances.
    #[must_use]
    pub fn total_supply(&self) -> Decimal {
        let Ok(map) = self.wallets.read() else {
            return Decimal::ZERO;
        };
        map.values()
            .filter_map(|handle| handle.lock().ok().map(|w| w.total()))
            .sum()
    }

    fn handle(&self, user_id: UserId) -> Result<Arc<Mutex<Wallet>>> {
        let map = self.wallets.read().map_err(|_| poisoned("account map"))?;
        map.get(&user_id)
            .cloned()
            .ok_or(VaultError::AccountNotFound(user_id))
    }

    fn lock_active<'a>(&self, handle: &'a Arc<Mutex<Wallet>>) -> Result<MutexGuard<'a, Wallet>> {
        let wallet = handle.lock().map_err(|_| poisoned("wallet"))?;
        if !wallet.active {
            return Err(VaultError::AccountInactive(wallet.user_id));
        }
        Ok(wallet)
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}

fn check_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(VaultError::Validation {
            reason: "Amount must be positive".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(user: UserId, amount: i64) -> AccountStore {
        let store = AccountStore::new();
        store.open_account(user, "NGN").unwrap();
        if amount > 0 {
            store.credit(user, Decimal::new(amount, 0)).unwrap();
        }
        store
    }

    #[test]
    fn open_and_credit() {
        let user = UserId::new();
        let store = store_with(user, 1000);
        assert_eq!(store.available(user).unwrap(), Decimal::new(1000, 0));
    }

    #[test]
    fn duplicate_account_rejected() {
        let user = UserId::new();
        let store = store_with(user, 0);
        let err = store.open_account(user, "NGN").unwrap_err();
        assert!(matches!(err, VaultError::DuplicateAccount(_)));
    }

    #[test]
    fn debit_insufficient_fails_unchanged() {
        let user = UserId::new();
        let store = store_with(user, 100);
        let err = store.debit(user, Decimal::new(200, 0)).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientFunds { .. }));
        assert_eq!(store.available(user).unwrap(), Decimal::new(100, 0));
    }

    #[test]
    fn zero_amount_rejected() {
        let user = UserId::new();
        let store = store_with(user, 100);
        assert!(matches!(
            store.credit(user, Decimal::ZERO).unwrap_err(),
            VaultError::Validation { .. }
        ));
        assert!(matches!(
            store.debit(user, Decimal::new(-5, 0)).unwrap_err(),
            VaultError::Validation { .. }
        ));
    }

    #[test]
    fn hold_and_consume() {
        let user = UserId::new();
        let store = store_with(user, 1000);
        store.hold(user, Decimal::new(400, 0)).unwrap();

        let wallet = store.snapshot(user).unwrap();
        assert_eq!(wallet.available, Decimal::new(600, 0));
        assert_eq!(wallet.pending, Decimal::new(400, 0));

        let available = store.consume_hold(user, Decimal::new(400, 0)).unwrap();
        assert_eq!(available, Decimal::new(600, 0));
        assert_eq!(store.snapshot(user).unwrap().pending, Decimal::ZERO);
    }

    #[test]
    fn release_hold_restores() {
        let user = UserId::new();
        let store = store_with(user, 1000);
        store.hold(user, Decimal::new(400, 0)).unwrap();
        store.release_hold(user, Decimal::new(400, 0)).unwrap();

        let wallet = store.snapshot(user).unwrap();
        assert_eq!(wallet.available, Decimal::new(1000, 0));
        assert_eq!(wallet.pending, Decimal::ZERO);
    }

    #[test]
    fn hold_insufficient_fails() {
        let user = UserId::new();
        let store = store_with(user, 100);
        let err = store.hold(user, Decimal::new(200, 0)).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientFunds { .. }));
        assert_eq!(store.snapshot(user).unwrap().pending, Decimal::ZERO);
    }

    #[test]
    fn transfer_moves_both_sides() {
        let a = UserId::new();
        let b = UserId::new();
        let store = store_with(a, 1000);
        store.open_account(b, "NGN").unwrap();

        let (from_bal, to_bal) = store.transfer(a, b, Decimal::new(300, 0)).unwrap();
        assert_eq!(from_bal, Decimal::new(700, 0));
        assert_eq!(to_bal, Decimal::new(300, 0));
        assert_eq!(store.available(a).unwrap(), Decimal::new(700, 0));
        assert_eq!(store.available(b).unwrap(), Decimal::new(300, 0));
    }

    #[test]
    fn transfer_insufficient_changes_nothing() {
        let a = UserId::new();
        let b = UserId::new();
        let store = store_with(a, 100);
        store.open_account(b, "NGN").unwrap();

        let err = store.transfer(a, b, Decimal::new(500, 0)).unwrap_err();
        assert!(matches!(err, VaultError::InsufficientFunds { .. }));
        assert_eq!(store.available(a).unwrap(), Decimal::new(100, 0));
        assert_eq!(store.available(b).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn transfer_to_self_rejected() {
        let a = UserId::new();
        let store = store_with(a, 100);
        assert!(matches!(
            store.transfer(a, a, Decimal::ONE).unwrap_err(),
            VaultError::SelfTransfer
        ));
    }

    #[test]
    fn transfer_currency_mismatch() {
        let a = UserId::new();
        let b = UserId::new();
        let store = store_with(a, 100);
        store.open_account(b, "USD").unwrap();
        let err = store.transfer(a, b, Decimal::ONE).unwrap_err();
        assert!(matches!(err, VaultError::CurrencyMismatch { .. }));
    }

    #[test]
    fn deactivated_wallet_rejects_mutation() {
        let a = UserId::new();
        let b = UserId::new();
        let store = store_with(a, 100);
        store.open_account(b, "NGN").unwrap();
        store.deactivate(b).unwrap();

        assert!(matches!(
            store.credit(b, Decimal::ONE).unwrap_err(),
            VaultError::AccountInactive(_)
        ));
        assert!(matches!(
            store.transfer(a, b, Decimal::ONE).unwrap_err(),
            VaultError::AccountInactive(_)
        ));
    }

    #[test]
    fn virtual_account_info_attaches() {
        let a = UserId::new();
        let store = store_with(a, 0);
        store.set_virtual_account(a, "9012345678", "Wema Bank").unwrap();
        let wallet = store.snapshot(a).unwrap();
        assert_eq!(wallet.virtual_account_number.as_deref(), Some("9012345678"));
        assert_eq!(wallet.virtual_account_bank.as_deref(), Some("Wema Bank"));
    }

    #[test]
    fn missing_account_errors() {
        let store = AccountStore::new();
        let err = store.available(UserId::new()).unwrap_err();
        assert!(matches!(err, VaultError::AccountNotFound(_)));
    }

    #[test]
    fn total_supply_sums_wallets() {
        let a = UserId::new();
        let b = UserId::new();
        let store = store_with(a, 1000);
        store.open_account(b, "NGN").unwrap();
        store.credit(b, Decimal::new(500, 0)).unwrap();
        store.hold(a, Decimal::new(300, 0)).unwrap();
        assert_eq!(store.total_supply(), Decimal::new(1500, 0));
    }

    #[test]
    fn crossing_transfers_do_not_deadlock() {
        use std::sync::Arc;

        let a = UserId::new();
        let b = UserId::new();
        let store = Arc::new(store_with(a, 10_000));
        store.open_account(b, "NGN").unwrap();
        store.credit(b, Decimal::new(10_000, 0)).unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                    let _ = store.transfer(from, to, Decimal::ONE);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // Money conserved regardless of interleaving.
        assert_eq!(store.total_supply(), Decimal::new(20_000, 0));
    }
}
