//! Append-only transaction journal.
//!
//! Every balance-affecting event is journaled as a `Pending` entry before
//! the balance moves, then resolved to `Completed` or `Failed` within the
//! same operation. Once terminal, an entry never changes.
//!
//! The journal also owns idempotency: a reference is reserved when its
//! entry is appended and released only if the entry fails, so a retried
//! request with a known reference can be answered with the original result
//! and a racing duplicate is rejected outright.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use splitvault_types::{
    EntryId, EntryStatus, EntryType, LedgerEntry, Reference, Result, UserId, VaultError,
};

fn poisoned() -> VaultError {
    VaultError::ConcurrencyConflict {
        reason: "journal lock poisoned".to_string(),
    }
}

#[derive(Default)]
struct JournalInner {
    entries: Vec<LedgerEntry>,
    by_id: HashMap<EntryId, usize>,
    /// Reference → entry id, for pending and completed entries only.
    by_reference: HashMap<Reference, EntryId>,
}

/// Append-only record of every balance-affecting event.
///
/// Internally synchronized: share behind an `Arc`.
pub struct TransactionJournal {
    inner: RwLock<JournalInner>,
}

impl TransactionJournal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(JournalInner::default()),
        }
    }

    /// Journal a new `Pending` entry, reserving its reference.
    ///
    /// # Errors
    /// - [`VaultError::DuplicateReference`] if the reference is owned by a
    ///   pending or completed entry
    /// - [`VaultError::Validation`] if the entry id itself is already
    ///   journaled (deterministic-id replay)
    pub fn append(&self, entry: LedgerEntry) -> Result<EntryId> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        if inner.by_id.contains_key(&entry.id) {
            return Err(VaultError::Validation {
                reason: format!("Entry {} already journaled", entry.id),
            });
        }
        if inner.by_reference.contains_key(&entry.reference) {
            return Err(VaultError::DuplicateReference(entry.reference));
        }

        let id = entry.id;
        let idx = inner.entries.len();
        inner.by_reference.insert(entry.reference.clone(), id);
        inner.by_id.insert(id, idx);
        inner.entries.push(entry);
        Ok(id)
    }

    /// Resolve a pending entry to `Completed`. Returns a copy of the final
    /// record.
    ///
    /// # Errors
    /// [`VaultError::EntryNotFound`] / [`VaultError::InvalidEntryTransition`].
    pub fn complete(&self, id: EntryId, balance_after: Option<Decimal>) -> Result<LedgerEntry> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let idx = *inner.by_id.get(&id).ok_or(VaultError::EntryNotFound)?;
        let entry = &mut inner.entries[idx];
        entry.mark_completed(balance_after)?;
        Ok(entry.clone())
    }

    /// Resolve a pending entry to `Failed`, releasing its reference for
    /// future retries. Returns a copy of the final record.
    ///
    /// # Errors
    /// [`VaultError::EntryNotFound`] / [`VaultError::InvalidEntryTransition`].
    pub fn fail(&self, id: EntryId, reason: impl Into<String>) -> Result<LedgerEntry> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let idx = *inner.by_id.get(&id).ok_or(VaultError::EntryNotFound)?;
        let entry = &mut inner.entries[idx];
        entry.mark_failed(reason)?;
        let reference = entry.reference.clone();
        let snapshot = entry.clone();
        inner.by_reference.remove(&reference);
        Ok(snapshot)
    }

    /// Look up the entry owning a reference (pending or completed).
    pub fn find_by_reference(&self, reference: &Reference) -> Result<Option<LedgerEntry>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .by_reference
            .get(reference)
            .and_then(|id| inner.by_id.get(id))
            .map(|&idx| inner.entries[idx].clone()))
    }

    /// Look up an entry by id.
    pub fn get(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.by_id.get(&id).map(|&idx| inner.entries[idx].clone()))
    }

    /// All entries touching the given user, in journal order.
    pub fn entries_for_account(&self, user_id: UserId) -> Result<Vec<LedgerEntry>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .entries
            .iter()
            .filter(|e| e.from_account == Some(user_id) || e.to_account == Some(user_id))
            .cloned()
            .collect())
    }

    /// Sum of the user's outflow of the given type on `now`'s UTC calendar
    /// day. Pending entries count — an in-flight transfer reserves its
    /// headroom against the daily ceiling.
    pub fn daily_outflow(
        &self,
        user_id: UserId,
        entry_type: EntryType,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        let day = now.date_naive();
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .entries
            .iter()
            .filter(|e| {
                e.from_account == Some(user_id)
                    && e.entry_type == entry_type
                    && e.status != EntryStatus::Failed
                    && e.created_at.date_naive() == day
            })
            .map(|e| e.amount)
            .sum())
    }

    /// Number of journaled entries.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    /// Whether the journal is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TransactionJournal {
    fn default() -> Self {
        Self::new()
    }
}
