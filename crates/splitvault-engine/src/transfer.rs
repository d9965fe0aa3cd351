//! Transfer service — peer-to-peer money movement and top-ups.
//!
//! Pipeline per request: validate → PIN gate (when a PIN is supplied) →
//! tier limits → journal a pending entry → atomic balance move → complete
//! the entry → emit an event. A failure at any step leaves balances
//! untouched; failures after the journal write resolve the entry to
//! `Failed` for audit.
//!
//! Retries are idempotent: a request whose reference is already owned by a
//! completed entry returns the original receipt without re-debiting.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use splitvault_gate::{AuthGate, LimitChecker, TierLookup};
use splitvault_ledger::{AccountStore, TransactionJournal};
use splitvault_types::{
    EngineEvent, EntryId, EntryStatus, EntryType, EventSink, LedgerEntry, Reference, Result,
    UserId, VaultError,
};

/// A transfer or top-up request.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from: UserId,
    pub to: UserId,
    pub amount: Decimal,
    pub description: Option<String>,
    /// Supplied when the caller's policy requires step-up authentication.
    pub pin: Option<String>,
    /// Client-supplied idempotency key; generated when absent.
    pub reference: Option<Reference>,
}

/// Result of a committed transfer or top-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transaction_id: EntryId,
    pub reference: Reference,
    /// The acting wallet's available balance after commit.
    pub new_balance: Decimal,
}

/// Peer-to-peer transfers and external-funds top-ups.
pub struct TransferService {
    accounts: Arc<AccountStore>,
    journal: Arc<TransactionJournal>,
    gate: Arc<AuthGate>,
    limits: LimitChecker,
    tiers: Arc<dyn TierLookup>,
    events: Arc<dyn EventSink>,
}

impl TransferService {
    #[must_use]
    pub fn new(
        accounts: Arc<AccountStore>,
        journal: Arc<TransactionJournal>,
        gate: Arc<AuthGate>,
        limits: LimitChecker,
        tiers: Arc<dyn TierLookup>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            accounts,
            journal,
            gate,
            limits,
            tiers,
            events,
        }
    }

    /// Move money between two wallets.
    ///
    /// # Errors
    /// `Validation` / `SelfTransfer` / `AuthFailed` / `AuthLocked` /
    /// `LimitExceeded` / `InsufficientFunds` / `AccountNotFound` — in every
    /// case no balance changed.
    pub fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        let now = Utc::now();

        if request.amount <= Decimal::ZERO {
            return Err(VaultError::Validation {
                reason: "Transfer amount must be positive".to_string(),
            });
        }
        if request.from == request.to {
            return Err(VaultError::SelfTransfer);
        }

        // Idempotent retry: a reference owned by a completed entry replays
        // the original result.
        if let Some(reference) = &request.reference {
            if let Some(receipt) = self.replay(reference, EntryType::Transfer)? {
                return Ok(receipt);
            }
        }

        // Step-up authentication, before anything touches the ledger.
        if let Some(pin) = &request.pin {
            if let Err(err) = self.gate.require(request.from, pin, now) {
                self.events.emit(
                    EngineEvent::new(request.from, "pin_failed", "auth", request.from)
                        .with_metadata(serde_json::json!({ "operation": "transfer" })),
                );
                return Err(err);
            }
        }

        // Tier limits over the rolling daily total.
        let tier = self.tiers.tier_for(request.from);
        let spent_today = self
            .journal
            .daily_outflow(request.from, EntryType::Transfer, now)?;
        self.limits.check(request.amount, spent_today, tier)?;

        let reference = request
            .reference
            .clone()
            .unwrap_or_else(Reference::generate);

        let mut entry = LedgerEntry::new(
            EntryType::Transfer,
            request.amount,
            Some(request.from),
            Some(request.to),
            reference.clone(),
        );
        if let Some(description) = &request.description {
            entry = entry.with_description(description.clone());
        }

        let entry_id = match self.journal.append(entry) {
            Ok(id) => id,
            // Lost a race against a concurrent retry with the same key.
            Err(VaultError::DuplicateReference(_)) => {
                return self
                    .replay(&reference, EntryType::Transfer)?
                    .ok_or(VaultError::ConcurrencyConflict {
                        reason: "reference still in flight".to_string(),
                    });
            }
            Err(err) => return Err(err),
        };

        let (from_balance, _) =
            match self
                .accounts
                .transfer(request.from, request.to, request.amount)
            {
                Ok(balances) => balances,
                Err(err) => {
                    // Audit record; the reference is released for retries.
                    self.journal.fail(entry_id, err.to_string())?;
                    return Err(err);
                }
            };

        self.journal.complete(entry_id, Some(from_balance))?;

        tracing::info!(
            from = %request.from,
            to = %request.to,
            amount = %request.amount,
            %reference,
            "transfer completed"
        );
        self.events.emit(
            EngineEvent::new(request.from, "transfer_completed", "transaction", entry_id)
                .with_metadata(serde_json::json!({
                    "to": request.to.to_string(),
                    "amount": request.amount.to_string(),
                    "reference": reference.to_string(),
                })),
        );

        Ok(TransferReceipt {
            transaction_id: entry_id,
            reference,
            new_balance: from_balance,
        })
    }

    /// Credit externally confirmed funds into a wallet.
    ///
    /// The payment collaborator has already validated the inbound transfer;
    /// no PIN or limit applies. Idempotent by reference.
    ///
    /// # Errors
    /// `Validation` / `AccountNotFound` / `AccountInactive`.
    pub fn topup(
        &self,
        user_id: UserId,
        amount: Decimal,
        reference: Option<Reference>,
    ) -> Result<TransferReceipt> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::Validation {
                reason: "Top-up amount must be positive".to_string(),
            });
        }

        if let Some(reference) = &reference {
            if let Some(receipt) = self.replay(reference, EntryType::Topup)? {
                return Ok(receipt);
            }
        }

        let reference = reference.unwrap_or_else(Reference::generate);
        let entry = LedgerEntry::new(
            EntryType::Topup,
            amount,
            None,
            Some(user_id),
            reference.clone(),
        );

        let entry_id = match self.journal.append(entry) {
            Ok(id) => id,
            Err(VaultError::DuplicateReference(_)) => {
                return self
                    .replay(&reference, EntryType::Topup)?
                    .ok_or(VaultError::ConcurrencyConflict {
                        reason: "reference still in flight".to_string(),
                    });
            }
            Err(err) => return Err(err),
        };

        let new_balance = match self.accounts.credit(user_id, amount) {
            Ok(balance) => balance,
            Err(err) => {
                self.journal.fail(entry_id, err.to_string())?;
                return Err(err);
            }
        };

        self.journal.complete(entry_id, Some(new_balance))?;

        self.events.emit(
            EngineEvent::new(user_id, "topup_completed", "transaction", entry_id)
                .with_metadata(serde_json::json!({ "amount": amount.to_string() })),
        );

        Ok(TransferReceipt {
            transaction_id: entry_id,
            reference,
            new_balance,
        })
    }

    /// Look up a reference and reconstruct the original receipt if its
    /// entry completed. `None` means the reference is free.
    ///
    /// # Errors
    /// `ConcurrencyConflict` while the original attempt is still pending;
    /// `DuplicateReference` if the reference belongs to a different kind of
    /// entry.
    fn replay(
        &self,
        reference: &Reference,
        expected_type: EntryType,
    ) -> Result<Option<TransferReceipt>> {
        let Some(entry) = self.journal.find_by_reference(reference)? else {
            return Ok(None);
        };
        if entry.entry_type != expected_type {
            return Err(VaultError::DuplicateReference(reference.clone()));
        }
        match entry.status {
            EntryStatus::Completed => Ok(Some(TransferReceipt {
                transaction_id: entry.id,
                reference: entry.reference,
                new_balance: entry.balance_after.unwrap_or(Decimal::ZERO),
            })),
            EntryStatus::Pending => Err(VaultError::ConcurrencyConflict {
                reason: "reference still in flight".to_string(),
            }),
            // Failed entries release their reference; unreachable here.
            EntryStatus::Failed => Ok(None),
        }
    }
}
