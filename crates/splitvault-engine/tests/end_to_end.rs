//! End-to-end integration tests across the ledger, gate, and engine.
//!
//! These exercise the full operation pipeline:
//! AuthGate -> LimitChecker -> AccountStore -> TransactionJournal -> events
//!
//! They verify the engine's core financial properties in realistic
//! scenarios: concurrent no-double-spend, transfer atomicity, idempotent
//! retries, room unlock and refund correctness, PIN lockout, recurring
//! deduction idempotence, and limit boundaries.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use splitvault_engine::{
    DeductionOutcome, HourglassScheduler, RoomEngine, TransferReceipt, TransferRequest,
    TransferService,
};
use splitvault_gate::{AuthGate, InMemoryTiers, LimitChecker, TierLookup};
use splitvault_ledger::{AccountStore, TransactionJournal};
use splitvault_types::*;

/// Helper: fully wired engine over shared ledger state.
struct Vault {
    accounts: Arc<AccountStore>,
    journal: Arc<TransactionJournal>,
    gate: Arc<AuthGate>,
    sink: Arc<MemorySink>,
    transfers: Arc<TransferService>,
    rooms: RoomEngine,
    scheduler: HourglassScheduler,
}

impl Vault {
    fn new() -> Self {
        let accounts = Arc::new(AccountStore::new());
        let journal = Arc::new(TransactionJournal::new());
        let gate = Arc::new(AuthGate::new(PinPolicy::default()));
        let tiers = Arc::new(InMemoryTiers::new());
        let sink = Arc::new(MemorySink::new());
        let events = Arc::clone(&sink) as Arc<dyn EventSink>;

        let transfers = Arc::new(TransferService::new(
            Arc::clone(&accounts),
            Arc::clone(&journal),
            Arc::clone(&gate),
            LimitChecker::new(LimitsConfig::default()),
            Arc::clone(&tiers) as Arc<dyn TierLookup>,
            Arc::clone(&events),
        ));
        let rooms = RoomEngine::new(
            Arc::clone(&accounts),
            Arc::clone(&journal),
            Arc::clone(&events),
        );
        let scheduler = HourglassScheduler::new(
            Arc::clone(&accounts),
            Arc::clone(&journal),
            Arc::clone(&events),
            SchedulerPolicy::default(),
        );

        Self {
            accounts,
            journal,
            gate,
            sink,
            transfers,
            rooms,
            scheduler,
        }
    }

    fn user_with(&self, amount: i64) -> UserId {
        let user = UserId::new();
        self.accounts.open_account(user, "NGN").unwrap();
        if amount > 0 {
            self.transfers
                .topup(user, Decimal::new(amount, 0), None)
                .unwrap();
        }
        user
    }

    fn transfer(&self, from: UserId, to: UserId, amount: i64) -> Result<TransferReceipt> {
        self.transfers.transfer(TransferRequest {
            from,
            to,
            amount: Decimal::new(amount, 0),
            description: None,
            pin: None,
            reference: None,
        })
    }

    /// Wallets + open room pools + non-refunded plan sub-ledgers. Constant
    /// across every internal movement; only top-ups grow it.
    fn total_money(&self) -> Decimal {
        self.accounts.total_supply()
            + self.rooms.pooled_total().unwrap()
            + self.scheduler.saved_total().unwrap()
    }
}

// ---------------------------------------------------------------------------
// No double-spend / atomicity
// ---------------------------------------------------------------------------

#[test]
fn concurrent_debits_never_overdraw() {
    let vault = Arc::new(Vault::new());
    let sender = vault.user_with(1_000);
    let recipient = vault.user_with(0);

    // 10 threads each try to move 300; only 3 can fit in 1,000.
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let vault = Arc::clone(&vault);
            std::thread::spawn(move || vault.transfer(sender, recipient, 300).is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .filter_map(|handle| handle.join().ok())
        .filter(|ok| *ok)
        .count();

    assert_eq!(successes, 3, "exactly the debits that fit succeed");
    let sender_balance = vault.accounts.available(sender).unwrap();
    assert_eq!(sender_balance, Decimal::new(100, 0));
    assert!(sender_balance >= Decimal::ZERO, "balance never negative");
    assert_eq!(
        vault.accounts.available(recipient).unwrap(),
        Decimal::new(900, 0)
    );
    assert_eq!(vault.total_money(), Decimal::new(1_000, 0));
}

#[test]
fn transfer_is_atomic_on_failure() {
    let vault = Vault::new();
    let a = vault.user_with(1_000);
    let b = vault.user_with(500);
    let before = vault.total_money();

    let err = vault.transfer(a, b, 5_000).unwrap_err();
    assert!(matches!(err, VaultError::InsufficientFunds { .. }));

    // Neither side moved; money conserved.
    assert_eq!(vault.accounts.available(a).unwrap(), Decimal::new(1_000, 0));
    assert_eq!(vault.accounts.available(b).unwrap(), Decimal::new(500, 0));
    assert_eq!(vault.total_money(), before);

    // The abort left an audit record, not a limbo entry.
    let entries = vault.journal.entries_for_account(a).unwrap();
    assert!(entries
        .iter()
        .all(|entry| entry.status != EntryStatus::Pending));
}

#[test]
fn transfer_success_moves_both_sides_together() {
    let vault = Vault::new();
    let a = vault.user_with(10_000);
    let b = vault.user_with(0);
    let before = vault.total_money();

    let receipt = vault.transfer(a, b, 4_000).unwrap();
    assert_eq!(receipt.new_balance, Decimal::new(6_000, 0));
    assert_eq!(vault.accounts.available(b).unwrap(), Decimal::new(4_000, 0));
    assert_eq!(vault.total_money(), before);
    assert_eq!(vault.sink.with_action("transfer_completed").len(), 1);
}

// ---------------------------------------------------------------------------
// Idempotent retry
// ---------------------------------------------------------------------------

#[test]
fn retried_transfer_applies_exactly_once() {
    let vault = Vault::new();
    let a = vault.user_with(10_000);
    let b = vault.user_with(0);

    let request = TransferRequest {
        from: a,
        to: b,
        amount: Decimal::new(2_500, 0),
        description: Some("rent split".to_string()),
        pin: None,
        reference: Some(Reference::from("rent-2026-08")),
    };
    let first = vault.transfers.transfer(request.clone()).unwrap();
    let second = vault.transfers.transfer(request).unwrap();

    assert_eq!(first.transaction_id, second.transaction_id);
    assert_eq!(first.new_balance, second.new_balance);
    assert_eq!(vault.accounts.available(a).unwrap(), Decimal::new(7_500, 0));
    assert_eq!(vault.accounts.available(b).unwrap(), Decimal::new(2_500, 0));

    // Exactly one completed entry carries the reference.
    let completed: Vec<_> = vault
        .journal
        .entries_for_account(a)
        .unwrap()
        .into_iter()
        .filter(|entry| {
            entry.status == EntryStatus::Completed && entry.entry_type == EntryType::Transfer
        })
        .collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].reference, Reference::from("rent-2026-08"));
}

// ---------------------------------------------------------------------------
// Room escrow
// ---------------------------------------------------------------------------

#[test]
fn target_room_unlocks_once_with_full_overshoot() {
    let vault = Vault::new();
    let creator = vault.user_with(0);
    let alice = vault.user_with(1_000);
    let bob = vault.user_with(1_000);

    let receipt = vault
        .rooms
        .create_room(
            creator,
            "Generator fund",
            Decimal::new(100, 0),
            UnlockType::TargetReached,
            None,
        )
        .unwrap();
    vault.rooms.join(alice, &receipt.invite_code).unwrap();
    vault.rooms.join(bob, &receipt.invite_code).unwrap();

    let before = vault.total_money();
    vault
        .rooms
        .contribute(alice, receipt.room_id, Decimal::new(40, 0))
        .unwrap();
    vault
        .rooms
        .contribute(bob, receipt.room_id, Decimal::new(40, 0))
        .unwrap();
    assert_eq!(
        vault.rooms.room(receipt.room_id).unwrap().status,
        RoomStatus::Open
    );

    vault
        .rooms
        .contribute(alice, receipt.room_id, Decimal::new(30, 0))
        .unwrap();

    // Unlocked exactly once, at the third contribution, for the full 110.
    let room = vault.rooms.room(receipt.room_id).unwrap();
    assert_eq!(room.status, RoomStatus::Unlocked);
    assert_eq!(
        vault.accounts.available(creator).unwrap(),
        Decimal::new(110, 0)
    );
    assert_eq!(vault.sink.with_action("room_unlocked").len(), 1);
    assert_eq!(vault.total_money(), before);
}

#[test]
fn refund_conserves_money_exactly() {
    let vault = Vault::new();
    let creator = vault.user_with(0);
    let alice = vault.user_with(500);
    let bob = vault.user_with(500);

    let receipt = vault
        .rooms
        .create_room(
            creator,
            "Abandoned pot",
            Decimal::new(1_000, 0),
            UnlockType::TargetReached,
            None,
        )
        .unwrap();
    vault.rooms.join(alice, &receipt.invite_code).unwrap();
    vault.rooms.join(bob, &receipt.invite_code).unwrap();

    let before = vault.total_money();
    vault
        .rooms
        .contribute(alice, receipt.room_id, Decimal::new(40, 0))
        .unwrap();
    vault
        .rooms
        .contribute(bob, receipt.room_id, Decimal::new(60, 0))
        .unwrap();
    assert_eq!(vault.total_money(), before, "pool counts toward supply");

    vault.rooms.refund(receipt.room_id).unwrap();

    assert_eq!(vault.accounts.available(alice).unwrap(), Decimal::new(500, 0));
    assert_eq!(vault.accounts.available(bob).unwrap(), Decimal::new(500, 0));
    assert_eq!(vault.accounts.available(creator).unwrap(), Decimal::ZERO);
    assert_eq!(
        vault.rooms.room(receipt.room_id).unwrap().status,
        RoomStatus::Archived
    );
    assert_eq!(vault.total_money(), before);
}

#[test]
fn date_room_unlocks_only_via_sweep() {
    let vault = Vault::new();
    let creator = vault.user_with(0);
    let alice = vault.user_with(1_000);

    let unlock_date = Utc::now() + chrono::Duration::hours(2);
    let receipt = vault
        .rooms
        .create_room(
            creator,
            "Payday pot",
            Decimal::ZERO,
            UnlockType::DateReached,
            Some(unlock_date),
        )
        .unwrap();
    vault.rooms.join(alice, &receipt.invite_code).unwrap();
    vault
        .rooms
        .contribute(alice, receipt.room_id, Decimal::new(250, 0))
        .unwrap();

    // A contribution never releases a strictly date-based room.
    assert_eq!(
        vault.rooms.room(receipt.room_id).unwrap().status,
        RoomStatus::Open
    );
    assert!(vault.rooms.evaluate_due(Utc::now()).unwrap().is_empty());

    // Once due, the sweep releases deterministically — and only once.
    let released = vault
        .rooms
        .evaluate_due(unlock_date + chrono::Duration::seconds(1))
        .unwrap();
    assert_eq!(released, vec![receipt.room_id]);
    assert_eq!(
        vault.accounts.available(creator).unwrap(),
        Decimal::new(250, 0)
    );
    assert!(vault
        .rooms
        .evaluate_due(unlock_date + chrono::Duration::hours(1))
        .unwrap()
        .is_empty());
}

// ---------------------------------------------------------------------------
// PIN lockout
// ---------------------------------------------------------------------------

#[test]
fn pin_lockout_blocks_money_and_recovers() {
    let vault = Vault::new();
    let a = vault.user_with(10_000);
    let b = vault.user_with(0);
    vault.gate.setup_pin(a, "2468").unwrap();

    let attempt = |pin: &str| {
        vault.transfers.transfer(TransferRequest {
            from: a,
            to: b,
            amount: Decimal::new(1_000, 0),
            description: None,
            pin: Some(pin.to_string()),
            reference: None,
        })
    };

    // 5 consecutive wrong PINs lock the account.
    for _ in 0..5 {
        assert!(attempt("0000").is_err());
    }

    // 6th attempt, even with the correct PIN, fails with AuthLocked and
    // does not verify the PIN or move money.
    let err = attempt("2468").unwrap_err();
    assert!(matches!(err, VaultError::AuthLocked { .. }));
    assert_eq!(vault.accounts.available(a).unwrap(), Decimal::new(10_000, 0));
    assert_eq!(vault.sink.with_action("pin_failed").len(), 6);

    // After the window elapses, a correct PIN succeeds and resets the
    // counter (simulated via the gate's explicit-time seam).
    let after = Utc::now() + chrono::Duration::minutes(15);
    assert!(vault.gate.check_at(a, "2468", after).unwrap().success);
    assert_eq!(vault.gate.lock_state(a).unwrap().failed_attempts, 0);
}

// ---------------------------------------------------------------------------
// Recurring deductions
// ---------------------------------------------------------------------------

#[test]
fn sweep_applies_at_most_one_deduction_per_cycle() {
    let vault = Vault::new();
    let user = vault.user_with(10_000);
    let plan_id = vault
        .scheduler
        .create_plan(
            user,
            "Rainy day",
            Decimal::new(50_000, 0),
            Decimal::new(1_000, 0),
            Recurrence::Daily,
            Utc::now() + chrono::Duration::days(30),
        )
        .unwrap();
    // First deduction happened at creation.
    assert_eq!(vault.accounts.available(user).unwrap(), Decimal::new(9_000, 0));

    let due = vault.scheduler.plan(plan_id).unwrap().next_deduction_date;
    let first = vault.scheduler.process_due(due).unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].outcome, DeductionOutcome::Deducted);

    // Immediate re-run for the same `now`: no further deduction.
    let second = vault.scheduler.process_due(due).unwrap();
    assert!(second.is_empty());
    assert_eq!(vault.accounts.available(user).unwrap(), Decimal::new(8_000, 0));
    assert_eq!(
        vault.scheduler.plan(plan_id).unwrap().current_saved,
        Decimal::new(2_000, 0)
    );
}

#[test]
fn plan_lifecycle_conserves_money() {
    let vault = Vault::new();
    let user = vault.user_with(10_000);
    let before = vault.total_money();

    let plan_id = vault
        .scheduler
        .create_plan(
            user,
            "Laptop",
            Decimal::new(50_000, 0),
            Decimal::new(2_000, 0),
            Recurrence::Weekly,
            Utc::now() + chrono::Duration::days(90),
        )
        .unwrap();
    assert_eq!(vault.total_money(), before, "sub-ledger counts toward supply");

    let due = vault.scheduler.plan(plan_id).unwrap().next_deduction_date;
    vault.scheduler.process_due(due).unwrap();
    assert_eq!(vault.total_money(), before);

    // Cancel refunds the entire saved amount.
    vault.scheduler.cancel(user, plan_id).unwrap();
    assert_eq!(vault.accounts.available(user).unwrap(), Decimal::new(10_000, 0));
    assert_eq!(vault.total_money(), before);
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

#[test]
fn limit_boundaries_are_exact() {
    let vault = Vault::new();
    let a = vault.user_with(3_000_000);
    let b = vault.user_with(0);

    // Exactly the per-transaction ceiling succeeds.
    vault.transfer(a, b, 500_000).unwrap();

    // One unit above fails, naming the limit.
    let err = vault.transfer(a, b, 500_001).unwrap_err();
    assert!(matches!(
        err,
        VaultError::LimitExceeded {
            kind: LimitKind::PerTransaction,
            ..
        }
    ));

    // A second 500,000 lands exactly on the 1,000,000 daily ceiling.
    vault.transfer(a, b, 500_000).unwrap();

    // The transfer that would cross the daily ceiling fails — not before.
    let err = vault.transfer(a, b, 100).unwrap_err();
    assert!(matches!(
        err,
        VaultError::LimitExceeded {
            kind: LimitKind::Daily,
            ..
        }
    ));
    assert_eq!(
        vault.accounts.available(a).unwrap(),
        Decimal::new(2_000_000, 0)
    );
}
