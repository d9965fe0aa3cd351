//! Recurring-deduction scheduler ("hourglass" savings plans).
//!
//! Driven by a periodic external tick: `process_due(now)` scans active
//! plans and applies at most one deduction per plan per call. The next
//! cycle boundary always advances from the previous *scheduled* date, not
//! from `now`, so the schedule never drifts.
//!
//! Re-running a sweep is safe: a plan's `next_deduction_date` advances in
//! the same locked mutation as the deduction, and each cycle's ledger
//! entry carries a deterministic id, so a crashed half-applied sweep
//! cannot double-deduct.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use splitvault_ledger::{AccountStore, TransactionJournal};
use splitvault_types::{
    EngineEvent, EntryId, EntryStatus, EntryType, EventSink, LedgerEntry, PlanId, PlanStatus,
    Recurrence, RecurringPlan, Reference, Result, SchedulerPolicy, UserId, VaultError,
};

/// What happened to one plan during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeductionOutcome {
    /// Deduction applied; `current_saved` grew by the plan's amount.
    Deducted,
    /// End date reached; plan completed without a final deduction.
    Completed,
    /// Insufficient funds this cycle; retried on the next tick.
    Skipped,
    /// Insufficient funds beyond the configured tolerance; plan paused.
    AutoPaused,
}

/// One sweep result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeductionResult {
    pub plan_id: PlanId,
    pub user_id: UserId,
    pub outcome: DeductionOutcome,
}

fn poisoned() -> VaultError {
    VaultError::ConcurrencyConflict {
        reason: "scheduler lock poisoned".to_string(),
    }
}

/// Time-driven repeated deductions into per-plan sub-ledgers.
pub struct HourglassScheduler {
    accounts: Arc<AccountStore>,
    journal: Arc<TransactionJournal>,
    events: Arc<dyn EventSink>,
    policy: SchedulerPolicy,
    plans: RwLock<HashMap<PlanId, RecurringPlan>>,
}

impl HourglassScheduler {
    #[must_use]
    pub fn new(
        accounts: Arc<AccountStore>,
        journal: Arc<TransactionJournal>,
        events: Arc<dyn EventSink>,
        policy: SchedulerPolicy,
    ) -> Self {
        Self {
            accounts,
            journal,
            events,
            policy,
            plans: RwLock::new(HashMap::new()),
        }
    }

    /// Create a plan and apply its first deduction immediately.
    ///
    /// If the owner cannot cover the first deduction, no plan is created.
    ///
    /// # Errors
    /// `Validation` / `InsufficientFunds` / `AccountNotFound`.
    pub fn create_plan(
        &self,
        user_id: UserId,
        name: &str,
        target_amount: Decimal,
        deduction_amount: Decimal,
        recurrence: Recurrence,
        end_date: DateTime<Utc>,
    ) -> Result<PlanId> {
        let now = Utc::now();
        if deduction_amount <= Decimal::ZERO {
            return Err(VaultError::Validation {
                reason: "Deduction amount must be positive".to_string(),
            });
        }
        if target_amount <= Decimal::ZERO {
            return Err(VaultError::Validation {
                reason: "Target amount must be positive".to_string(),
            });
        }
        if end_date <= now {
            return Err(VaultError::Validation {
                reason: "End date must be in the future".to_string(),
            });
        }

        let plan_id = PlanId::new();
        let mut plans = self.plans.write().map_err(|_| poisoned())?;

        // First savings applied at creation, before the plan exists.
        self.apply_deduction(plan_id, user_id, deduction_amount, now)?;

        plans.insert(
            plan_id,
            RecurringPlan {
                id: plan_id,
                user_id,
                name: name.to_string(),
                target_amount,
                current_saved: deduction_amount,
                deduction_amount,
                recurrence,
                next_deduction_date: recurrence.advance(now),
                end_date,
                status: PlanStatus::Active,
                consecutive_failures: 0,
                created_at: now,
            },
        );

        self.events.emit(
            EngineEvent::new(user_id, "plan_created", "plan", plan_id).with_metadata(
                serde_json::json!({
                    "name": name,
                    "first_deduction": deduction_amount.to_string(),
                }),
            ),
        );
        Ok(plan_id)
    }

    /// Apply deductions for every active plan due at `now`. Returns one
    /// result row per touched plan. Running the same sweep twice for the
    /// same `now` applies at most one deduction per plan per due cycle.
    pub fn process_due(&self, now: DateTime<Utc>) -> Result<Vec<DeductionResult>> {
        let mut plans = self.plans.write().map_err(|_| poisoned())?;
        let mut results = Vec::new();

        for plan in plans.values_mut() {
            if plan.status != PlanStatus::Active {
                continue;
            }

            // End date takes precedence over any pending deduction.
            if now >= plan.end_date {
                plan.transition(PlanStatus::Completed)?;
                self.events.emit(
                    EngineEvent::new(plan.user_id, "plan_completed", "plan", plan.id)
                        .with_metadata(serde_json::json!({
                            "saved": plan.current_saved.to_string(),
                        })),
                );
                results.push(DeductionResult {
                    plan_id: plan.id,
                    user_id: plan.user_id,
                    outcome: DeductionOutcome::Completed,
                });
                continue;
            }

            if plan.next_deduction_date > now {
                continue;
            }

            let cycle = plan.next_deduction_date;
            match self.apply_cycle_deduction(plan, cycle) {
                Ok(()) => {
                    plan.current_saved += plan.deduction_amount;
                    // Advance from the scheduled boundary, not from `now`.
                    plan.next_deduction_date = plan.recurrence.advance(cycle);
                    plan.consecutive_failures = 0;
                    self.events.emit(
                        EngineEvent::new(plan.user_id, "plan_deduction", "plan", plan.id)
                            .with_metadata(serde_json::json!({
                                "amount": plan.deduction_amount.to_string(),
                                "saved": plan.current_saved.to_string(),
                            })),
                    );
                    results.push(DeductionResult {
                        plan_id: plan.id,
                        user_id: plan.user_id,
                        outcome: DeductionOutcome::Deducted,
                    });
                }
                Err(VaultError::InsufficientFunds { .. }) => {
                    // Schedule unchanged; the next tick retries this cycle.
                    plan.consecutive_failures += 1;
                    let exhausted = self
                        .policy
                        .max_consecutive_failures
                        .is_some_and(|max| plan.consecutive_failures >= max);
                    if exhausted {
                        plan.transition(PlanStatus::Paused)?;
                        tracing::warn!(plan = %plan.id, "plan auto-paused after repeated insufficient funds");
                        self.events.emit(EngineEvent::new(
                            plan.user_id,
                            "plan_paused",
                            "plan",
                            plan.id,
                        ));
                        results.push(DeductionResult {
                            plan_id: plan.id,
                            user_id: plan.user_id,
                            outcome: DeductionOutcome::AutoPaused,
                        });
                    } else {
                        results.push(DeductionResult {
                            plan_id: plan.id,
                            user_id: plan.user_id,
                            outcome: DeductionOutcome::Skipped,
                        });
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }

    /// Freeze a plan. The schedule does not move while paused.
    ///
    /// # Errors
    /// `PlanNotFound` / `InvalidPlanTransition`.
    pub fn pause(&self, user_id: UserId, plan_id: PlanId) -> Result<()> {
        let mut plans = self.plans.write().map_err(|_| poisoned())?;
        let plan = owned_plan(&mut plans, user_id, plan_id)?;
        plan.transition(PlanStatus::Paused)
    }

    /// Resume a paused plan. The next deduction is one recurrence unit
    /// from now.
    ///
    /// # Errors
    /// `PlanNotFound` / `InvalidPlanTransition`.
    pub fn resume(&self, user_id: UserId, plan_id: PlanId) -> Result<()> {
        let now = Utc::now();
        let mut plans = self.plans.write().map_err(|_| poisoned())?;
        let plan = owned_plan(&mut plans, user_id, plan_id)?;
        plan.transition(PlanStatus::Active)?;
        plan.next_deduction_date = plan.recurrence.advance(now);
        Ok(())
    }

    /// Cancel a plan, refunding the entire saved amount to the owner.
    ///
    /// # Errors
    /// `PlanNotFound` / `PlanNotActive` for already-terminal plans.
    pub fn cancel(&self, user_id: UserId, plan_id: PlanId) -> Result<()> {
        let mut plans = self.plans.write().map_err(|_| poisoned())?;
        let plan = owned_plan(&mut plans, user_id, plan_id)?;
        if !plan.status.can_transition_to(PlanStatus::Cancelled) {
            return Err(VaultError::PlanNotActive {
                plan_id,
                status: plan.status,
            });
        }

        let refund = plan.current_saved;
        if refund > Decimal::ZERO {
            let entry = LedgerEntry::new(
                EntryType::RecurringDeduction,
                refund,
                None,
                Some(user_id),
                Reference::generate(),
            )
            .with_description("plan cancelled — saved amount refunded");
            let entry_id = self.journal.append(entry)?;
            let new_balance = self.accounts.credit(user_id, refund)?;
            self.journal.complete(entry_id, Some(new_balance))?;
        }

        plan.current_saved = Decimal::ZERO;
        plan.transition(PlanStatus::Cancelled)?;
        self.events.emit(
            EngineEvent::new(user_id, "plan_cancelled", "plan", plan_id)
                .with_metadata(serde_json::json!({ "refunded": refund.to_string() })),
        );
        Ok(())
    }

    /// Snapshot of a plan.
    pub fn plan(&self, plan_id: PlanId) -> Result<RecurringPlan> {
        let plans = self.plans.read().map_err(|_| poisoned())?;
        plans
            .get(&plan_id)
            .cloned()
            .ok_or(VaultError::PlanNotFound(plan_id))
    }

    /// All plans owned by a user.
    pub fn plans_for(&self, user_id: UserId) -> Result<Vec<RecurringPlan>> {
        let plans = self.plans.read().map_err(|_| poisoned())?;
        Ok(plans
            .values()
            .filter(|plan| plan.user_id == user_id)
            .cloned()
            .collect())
    }

    /// Total funds currently held in non-terminal plan sub-ledgers. Used
    /// by conservation checks.
    pub fn saved_total(&self) -> Result<Decimal> {
        let plans = self.plans.read().map_err(|_| poisoned())?;
        Ok(plans
            .values()
            .filter(|plan| {
                matches!(plan.status, PlanStatus::Active | PlanStatus::Paused | PlanStatus::Completed)
            })
            .map(|plan| plan.current_saved)
            .sum())
    }

    /// Debit one cycle's amount with a deterministic per-cycle entry id.
    fn apply_cycle_deduction(&self, plan: &RecurringPlan, cycle: DateTime<Utc>) -> Result<()> {
        let entry_id = EntryId::deterministic(plan.id, cycle);
        match self.journal.get(entry_id)? {
            // A completed entry under this id means a previous sweep
            // already applied this cycle.
            Some(entry) if entry.status == EntryStatus::Completed => Ok(()),
            // A failed attempt left the id taken but moved no money;
            // retry under a fresh id.
            Some(_) => {
                self.apply_deduction_with_id(EntryId::new(), plan.user_id, plan.deduction_amount)
            }
            None => self.apply_deduction_with_id(entry_id, plan.user_id, plan.deduction_amount),
        }
    }

    fn apply_deduction(
        &self,
        plan_id: PlanId,
        user_id: UserId,
        amount: Decimal,
        cycle: DateTime<Utc>,
    ) -> Result<()> {
        self.apply_deduction_with_id(EntryId::deterministic(plan_id, cycle), user_id, amount)
    }

    fn apply_deduction_with_id(
        &self,
        entry_id: EntryId,
        user_id: UserId,
        amount: Decimal,
    ) -> Result<()> {
        let entry = LedgerEntry::new(
            EntryType::RecurringDeduction,
            amount,
            Some(user_id),
            None,
            Reference::generate(),
        )
        .with_id(entry_id);
        self.journal.append(entry)?;
        match self.accounts.debit(user_id, amount) {
            Ok(balance) => {
                self.journal.complete(entry_id, Some(balance))?;
                Ok(())
            }
            Err(err) => {
                self.journal.fail(entry_id, err.to_string())?;
                Err(err)
            }
        }
    }
}

fn owned_plan<'a>(
    plans: &'a mut HashMap<PlanId, RecurringPlan>,
    user_id: UserId,
    plan_id: PlanId,
) -> Result<&'a mut RecurringPlan> {
    let plan = plans
        .get_mut(&plan_id)
        .ok_or(VaultError::PlanNotFound(plan_id))?;
    // Ownership failures look like absence — don't leak other users' plans.
    if plan.user_id != user_id {
        return Err(VaultError::PlanNotFound(plan_id));
    }
    Ok(plan)
}
