//! Money-room engine — pooled escrow with conditional release.
//!
//! A contribution earmarks the contributor's funds, consumes them into the
//! room pool, journals the movement, and evaluates the unlock condition —
//! all inside one write lock, so there is no observable state where the
//! target is met but the room is still open.
//!
//! Strictly date-based rooms are released by the [`RoomEngine::evaluate_due`]
//! sweep, never by a contribution. Manual rooms are released only by an
//! explicit creator action.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use splitvault_ledger::{AccountStore, TransactionJournal};
use splitvault_types::{
    constants, Contribution, ContributionId, ContributionStatus, EngineEvent, EntryType,
    EventSink, LedgerEntry, Reference, Result, Room, RoomId, RoomMembership, RoomStatus,
    UnlockType, UserId, VaultError,
};

/// Returned by [`RoomEngine::create_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoomReceipt {
    pub room_id: RoomId,
    pub invite_code: String,
}

#[derive(Default)]
struct RoomsInner {
    rooms: HashMap<RoomId, Room>,
    invite_index: HashMap<String, RoomId>,
    members: HashMap<RoomId, Vec<RoomMembership>>,
    contributions: HashMap<RoomId, Vec<Contribution>>,
}

fn poisoned() -> VaultError {
    VaultError::ConcurrencyConflict {
        reason: "room engine lock poisoned".to_string(),
    }
}

/// Pooled escrow: create, join, contribute, release, refund.
pub struct RoomEngine {
    accounts: Arc<AccountStore>,
    journal: Arc<TransactionJournal>,
    events: Arc<dyn EventSink>,
    inner: RwLock<RoomsInner>,
}

impl RoomEngine {
    #[must_use]
    pub fn new(
        accounts: Arc<AccountStore>,
        journal: Arc<TransactionJournal>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            accounts,
            journal,
            events,
            inner: RwLock::new(RoomsInner::default()),
        }
    }

    /// Create a room. The creator becomes its first member.
    ///
    /// # Errors
    /// [`VaultError::Validation`] for a bad target/date combination.
    pub fn create_room(
        &self,
        creator_id: UserId,
        name: &str,
        target_amount: Decimal,
        unlock_type: UnlockType,
        unlock_date: Option<DateTime<Utc>>,
    ) -> Result<CreateRoomReceipt> {
        let now = Utc::now();
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        let invite_code = generate_invite_code(&inner.invite_index)?;
        let room = Room::new(
            creator_id,
            name,
            target_amount,
            unlock_type,
            unlock_date,
            invite_code.clone(),
            now,
        )?;
        let room_id = room.id;

        inner.invite_index.insert(invite_code.clone(), room_id);
        inner.members.entry(room_id).or_default().push(RoomMembership {
            room_id,
            user_id: creator_id,
            joined_at: now,
        });
        inner.rooms.insert(room_id, room);

        self.events.emit(
            EngineEvent::new(creator_id, "room_created", "room", room_id)
                .with_metadata(serde_json::json!({ "name": name })),
        );

        Ok(CreateRoomReceipt {
            room_id,
            invite_code,
        })
    }

    /// Join a room by invite code. Idempotent — re-joining succeeds without
    /// a duplicate membership row.
    ///
    /// # Errors
    /// [`VaultError::InviteCodeNotFound`] for unknown codes and for codes
    /// of rooms that are no longer open (expired).
    pub fn join(&self, user_id: UserId, invite_code: &str) -> Result<RoomId> {
        let now = Utc::now();
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        let room_id = *inner
            .invite_index
            .get(&invite_code.to_uppercase())
            .ok_or(VaultError::InviteCodeNotFound)?;
        let open = inner
            .rooms
            .get(&room_id)
            .is_some_and(|room| room.status == RoomStatus::Open);
        if !open {
            return Err(VaultError::InviteCodeNotFound);
        }

        let members = inner.members.entry(room_id).or_default();
        if members.iter().any(|m| m.user_id == user_id) {
            return Ok(room_id);
        }
        members.push(RoomMembership {
            room_id,
            user_id,
            joined_at: now,
        });

        self.events
            .emit(EngineEvent::new(user_id, "room_joined", "room", room_id));
        Ok(room_id)
    }

    /// Contribute to an open room. Returns the room's new pool amount.
    ///
    /// The debit, the pool increment, the contribution row, the ledger
    /// entry, and the unlock evaluation all commit under one lock.
    ///
    /// # Errors
    /// `Validation` / `RoomNotFound` / `RoomNotOpen` / `InsufficientFunds`.
    pub fn contribute(&self, user_id: UserId, room_id: RoomId, amount: Decimal) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(VaultError::Validation {
                reason: "Contribution amount must be positive".to_string(),
            });
        }
        let now = Utc::now();
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        {
            let room = inner
                .rooms
                .get(&room_id)
                .ok_or(VaultError::RoomNotFound(room_id))?;
            if room.status != RoomStatus::Open {
                return Err(VaultError::RoomNotOpen {
                    room_id,
                    status: room.status,
                });
            }
        }
        let is_member = inner
            .members
            .get(&room_id)
            .is_some_and(|members| members.iter().any(|m| m.user_id == user_id));
        if !is_member {
            return Err(VaultError::Validation {
                reason: "Not a room member".to_string(),
            });
        }

        // Earmark first: the funds leave `available` before the pool grows.
        self.accounts.hold(user_id, amount)?;

        let entry = LedgerEntry::new(
            EntryType::RoomContribution,
            amount,
            Some(user_id),
            None,
            Reference::generate(),
        );
        let entry_id = match self.journal.append(entry) {
            Ok(id) => id,
            Err(err) => {
                self.accounts.release_hold(user_id, amount)?;
                return Err(err);
            }
        };

        let new_balance = self.accounts.consume_hold(user_id, amount)?;
        self.journal.complete(entry_id, Some(new_balance))?;

        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(VaultError::RoomNotFound(room_id))?;
        room.current_amount += amount;
        let new_room_amount = room.current_amount;

        inner
            .contributions
            .entry(room_id)
            .or_default()
            .push(Contribution {
                id: ContributionId::new(),
                room_id,
                user_id,
                amount,
                status: ContributionStatus::Confirmed,
                transaction_id: entry_id,
                timestamp: now,
            });

        self.events.emit(
            EngineEvent::new(user_id, "room_contribution", "room", room_id).with_metadata(
                serde_json::json!({
                    "amount": amount.to_string(),
                    "pool": new_room_amount.to_string(),
                }),
            ),
        );

        // Synchronous unlock evaluation for target-bearing rooms; strictly
        // date-based rooms wait for the sweep.
        let room = inner.rooms.get_mut(&room_id).ok_or(VaultError::RoomNotFound(room_id))?;
        if room.unlock_type.requires_target() && room.unlock_due(now) {
            self.settle_unlock(room)?;
        }

        Ok(new_room_amount)
    }

    /// Sweep all open date-bearing rooms whose condition holds at `now`.
    /// Returns the rooms released by this call. Idempotent — released
    /// rooms are no longer due.
    pub fn evaluate_due(&self, now: DateTime<Utc>) -> Result<Vec<RoomId>> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let mut released = Vec::new();
        let due: Vec<RoomId> = inner
            .rooms
            .values()
            .filter(|room| room.unlock_type.requires_date() && room.unlock_due(now))
            .map(|room| room.id)
            .collect();
        for room_id in due {
            let room = inner
                .rooms
                .get_mut(&room_id)
                .ok_or(VaultError::RoomNotFound(room_id))?;
            self.settle_unlock(room)?;
            released.push(room_id);
        }
        Ok(released)
    }

    /// Manually release an open room's pool to its creator. Only the
    /// creator may do this. Releasing an already-unlocked room is a no-op.
    ///
    /// # Errors
    /// `RoomNotFound` / `NotRoomCreator` / `RoomNotOpen` (archived rooms).
    pub fn release(&self, caller: UserId, room_id: RoomId) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let room = inner
            .rooms
            .get_mut(&room_id)
            .ok_or(VaultError::RoomNotFound(room_id))?;
        if room.creator_id != caller {
            return Err(VaultError::NotRoomCreator);
        }
        match room.status {
            RoomStatus::Unlocked => Ok(()),
            RoomStatus::Archived => Err(VaultError::RoomNotOpen {
                room_id,
                status: room.status,
            }),
            RoomStatus::Open => self.settle_unlock(room),
        }
    }

    /// Archive a room and refund every confirmed contribution. Safely
    /// re-runnable: the room is archived first, and a re-run only processes
    /// contributions that are still confirmed. Returns the number refunded
    /// by this call.
    ///
    /// # Errors
    /// `RoomNotFound`; `RoomNotOpen` for unlocked rooms.
    pub fn refund(&self, room_id: RoomId) -> Result<usize> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;

        {
            let room = inner
                .rooms
                .get_mut(&room_id)
                .ok_or(VaultError::RoomNotFound(room_id))?;
            match room.status {
                RoomStatus::Unlocked => {
                    return Err(VaultError::RoomNotOpen {
                        room_id,
                        status: room.status,
                    });
                }
                // Archive first so no new contribution can slip in; a
                // re-run after a partial failure lands here.
                RoomStatus::Open => room.mark_archived()?,
                RoomStatus::Archived => {}
            }
        }

        let pending_refunds: Vec<(usize, UserId, Decimal)> = inner
            .contributions
            .get(&room_id)
            .map(|rows| {
                rows.iter()
                    .enumerate()
                    .filter(|(_, c)| c.status == ContributionStatus::Confirmed)
                    .map(|(idx, c)| (idx, c.user_id, c.amount))
                    .collect()
            })
            .unwrap_or_default();

        let mut refunded = 0;
        for (idx, user_id, amount) in pending_refunds {
            let entry = LedgerEntry::new(
                EntryType::RoomRefund,
                amount,
                None,
                Some(user_id),
                Reference::generate(),
            );
            let entry_id = self.journal.append(entry)?;
            let new_balance = self.accounts.credit(user_id, amount)?;
            self.journal.complete(entry_id, Some(new_balance))?;

            if let Some(rows) = inner.contributions.get_mut(&room_id) {
                rows[idx].status = ContributionStatus::Refunded;
            }
            if let Some(room) = inner.rooms.get_mut(&room_id) {
                room.current_amount -= amount;
            }
            self.events.emit(
                EngineEvent::new(user_id, "room_refunded", "room", room_id)
                    .with_metadata(serde_json::json!({ "amount": amount.to_string() })),
            );
            refunded += 1;
        }

        tracing::info!(%room_id, refunded, "room refunded and archived");
        Ok(refunded)
    }

    /// Snapshot of a room.
    pub fn room(&self, room_id: RoomId) -> Result<Room> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        inner
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(VaultError::RoomNotFound(room_id))
    }

    /// Contribution rows for a room, in arrival order.
    pub fn contributions(&self, room_id: RoomId) -> Result<Vec<Contribution>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.contributions.get(&room_id).cloned().unwrap_or_default())
    }

    /// Membership rows for a room.
    pub fn members(&self, room_id: RoomId) -> Result<Vec<RoomMembership>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.members.get(&room_id).cloned().unwrap_or_default())
    }

    /// Total funds currently held in open room pools. Used by conservation
    /// checks.
    pub fn pooled_total(&self) -> Result<Decimal> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .rooms
            .values()
            .filter(|room| room.status == RoomStatus::Open)
            .map(|room| room.current_amount)
            .sum())
    }

    /// Credit the full pool to the creator, journal the settlement, and
    /// mark the room unlocked. Caller holds the write lock and has checked
    /// the room is open.
    fn settle_unlock(&self, room: &mut Room) -> Result<()> {
        let amount = room.current_amount;
        let creator = room.creator_id;

        if amount > Decimal::ZERO {
            let entry = LedgerEntry::new(
                EntryType::RoomUnlock,
                amount,
                None,
                Some(creator),
                Reference::generate(),
            );
            let entry_id = self.journal.append(entry)?;
            let new_balance = match self.accounts.credit(creator, amount) {
                Ok(balance) => balance,
                Err(err) => {
                    // Room stays open; the next evaluation retries.
                    self.journal.fail(entry_id, err.to_string())?;
                    return Err(err);
                }
            };
            self.journal.complete(entry_id, Some(new_balance))?;
        }

        room.mark_unlocked()?;
        tracing::info!(room_id = %room.id, %amount, "room unlocked");
        self.events.emit(
            EngineEvent::new(creator, "room_unlocked", "room", room.id)
                .with_metadata(serde_json::json!({ "amount": amount.to_string() })),
        );
        Ok(())
    }
}

/// Draw a collision-free invite code: 8 chars from an unambiguous
/// uppercase alphabet.
fn generate_invite_code(index: &HashMap<String, RoomId>) -> Result<String> {
    const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
    let mut rng = rand::thread_rng();
    for _ in 0..constants::INVITE_CODE_MAX_ATTEMPTS {
        let code: String = (0..constants::INVITE_CODE_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        if !index.contains_key(&code) {
            return Ok(code);
        }
    }
    Err(VaultError::Internal(
        "invite code space exhausted".to_string(),
    ))
}
