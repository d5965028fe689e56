//! Counter and room assignment.
//!
//! Counters are registered per branch per day; availability lookups are
//! deterministic (counter number ascending) so kiosks and display boards agree
//! on ordering. Rooms are an upsert keyed by staff member, with hard
//! uniqueness on (department, room number).

use crate::clock::Clock;
use crate::error::{QueueError, QueueResult};
use crate::journey::Room;
use crate::sequence::today;
use crate::store::Records;
use crate::ticket::Counter;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uqm_types::{BranchCode, DepartmentName};
use uuid::Uuid;

/// Matches tickets and journey stages to serving resources.
pub struct AssignmentResolver {
    counters: Arc<dyn Records<Counter>>,
    rooms: Arc<dyn Records<Room>>,
    clock: Arc<dyn Clock>,
}

impl AssignmentResolver {
    pub fn new(
        counters: Arc<dyn Records<Counter>>,
        rooms: Arc<dyn Records<Room>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            counters,
            rooms,
            clock,
        }
    }

    /// Registers a counter for the branch for today.
    ///
    /// # Errors
    /// `Conflict` if the branch already has a counter with this number today.
    pub fn open_counter(
        &self,
        branch: BranchCode,
        counter_number: u32,
        user_id: Uuid,
        queue_id: Uuid,
    ) -> QueueResult<Counter> {
        let now = self.clock.now();
        let taken = self.counters.list()?.into_iter().any(|(_, record)| {
            record.doc.branch == branch
                && record.doc.counter_number == counter_number
                && opened_on(&record.doc, now)
        });
        if taken {
            return Err(QueueError::Conflict(format!(
                "counter {counter_number} is already open at branch {branch} today"
            )));
        }

        let counter = Counter {
            id: Uuid::new_v4(),
            branch,
            counter_number,
            user_id,
            available: true,
            queue_id,
            created_at: now,
        };
        let stored = self.counters.insert(counter.id.to_string(), counter)?;
        Ok(stored.doc)
    }

    /// Counters of `branch` opened today and currently available, ordered by
    /// counter number ascending for deterministic assignment and display.
    pub fn find_available_counters(&self, branch: &BranchCode) -> QueueResult<Vec<Counter>> {
        let now = self.clock.now();
        let mut available: Vec<Counter> = self
            .counters
            .list()?
            .into_iter()
            .map(|(_, record)| record.doc)
            .filter(|c| &c.branch == branch && c.available && opened_on(c, now))
            .collect();
        available.sort_by_key(|c| c.counter_number);
        Ok(available)
    }

    /// Upserts the room owned by `staff_id`: updates its department/number if
    /// one exists, creates it otherwise. One room per staff member, and a
    /// room number is unique within its department, both enforced here, not
    /// merely advisory.
    ///
    /// # Errors
    /// `Conflict` if `room_number` is already taken by a different staff
    /// member in the same department, or if a racing writer touched the room.
    pub fn assign_room_to_staff(
        &self,
        staff_id: Uuid,
        department: DepartmentName,
        room_number: u32,
    ) -> QueueResult<Room> {
        let rooms = self.rooms.list()?;

        let number_taken = rooms.iter().any(|(_, record)| {
            record.doc.department == department
                && record.doc.room_number == room_number
                && record.doc.staff_id != staff_id
        });
        if number_taken {
            return Err(QueueError::Conflict(format!(
                "room {room_number} in {department} is already assigned to another staff member"
            )));
        }

        let existing = rooms
            .into_iter()
            .find(|(_, record)| record.doc.staff_id == staff_id);

        match existing {
            Some((key, record)) => {
                let mut room = record.doc.clone();
                room.department = department;
                room.room_number = room_number;
                let updated = self.rooms.update(&key, record.version, room)?;
                Ok(updated.doc)
            }
            None => {
                let room = Room {
                    id: Uuid::new_v4(),
                    staff_id,
                    department,
                    room_number,
                };
                let stored = self.rooms.insert(room.id.to_string(), room)?;
                Ok(stored.doc)
            }
        }
    }
}

fn opened_on(counter: &Counter, now: DateTime<Utc>) -> bool {
    counter.created_at.date_naive() == now.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::StoreSet;
    use chrono::TimeZone;

    struct Fixture {
        resolver: AssignmentResolver,
        clock: Arc<ManualClock>,
        branch: BranchCode,
        queue_id: Uuid,
    }

    fn fixture() -> Fixture {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 14, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::starting_at(t0));
        let stores = StoreSet::new();
        let resolver =
            AssignmentResolver::new(stores.counters.clone(), stores.rooms.clone(), clock.clone());
        Fixture {
            resolver,
            clock,
            branch: BranchCode::new("HQ-01").unwrap(),
            queue_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn available_counters_are_ordered_by_number() {
        let fx = fixture();
        for number in [3, 1, 2] {
            fx.resolver
                .open_counter(fx.branch.clone(), number, Uuid::new_v4(), fx.queue_id)
                .expect("open counter");
        }

        let counters = fx
            .resolver
            .find_available_counters(&fx.branch)
            .expect("list");
        let numbers: Vec<u32> = counters.iter().map(|c| c.counter_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn yesterdays_counters_are_not_offered_today() {
        let fx = fixture();
        fx.resolver
            .open_counter(fx.branch.clone(), 1, Uuid::new_v4(), fx.queue_id)
            .expect("open counter");

        fx.clock.advance_secs(60 * 60 * 24);
        let counters = fx
            .resolver
            .find_available_counters(&fx.branch)
            .expect("list");
        assert!(counters.is_empty());

        // The number is free again on the new day.
        fx.resolver
            .open_counter(fx.branch.clone(), 1, Uuid::new_v4(), fx.queue_id)
            .expect("reopen next day");
    }

    #[test]
    fn duplicate_counter_numbers_conflict_within_a_day() {
        let fx = fixture();
        fx.resolver
            .open_counter(fx.branch.clone(), 1, Uuid::new_v4(), fx.queue_id)
            .expect("open counter");
        let err = fx
            .resolver
            .open_counter(fx.branch.clone(), 1, Uuid::new_v4(), fx.queue_id)
            .expect_err("duplicate number");
        assert!(matches!(err, QueueError::Conflict(_)));

        // Another branch is free to use the same number.
        fx.resolver
            .open_counter(
                BranchCode::new("EAST-02").unwrap(),
                1,
                Uuid::new_v4(),
                fx.queue_id,
            )
            .expect("other branch");
    }

    #[test]
    fn room_upsert_moves_the_staff_members_room() {
        let fx = fixture();
        let staff = Uuid::new_v4();
        let radiology = DepartmentName::new("Radiology").unwrap();
        let cardiology = DepartmentName::new("Cardiology").unwrap();

        let room = fx
            .resolver
            .assign_room_to_staff(staff, radiology.clone(), 4)
            .expect("create");
        let moved = fx
            .resolver
            .assign_room_to_staff(staff, cardiology.clone(), 2)
            .expect("move");

        assert_eq!(moved.id, room.id);
        assert_eq!(moved.department, cardiology);
        assert_eq!(moved.room_number, 2);
    }

    #[test]
    fn room_numbers_are_unique_per_department() {
        let fx = fixture();
        let radiology = DepartmentName::new("Radiology").unwrap();
        let cardiology = DepartmentName::new("Cardiology").unwrap();

        fx.resolver
            .assign_room_to_staff(Uuid::new_v4(), radiology.clone(), 4)
            .expect("first");
        let err = fx
            .resolver
            .assign_room_to_staff(Uuid::new_v4(), radiology.clone(), 4)
            .expect_err("same number, same department");
        assert!(matches!(err, QueueError::Conflict(_)));

        // Same number in a different department is fine.
        fx.resolver
            .assign_room_to_staff(Uuid::new_v4(), cardiology, 4)
            .expect("other department");
    }
}
