//! Persistent session identifiers.
//!
//! Calendar clients key subscribed events on their UID, so a session's UID
//! must survive every regeneration. Missing ones are minted once here and
//! written back into the schedule document by the caller.

use crate::schedule::Schedule;
use tracing::debug;
use uuid::Uuid;

/// Assign a random UID to every session whose UID is absent or blank.
/// Sessions that already carry one are left alone. Returns the number of
/// UIDs assigned.
pub fn backfill_uids(schedule: &mut Schedule) -> usize {
    let mut assigned = 0;
    for day in schedule.days.iter_mut() {
        for session in day.sessions.iter_mut() {
            if session.uid().is_some() {
                continue;
            }
            let uid = Uuid::new_v4().to_string();
            debug!(date = %day.date, title = ?session.title, %uid, "assigned uid");
            session.uid = Some(uid);
            assigned += 1;
        }
    }
    assigned
}
