use serde::{Deserialize, Serialize};

/// A single (ipID -> nextDueTime) record in the schedule store.
/// Absence of an entry for an IP means "not scheduled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub ip_id: u64,
    pub next_due_s: u64,
}
