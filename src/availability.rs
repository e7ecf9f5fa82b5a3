//! Per-actor view of which workers are idle.
//!
//! Each actor owns its own table and mutates it only in response to protocol
//! messages, so no locking is involved.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::WorkerId;

/// Availability of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Idle,
    Busy,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
        };
        write!(f, "{s}")
    }
}

/// Mapping from worker identity to availability, ordered by identity.
#[derive(Debug, Clone, Default)]
pub struct AvailabilityTable {
    entries: BTreeMap<WorkerId, Availability>,
}

impl AvailabilityTable {
    /// Seed a table with every worker idle.
    pub fn all_idle(workers: impl IntoIterator<Item = WorkerId>) -> Self {
        Self {
            entries: workers
                .into_iter()
                .map(|id| (id, Availability::Idle))
                .collect(),
        }
    }

    pub fn get(&self, worker: WorkerId) -> Option<Availability> {
        self.entries.get(&worker).copied()
    }

    /// Lowest-identity idle worker, if any.
    pub fn first_idle(&self) -> Option<WorkerId> {
        self.entries
            .iter()
            .find(|(_, state)| **state == Availability::Idle)
            .map(|(id, _)| *id)
    }

    /// Mark `worker` busy. Returns the previous state, or `None` for an unknown worker.
    pub fn mark_busy(&mut self, worker: WorkerId) -> Option<Availability> {
        self.set(worker, Availability::Busy)
    }

    /// Mark `worker` idle. Returns the previous state, or `None` for an unknown worker.
    pub fn mark_idle(&mut self, worker: WorkerId) -> Option<Availability> {
        self.set(worker, Availability::Idle)
    }

    fn set(&mut self, worker: WorkerId, state: Availability) -> Option<Availability> {
        self.entries
            .get_mut(&worker)
            .map(|entry| std::mem::replace(entry, state))
    }

    pub fn busy_count(&self) -> usize {
        self.entries
            .values()
            .filter(|state| **state == Availability::Busy)
            .count()
    }

    pub fn is_all_idle(&self) -> bool {
        self.busy_count() == 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(n: u32) -> AvailabilityTable {
        AvailabilityTable::all_idle((0..n).map(WorkerId))
    }

    #[test]
    fn seeded_all_idle() {
        let t = table(3);
        assert_eq!(t.len(), 3);
        assert!(t.is_all_idle());
        assert_eq!(t.first_idle(), Some(WorkerId(0)));
    }

    #[test]
    fn first_idle_picks_lowest_identity() {
        let mut t = table(4);
        t.mark_busy(WorkerId(0));
        t.mark_busy(WorkerId(2));
        assert_eq!(t.first_idle(), Some(WorkerId(1)));
        t.mark_busy(WorkerId(1));
        assert_eq!(t.first_idle(), Some(WorkerId(3)));
    }

    #[test]
    fn no_idle_when_all_busy() {
        let mut t = table(2);
        t.mark_busy(WorkerId(0));
        t.mark_busy(WorkerId(1));
        assert_eq!(t.first_idle(), None);
        assert_eq!(t.busy_count(), 2);
        assert!(!t.is_all_idle());
    }

    #[test]
    fn mark_returns_previous_state() {
        let mut t = table(1);
        assert_eq!(t.mark_busy(WorkerId(0)), Some(Availability::Idle));
        assert_eq!(t.mark_busy(WorkerId(0)), Some(Availability::Busy));
        assert_eq!(t.mark_idle(WorkerId(0)), Some(Availability::Busy));
        assert_eq!(t.get(WorkerId(0)), Some(Availability::Idle));
    }

    #[test]
    fn unknown_worker_is_not_inserted() {
        let mut t = table(1);
        assert_eq!(t.mark_busy(WorkerId(9)), None);
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(WorkerId(9)), None);
    }

    #[test]
    fn empty_table_has_no_idle_worker() {
        let t = AvailabilityTable::default();
        assert!(t.is_empty());
        assert_eq!(t.first_idle(), None);
    }
}
