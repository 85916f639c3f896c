//! Breakpoint bookkeeping: a table keyed by both monotonic id and
//! bytecode location.

use std::collections::HashMap;

/// One breakpoint set at a bytecode location.
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    /// Monotonic id, assigned in set order.
    pub id: u32,
    /// The bytecode offset this breakpoint fires at.
    pub location: u32,
    /// Whether this breakpoint currently participates in the break
    /// predicate.
    pub enabled: bool,
    /// Number of times execution has stopped here.
    pub hit_count: u64,
    /// An optional condition string attached for the user's own
    /// reference. Not evaluated: no expression language is defined for
    /// Glyph bytecode, so conditions are carried as metadata only.
    pub condition: Option<String>,
}

/// The breakpoint set for one debugger session, indexed both by id and
/// by location so both `clear(location)` and `clear-by-id(id)` are
/// cheap.
#[derive(Debug, Clone, Default)]
pub struct BreakpointTable {
    next_id: u32,
    by_id: HashMap<u32, Breakpoint>,
    by_location: HashMap<u32, u32>,
}

impl BreakpointTable {
    /// An empty table, ids starting at 1.
    pub fn new() -> Self {
        BreakpointTable {
            next_id: 1,
            by_id: HashMap::new(),
            by_location: HashMap::new(),
        }
    }

    /// Sets a breakpoint at `location`, returning its id. Setting at a
    /// location that already has one returns the existing id rather
    /// than creating a duplicate.
    pub fn set(&mut self, location: u32) -> u32 {
        if let Some(&id) = self.by_location.get(&location) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_location.insert(location, id);
        self.by_id.insert(
            id,
            Breakpoint {
                id,
                location,
                enabled: true,
                hit_count: 0,
                condition: None,
            },
        );
        id
    }

    /// Removes the breakpoint at `location`, if any, returning whether
    /// one was removed.
    pub fn clear(&mut self, location: u32) -> bool {
        match self.by_location.remove(&location) {
            Some(id) => {
                self.by_id.remove(&id);
                true
            }
            None => false,
        }
    }

    /// Removes the breakpoint with `id`, if any, returning whether one
    /// was removed.
    pub fn clear_by_id(&mut self, id: u32) -> bool {
        match self.by_id.remove(&id) {
            Some(bp) => {
                self.by_location.remove(&bp.location);
                true
            }
            None => false,
        }
    }

    /// Enables the breakpoint at `location`, if any, returning whether
    /// one was found.
    pub fn enable(&mut self, location: u32) -> bool {
        self.set_enabled(location, true)
    }

    /// Disables the breakpoint at `location`, if any, returning whether
    /// one was found.
    pub fn disable(&mut self, location: u32) -> bool {
        self.set_enabled(location, false)
    }

    fn set_enabled(&mut self, location: u32, enabled: bool) -> bool {
        let Some(&id) = self.by_location.get(&location) else {
            return false;
        };
        if let Some(bp) = self.by_id.get_mut(&id) {
            bp.enabled = enabled;
        }
        true
    }

    /// Every breakpoint, ordered by id.
    pub fn list(&self) -> Vec<Breakpoint> {
        let mut all: Vec<Breakpoint> = self.by_id.values().cloned().collect();
        all.sort_by_key(|bp| bp.id);
        all
    }

    /// The breakpoint at `location`, if any.
    pub fn get(&self, location: u32) -> Option<Breakpoint> {
        let id = self.by_location.get(&location)?;
        self.by_id.get(id).cloned()
    }

    /// Records a hit at `location`, if a breakpoint exists there.
    pub fn record_hit(&mut self, location: u32) {
        if let Some(&id) = self.by_location.get(&location) {
            if let Some(bp) = self.by_id.get_mut(&id) {
                bp.hit_count += 1;
            }
        }
    }

    /// Zeroes every breakpoint's hit count, preserving the breakpoints
    /// themselves.
    pub fn reset_hit_counts(&mut self) {
        for bp in self.by_id.values_mut() {
            bp.hit_count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_location_is_deduped() {
        let mut table = BreakpointTable::new();
        let a = table.set(10);
        let b = table.set(20);
        let c = table.set(10); // same location, returns existing id
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(c, a);
        assert_eq!(table.list().len(), 2);
    }

    #[test]
    fn clear_by_id_and_by_location_both_remove() {
        let mut table = BreakpointTable::new();
        let id = table.set(5);
        assert!(table.clear_by_id(id));
        assert!(table.get(5).is_none());

        let id2 = table.set(6);
        assert!(table.clear(6));
        assert!(table.get(6).is_none());
        assert!(!table.clear_by_id(id2));
    }

    #[test]
    fn disable_then_enable_round_trips() {
        let mut table = BreakpointTable::new();
        table.set(1);
        assert!(table.disable(1));
        assert!(!table.get(1).unwrap().enabled);
        assert!(table.enable(1));
        assert!(table.get(1).unwrap().enabled);
    }

    #[test]
    fn reset_hit_counts_preserves_breakpoints() {
        let mut table = BreakpointTable::new();
        table.set(1);
        table.record_hit(1);
        table.record_hit(1);
        assert_eq!(table.get(1).unwrap().hit_count, 2);
        table.reset_hit_counts();
        assert_eq!(table.get(1).unwrap().hit_count, 0);
        assert_eq!(table.list().len(), 1);
    }
}
