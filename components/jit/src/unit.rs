//! Compilation units and execution profiles: the JIT's per-route state.

use crate::tier::Tier;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A cached compiled unit for one named route.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// The route's name.
    pub name: String,
    /// The cached bytecode for this unit at its current tier.
    pub bytecode: Vec<u8>,
    /// The tier this unit is currently compiled at.
    pub tier: Tier,
    /// When this unit was last (re)compiled.
    pub compiled_at: Instant,
    /// How many times this unit has been executed since it was compiled.
    pub execution_count: u64,
    /// When this unit was last executed.
    pub last_executed_at: Option<Instant>,
}

impl CompilationUnit {
    /// Creates a freshly compiled unit at `tier`.
    pub fn new(name: impl Into<String>, bytecode: Vec<u8>, tier: Tier) -> Self {
        CompilationUnit {
            name: name.into(),
            bytecode,
            tier,
            compiled_at: Instant::now(),
            execution_count: 0,
            last_executed_at: None,
        }
    }

    /// Records one execution of this unit.
    pub fn record_execution(&mut self) {
        self.execution_count += 1;
        self.last_executed_at = Some(Instant::now());
    }

    /// Replaces this unit's bytecode and tier in place, resetting
    /// `compiled_at` but preserving the execution count — a recompile is
    /// not a fresh unit, it is the same route promoted.
    pub fn recompile(&mut self, bytecode: Vec<u8>, tier: Tier) {
        self.bytecode = bytecode;
        self.tier = tier;
        self.compiled_at = Instant::now();
    }
}

/// Per-route runtime profile: timing, a type histogram, and call-graph
/// edges, feeding the controller's tier-promotion and inlining decisions.
#[derive(Debug, Clone)]
pub struct ExecutionProfile {
    /// The route's name.
    pub name: String,
    /// Total number of executions recorded.
    pub execution_count: u64,
    /// Sum of all recorded elapsed times.
    pub total_time: Duration,
    /// Shortest recorded elapsed time.
    pub min_time: Duration,
    /// Longest recorded elapsed time.
    pub max_time: Duration,
    /// When this profile was last updated.
    pub last_executed_at: Option<Instant>,
    /// `variable name -> type name -> observation count`.
    pub type_histogram: HashMap<String, HashMap<String, u64>>,
    /// `type name -> observation count` for the route's return value.
    pub return_type_histogram: HashMap<String, u64>,
    /// `callee name -> call count`, edges this route calls out to.
    pub calls: HashMap<String, u64>,
    /// `caller name -> call count`, edges calling into this route.
    pub called_by: HashMap<String, u64>,
}

impl ExecutionProfile {
    /// An empty profile for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        ExecutionProfile {
            name: name.into(),
            execution_count: 0,
            total_time: Duration::ZERO,
            min_time: Duration::MAX,
            max_time: Duration::ZERO,
            last_executed_at: None,
            type_histogram: HashMap::new(),
            return_type_histogram: HashMap::new(),
            calls: HashMap::new(),
            called_by: HashMap::new(),
        }
    }

    /// Folds one execution's elapsed time into the profile.
    pub fn record_execution(&mut self, elapsed: Duration) {
        self.execution_count += 1;
        self.total_time += elapsed;
        self.min_time = self.min_time.min(elapsed);
        self.max_time = self.max_time.max(elapsed);
        self.last_executed_at = Some(Instant::now());
    }

    /// The average elapsed time across all recorded executions.
    pub fn average_time(&self) -> Duration {
        if self.execution_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.execution_count as u32
        }
    }

    /// Folds a single `(variable, observed type)` pair into the type
    /// histogram.
    pub fn record_type_observation(&mut self, variable: &str, type_name: &str) {
        *self
            .type_histogram
            .entry(variable.to_string())
            .or_default()
            .entry(type_name.to_string())
            .or_insert(0) += 1;
    }

    /// Folds one observed return type into the return-type histogram.
    pub fn record_return_type(&mut self, type_name: &str) {
        *self.return_type_histogram.entry(type_name.to_string()).or_insert(0) += 1;
    }

    /// Records an edge to `callee`.
    pub fn record_call(&mut self, callee: &str) {
        *self.calls.entry(callee.to_string()).or_insert(0) += 1;
    }

    /// Records an edge from `caller`.
    pub fn record_called_by(&mut self, caller: &str) {
        *self.called_by.entry(caller.to_string()).or_insert(0) += 1;
    }

    /// Whether `variable`'s dominant observed type accounts for at least
    /// 95% of its observations (`spec.md` §3 invariant (iv)).
    pub fn is_type_stable(&self, variable: &str) -> bool {
        let Some(counts) = self.type_histogram.get(variable) else {
            return false;
        };
        let total: u64 = counts.values().sum();
        if total == 0 {
            return false;
        }
        let dominant = counts.values().copied().max().unwrap_or(0);
        (dominant as f64) / (total as f64) >= 0.95
    }

    /// Every variable name with a type-stable histogram.
    pub fn type_stable_variables(&self) -> Vec<String> {
        self.type_histogram
            .keys()
            .filter(|v| self.is_type_stable(v))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_tracks_min_max_average() {
        let mut profile = ExecutionProfile::new("route");
        profile.record_execution(Duration::from_millis(10));
        profile.record_execution(Duration::from_millis(30));
        assert_eq!(profile.execution_count, 2);
        assert_eq!(profile.min_time, Duration::from_millis(10));
        assert_eq!(profile.max_time, Duration::from_millis(30));
        assert_eq!(profile.average_time(), Duration::from_millis(20));
    }

    #[test]
    fn type_stability_requires_95_percent_dominance() {
        let mut profile = ExecutionProfile::new("route");
        for _ in 0..95 {
            profile.record_type_observation("x", "int");
        }
        for _ in 0..5 {
            profile.record_type_observation("x", "float");
        }
        assert!(profile.is_type_stable("x"));

        for _ in 0..1 {
            profile.record_type_observation("x", "float");
        }
        assert!(!profile.is_type_stable("x"));
    }

    #[test]
    fn return_type_histogram_accumulates_observed_types() {
        let mut profile = ExecutionProfile::new("route");
        profile.record_return_type("int");
        profile.record_return_type("int");
        profile.record_return_type("string");
        assert_eq!(profile.return_type_histogram.get("int"), Some(&2));
        assert_eq!(profile.return_type_histogram.get("string"), Some(&1));
    }

    #[test]
    fn unit_recompile_preserves_execution_count() {
        let mut unit = CompilationUnit::new("route", vec![1, 2, 3], Tier::Baseline);
        unit.record_execution();
        unit.record_execution();
        unit.recompile(vec![4, 5, 6], Tier::Optimized);
        assert_eq!(unit.execution_count, 2);
        assert_eq!(unit.tier, Tier::Optimized);
        assert_eq!(unit.bytecode, vec![4, 5, 6]);
    }
}
