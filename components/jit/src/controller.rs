//! The JIT controller: a shared, lock-protected cache of compiled units,
//! execution profiles, type specializations and deoptimization history.

use crate::config::JitConfig;
use crate::deopt::{DeoptLog, DeoptReason, DeoptRecord};
use crate::inlining::{self, InlineCandidate};
use crate::specialization::{SpecializationCache, TypeAssignment};
use crate::tier::Tier;
use crate::unit::{CompilationUnit, ExecutionProfile};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors surfaced by the JIT controller.
#[derive(Debug, Clone, Error)]
pub enum JitError {
    /// The compiler collaborator failed; cache state is unchanged.
    #[error("compilation failed: {0}")]
    Compilation(String),
}

/// The route-IR-to-bytecode collaborator the controller calls on a cache
/// miss or an upgrade. Front-end compilation is out of scope for this
/// crate (`spec.md` §1); by default this is the identity function, since
/// every tier here is a bookkeeping distinction over the same bytecode
/// rather than a distinct native encoding. Hosts that do have a real
/// per-tier recompilation step inject their own.
pub type CompileFn = Arc<dyn Fn(&[u8], Tier) -> Result<Vec<u8>, String> + Send + Sync>;

fn identity_compile() -> CompileFn {
    Arc::new(|bytes: &[u8], _tier: Tier| Ok(bytes.to_vec()))
}

/// A point-in-time snapshot of the controller's counters.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    /// Total successful compiles across every tier.
    pub compiles_total: u64,
    /// Compiles that landed at `baseline`.
    pub compiles_baseline: u64,
    /// Compiles that landed at `optimized`.
    pub compiles_optimized: u64,
    /// Compiles that landed at `highly-optimized`.
    pub compiles_aggressive: u64,
    /// Compiles triggered by `check_adaptive_recompilation` specifically.
    pub compiles_adaptive: u64,
    /// Cache lookups that found an existing unit.
    pub cache_hits: u64,
    /// Cache lookups that found nothing.
    pub cache_misses: u64,
    /// Specialization lookups that found a valid variant.
    pub specialization_hits: u64,
    /// Specialization lookups that found nothing usable.
    pub specialization_misses: u64,
    /// Total deoptimization events recorded.
    pub deoptimizations: u64,
    /// Total inlining decisions that came back positive.
    pub inlined_functions: u64,
    /// Cumulative time spent inside the compile collaborator.
    pub total_compilation_time: Duration,
    /// Cumulative recorded execution time across all routes.
    pub total_execution_time: Duration,
}

/// The shared JIT controller. Every accessor takes `&self`; all mutable
/// state lives behind its own `parking_lot::RwLock` so readers never
/// block on an unrelated aggregate (`spec.md` §4.2's concurrency
/// requirement).
pub struct JitController {
    units: RwLock<HashMap<String, CompilationUnit>>,
    profiles: RwLock<HashMap<String, ExecutionProfile>>,
    specializations: RwLock<SpecializationCache>,
    deopts: RwLock<DeoptLog>,
    stats: RwLock<Stats>,
    config: RwLock<JitConfig>,
    compile_fn: CompileFn,
}

impl JitController {
    /// A controller using the identity compile function (cache/tier
    /// bookkeeping only, no real per-tier transformation).
    pub fn new(config: JitConfig) -> Self {
        JitController::with_compile_fn(config, identity_compile())
    }

    /// A controller using a caller-supplied compile function, e.g. one
    /// that can fail, for exercising failure semantics.
    pub fn with_compile_fn(config: JitConfig, compile_fn: CompileFn) -> Self {
        let deopt_capacity = config.deopt_ring_buffer_size;
        let spec_capacity = config.max_specializations_per_route;
        JitController {
            units: RwLock::new(HashMap::new()),
            profiles: RwLock::new(HashMap::new()),
            specializations: RwLock::new(SpecializationCache::new(spec_capacity)),
            deopts: RwLock::new(DeoptLog::new(deopt_capacity)),
            stats: RwLock::new(Stats::default()),
            config: RwLock::new(config),
            compile_fn,
        }
    }

    fn initial_tier(&self, name: &str) -> Tier {
        let threshold = self.config.read().hot_path_threshold;
        match self.profiles.read().get(name) {
            Some(profile) if profile.execution_count >= threshold => Tier::Optimized,
            _ => Tier::Baseline,
        }
    }

    fn record_compile_bucket(&self, tier: Tier, adaptive: bool) {
        let mut stats = self.stats.write();
        stats.compiles_total += 1;
        match tier {
            Tier::Baseline => stats.compiles_baseline += 1,
            Tier::Optimized => stats.compiles_optimized += 1,
            Tier::HighlyOptimized => stats.compiles_aggressive += 1,
            Tier::Interpreted => {}
        }
        if adaptive {
            stats.compiles_adaptive += 1;
        }
    }

    /// Returns bytecode for `name`, compiling it on a cache miss or
    /// returning the cached copy on a hit. A hit may opportunistically
    /// upgrade the unit's tier in the background; failures there are
    /// swallowed since the caller only asked for the bytecode.
    pub fn compile_route(&self, name: &str, route_ir: &[u8]) -> Result<Vec<u8>, JitError> {
        let cached = self.units.read().get(name).map(|u| u.bytecode.clone());
        if let Some(bytecode) = cached {
            self.stats.write().cache_hits += 1;
            self.maybe_upgrade_on_hit(name);
            return Ok(bytecode);
        }

        self.stats.write().cache_misses += 1;
        let tier = self.initial_tier(name);
        let started = Instant::now();
        let compiled = (self.compile_fn)(route_ir, tier).map_err(JitError::Compilation)?;
        self.stats.write().total_compilation_time += started.elapsed();
        self.units
            .write()
            .insert(name.to_string(), CompilationUnit::new(name, compiled.clone(), tier));
        self.record_compile_bucket(tier, false);
        Ok(compiled)
    }

    fn maybe_upgrade_on_hit(&self, name: &str) {
        let window = Duration::from_secs(self.config.read().tier_upgrade_window_secs);
        let threshold = self.config.read().hot_path_threshold;

        let (current_tier, bytecode) = {
            let units = self.units.read();
            let Some(unit) = units.get(name) else { return };
            if unit.tier.is_terminal() || unit.compiled_at.elapsed() < window {
                return;
            }
            (unit.tier, unit.bytecode.clone())
        };

        let execution_count = match self.profiles.read().get(name) {
            Some(profile) => profile.execution_count,
            None => return,
        };
        let trigger = match current_tier {
            Tier::Baseline => threshold / 2,
            Tier::Optimized => threshold,
            Tier::Interpreted | Tier::HighlyOptimized => return,
        };
        if execution_count < trigger {
            return;
        }
        let Some(next_tier) = current_tier.next() else { return };

        if let Ok(compiled) = (self.compile_fn)(&bytecode, next_tier) {
            if let Some(unit) = self.units.write().get_mut(name) {
                unit.recompile(compiled, next_tier);
            }
            self.record_compile_bucket(next_tier, false);
        }
    }

    /// Returns a type-specialized compile of `name` for `types`, from
    /// cache or freshly compiled.
    pub fn compile_route_with_types(
        &self,
        name: &str,
        route_ir: &[u8],
        types: TypeAssignment,
    ) -> Result<Vec<u8>, JitError> {
        if let Some(bytecode) = self.specializations.write().get(name, &types) {
            self.stats.write().specialization_hits += 1;
            return Ok(bytecode);
        }
        self.stats.write().specialization_misses += 1;

        let started = Instant::now();
        let compiled = (self.compile_fn)(route_ir, Tier::Optimized).map_err(JitError::Compilation)?;
        self.stats.write().total_compilation_time += started.elapsed();
        self.specializations.write().insert(name, types, compiled.clone());
        Ok(compiled)
    }

    /// Folds one execution's elapsed time, observed variable types and
    /// the execution's return type into `name`'s profile, creating the
    /// profile on first use.
    pub fn record_execution(
        &self,
        name: &str,
        elapsed: Duration,
        type_observations: &HashMap<String, String>,
        return_type: Option<&str>,
    ) {
        {
            let mut profiles = self.profiles.write();
            let profile = profiles
                .entry(name.to_string())
                .or_insert_with(|| ExecutionProfile::new(name));
            profile.record_execution(elapsed);
            for (variable, type_name) in type_observations {
                profile.record_type_observation(variable, type_name);
            }
            if let Some(type_name) = return_type {
                profile.record_return_type(type_name);
            }
        }
        if let Some(unit) = self.units.write().get_mut(name) {
            unit.record_execution();
        }
        self.stats.write().total_execution_time += elapsed;
    }

    /// Records a call-graph edge: `caller` invoked `callee`.
    pub fn record_call_edge(&self, caller: &str, callee: &str) {
        let mut profiles = self.profiles.write();
        profiles
            .entry(caller.to_string())
            .or_insert_with(|| ExecutionProfile::new(caller))
            .record_call(callee);
        profiles
            .entry(callee.to_string())
            .or_insert_with(|| ExecutionProfile::new(callee))
            .record_called_by(caller);
    }

    /// Records a deoptimization for `name`: invalidates its
    /// specializations and appends to the bounded deopt log. Never fails.
    pub fn record_deoptimization(&self, name: &str, reason: DeoptReason, observed_types: HashMap<String, String>) {
        let tier_at_failure = self
            .units
            .read()
            .get(name)
            .map(|u| u.tier)
            .unwrap_or(Tier::Interpreted);
        self.deopts.write().record(DeoptRecord {
            route: name.to_string(),
            reason,
            timestamp: Instant::now(),
            tier_at_failure,
            observed_types,
        });
        self.specializations.write().invalidate_route(name);
        self.stats.write().deoptimizations += 1;
    }

    /// Explicitly re-evaluates whether `name` should be promoted, based
    /// on type-stable variables in its profile. Unlike the opportunistic
    /// upgrade on a cache hit, failures here propagate to the caller.
    pub fn check_adaptive_recompilation(&self, name: &str, route_ir: &[u8]) -> Result<bool, JitError> {
        let current_tier = match self.units.read().get(name) {
            Some(unit) => unit.tier,
            None => return Ok(false),
        };
        if current_tier.is_terminal() {
            return Ok(false);
        }
        let has_stable_types = self
            .profiles
            .read()
            .get(name)
            .map(|p| !p.type_stable_variables().is_empty())
            .unwrap_or(false);
        if !has_stable_types {
            return Ok(false);
        }
        let Some(next_tier) = current_tier.next() else {
            return Ok(false);
        };

        let started = Instant::now();
        let compiled = (self.compile_fn)(route_ir, next_tier).map_err(JitError::Compilation)?;
        self.stats.write().total_compilation_time += started.elapsed();
        if let Some(unit) = self.units.write().get_mut(name) {
            unit.recompile(compiled, next_tier);
        }
        self.record_compile_bucket(next_tier, true);
        Ok(true)
    }

    /// Drops the cached unit and specializations for `name`. Profile and
    /// deoptimization history are preserved.
    pub fn invalidate(&self, name: &str) {
        self.units.write().remove(name);
        self.specializations.write().clear_route(name);
    }

    /// Drops every cached unit and specialization. Profiles and
    /// deoptimization history are preserved.
    pub fn clear_cache(&self) {
        self.units.write().clear();
        self.specializations.write().clear();
    }

    /// A snapshot of the controller's counters.
    pub fn stats(&self) -> Stats {
        self.stats.read().clone()
    }

    /// The stable JSON observability contract (`spec.md` §6).
    pub fn detailed_stats(&self) -> serde_json::Value {
        let stats = self.stats.read().clone();
        let profiles = self.profiles.read();
        let specializations = self.specializations.read();

        let call_graph_size: usize = profiles.values().map(|p| p.calls.len()).sum();
        let total_executions: u64 = profiles.values().map(|p| p.execution_count).sum();
        let specialization_details: Vec<serde_json::Value> = specializations
            .all()
            .map(|s| {
                serde_json::json!({
                    "route": s.route,
                    "hitCount": s.hit_count,
                    "missCount": s.miss_count,
                    "valid": s.valid,
                })
            })
            .collect();

        serde_json::json!({
            "compilations": {
                "total": stats.compiles_total,
                "baseline": stats.compiles_baseline,
                "optimized": stats.compiles_optimized,
                "aggressive": stats.compiles_aggressive,
                "adaptive": stats.compiles_adaptive,
            },
            "cache": {
                "hits": stats.cache_hits,
                "misses": stats.cache_misses,
            },
            "specialization": {
                "hits": stats.specialization_hits,
                "misses": stats.specialization_misses,
                "details": specialization_details,
            },
            "profiler": {
                "totalProfiles": profiles.len(),
                "totalExecutions": total_executions,
                "callGraphSize": call_graph_size,
            },
            "deoptimizations": stats.deoptimizations,
            "inlinedFunctions": stats.inlined_functions,
            "timing": {
                "totalCompilationTime": stats.total_compilation_time.as_millis() as u64,
                "totalExecutionTime": stats.total_execution_time.as_millis() as u64,
            },
        })
    }

    /// Routes whose profile execution count is at or above the hot-path
    /// threshold, most executed first.
    pub fn hot_paths(&self) -> Vec<(String, u64)> {
        let threshold = self.config.read().hot_path_threshold;
        let mut hot: Vec<(String, u64)> = self
            .profiles
            .read()
            .values()
            .filter(|p| p.execution_count >= threshold)
            .map(|p| (p.name.clone(), p.execution_count))
            .collect();
        hot.sort_by(|a, b| b.1.cmp(&a.1));
        hot
    }

    /// A deep copy of the cached unit for `name`, if any.
    pub fn unit(&self, name: &str) -> Option<CompilationUnit> {
        self.units.read().get(name).cloned()
    }

    /// A deep copy of the execution profile for `name`, if any.
    pub fn profile(&self, name: &str) -> Option<ExecutionProfile> {
        self.profiles.read().get(name).cloned()
    }

    /// Evaluates the inlining oracle for one `(caller, callee)` pair.
    pub fn inlining_decision(
        &self,
        caller: &str,
        callee: &str,
        body_size: u64,
    ) -> inlining::InliningDecision {
        let config = self.config.read().inlining.clone();
        let profiles = self.profiles.read();
        let decision = inlining::evaluate(caller, callee, body_size, profiles.get(callee), &config);
        if decision.should_inline {
            drop(profiles);
            self.stats.write().inlined_functions += 1;
        }
        decision
    }

    /// Ranked inlining candidates for `caller`, given each callee's body
    /// size.
    pub fn inline_candidates(&self, caller: &str, body_sizes: &HashMap<String, u64>) -> Vec<InlineCandidate> {
        let config = self.config.read().inlining.clone();
        let profiles = self.profiles.read();
        let Some(caller_profile) = profiles.get(caller) else {
            return Vec::new();
        };
        inlining::inline_candidates(caller, caller_profile, body_sizes, &profiles, &config)
    }

    /// Replaces the controller's configuration wholesale.
    pub fn set_config(&self, config: JitConfig) {
        *self.config.write() = config;
    }

    /// A copy of the controller's current configuration.
    pub fn config(&self) -> JitConfig {
        self.config.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_miss_then_hit() {
        let jit = JitController::new(JitConfig::default());
        let bytecode = jit.compile_route("route", &[1, 2, 3]).unwrap();
        assert_eq!(bytecode, vec![1, 2, 3]);
        assert_eq!(jit.stats().cache_misses, 1);

        jit.compile_route("route", &[1, 2, 3]).unwrap();
        assert_eq!(jit.stats().cache_hits, 1);
    }

    #[test]
    fn initial_tier_is_optimized_when_profile_is_already_hot() {
        let jit = JitController::new(JitConfig::default());
        for _ in 0..150 {
            jit.record_execution("route", Duration::from_millis(1), &HashMap::new(), None);
        }
        jit.compile_route("route", &[1]).unwrap();
        assert_eq!(jit.unit("route").unwrap().tier, Tier::Optimized);
    }

    #[test]
    fn record_execution_folds_return_type_into_profile() {
        let jit = JitController::new(JitConfig::default());
        jit.record_execution("route", Duration::from_millis(1), &HashMap::new(), Some("int"));
        jit.record_execution("route", Duration::from_millis(1), &HashMap::new(), Some("int"));
        jit.record_execution("route", Duration::from_millis(1), &HashMap::new(), Some("string"));
        let profile = jit.profile("route").unwrap();
        assert_eq!(profile.return_type_histogram.get("int"), Some(&2));
        assert_eq!(profile.return_type_histogram.get("string"), Some(&1));
    }

    #[test]
    fn compilation_failure_leaves_cache_untouched() {
        let failing: CompileFn = Arc::new(|_bytes, _tier| Err("boom".to_string()));
        let jit = JitController::with_compile_fn(JitConfig::default(), failing);
        let err = jit.compile_route("route", &[1]).unwrap_err();
        assert!(matches!(err, JitError::Compilation(_)));
        assert!(jit.unit("route").is_none());
    }

    #[test]
    fn deoptimization_invalidates_specializations_but_not_profile() {
        let jit = JitController::new(JitConfig::default());
        let mut types = TypeAssignment::new();
        types.insert("x".to_string(), "int".to_string());
        jit.compile_route_with_types("route", &[9], types.clone()).unwrap();
        jit.record_execution("route", Duration::from_millis(5), &HashMap::new(), Some("int"));

        jit.record_deoptimization("route", DeoptReason::TypeGuardFailure, HashMap::new());

        assert!(jit.profile("route").is_some());
        // a second lookup with the same types must miss, since the
        // cached specialization was invalidated (not deleted).
        let second = jit.compile_route_with_types("route", &[9], types).unwrap();
        assert_eq!(second, vec![9]);
        assert_eq!(jit.stats().specialization_misses, 2);
    }

    #[test]
    fn clear_cache_preserves_profiles() {
        let jit = JitController::new(JitConfig::default());
        jit.record_execution("route", Duration::from_millis(1), &HashMap::new(), None);
        jit.compile_route("route", &[1]).unwrap();
        jit.clear_cache();
        assert!(jit.unit("route").is_none());
        assert!(jit.profile("route").is_some());
    }

    #[test]
    fn detailed_stats_has_the_documented_shape() {
        let jit = JitController::new(JitConfig::default());
        jit.compile_route("route", &[1]).unwrap();
        let stats = jit.detailed_stats();
        assert!(stats["compilations"]["total"].is_u64());
        assert!(stats["cache"]["misses"].is_u64());
        assert!(stats["specialization"]["details"].is_array());
        assert!(stats["profiler"]["totalProfiles"].is_u64());
        assert!(stats["timing"]["totalCompilationTime"].is_u64());
    }

    #[test]
    fn hot_paths_lists_only_routes_above_threshold() {
        let jit = JitController::new(JitConfig::default());
        for _ in 0..200 {
            jit.record_execution("hot", Duration::from_millis(1), &HashMap::new(), None);
        }
        jit.record_execution("cold", Duration::from_millis(1), &HashMap::new(), None);
        let hot = jit.hot_paths();
        assert_eq!(hot.len(), 1);
        assert_eq!(hot[0].0, "hot");
    }
}
