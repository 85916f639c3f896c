//! Tunable thresholds for the JIT controller.
//!
//! Grouped into one struct a host can override and reload at runtime,
//! mirroring how the teacher's inlining oracle groups its own thresholds
//! into a single `InliningConfig`.

use serde::{Deserialize, Serialize};

/// Inlining-specific thresholds, nested under [`JitConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InliningConfig {
    /// Minimum observed call count from caller to callee before inlining
    /// is considered.
    pub min_call_count: u64,
    /// Maximum callee body size (in statements) eligible for inlining.
    pub max_body_statements: u64,
    /// Minimum benefit score (`calls / (body + 1)`) required to inline.
    pub benefit_threshold: f64,
}

impl Default for InliningConfig {
    fn default() -> Self {
        InliningConfig {
            min_call_count: 10,
            max_body_statements: 20,
            benefit_threshold: 0.5,
        }
    }
}

/// All tunables the JIT controller consults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JitConfig {
    /// Execution count at or above which a route is "hot". Used both to
    /// pick `optimized` as the initial tier on a cold compile and as the
    /// `optimized -> highly-optimized` upgrade trigger.
    pub hot_path_threshold: u64,
    /// Minimum seconds between compiles of the same unit before a
    /// cache-hit is eligible to trigger a tier upgrade.
    pub tier_upgrade_window_secs: u64,
    /// Maximum number of type specializations cached per route.
    pub max_specializations_per_route: usize,
    /// Capacity of the deoptimization ring buffer.
    pub deopt_ring_buffer_size: usize,
    /// Inlining oracle thresholds.
    pub inlining: InliningConfig,
}

impl Default for JitConfig {
    fn default() -> Self {
        JitConfig {
            hot_path_threshold: 100,
            tier_upgrade_window_secs: 10,
            max_specializations_per_route: 5,
            deopt_ring_buffer_size: 100,
            inlining: InliningConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = JitConfig::default();
        assert_eq!(config.hot_path_threshold, 100);
        assert_eq!(config.tier_upgrade_window_secs, 10);
        assert_eq!(config.max_specializations_per_route, 5);
        assert_eq!(config.deopt_ring_buffer_size, 100);
        assert_eq!(config.inlining.min_call_count, 10);
        assert_eq!(config.inlining.max_body_statements, 20);
        assert_eq!(config.inlining.benefit_threshold, 0.5);
    }
}
