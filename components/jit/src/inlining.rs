//! The inlining oracle: a decision procedure, not a transformation.
//!
//! Grounded in the teacher's `jit_compiler::inlining` oracle's
//! should-inline/reason/benefit decision shape; its IR cloning and
//! call-site rewriting machinery has no counterpart here since this
//! spec asks only for the decision (`spec.md` §4.2).

use crate::config::InliningConfig;
use crate::unit::ExecutionProfile;

/// The oracle's verdict for one `(caller, callee)` call site.
#[derive(Debug, Clone, PartialEq)]
pub struct InliningDecision {
    /// Whether the callee should be inlined at this call site.
    pub should_inline: bool,
    /// A short human-readable reason for the verdict.
    pub reason: String,
    /// The computed benefit score (`calls / (body + 1)`).
    pub benefit: f64,
}

/// A ranked candidate returned by [`inline_candidates`].
#[derive(Debug, Clone, PartialEq)]
pub struct InlineCandidate {
    /// The caller route.
    pub caller: String,
    /// The callee route.
    pub callee: String,
    /// The computed benefit score.
    pub benefit: f64,
}

fn benefit_score(calls: u64, body_size: u64) -> f64 {
    calls as f64 / (body_size as f64 + 1.0)
}

/// Evaluates whether `callee` should be inlined into `caller`, given the
/// callee's profile (if any) and its body size in statements.
pub fn evaluate(
    caller: &str,
    callee: &str,
    body_size: u64,
    callee_profile: Option<&ExecutionProfile>,
    config: &InliningConfig,
) -> InliningDecision {
    let Some(profile) = callee_profile else {
        return InliningDecision {
            should_inline: false,
            reason: format!("no profile exists for callee '{}'", callee),
            benefit: 0.0,
        };
    };

    let calls_from_caller = profile.called_by.get(caller).copied().unwrap_or(0);
    if calls_from_caller < config.min_call_count {
        return InliningDecision {
            should_inline: false,
            reason: format!(
                "call count {} from '{}' is below min-call-count {}",
                calls_from_caller, caller, config.min_call_count
            ),
            benefit: 0.0,
        };
    }

    if body_size > config.max_body_statements {
        return InliningDecision {
            should_inline: false,
            reason: format!(
                "callee body size {} exceeds max-body {}",
                body_size, config.max_body_statements
            ),
            benefit: 0.0,
        };
    }

    let benefit = benefit_score(calls_from_caller, body_size);
    if benefit < config.benefit_threshold {
        return InliningDecision {
            should_inline: false,
            reason: format!(
                "benefit score {:.3} is below threshold {:.3}",
                benefit, config.benefit_threshold
            ),
            benefit,
        };
    }

    InliningDecision {
        should_inline: true,
        reason: "call count, body size and benefit score all clear their thresholds".to_string(),
        benefit,
    }
}

/// Ranks every known callee of `caller` by benefit score, most
/// beneficial first, using each callee's own profile for its body-call
/// statistics.
pub fn inline_candidates(
    caller: &str,
    caller_profile: &ExecutionProfile,
    body_sizes: &std::collections::HashMap<String, u64>,
    profiles: &std::collections::HashMap<String, ExecutionProfile>,
    config: &InliningConfig,
) -> Vec<InlineCandidate> {
    let mut candidates: Vec<InlineCandidate> = caller_profile
        .calls
        .keys()
        .filter_map(|callee| {
            let profile = profiles.get(callee)?;
            let body_size = *body_sizes.get(callee)?;
            let decision = evaluate(caller, callee, body_size, Some(profile), config);
            decision.should_inline.then_some(InlineCandidate {
                caller: caller.to_string(),
                callee: callee.clone(),
                benefit: decision.benefit,
            })
        })
        .collect();
    candidates.sort_by(|a, b| b.benefit.partial_cmp(&a.benefit).unwrap());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_callee_with_no_profile() {
        let config = InliningConfig::default();
        let decision = evaluate("caller", "callee", 5, None, &config);
        assert!(!decision.should_inline);
    }

    #[test]
    fn rejects_below_min_call_count() {
        let config = InliningConfig::default();
        let mut profile = ExecutionProfile::new("callee");
        profile.record_called_by("caller"); // only 1 call, default min is 10
        let decision = evaluate("caller", "callee", 5, Some(&profile), &config);
        assert!(!decision.should_inline);
    }

    #[test]
    fn accepts_when_all_thresholds_clear() {
        let config = InliningConfig::default();
        let mut profile = ExecutionProfile::new("callee");
        for _ in 0..20 {
            profile.record_called_by("caller");
        }
        // benefit = 20 / (5 + 1) = 3.33, well above 0.5
        let decision = evaluate("caller", "callee", 5, Some(&profile), &config);
        assert!(decision.should_inline);
        assert!(decision.benefit > config.benefit_threshold);
    }

    #[test]
    fn rejects_oversized_body_even_with_high_call_count() {
        let config = InliningConfig::default();
        let mut profile = ExecutionProfile::new("callee");
        for _ in 0..50 {
            profile.record_called_by("caller");
        }
        let decision = evaluate("caller", "callee", 100, Some(&profile), &config);
        assert!(!decision.should_inline);
    }

    #[test]
    fn uses_the_call_graph_edge_recorded_by_record_call_edge() {
        // Exercises the same path `JitController::record_call_edge` uses:
        // the caller's profile gets `.calls`, the callee's profile gets
        // `.called_by`. The oracle must read the callee's `.called_by`,
        // not its `.calls` (which holds the callee's own outgoing edges).
        let config = InliningConfig::default();
        let mut caller_profile = ExecutionProfile::new("caller");
        let mut callee_profile = ExecutionProfile::new("callee");
        for _ in 0..20 {
            caller_profile.record_call("callee");
            callee_profile.record_called_by("caller");
        }
        // The callee also happens to call some other route; that must not
        // be mistaken for calls *into* the callee.
        callee_profile.record_call("other");

        let decision = evaluate("caller", "callee", 5, Some(&callee_profile), &config);
        assert!(decision.should_inline);
    }
}
