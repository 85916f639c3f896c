//! The four-tier compilation ladder.

use serde::{Deserialize, Serialize};

/// A compilation tier. Ordered so that `a < b` means `a` is less
/// optimized than `b`; promotion is monotonic (`spec.md` §3 invariant
/// (iii)) — a unit's tier may only move rightward along this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Never compiled; executed by the plain interpreter.
    Interpreted,
    /// First compiled tier, chosen when no profile warrants more.
    Baseline,
    /// Promoted once execution count crosses the baseline trigger.
    Optimized,
    /// The terminal tier; no further promotion is possible.
    HighlyOptimized,
}

impl Tier {
    /// Whether this tier accepts no further promotion.
    pub fn is_terminal(self) -> bool {
        self == Tier::HighlyOptimized
    }

    /// The tier one step up from this one, or `None` if already terminal.
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Interpreted => Some(Tier::Baseline),
            Tier::Baseline => Some(Tier::Optimized),
            Tier::Optimized => Some(Tier::HighlyOptimized),
            Tier::HighlyOptimized => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_monotonic_by_declaration() {
        assert!(Tier::Interpreted < Tier::Baseline);
        assert!(Tier::Baseline < Tier::Optimized);
        assert!(Tier::Optimized < Tier::HighlyOptimized);
    }

    #[test]
    fn highly_optimized_has_no_next() {
        assert_eq!(Tier::HighlyOptimized.next(), None);
        assert!(Tier::HighlyOptimized.is_terminal());
    }
}
