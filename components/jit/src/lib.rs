//! The tiered JIT controller: compilation-unit cache, execution
//! profiles, type specializations, deoptimization log and the inlining
//! oracle (`spec.md` §4.2).

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod config;
mod controller;
mod deopt;
mod inlining;
mod specialization;
mod tier;
mod unit;

pub use config::{InliningConfig, JitConfig};
pub use controller::{CompileFn, JitController, JitError, Stats};
pub use deopt::{DeoptLog, DeoptReason, DeoptRecord};
pub use inlining::{InlineCandidate, InliningDecision, evaluate, inline_candidates};
pub use specialization::{SpecializationCache, TypeAssignment, TypeSpecialization};
pub use tier::Tier;
pub use unit::{CompilationUnit, ExecutionProfile};
