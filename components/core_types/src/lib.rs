//! Core value and error types shared by the bytecode VM, the JIT controller
//! and the debugger.
//!
//! Kept as its own crate (rather than folded into `vm`) so that `jit` and
//! `debugger` can depend on the value model without pulling in the
//! interpreter loop, and so profiling types added later have a home free of
//! cyclic dependencies.

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod error;
mod value;

pub use error::{LoadError, RuntimeError};
pub use value::{FutureHandle, FutureOutcome, FutureState, Value};
