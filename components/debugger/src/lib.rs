//! A step debugger and REPL for Glyph bytecode (`spec.md` §4.3):
//! breakpoints, step modes, a simulated call stack, value inspection
//! and disassembly, plus the line-oriented command loop that drives
//! them interactively.

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod breakpoint;
mod debugger;
mod error;
mod frame;
mod hook_adapter;
mod repl;

pub use breakpoint::{Breakpoint, BreakpointTable};
pub use debugger::{format_location, format_value, Debugger, StepMode};
pub use error::DebuggerError;
pub use frame::CallFrame;
pub use hook_adapter::HookAdapter;
pub use repl::SessionOutcome;
