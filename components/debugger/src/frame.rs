//! The debugger's simulated call stack.
//!
//! The VM itself has no notion of user-defined call frames (`call`
//! dispatches to a host built-in, not a Glyph function); the debugger's
//! frame stack is pushed and popped by whoever drives a `call` opcode
//! on the host side, purely for `backtrace`-style inspection.

use core_types::Value;
use std::collections::HashMap;

/// One simulated call frame.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// The name of the routine this frame belongs to.
    pub function_name: String,
    /// The bytecode offset to resume at once this frame returns.
    pub return_pc: u32,
    /// The locals snapshot captured when the frame was pushed.
    pub locals: HashMap<String, Value>,
}

impl CallFrame {
    /// A new frame for `function_name`.
    pub fn new(function_name: impl Into<String>, return_pc: u32, locals: HashMap<String, Value>) -> Self {
        CallFrame {
            function_name: function_name.into(),
            return_pc,
            locals,
        }
    }
}
