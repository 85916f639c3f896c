//! The observer interface the debugger attaches through.
//!
//! The VM itself has no notion of breakpoints or stepping; it just asks an
//! [`ExecutionHook`] before every instruction whether to keep going. This
//! keeps the debugger's gating logic entirely in the `debugger` crate while
//! letting it see the live program counter and locals of a running
//! execution.

use core_types::Value;
use std::collections::HashMap;

/// What the VM should do after consulting a hook.
#[derive(Debug, Clone, PartialEq)]
pub enum HookAction {
    /// Proceed to execute the instruction at `pc`.
    Continue,
    /// Abort the execution with a host-supplied message.
    Abort(String),
}

/// Consulted before every instruction.
pub trait ExecutionHook {
    /// Called with the program counter about to execute, the current
    /// locals and globals (snapshots, not live references), and the
    /// operand stack depth.
    fn before_instruction(
        &mut self,
        pc: u32,
        locals: &HashMap<String, Value>,
        globals: &HashMap<String, Value>,
        stack_depth: usize,
    ) -> HookAction;
}

/// A hook that never stops execution; used when no debugger is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl ExecutionHook for NoopHook {
    fn before_instruction(
        &mut self,
        _pc: u32,
        _locals: &HashMap<String, Value>,
        _globals: &HashMap<String, Value>,
        _stack_depth: usize,
    ) -> HookAction {
        HookAction::Continue
    }
}
