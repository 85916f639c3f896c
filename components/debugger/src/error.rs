//! Debugger-local errors. Per `spec.md` §4.3's failure semantics,
//! debugger operations never halt the VM; these are only ever returned
//! to whatever is driving the debugger (the REPL, or a host embedding
//! it) and shown to the user.

use thiserror::Error;

/// Errors surfaced by the debugger's own operations.
#[derive(Debug, Clone, Error)]
pub enum DebuggerError {
    /// `clear`/`enable`/`disable` targeted a location with no breakpoint.
    #[error("no breakpoint at location {0:#06x}")]
    NoBreakpointAtLocation(u32),
    /// `clear-by-id` targeted an id that doesn't exist.
    #[error("no breakpoint with id {0}")]
    NoBreakpointWithId(u32),
    /// `pop-frame` was called with no frames on the call stack.
    #[error("call stack is empty")]
    EmptyCallStack,
    /// `inspect`/`print` named a variable not present in locals or
    /// globals.
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    /// `disassemble` was called before `set-bytecode`.
    #[error("no bytecode loaded")]
    NoBytecodeLoaded,
    /// `disassemble` was given a `pc` past the end of the loaded
    /// bytecode.
    #[error("nothing to disassemble at pc={0}")]
    NothingToDisassemble(u32),
    /// An I/O failure reading from or writing to the REPL's injected
    /// streams.
    #[error("repl i/o error: {0}")]
    Io(String),
}
