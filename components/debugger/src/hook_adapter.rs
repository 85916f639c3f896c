//! The seam between [`Debugger`] and [`vm::ExecutionHook`].
//!
//! The debugger's own API is plain state manipulation; actually gating
//! a running VM additionally needs somewhere to read commands from and
//! write output to when a break fires, so that's factored into this
//! thin adapter rather than folded into [`Debugger`] itself.

use crate::debugger::Debugger;
use crate::repl::{self, SessionOutcome};
use core_types::Value;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use vm::{ExecutionHook, HookAction};

/// Wraps a [`Debugger`] with the reader/writer pair its REPL drives
/// through whenever the debugger decides to break.
pub struct HookAdapter<'a, R, W> {
    debugger: &'a mut Debugger,
    reader: R,
    writer: W,
}

impl<'a, R: BufRead, W: Write> HookAdapter<'a, R, W> {
    /// Attaches `debugger` to a fresh `reader`/`writer` pair for one
    /// execution.
    pub fn new(debugger: &'a mut Debugger, reader: R, writer: W) -> Self {
        HookAdapter { debugger, reader, writer }
    }
}

impl<'a, R: BufRead, W: Write> ExecutionHook for HookAdapter<'a, R, W> {
    fn before_instruction(
        &mut self,
        pc: u32,
        locals: &HashMap<String, Value>,
        globals: &HashMap<String, Value>,
        stack_depth: usize,
    ) -> HookAction {
        self.debugger.observe(locals, globals, stack_depth);
        if !self.debugger.should_break(pc) {
            return HookAction::Continue;
        }
        self.debugger.record_break(pc);
        match repl::run(self.debugger, &mut self.reader, &mut self.writer) {
            Ok(SessionOutcome::Resumed) => HookAction::Continue,
            Ok(SessionOutcome::Quit) => HookAction::Abort("debugger session ended".to_string()),
            Err(e) => HookAction::Abort(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn breakpoint_drives_repl_and_then_continues() {
        let mut dbg = Debugger::new();
        dbg.set(0);
        let reader = Cursor::new(b"locals\ncontinue\n".to_vec());
        let mut output: Vec<u8> = Vec::new();
        {
            let mut adapter = HookAdapter::new(&mut dbg, reader, &mut output);
            let action = adapter.before_instruction(0, &HashMap::new(), &HashMap::new(), 0);
            assert_eq!(action, HookAction::Continue);
        }
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("(none)"));
        assert_eq!(dbg.get(0).unwrap().hit_count, 1);
    }

    #[test]
    fn quit_aborts_execution() {
        let mut dbg = Debugger::new();
        dbg.pause();
        let reader = Cursor::new(b"quit\n".to_vec());
        let mut output: Vec<u8> = Vec::new();
        let mut adapter = HookAdapter::new(&mut dbg, reader, &mut output);
        let action = adapter.before_instruction(0, &HashMap::new(), &HashMap::new(), 0);
        assert!(matches!(action, HookAction::Abort(_)));
    }
}
