//! The debugger proper: breakpoint management, step modes, call-frame
//! simulation, inspection and disassembly (`spec.md` §4.3).
//!
//! Grounded on the teacher's `nvm` hypervisor debugger's overall shape
//! (breakpoint table, step modes, frame stack, inspection, `attach`-style
//! state machine), generalized from native registers/memory to Glyph
//! locals and bytecode.

use crate::breakpoint::{Breakpoint, BreakpointTable};
use crate::error::DebuggerError;
use crate::frame::CallFrame;
use bytecode::disassemble_one;
use core_types::Value;
use std::collections::HashMap;

/// The debugger's current stepping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    /// Run until a breakpoint or explicit pause.
    Continue,
    /// Break on every instruction.
    StepInto,
    /// Break once back at the same call-frame depth as when stepping
    /// started (a call underneath runs to completion).
    StepOver,
    /// Break once the call-frame depth drops below where stepping
    /// started (the current frame has returned).
    StepOut,
}

/// Renders a bytecode location the way the REPL and disassembly report
/// it: lowercase hex, `0x` prefix, 4 hex digits.
pub fn format_location(location: u32) -> String {
    format!("0x{:04x}", location)
}

/// Renders a [`Value`]'s type and, for collections, a length or
/// cardinality, per `spec.md` §4.3's inspection format.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Int(n) => format!("int({})", n),
        Value::Float(f) => format!("float({})", f),
        Value::Str(s) => format!("string(len={})", s.chars().count()),
        Value::Bool(b) => format!("bool({})", b),
        Value::Array(items) => format!("array(len={})", items.len()),
        Value::Object(fields) => format!("object(len={})", fields.len()),
        Value::Future(_) => "future".to_string(),
    }
}

/// Breakpoint/step/call-frame/inspection state for one debugging
/// session. Implements [`vm::ExecutionHook`] through
/// [`crate::hook_adapter::HookAdapter`] rather than directly, since
/// gating a live execution also needs an injected reader/writer to
/// drive the REPL when a break fires.
#[derive(Debug)]
pub struct Debugger {
    breakpoints: BreakpointTable,
    step_mode: StepMode,
    paused: bool,
    step_start_depth: usize,
    frames: Vec<CallFrame>,
    bytecode: Vec<u8>,
    last_locals: HashMap<String, Value>,
    last_globals: HashMap<String, Value>,
    last_stack_depth: usize,
}

impl Default for Debugger {
    fn default() -> Self {
        Debugger::new()
    }
}

impl Debugger {
    /// A fresh debugger: no breakpoints, continue mode, empty frame
    /// stack.
    pub fn new() -> Self {
        Debugger {
            breakpoints: BreakpointTable::new(),
            step_mode: StepMode::Continue,
            paused: false,
            step_start_depth: 0,
            frames: Vec::new(),
            bytecode: Vec::new(),
            last_locals: HashMap::new(),
            last_globals: HashMap::new(),
            last_stack_depth: 0,
        }
    }

    // -- Breakpoint management -------------------------------------------

    /// Sets a breakpoint at `location`, returning its id.
    pub fn set(&mut self, location: u32) -> u32 {
        self.breakpoints.set(location)
    }

    /// Clears the breakpoint at `location`.
    pub fn clear(&mut self, location: u32) -> Result<(), DebuggerError> {
        if self.breakpoints.clear(location) {
            Ok(())
        } else {
            Err(DebuggerError::NoBreakpointAtLocation(location))
        }
    }

    /// Clears the breakpoint with `id`.
    pub fn clear_by_id(&mut self, id: u32) -> Result<(), DebuggerError> {
        if self.breakpoints.clear_by_id(id) {
            Ok(())
        } else {
            Err(DebuggerError::NoBreakpointWithId(id))
        }
    }

    /// Enables the breakpoint at `location`.
    pub fn enable(&mut self, location: u32) -> Result<(), DebuggerError> {
        if self.breakpoints.enable(location) {
            Ok(())
        } else {
            Err(DebuggerError::NoBreakpointAtLocation(location))
        }
    }

    /// Disables the breakpoint at `location`.
    pub fn disable(&mut self, location: u32) -> Result<(), DebuggerError> {
        if self.breakpoints.disable(location) {
            Ok(())
        } else {
            Err(DebuggerError::NoBreakpointAtLocation(location))
        }
    }

    /// Every breakpoint, ordered by id.
    pub fn list(&self) -> Vec<Breakpoint> {
        self.breakpoints.list()
    }

    /// The breakpoint at `location`, if any.
    pub fn get(&self, location: u32) -> Option<Breakpoint> {
        self.breakpoints.get(location)
    }

    // -- Step modes -------------------------------------------------------

    /// Resumes free-running execution: only breakpoints and pauses stop
    /// it.
    pub fn set_continue(&mut self) {
        self.step_mode = StepMode::Continue;
        self.paused = false;
    }

    /// Breaks on the very next instruction, regardless of depth.
    pub fn step_into(&mut self) {
        self.step_mode = StepMode::StepInto;
        self.paused = false;
    }

    /// Breaks once back at the current call-frame depth (steps over
    /// any nested call).
    pub fn step_over(&mut self) {
        self.step_mode = StepMode::StepOver;
        self.step_start_depth = self.frames.len();
        self.paused = false;
    }

    /// Breaks once the current frame has returned.
    pub fn step_out(&mut self) {
        self.step_mode = StepMode::StepOut;
        self.step_start_depth = self.frames.len();
        self.paused = false;
    }

    /// Explicitly pauses; the next instruction will break regardless of
    /// breakpoints or step mode.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Clears an explicit pause without changing the step mode.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// The current step mode.
    pub fn step_mode(&self) -> StepMode {
        self.step_mode
    }

    /// Whether the debugger is explicitly paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// The break predicate (`spec.md` §4.3): whether execution should
    /// stop before running the instruction at `pc`.
    pub fn should_break(&self, pc: u32) -> bool {
        if self.paused {
            return true;
        }
        if self.step_mode == StepMode::StepInto {
            return true;
        }
        if let Some(bp) = self.breakpoints.get(pc) {
            if bp.enabled {
                return true;
            }
        }
        match self.step_mode {
            StepMode::StepOver => self.frames.len() <= self.step_start_depth,
            StepMode::StepOut => self.frames.len() < self.step_start_depth,
            StepMode::Continue | StepMode::StepInto => false,
        }
    }

    /// Records a break actually taken at `pc`, bumping any breakpoint's
    /// hit count there.
    pub fn record_break(&mut self, pc: u32) {
        self.breakpoints.record_hit(pc);
    }

    /// Updates the locals/globals/stack-depth snapshot the inspection
    /// methods read from. Called once per instruction by whichever hook
    /// adapter drives the VM.
    pub fn observe(&mut self, locals: &HashMap<String, Value>, globals: &HashMap<String, Value>, stack_depth: usize) {
        self.last_locals = locals.clone();
        self.last_globals = globals.clone();
        self.last_stack_depth = stack_depth;
    }

    /// The operand stack depth as of the last observed instruction.
    pub fn stack_depth(&self) -> usize {
        self.last_stack_depth
    }

    // -- Call-stack simulation --------------------------------------------

    /// Pushes a simulated call frame. Driven by whatever dispatches
    /// `call` on the host side; the VM itself has no native notion of
    /// Glyph-level call frames.
    pub fn push_frame(&mut self, name: impl Into<String>, return_pc: u32, locals: HashMap<String, Value>) {
        self.frames.push(CallFrame::new(name, return_pc, locals));
    }

    /// Pops the innermost call frame.
    pub fn pop_frame(&mut self) -> Result<CallFrame, DebuggerError> {
        self.frames.pop().ok_or(DebuggerError::EmptyCallStack)
    }

    /// The current call-frame stack, innermost last.
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// A human-readable backtrace, innermost frame first.
    pub fn format_stack(&self) -> String {
        if self.frames.is_empty() {
            return "(empty call stack)".to_string();
        }
        self.frames
            .iter()
            .rev()
            .enumerate()
            .map(|(depth, frame)| {
                format!(
                    "#{depth} {} (return {})",
                    frame.function_name,
                    format_location(frame.return_pc)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    // -- Inspection --------------------------------------------------------

    /// Looks `name` up in the most recently observed locals, falling
    /// back to globals.
    pub fn inspect(&self, name: &str) -> Result<String, DebuggerError> {
        if let Some(value) = self.last_locals.get(name) {
            return Ok(format_value(value));
        }
        if let Some(value) = self.last_globals.get(name) {
            return Ok(format_value(value));
        }
        Err(DebuggerError::UndefinedVariable(name.to_string()))
    }

    /// Every local, one per line, as `name = type(detail)`.
    pub fn format_locals(&self) -> String {
        format_bindings(&self.last_locals)
    }

    /// Every global, one per line, as `name = type(detail)`.
    pub fn format_globals(&self) -> String {
        format_bindings(&self.last_globals)
    }

    // -- Disassembly --------------------------------------------------------

    /// Loads bytecode for `disassemble` to read from.
    pub fn set_bytecode(&mut self, bytes: Vec<u8>) {
        self.bytecode = bytes;
    }

    /// Disassembles the single instruction at `pc`.
    pub fn disassemble(&self, pc: u32) -> Result<String, DebuggerError> {
        if self.bytecode.is_empty() {
            return Err(DebuggerError::NoBytecodeLoaded);
        }
        let (text, _next_pc) = disassemble_one(&self.bytecode, pc).ok_or(DebuggerError::NothingToDisassemble(pc))?;
        Ok(format!("{} {}", format_location(pc), text))
    }

    // -- Reset ---------------------------------------------------------------

    /// Clears frames, returns to continue mode, unpauses, zeroes
    /// breakpoint hit counts — but preserves the breakpoints themselves.
    pub fn reset(&mut self) {
        self.frames.clear();
        self.step_mode = StepMode::Continue;
        self.paused = false;
        self.step_start_depth = 0;
        self.breakpoints.reset_hit_counts();
    }
}

fn format_bindings(bindings: &HashMap<String, Value>) -> String {
    if bindings.is_empty() {
        return "(none)".to_string();
    }
    let mut names: Vec<&String> = bindings.keys().collect();
    names.sort();
    names
        .into_iter()
        .map(|name| format!("{} = {}", name, format_value(&bindings[name])))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoint_fires_should_break() {
        let mut dbg = Debugger::new();
        dbg.set(0x10);
        assert!(!dbg.should_break(0x20));
        assert!(dbg.should_break(0x10));
    }

    #[test]
    fn disabled_breakpoint_does_not_fire() {
        let mut dbg = Debugger::new();
        dbg.set(0x10);
        dbg.disable(0x10).unwrap();
        assert!(!dbg.should_break(0x10));
    }

    #[test]
    fn step_into_breaks_on_every_instruction() {
        let mut dbg = Debugger::new();
        dbg.step_into();
        assert!(dbg.should_break(0));
        assert!(dbg.should_break(1));
    }

    #[test]
    fn step_over_breaks_only_at_or_above_start_depth() {
        let mut dbg = Debugger::new();
        dbg.push_frame("outer", 0, HashMap::new());
        dbg.step_over(); // start depth = 1
        dbg.push_frame("inner", 4, HashMap::new());
        assert!(!dbg.should_break(5)); // depth 2, deeper than start
        dbg.pop_frame().unwrap();
        assert!(dbg.should_break(6)); // back to depth 1
    }

    #[test]
    fn step_out_breaks_once_shallower_than_start() {
        let mut dbg = Debugger::new();
        dbg.push_frame("outer", 0, HashMap::new());
        dbg.push_frame("inner", 4, HashMap::new());
        dbg.step_out(); // start depth = 2
        assert!(!dbg.should_break(5));
        dbg.pop_frame().unwrap();
        assert!(dbg.should_break(6)); // depth 1 < 2
    }

    #[test]
    fn pause_overrides_everything() {
        let mut dbg = Debugger::new();
        dbg.pause();
        assert!(dbg.should_break(999));
        dbg.resume();
        assert!(!dbg.should_break(999));
    }

    #[test]
    fn pop_frame_on_empty_stack_errors() {
        let mut dbg = Debugger::new();
        assert!(matches!(dbg.pop_frame(), Err(DebuggerError::EmptyCallStack)));
    }

    #[test]
    fn inspect_checks_locals_then_globals_then_errors() {
        let mut dbg = Debugger::new();
        let mut locals = HashMap::new();
        locals.insert("x".to_string(), Value::Int(1));
        let mut globals = HashMap::new();
        globals.insert("g".to_string(), Value::Bool(true));
        dbg.observe(&locals, &globals, 0);

        assert_eq!(dbg.inspect("x").unwrap(), "int(1)");
        assert_eq!(dbg.inspect("g").unwrap(), "bool(true)");
        assert!(matches!(dbg.inspect("nope"), Err(DebuggerError::UndefinedVariable(_))));
    }

    #[test]
    fn disassemble_without_bytecode_errors() {
        let dbg = Debugger::new();
        assert!(matches!(dbg.disassemble(0), Err(DebuggerError::NoBytecodeLoaded)));
    }

    #[test]
    fn reset_preserves_breakpoints_but_zeroes_hits_and_frames() {
        let mut dbg = Debugger::new();
        dbg.set(0x10);
        dbg.record_break(0x10);
        dbg.push_frame("f", 0, HashMap::new());
        dbg.pause();
        dbg.reset();
        assert_eq!(dbg.get(0x10).unwrap().hit_count, 0);
        assert!(dbg.frames().is_empty());
        assert!(!dbg.is_paused());
        assert_eq!(dbg.step_mode(), StepMode::Continue);
    }

    #[test]
    fn format_value_reports_collection_cardinality() {
        assert_eq!(format_value(&Value::Array(vec![Value::Int(1), Value::Int(2)])), "array(len=2)");
        assert_eq!(format_value(&Value::Str("hi".to_string())), "string(len=2)");
        assert_eq!(format_value(&Value::Null), "null");
    }

    #[test]
    fn format_location_is_lowercase_hex_with_4_digits() {
        assert_eq!(format_location(0x10), "0x0010");
        assert_eq!(format_location(0), "0x0000");
    }
}
