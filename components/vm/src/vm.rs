//! The public `Vm` type: the embeddable bytecode interpreter.

use crate::hook::{ExecutionHook, NoopHook};
use crate::interpreter::{self, ExecutionEnv, RunOutcome};
use crate::iterators::IteratorTable;
use crate::stack::{OperandStack, DEFAULT_MAX_STACK_SIZE};
use crate::ws_host::WebSocketHost;
use bytecode::Chunk;
use builtins::{baseline, Registry};
use core_types::{RuntimeError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A single instruction-stream interpreter.
///
/// Holds the state that outlives any one execution (globals, the built-in
/// registry, an optional WebSocket host) plus the state a caller may want
/// to seed before calling [`Vm::execute`] (the operand stack, pending
/// locals). Locals are fresh at the start of every execution; globals are
/// not and persist across calls until [`Vm::reset`].
pub struct Vm {
    stack: OperandStack,
    globals: HashMap<String, Value>,
    pending_locals: HashMap<String, Value>,
    last_locals: HashMap<String, Value>,
    iterators: IteratorTable,
    builtins: Registry,
    ws_host: Option<Arc<dyn WebSocketHost>>,
    max_steps: u64,
    type_observations: HashMap<String, String>,
    record_type_observations: bool,
}

impl Vm {
    /// A fresh VM with the baseline built-in registry.
    pub fn new() -> Self {
        Vm::with_registry(baseline())
    }

    /// A fresh VM with a caller-supplied registry (e.g. baseline plus
    /// host-specific built-ins).
    pub fn with_registry(registry: Registry) -> Self {
        Vm {
            stack: OperandStack::new(DEFAULT_MAX_STACK_SIZE),
            globals: HashMap::new(),
            pending_locals: HashMap::new(),
            last_locals: HashMap::new(),
            iterators: IteratorTable::new(),
            builtins: registry,
            ws_host: None,
            max_steps: 0,
            type_observations: HashMap::new(),
            record_type_observations: false,
        }
    }

    /// Sets the step-count ceiling; `0` means unlimited.
    pub fn set_max_steps(&mut self, max_steps: u64) {
        self.max_steps = max_steps;
    }

    /// Attaches a WebSocket host for `ws-*` opcodes to consult.
    pub fn set_websocket_host(&mut self, host: Arc<dyn WebSocketHost>) {
        self.ws_host = Some(host);
    }

    /// Detaches the current WebSocket host.
    pub fn clear_websocket_host(&mut self) {
        self.ws_host = None;
    }

    /// Enables per-variable type observation on `store-var`, consulted by
    /// the JIT's profiler via [`Vm::take_type_observations`].
    pub fn enable_type_observations(&mut self, enabled: bool) {
        self.record_type_observations = enabled;
    }

    /// Drains the type observations recorded since the last call.
    pub fn take_type_observations(&mut self) -> HashMap<String, String> {
        std::mem::take(&mut self.type_observations)
    }

    /// Seeds a local variable for the next [`Vm::execute`] call.
    pub fn set_local(&mut self, name: impl Into<String>, value: Value) {
        self.pending_locals.insert(name.into(), value);
    }

    /// Seeds a global variable, visible to every subsequent execution
    /// (and, by copy, to any `async` children they spawn).
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Reads a global variable.
    pub fn get_global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Pushes a value directly onto the operand stack, ahead of execution.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops the top of the operand stack.
    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop()
    }

    /// Clears the stack, pending locals, iterators and globals, returning
    /// the VM to a freshly-constructed state. The built-in registry, the
    /// WebSocket host and the step limit are untouched.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.globals.clear();
        self.pending_locals.clear();
        self.last_locals.clear();
        self.iterators.clear();
        self.type_observations.clear();
    }

    /// A snapshot of the current globals.
    pub fn globals_snapshot(&self) -> HashMap<String, Value> {
        self.globals.clone()
    }

    /// A snapshot of the locals as of the end of the most recent execution.
    pub fn locals_snapshot(&self) -> HashMap<String, Value> {
        self.last_locals.clone()
    }

    /// Loads a GLYP binary and executes it, returning the final result.
    pub fn load_and_execute(&mut self, bytes: &[u8]) -> Result<Value, RuntimeError> {
        let chunk = Chunk::load(bytes).map_err(RuntimeError::Load)?;
        self.execute(&chunk)
    }

    /// Executes `chunk`, returning only the final stack-top value.
    pub fn execute(&mut self, chunk: &Chunk) -> Result<Value, RuntimeError> {
        self.execute_instrumented(chunk).map(|outcome| outcome.value)
    }

    /// Executes `chunk`, returning the full [`RunOutcome`] (including
    /// whether the stream stopped via `http-return`).
    pub fn execute_instrumented(&mut self, chunk: &Chunk) -> Result<RunOutcome, RuntimeError> {
        let mut hook = NoopHook;
        self.execute_with_hook(chunk, &mut hook)
    }

    /// Executes `chunk`, consulting `hook` before every instruction. This
    /// is the entry point a debugger attaches through.
    pub fn execute_with_hook(
        &mut self,
        chunk: &Chunk,
        hook: &mut dyn ExecutionHook,
    ) -> Result<RunOutcome, RuntimeError> {
        let mut locals = std::mem::take(&mut self.pending_locals);
        let mut observations = HashMap::new();

        let mut env = ExecutionEnv {
            constants: &chunk.constants,
            locals: &mut locals,
            globals: &mut self.globals,
            builtins: &self.builtins,
            ws_host: self.ws_host.as_ref(),
            max_steps: self.max_steps,
            type_observations: if self.record_type_observations {
                Some(&mut observations)
            } else {
                None
            },
        };

        let result = interpreter::run(&chunk.code, &mut env, &mut self.stack, &mut self.iterators, hook);

        self.last_locals = locals;
        if self.record_type_observations {
            self.type_observations.extend(observations);
        }
        result
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::ChunkBuilder;

    #[test]
    fn executes_a_literal_return() {
        let mut builder = ChunkBuilder::new();
        let idx = builder.add_constant(Value::Int(42));
        builder.emit(bytecode::Opcode::Push(idx));
        builder.emit(bytecode::Opcode::Return);
        let chunk = builder.build();

        let mut vm = Vm::new();
        let result = vm.execute(&chunk).unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn arithmetic_promotes_int_to_float_on_mixed_operands() {
        let mut builder = ChunkBuilder::new();
        let a = builder.add_constant(Value::Int(1));
        let b = builder.add_constant(Value::Float(2.5));
        builder.emit(bytecode::Opcode::Push(a));
        builder.emit(bytecode::Opcode::Push(b));
        builder.emit(bytecode::Opcode::Add);
        builder.emit(bytecode::Opcode::Return);
        let chunk = builder.build();

        let mut vm = Vm::new();
        assert_eq!(vm.execute(&chunk).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn string_concat_via_add() {
        let mut builder = ChunkBuilder::new();
        let a = builder.add_constant(Value::Str("foo".into()));
        let b = builder.add_constant(Value::Str("bar".into()));
        builder.emit(bytecode::Opcode::Push(a));
        builder.emit(bytecode::Opcode::Push(b));
        builder.emit(bytecode::Opcode::Add);
        builder.emit(bytecode::Opcode::Return);
        let chunk = builder.build();

        let mut vm = Vm::new();
        assert_eq!(vm.execute(&chunk).unwrap(), Value::Str("foobar".into()));
    }

    #[test]
    fn object_build_then_get_field() {
        let mut builder = ChunkBuilder::new();
        let key = builder.add_constant(Value::Str("name".into()));
        let value = builder.add_constant(Value::Str("glyph".into()));
        let key_again = builder.add_constant(Value::Str("name".into()));
        builder.emit(bytecode::Opcode::Push(key));
        builder.emit(bytecode::Opcode::Push(value));
        builder.emit(bytecode::Opcode::BuildObject(1));
        builder.emit(bytecode::Opcode::Push(key_again));
        builder.emit(bytecode::Opcode::GetField);
        builder.emit(bytecode::Opcode::Return);
        let chunk = builder.build();

        let mut vm = Vm::new();
        assert_eq!(vm.execute(&chunk).unwrap(), Value::Str("glyph".into()));
    }

    #[test]
    fn async_child_cannot_mutate_parent_globals() {
        // The async body shares the enclosing chunk's constant pool, so its
        // constants must be added to `parent`, not to a separate builder.
        let mut parent = ChunkBuilder::new();
        let var_name = parent.add_constant(Value::Str("counter".into()));
        let overwrite_value = parent.add_constant(Value::Int(99));

        let mut child = ChunkBuilder::new();
        child.emit(bytecode::Opcode::Push(overwrite_value));
        child.emit(bytecode::Opcode::StoreVar(var_name));
        child.emit(bytecode::Opcode::Halt);

        parent.emit_async(&child);
        parent.emit(bytecode::Opcode::Await);
        parent.emit(bytecode::Opcode::Pop);
        parent.emit(bytecode::Opcode::LoadVar(var_name));
        parent.emit(bytecode::Opcode::Return);
        let chunk = parent.build();

        let mut vm = Vm::new();
        vm.set_global("counter", Value::Int(1));
        let result = vm.execute(&chunk).unwrap();
        assert_eq!(result, Value::Int(1));
        assert_eq!(vm.get_global("counter"), Some(&Value::Int(1)));
    }

    #[test]
    fn step_limit_aborts_runaway_loops() {
        let mut builder = ChunkBuilder::new();
        let offset = builder.offset();
        builder.emit(bytecode::Opcode::Jump(offset));
        let chunk = builder.build();

        let mut vm = Vm::new();
        vm.set_max_steps(1000);
        let err = vm.execute(&chunk).unwrap_err();
        assert_eq!(err, RuntimeError::StepLimitExceeded);
    }

    #[test]
    fn stack_overflow_silently_drops_excess_pushes() {
        let mut builder = ChunkBuilder::new();
        let idx = builder.add_constant(Value::Int(1));
        for _ in 0..(DEFAULT_MAX_STACK_SIZE + 10) {
            builder.emit(bytecode::Opcode::Push(idx));
        }
        builder.emit(bytecode::Opcode::Halt);
        let chunk = builder.build();

        let mut vm = Vm::new();
        vm.execute(&chunk).unwrap();
    }
}
