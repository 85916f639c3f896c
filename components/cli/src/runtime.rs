//! Orchestrates a single `glyph` invocation: loads bytecode, optionally
//! routes it through the JIT controller, and executes it on a `Vm`,
//! attaching a `Debugger` when asked to.
//!
//! Grounded on the teacher's `js_cli::Runtime`, which plays the same
//! role of gluing the parser/VM/event-loop/builtins together behind one
//! struct the binary entry point drives.

use crate::error::{CliError, CliResult};
use bytecode::Chunk;
use core_types::Value;
use debugger::{Debugger, HookAdapter};
use jit::{JitConfig, JitController, Tier};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;
use vm::Vm;

/// Glues the VM, the JIT controller and the debugger together for one
/// process invocation.
pub struct Runtime {
    vm: Vm,
    jit: Option<Arc<JitController>>,
}

impl Runtime {
    /// A runtime with no JIT controller attached; bytecode executes
    /// directly against the VM.
    pub fn new() -> Self {
        Runtime { vm: Vm::new(), jit: None }
    }

    /// Attaches a JIT controller configured from `config`, so that
    /// subsequent calls to [`Runtime::execute_via_route`] go through its
    /// cache and tier policy.
    pub fn with_jit(mut self, config: JitConfig) -> Self {
        self.jit = Some(Arc::new(JitController::new(config)));
        self
    }

    /// Sets the VM's step-count ceiling.
    pub fn set_max_steps(&mut self, max_steps: u64) {
        self.vm.set_max_steps(max_steps);
    }

    /// Resets the underlying VM to a freshly constructed state (the JIT
    /// controller, if attached, is untouched).
    pub fn reset(&mut self) {
        self.vm.reset();
    }

    /// Executes raw `GLYP` bytes directly, bypassing the JIT controller.
    pub fn execute_bytes(&mut self, bytes: &[u8]) -> CliResult<Value> {
        let chunk = Chunk::load(bytes)?;
        Ok(self.vm.execute(&chunk)?)
    }

    /// Executes `bytes` under `name` through the attached JIT controller
    /// (compiling on miss, timing the run, and recording the execution
    /// back into the controller's profile), returning the result and the
    /// tier the unit ended up at.
    pub fn execute_via_route(&mut self, name: &str, bytes: &[u8]) -> CliResult<(Value, Tier)> {
        let jit = self.jit.clone().expect("execute_via_route requires with_jit");
        let compiled = jit.compile_route(name, bytes)?;
        let chunk = Chunk::load(&compiled)?;

        self.vm.enable_type_observations(true);
        let started = Instant::now();
        let result = self.vm.execute(&chunk);
        let elapsed = started.elapsed();
        let observations = self.vm.take_type_observations();
        let return_type = result.as_ref().ok().map(Value::type_name);
        jit.record_execution(name, elapsed, &observations, return_type);

        let tier = jit.unit(name).map(|u| u.tier).unwrap_or(Tier::Interpreted);
        Ok((result?, tier))
    }

    /// The attached JIT controller, if any, for printing stats after a
    /// `--route` run.
    pub fn jit(&self) -> Option<&Arc<JitController>> {
        self.jit.as_ref()
    }

    /// Executes `bytes` with `debugger` attached, gating every
    /// instruction through a REPL driven from `reader`/`writer`.
    pub fn execute_with_debugger<R: BufRead, W: Write>(
        &mut self,
        bytes: &[u8],
        debugger: &mut Debugger,
        reader: R,
        writer: W,
    ) -> CliResult<Value> {
        let chunk = Chunk::load(bytes)?;
        debugger.set_bytecode(chunk.code.clone());
        let mut hook = HookAdapter::new(debugger, reader, writer);
        let outcome = self.vm.execute_with_hook(&chunk, &mut hook)?;
        Ok(outcome.value)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

/// Parses a `break` location argument (decimal or `0x`-prefixed hex).
pub fn parse_location(arg: &str) -> Option<u32> {
    let trimmed = arg.trim();
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        trimmed.parse::<u32>().ok()
    }
}

/// Renders a result `Value` the way the REPL and the one-shot execution
/// path both print it.
pub fn format_result(value: &Value) -> String {
    debugger::format_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::ChunkBuilder;

    fn literal_return_bytes(n: i64) -> Vec<u8> {
        let mut builder = ChunkBuilder::new();
        let idx = builder.add_constant(Value::Int(n));
        builder.emit(bytecode::Opcode::Push(idx));
        builder.emit(bytecode::Opcode::Halt);
        builder.build_bytes()
    }

    #[test]
    fn executes_bytes_directly() {
        let mut runtime = Runtime::new();
        let result = runtime.execute_bytes(&literal_return_bytes(42)).unwrap();
        assert_eq!(result, Value::Int(42));
    }

    #[test]
    fn execute_via_route_uses_the_jit_cache() {
        let mut runtime = Runtime::new().with_jit(JitConfig::default());
        let bytes = literal_return_bytes(7);

        let (first, first_tier) = runtime.execute_via_route("home", &bytes).unwrap();
        assert_eq!(first, Value::Int(7));
        assert_eq!(first_tier, Tier::Baseline);

        let (second, _) = runtime.execute_via_route("home", &bytes).unwrap();
        assert_eq!(second, Value::Int(7));

        let stats = runtime.jit().unwrap().stats();
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_misses, 1);
    }

    #[test]
    fn execute_with_debugger_runs_to_completion_with_no_breakpoints() {
        let mut runtime = Runtime::new();
        let mut dbg = Debugger::new();
        let bytes = literal_return_bytes(5);
        let result = runtime
            .execute_with_debugger(&bytes, &mut dbg, std::io::Cursor::new(Vec::new()), std::io::sink())
            .unwrap();
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn parse_location_accepts_hex_and_decimal() {
        assert_eq!(parse_location("0x10"), Some(16));
        assert_eq!(parse_location("16"), Some(16));
        assert_eq!(parse_location("nope"), None);
    }
}
