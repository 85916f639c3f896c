//! The process entry point's argument surface.

use clap::Parser;
use std::path::PathBuf;

/// Execute, disassemble or step through a GLYP bytecode file.
#[derive(Debug, Parser)]
#[command(name = "glyph", version, about = "Glyph bytecode VM, JIT controller and debugger")]
pub struct Args {
    /// Path to a `GLYP`-formatted bytecode file. Omit together with
    /// `--repl` to start an interactive session instead.
    pub file: Option<PathBuf>,

    /// Start an interactive loop that executes one bytecode file per
    /// line against a persistent VM, instead of running `file` once.
    #[arg(long, conflicts_with = "file")]
    pub repl: bool,

    /// Step-count ceiling for this execution (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    pub max_steps: u64,

    /// Attach the interactive debugger, reading commands from stdin.
    #[arg(long)]
    pub debug: bool,

    /// Set a breakpoint at the given bytecode offset before running
    /// (decimal or `0x`-prefixed hex). May be repeated.
    #[arg(long = "break", value_name = "LOC")]
    pub breakpoints: Vec<String>,

    /// Print the disassembly and exit without executing.
    #[arg(long)]
    pub disassemble: bool,

    /// Route the execution through the JIT controller under this name
    /// instead of executing directly, printing the resulting tier and
    /// `detailed_stats()` afterwards.
    #[arg(long)]
    pub route: Option<String>,

    /// Path to a `serde_json`-encoded `JitConfig`, used only together
    /// with `--route`.
    #[arg(long, requires = "route")]
    pub jit_config: Option<PathBuf>,
}
