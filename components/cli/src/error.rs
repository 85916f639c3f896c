//! Error type for the `glyph` binary.

use core_types::{LoadError, RuntimeError};
use std::fmt;

/// Errors the CLI can surface to the user.
#[derive(Debug)]
pub enum CliError {
    /// Couldn't read the bytecode file or a `--jit-config` file.
    Io(std::io::Error),
    /// The bytecode file failed to parse.
    Load(LoadError),
    /// Execution raised a runtime error.
    Runtime(RuntimeError),
    /// The JIT controller's compile collaborator failed.
    Jit(jit::JitError),
    /// The `--jit-config` file was not valid JSON for `JitConfig`.
    JitConfig(serde_json::Error),
    /// The debugger session ended in an unrecoverable way.
    Debugger(debugger::DebuggerError),
    /// A command-line argument was malformed (e.g. an invalid `--break`
    /// location).
    BadArgument(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "i/o error: {e}"),
            CliError::Load(e) => write!(f, "load error: {e}"),
            CliError::Runtime(e) => write!(f, "runtime error: {e}"),
            CliError::Jit(e) => write!(f, "jit error: {e}"),
            CliError::JitConfig(e) => write!(f, "invalid --jit-config: {e}"),
            CliError::Debugger(e) => write!(f, "debugger error: {e}"),
            CliError::BadArgument(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Io(e) => Some(e),
            CliError::Load(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Jit(e) => Some(e),
            CliError::JitConfig(e) => Some(e),
            CliError::Debugger(e) => Some(e),
            CliError::BadArgument(_) => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<LoadError> for CliError {
    fn from(e: LoadError) -> Self {
        CliError::Load(e)
    }
}

impl From<RuntimeError> for CliError {
    fn from(e: RuntimeError) -> Self {
        CliError::Runtime(e)
    }
}

impl From<jit::JitError> for CliError {
    fn from(e: jit::JitError) -> Self {
        CliError::Jit(e)
    }
}

impl From<debugger::DebuggerError> for CliError {
    fn from(e: debugger::DebuggerError) -> Self {
        CliError::Debugger(e)
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
