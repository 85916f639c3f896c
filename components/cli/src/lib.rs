//! The `glyph` CLI library: argument parsing and runtime orchestration
//! shared by the `glyph` binary.

#![warn(missing_docs)]

pub mod cli;
pub mod error;
pub mod repl;
pub mod runtime;

pub use cli::Args;
pub use error::{CliError, CliResult};
pub use runtime::Runtime;
