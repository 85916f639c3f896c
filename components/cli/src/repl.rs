//! The top-level interactive loop: executes one bytecode file per line
//! against a persistent `Runtime`, so VM globals survive across entries.
//!
//! Grounded on the teacher's `js_cli::repl` loop's overall shape — a
//! `rustyline`-backed `DefaultEditor`, special `.`-prefixed commands,
//! `exit`/`quit` to leave — generalized from JS source lines to paths
//! naming `GLYP` bytecode files, since this CLI has no source front end
//! of its own (`spec.md` §1).

use crate::error::CliResult;
use crate::runtime::{format_result, Runtime};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Runs the interactive loop until `exit`/`quit`/Ctrl-D.
pub fn run_repl(runtime: &mut Runtime) -> CliResult<()> {
    let mut editor = DefaultEditor::new().map_err(|e| crate::error::CliError::BadArgument(e.to_string()))?;

    println!("Glyph runtime REPL");
    println!("Enter a path to a GLYP bytecode file to execute it, or 'exit' to quit.");

    loop {
        match editor.readline("glyph> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "exit" || trimmed == "quit" || trimmed == ".exit" {
                    println!("Goodbye!");
                    break;
                }
                if trimmed == ".help" {
                    println!("Commands: <path>  .jit  .reset  exit");
                    continue;
                }
                if trimmed == ".reset" {
                    runtime.reset();
                    println!("vm reset");
                    continue;
                }

                let _ = editor.add_history_entry(trimmed);
                match std::fs::read(trimmed) {
                    Ok(bytes) => match runtime.execute_bytes(&bytes) {
                        Ok(value) => println!("{}", format_result(&value)),
                        Err(e) => eprintln!("error: {e}"),
                    },
                    Err(e) => eprintln!("error: could not read '{trimmed}': {e}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Press Ctrl-D or type 'exit' to quit");
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(e) => return Err(crate::error::CliError::BadArgument(e.to_string())),
        }
    }
    Ok(())
}
