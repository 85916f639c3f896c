//! The debugger's line-oriented command loop (`spec.md` §4.3), reading
//! from an injected reader and writing to an injected writer so it can
//! be driven from a real terminal or, in tests, from an in-memory
//! buffer.
//!
//! Grounded on the teacher's `js_cli::repl` loop's overall shape
//! (read-dispatch-print, unknown input reported but not fatal),
//! generalized from JS source lines to debugger commands.

use crate::debugger::{format_location, Debugger};
use crate::error::DebuggerError;
use std::io::{BufRead, Write};

const PROMPT: &str = "(glyph-dbg) ";

const HELP_TEXT: &str = "\
Commands:
  help, h, ?            show this help
  break <loc>           set a breakpoint at a bytecode location
  clear <loc>           remove the breakpoint at a bytecode location
  breakpoints           list breakpoints
  continue              resume free-running execution
  step                  step into the next instruction
  next                  step over (run any nested call to completion)
  out                   step out of the current call frame
  locals                show the current locals
  globals               show the current globals
  stack                 show the operand stack depth
  callstack             show the simulated call stack
  reset                 clear frames and breakpoint hit counts
  print <expr>          inspect a variable by name
  quit                  end the debugging session";

/// One parsed REPL command line.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Help,
    Break(u32),
    Clear(u32),
    Breakpoints,
    Continue,
    Step,
    Next,
    Out,
    Locals,
    Globals,
    Stack,
    CallStack,
    Reset,
    Print(String),
    Quit,
    Empty,
    Unknown(String),
    BadArgument(String),
}

fn parse_location(arg: &str) -> Option<u32> {
    let trimmed = arg.trim();
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).ok()
    } else {
        trimmed.parse::<u32>().ok()
    }
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let mut parts = line.splitn(2, char::is_whitespace);
    let verb = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match verb {
        "help" | "h" | "?" => Command::Help,
        "break" => match parse_location(rest) {
            Some(loc) => Command::Break(loc),
            None => Command::BadArgument(format!("'{rest}' is not a valid location")),
        },
        "clear" => match parse_location(rest) {
            Some(loc) => Command::Clear(loc),
            None => Command::BadArgument(format!("'{rest}' is not a valid location")),
        },
        "breakpoints" => Command::Breakpoints,
        "continue" => Command::Continue,
        "step" => Command::Step,
        "next" => Command::Next,
        "out" => Command::Out,
        "locals" => Command::Locals,
        "globals" => Command::Globals,
        "stack" => Command::Stack,
        "callstack" => Command::CallStack,
        "reset" => Command::Reset,
        "print" if !rest.is_empty() => Command::Print(rest.to_string()),
        "print" => Command::BadArgument("print requires a variable name".to_string()),
        "quit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Why a REPL session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// A command that resumes execution (`continue`/`step`/`next`/`out`)
    /// was issued.
    Resumed,
    /// `quit` was issued, or the reader reached end of input.
    Quit,
}

fn write_line<W: Write>(writer: &mut W, text: &str) -> Result<(), DebuggerError> {
    writeln!(writer, "{text}").map_err(|e| DebuggerError::Io(e.to_string()))
}

/// Processes a single command line against `debugger`, writing its
/// output to `writer`. Returns `Some(outcome)` once the session should
/// stop reading further commands.
fn dispatch<W: Write>(
    debugger: &mut Debugger,
    writer: &mut W,
    line: &str,
) -> Result<Option<SessionOutcome>, DebuggerError> {
    match parse_command(line) {
        Command::Empty => {}
        Command::Help => write_line(writer, HELP_TEXT)?,
        Command::Break(loc) => {
            let id = debugger.set(loc);
            write_line(writer, &format!("breakpoint {id} set at {}", format_location(loc)))?;
        }
        Command::Clear(loc) => match debugger.clear(loc) {
            Ok(()) => write_line(writer, &format!("cleared breakpoint at {}", format_location(loc)))?,
            Err(e) => write_line(writer, &format!("error: {e}"))?,
        },
        Command::Breakpoints => {
            let list = debugger.list();
            if list.is_empty() {
                write_line(writer, "(no breakpoints)")?;
            } else {
                for bp in list {
                    write_line(
                        writer,
                        &format!(
                            "#{} {} {} hits={}",
                            bp.id,
                            format_location(bp.location),
                            if bp.enabled { "enabled" } else { "disabled" },
                            bp.hit_count
                        ),
                    )?;
                }
            }
        }
        Command::Continue => {
            debugger.set_continue();
            return Ok(Some(SessionOutcome::Resumed));
        }
        Command::Step => {
            debugger.step_into();
            return Ok(Some(SessionOutcome::Resumed));
        }
        Command::Next => {
            debugger.step_over();
            return Ok(Some(SessionOutcome::Resumed));
        }
        Command::Out => {
            debugger.step_out();
            return Ok(Some(SessionOutcome::Resumed));
        }
        Command::Locals => write_line(writer, &debugger.format_locals())?,
        Command::Globals => write_line(writer, &debugger.format_globals())?,
        Command::Stack => write_line(writer, &format!("operand stack depth: {}", debugger.stack_depth()))?,
        Command::CallStack => write_line(writer, &debugger.format_stack())?,
        Command::Reset => {
            debugger.reset();
            write_line(writer, "debugger reset")?;
        }
        Command::Print(name) => match debugger.inspect(&name) {
            Ok(rendered) => write_line(writer, &format!("{name} = {rendered}"))?,
            Err(e) => write_line(writer, &format!("error: {e}"))?,
        },
        Command::Quit => return Ok(Some(SessionOutcome::Quit)),
        Command::Unknown(verb) => write_line(writer, &format!("unknown command '{verb}' (try 'help')"))?,
        Command::BadArgument(detail) => write_line(writer, &format!("error: {detail}"))?,
    }
    Ok(None)
}

/// Drives the command loop until a resuming command, `quit`, or
/// end-of-input is reached.
pub fn run<R: BufRead, W: Write>(debugger: &mut Debugger, reader: &mut R, writer: &mut W) -> Result<SessionOutcome, DebuggerError> {
    loop {
        write!(writer, "{PROMPT}").map_err(|e| DebuggerError::Io(e.to_string()))?;
        writer.flush().map_err(|e| DebuggerError::Io(e.to_string()))?;

        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).map_err(|e| DebuggerError::Io(e.to_string()))?;
        if bytes_read == 0 {
            return Ok(SessionOutcome::Quit);
        }

        if let Some(outcome) = dispatch(debugger, writer, &line)? {
            return Ok(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_session(debugger: &mut Debugger, input: &str) -> (SessionOutcome, String) {
        let mut reader = Cursor::new(input.as_bytes());
        let mut output = Vec::new();
        let outcome = run(debugger, &mut reader, &mut output).unwrap();
        (outcome, String::from_utf8(output).unwrap())
    }

    #[test]
    fn unknown_command_does_not_end_session() {
        let mut dbg = Debugger::new();
        let (outcome, output) = run_session(&mut dbg, "bogus\ncontinue\n");
        assert_eq!(outcome, SessionOutcome::Resumed);
        assert!(output.contains("unknown command 'bogus'"));
    }

    #[test]
    fn break_then_breakpoints_then_continue() {
        let mut dbg = Debugger::new();
        let (outcome, output) = run_session(&mut dbg, "break 0x10\nbreakpoints\ncontinue\n");
        assert_eq!(outcome, SessionOutcome::Resumed);
        assert!(output.contains("breakpoint 1 set at 0x0010"));
        assert!(output.contains("#1 0x0010 enabled hits=0"));
    }

    #[test]
    fn quit_ends_session_without_resuming() {
        let mut dbg = Debugger::new();
        let (outcome, _) = run_session(&mut dbg, "quit\n");
        assert_eq!(outcome, SessionOutcome::Quit);
    }

    #[test]
    fn eof_is_treated_as_quit() {
        let mut dbg = Debugger::new();
        let (outcome, _) = run_session(&mut dbg, "");
        assert_eq!(outcome, SessionOutcome::Quit);
    }

    #[test]
    fn malformed_break_argument_is_reported_not_fatal() {
        let mut dbg = Debugger::new();
        let (outcome, output) = run_session(&mut dbg, "break not-a-number\ncontinue\n");
        assert_eq!(outcome, SessionOutcome::Resumed);
        assert!(output.contains("error:"));
    }

    #[test]
    fn print_missing_variable_reports_error() {
        let mut dbg = Debugger::new();
        let (_, output) = run_session(&mut dbg, "print nope\nquit\n");
        assert!(output.contains("undefined variable 'nope'"));
    }
}
