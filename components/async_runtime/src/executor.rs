//! Spawns independent executions for the `async` opcode.
//!
//! Each spawned body runs on its own OS thread with no shared state besides
//! what it was handed at spawn time; the parent sees only the
//! [`FutureHandle`] that `spawn` returns.

use core_types::{FutureHandle, Value};
use std::panic::{self, AssertUnwindSafe};

/// Runs `body` on a new thread and returns a future that resolves with its
/// result.
///
/// A panic inside `body` is caught and surfaces as the future's error,
/// matching the spec's requirement that a child's panic never propagates
/// to the parent's thread.
pub fn spawn<F>(body: F) -> FutureHandle
where
    F: FnOnce() -> Result<Value, String> + Send + 'static,
{
    let handle = FutureHandle::pending();
    let child = handle.clone();
    std::thread::spawn(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(body));
        match outcome {
            Ok(Ok(value)) => child.resolve(value),
            Ok(Err(message)) => child.reject(message),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "async block panicked".to_string());
                child.reject(message);
            }
        }
    });
    handle
}

/// Default await timeout when the host does not override it: 30 seconds.
///
/// The core never enforces this itself (§4.1); it is exposed so hosts that
/// want to mirror the reference timeout do not have to invent the number.
/// `0` (via [`std::time::Duration::ZERO`]) means unlimited, at the host's
/// discretion.
pub const DEFAULT_AWAIT_TIMEOUT_SECS: u64 = 30;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_resolves_with_returned_value() {
        let handle = spawn(|| Ok(Value::Int(30)));
        let result = handle.wait(None).unwrap();
        assert_eq!(result, Value::Int(30));
    }

    #[test]
    fn spawn_captures_panics_as_errors() {
        let handle = spawn(|| -> Result<Value, String> { panic!("boom") });
        let err = handle.wait(None).unwrap_err();
        match err {
            core_types::FutureOutcome::Error(message) => assert!(message.contains("boom")),
            core_types::FutureOutcome::TimedOut => panic!("expected an error, not a timeout"),
        }
    }

    #[test]
    fn spawn_propagates_returned_errors() {
        let handle = spawn(|| Err("division by zero".to_string()));
        let err = handle.wait(None).unwrap_err();
        match err {
            core_types::FutureOutcome::Error(message) => {
                assert_eq!(message, "division by zero")
            }
            core_types::FutureOutcome::TimedOut => panic!("expected an error"),
        }
    }
}
