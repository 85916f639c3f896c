//! The dynamic value type shared by the VM, JIT and debugger.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

/// A dynamically-typed runtime value.
///
/// `Value` is a tagged sum over the handful of shapes the language's data
/// model supports. Arrays and objects are plain owned containers: cloning a
/// `Value` deep-copies them, which is what guarantees that array/object
/// literals produced by two independent executions never alias each other.
#[derive(Debug, Clone)]
pub enum Value {
    /// The absence of a value.
    Null,
    /// A 64-bit signed integer.
    Int(i64),
    /// A 64-bit IEEE-754 float.
    Float(f64),
    /// A UTF-8 string.
    Str(String),
    /// A boolean.
    Bool(bool),
    /// An ordered sequence of values.
    Array(Vec<Value>),
    /// A string-keyed mapping. Iteration order is unspecified.
    Object(HashMap<String, Value>),
    /// A one-shot asynchronous cell produced by `async` and consumed by `await`.
    Future(FutureHandle),
}

impl Value {
    /// The type tag used for dispatch and for the JIT's type histogram.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Future(_) => "future",
        }
    }

    /// Whether this value is a number (int or float).
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Returns the value as `f64` if it is numeric, promoting ints.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Renders the value as JSON, per the data model's future convention:
    /// a resolved future serializes as its result, a pending one as
    /// `{"pending": true}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Future(handle) => match handle.peek() {
                FutureState::Resolved(v) => v.to_json(),
                FutureState::Error(e) => {
                    let mut m = serde_json::Map::new();
                    m.insert("error".to_string(), serde_json::Value::String(e));
                    serde_json::Value::Object(m)
                }
                FutureState::Pending => {
                    let mut m = serde_json::Map::new();
                    m.insert("pending".to_string(), serde_json::Value::Bool(true));
                    serde_json::Value::Object(m)
                }
            },
        }
    }
}

// Equality follows the documented rule: same-tag comparison only, int/float
// never compare equal to each other even when numerically identical. Since
// this is exactly what a derived, per-variant comparison gives, equality is
// implemented by hand only to avoid requiring `FutureHandle: PartialEq` via
// derive on the whole enum; the behavior otherwise matches a derive.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Future(a), Value::Future(b)) => Arc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

/// The internal state of a [`FutureHandle`].
#[derive(Debug, Clone)]
pub enum FutureState {
    /// Not yet resolved.
    Pending,
    /// Resolved with a value.
    Resolved(Value),
    /// Resolved with an error.
    Error(String),
}

#[derive(Debug)]
struct FutureInner {
    state: Mutex<FutureState>,
    signal: Condvar,
}

/// A one-shot asynchronous cell.
///
/// Produced by the `async` opcode and consumed by `await`. Any number of
/// awaiters may block on the completion signal; once resolved the handle is
/// immutable.
#[derive(Debug, Clone)]
pub struct FutureHandle(Arc<FutureInner>);

impl FutureHandle {
    /// Creates a new, unresolved future.
    pub fn pending() -> Self {
        FutureHandle(Arc::new(FutureInner {
            state: Mutex::new(FutureState::Pending),
            signal: Condvar::new(),
        }))
    }

    /// Creates an already-resolved future holding `value`.
    pub fn resolved(value: Value) -> Self {
        let handle = Self::pending();
        handle.resolve(value);
        handle
    }

    /// Creates an already-resolved future holding an error.
    pub fn failed(message: impl Into<String>) -> Self {
        let handle = Self::pending();
        handle.reject(message.into());
        handle
    }

    /// Resolves the future with a value, waking any blocked awaiters.
    ///
    /// A future is immutable once settled; resolving an already-settled
    /// future is a no-op.
    pub fn resolve(&self, value: Value) {
        let mut guard = self.0.state.lock().unwrap();
        if matches!(*guard, FutureState::Pending) {
            *guard = FutureState::Resolved(value);
            self.0.signal.notify_all();
        }
    }

    /// Resolves the future with an error, waking any blocked awaiters.
    pub fn reject(&self, message: String) {
        let mut guard = self.0.state.lock().unwrap();
        if matches!(*guard, FutureState::Pending) {
            *guard = FutureState::Error(message);
            self.0.signal.notify_all();
        }
    }

    /// Returns the current state without blocking.
    pub fn peek(&self) -> FutureState {
        self.0.state.lock().unwrap().clone()
    }

    /// Blocks the caller until the future settles, then returns the result.
    ///
    /// `timeout` of `None` waits indefinitely. Returns `Err(true)` on
    /// timeout (distinguishable from a settled error).
    pub fn wait(&self, timeout: Option<std::time::Duration>) -> Result<Value, FutureOutcome> {
        let mut guard = self.0.state.lock().unwrap();
        loop {
            match &*guard {
                FutureState::Resolved(v) => return Ok(v.clone()),
                FutureState::Error(e) => return Err(FutureOutcome::Error(e.clone())),
                FutureState::Pending => {}
            }
            match timeout {
                None => guard = self.0.signal.wait(guard).unwrap(),
                Some(d) => {
                    let (next, result) = self.0.signal.wait_timeout(guard, d).unwrap();
                    guard = next;
                    if result.timed_out() && matches!(*guard, FutureState::Pending) {
                        return Err(FutureOutcome::TimedOut);
                    }
                }
            }
        }
    }
}

/// The non-value outcomes of waiting on a future.
#[derive(Debug, Clone)]
pub enum FutureOutcome {
    /// The future resolved with an error.
    Error(String),
    /// The wait exceeded its timeout while the future was still pending.
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_and_float_never_compare_equal() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_eq!(Value::Float(1.5), Value::Float(1.5));
    }

    #[test]
    fn different_tags_are_unequal() {
        assert_ne!(Value::Null, Value::Bool(false));
        assert_ne!(Value::Str("1".into()), Value::Int(1));
    }

    #[test]
    fn future_to_json_pending_then_resolved() {
        let handle = FutureHandle::pending();
        let v = Value::Future(handle.clone());
        assert_eq!(v.to_json(), serde_json::json!({"pending": true}));
        handle.resolve(Value::Int(7));
        assert_eq!(v.to_json(), serde_json::json!(7));
    }

    #[test]
    fn future_wait_blocks_until_resolved() {
        let handle = FutureHandle::pending();
        let h2 = handle.clone();
        let thread = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            h2.resolve(Value::Int(42));
        });
        let result = handle.wait(None).unwrap();
        assert_eq!(result, Value::Int(42));
        thread.join().unwrap();
    }

    #[test]
    fn array_clone_is_independent() {
        let mut a = Value::Array(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::Array(items) = &mut a {
            items.push(Value::Int(2));
        }
        assert_eq!(b, Value::Array(vec![Value::Int(1)]));
    }
}
