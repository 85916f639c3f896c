//! The built-in function registry consulted by `call`.

use core_types::{RuntimeError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A host-registered built-in: takes the call's arguments, returns a value
/// or an error.
pub type BuiltinFn = Arc<dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync>;

/// A mapping from built-in name to implementation.
///
/// Cheap to clone: the map itself is cloned but each entry is an `Arc`, so
/// cloning a registry (as happens when an `async` block spawns with its own
/// copy of the parent's built-ins) does not duplicate any function bodies.
#[derive(Clone)]
pub struct Registry {
    functions: HashMap<String, BuiltinFn>,
}

impl Registry {
    /// An empty registry with no built-ins registered.
    pub fn empty() -> Self {
        Registry {
            functions: HashMap::new(),
        }
    }

    /// Registers `name`, overwriting any previous entry under that name.
    ///
    /// The core itself never removes or overrides existing names once a
    /// program is running; this method exists for hosts to extend the
    /// baseline set before execution starts.
    pub fn register(&mut self, name: impl Into<String>, f: BuiltinFn) {
        self.functions.insert(name.into(), f);
    }

    /// Looks up and invokes `name` with `args`.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        match self.functions.get(name) {
            Some(f) => f(args),
            None => Err(RuntimeError::UndefinedFunction(name.to_string())),
        }
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

fn arity_error(name: &str, expected: &str, got: usize) -> RuntimeError {
    RuntimeError::ArgumentError(format!(
        "{} expects {} argument(s), got {}",
        name, expected, got
    ))
}

fn type_error(name: &str, detail: &str) -> RuntimeError {
    RuntimeError::ArgumentError(format!("{}: {}", name, detail))
}

fn expect_string<'a>(name: &str, v: &'a Value) -> Result<&'a str, RuntimeError> {
    match v {
        Value::Str(s) => Ok(s.as_str()),
        other => Err(type_error(
            name,
            &format!("expected string, got {}", other.type_name()),
        )),
    }
}

/// Builds the baseline registry the core ships: string/array utilities and
/// time helpers. Hosts layer application-specific built-ins (MongoDB,
/// Redis, HTTP routing, ...) on top of this; those are out of scope here.
pub fn baseline() -> Registry {
    let mut reg = Registry::empty();

    reg.register(
        "length",
        Arc::new(|args: &[Value]| match args {
            [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
            [Value::Array(a)] => Ok(Value::Int(a.len() as i64)),
            [other] => Err(type_error(
                "length",
                &format!("expected string or array, got {}", other.type_name()),
            )),
            _ => Err(arity_error("length", "1", args.len())),
        }),
    );

    reg.register(
        "upper",
        Arc::new(|args: &[Value]| match args {
            [v] => Ok(Value::Str(expect_string("upper", v)?.to_uppercase())),
            _ => Err(arity_error("upper", "1", args.len())),
        }),
    );

    reg.register(
        "lower",
        Arc::new(|args: &[Value]| match args {
            [v] => Ok(Value::Str(expect_string("lower", v)?.to_lowercase())),
            _ => Err(arity_error("lower", "1", args.len())),
        }),
    );

    reg.register(
        "trim",
        Arc::new(|args: &[Value]| match args {
            [v] => Ok(Value::Str(expect_string("trim", v)?.trim().to_string())),
            _ => Err(arity_error("trim", "1", args.len())),
        }),
    );

    reg.register(
        "split",
        Arc::new(|args: &[Value]| match args {
            [v, sep] => {
                let s = expect_string("split", v)?;
                let sep = expect_string("split", sep)?;
                let parts = if sep.is_empty() {
                    s.chars().map(|c| Value::Str(c.to_string())).collect()
                } else {
                    s.split(sep).map(|p| Value::Str(p.to_string())).collect()
                };
                Ok(Value::Array(parts))
            }
            _ => Err(arity_error("split", "2", args.len())),
        }),
    );

    reg.register(
        "join",
        Arc::new(|args: &[Value]| match args {
            [Value::Array(items), sep] => {
                let sep = expect_string("join", sep)?;
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(expect_string("join", item)?.to_string());
                }
                Ok(Value::Str(parts.join(sep)))
            }
            [other, _] => Err(type_error(
                "join",
                &format!("expected array, got {}", other.type_name()),
            )),
            _ => Err(arity_error("join", "2", args.len())),
        }),
    );

    reg.register(
        "contains",
        Arc::new(|args: &[Value]| match args {
            [Value::Str(s), needle] => {
                let needle = expect_string("contains", needle)?;
                Ok(Value::Bool(s.contains(needle)))
            }
            [Value::Array(items), needle] => Ok(Value::Bool(items.contains(needle))),
            [other, _] => Err(type_error(
                "contains",
                &format!("expected string or array, got {}", other.type_name()),
            )),
            _ => Err(arity_error("contains", "2", args.len())),
        }),
    );

    reg.register(
        "replace",
        Arc::new(|args: &[Value]| match args {
            [v, from, to] => {
                let s = expect_string("replace", v)?;
                let from = expect_string("replace", from)?;
                let to = expect_string("replace", to)?;
                Ok(Value::Str(s.replace(from, to)))
            }
            _ => Err(arity_error("replace", "3", args.len())),
        }),
    );

    reg.register(
        "substring",
        Arc::new(|args: &[Value]| {
            let (s, start, end) = match args {
                [v, Value::Int(start)] => (expect_string("substring", v)?, *start, None),
                [v, Value::Int(start), Value::Int(end)] => {
                    (expect_string("substring", v)?, *start, Some(*end))
                }
                _ => return Err(arity_error("substring", "2 or 3", args.len())),
            };
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let start = start.clamp(0, len) as usize;
            let end = end.unwrap_or(len).clamp(0, len) as usize;
            if start > end {
                return Ok(Value::Str(String::new()));
            }
            Ok(Value::Str(chars[start..end].iter().collect()))
        }),
    );

    let now_fn: BuiltinFn = Arc::new(|args: &[Value]| {
        if !args.is_empty() {
            return Err(arity_error("now", "0", args.len()));
        }
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Ok(Value::Int(secs))
    });
    reg.register("now", now_fn.clone());
    reg.register("time.now", now_fn);

    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_handles_strings_and_arrays() {
        let reg = baseline();
        assert_eq!(
            reg.call("length", &[Value::Str("hi".into())]).unwrap(),
            Value::Int(2)
        );
        assert_eq!(
            reg.call(
                "length",
                &[Value::Array(vec![Value::Int(1), Value::Int(2)])]
            )
            .unwrap(),
            Value::Int(2)
        );
    }

    #[test]
    fn undefined_function_is_an_error() {
        let reg = baseline();
        let err = reg.call("nope", &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedFunction(name) if name == "nope"));
    }

    #[test]
    fn split_and_join_round_trip() {
        let reg = baseline();
        let parts = reg
            .call(
                "split",
                &[Value::Str("a,b,c".into()), Value::Str(",".into())],
            )
            .unwrap();
        assert_eq!(
            parts,
            Value::Array(vec![
                Value::Str("a".into()),
                Value::Str("b".into()),
                Value::Str("c".into())
            ])
        );
        let joined = reg.call("join", &[parts, Value::Str("-".into())]).unwrap();
        assert_eq!(joined, Value::Str("a-b-c".into()));
    }

    #[test]
    fn substring_clamps_bounds() {
        let reg = baseline();
        let result = reg
            .call("substring", &[Value::Str("hello".into()), Value::Int(1), Value::Int(100)])
            .unwrap();
        assert_eq!(result, Value::Str("ello".into()));
    }

    #[test]
    fn host_can_register_additional_builtins_without_losing_baseline() {
        let mut reg = baseline();
        reg.register(
            "double",
            Arc::new(|args: &[Value]| match args {
                [Value::Int(n)] => Ok(Value::Int(n * 2)),
                _ => Err(arity_error("double", "1", args.len())),
            }),
        );
        assert!(reg.contains("length"));
        assert_eq!(reg.call("double", &[Value::Int(4)]).unwrap(), Value::Int(8));
    }
}
