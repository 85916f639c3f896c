//! The opcode dispatch loop shared by top-level executions and `async`
//! child executions.

use crate::hook::{ExecutionHook, HookAction};
use crate::iterators::{IterError, IteratorTable};
use crate::stack::OperandStack;
use crate::ws_host::WebSocketHost;
use bytecode::{decode_at, Chunk, Opcode};
use builtins::Registry;
use core_types::{RuntimeError, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// The outcome of running an instruction stream to completion.
pub struct RunOutcome {
    /// The top of the operand stack when execution stopped (null if empty).
    pub value: Value,
    /// Whether the stream stopped via `http-return` specifically.
    pub was_http_return: bool,
}

/// Everything a single instruction stream needs for the duration of one
/// execution. Bundled so `async` can build an independent copy cheaply.
pub struct ExecutionEnv<'a> {
    /// The decoded constant pool, shared read-only for the execution.
    pub constants: &'a [Value],
    /// Per-execution local variables.
    pub locals: &'a mut HashMap<String, Value>,
    /// Globals visible to this execution (a real reference at the top
    /// level; an owned snapshot inside an `async` child).
    pub globals: &'a mut HashMap<String, Value>,
    /// The built-in function registry.
    pub builtins: &'a Registry,
    /// The optional WebSocket host.
    pub ws_host: Option<&'a Arc<dyn WebSocketHost>>,
    /// The step-count ceiling; `0` means unlimited.
    pub max_steps: u64,
    /// Observed `store-var` types, keyed by variable name, for the JIT's
    /// type histogram. Only populated when the caller wants profiling.
    pub type_observations: Option<&'a mut HashMap<String, String>>,
}

/// Runs `code` (the raw instruction stream of a [`Chunk`]) to halt,
/// `return`, `http-return`, or end-of-buffer.
pub fn run(
    code: &[u8],
    env: &mut ExecutionEnv<'_>,
    stack: &mut OperandStack,
    iterators: &mut IteratorTable,
    hook: &mut dyn ExecutionHook,
) -> Result<RunOutcome, RuntimeError> {
    let mut pc: u32 = 0;
    let mut steps: u64 = 0;

    loop {
        if pc as usize >= code.len() {
            return Ok(RunOutcome {
                value: stack.peek().cloned().unwrap_or(Value::Null),
                was_http_return: false,
            });
        }

        if env.max_steps != 0 {
            steps += 1;
            if steps > env.max_steps {
                return Err(RuntimeError::StepLimitExceeded);
            }
        }

        match hook.before_instruction(pc, env.locals, env.globals, stack.len()) {
            HookAction::Continue => {}
            HookAction::Abort(message) => {
                return Err(RuntimeError::HostError(message));
            }
        }

        let (opcode, next_pc) = decode_at(code, pc).map_err(RuntimeError::Load)?;

        match opcode {
            Opcode::Push(idx) => {
                let constant = env
                    .constants
                    .get(idx as usize)
                    .cloned()
                    .unwrap_or(Value::Null);
                stack.push(constant);
            }
            Opcode::Pop => {
                stack.pop()?;
            }

            Opcode::Add => binary_add(stack)?,
            Opcode::Sub => binary_numeric(stack, "sub", |a, b| a - b, |a, b| a - b)?,
            Opcode::Mul => binary_numeric(stack, "mul", |a, b| a * b, |a, b| a * b)?,
            Opcode::Div => binary_div_mod(stack, true)?,
            Opcode::Mod => binary_div_mod(stack, false)?,
            Opcode::Neg => {
                let v = stack.pop()?;
                let negated = match v {
                    Value::Int(i) => Value::Int(-i),
                    Value::Float(f) => Value::Float(-f),
                    other => {
                        return Err(type_error(
                            "neg",
                            &format!("expected number, got {}", other.type_name()),
                        ))
                    }
                };
                stack.push(negated);
            }

            Opcode::Eq => {
                let (a, b) = pop_pair(stack)?;
                stack.push(Value::Bool(a == b));
            }
            Opcode::Ne => {
                let (a, b) = pop_pair(stack)?;
                stack.push(Value::Bool(a != b));
            }
            Opcode::Lt => stack.push(Value::Bool(compare(stack, "lt")? == std::cmp::Ordering::Less)),
            Opcode::Gt => {
                stack.push(Value::Bool(compare(stack, "gt")? == std::cmp::Ordering::Greater))
            }
            Opcode::Le => {
                stack.push(Value::Bool(compare(stack, "le")? != std::cmp::Ordering::Greater))
            }
            Opcode::Ge => {
                stack.push(Value::Bool(compare(stack, "ge")? != std::cmp::Ordering::Less))
            }

            Opcode::And => {
                let (a, b) = pop_bool_pair(stack, "and")?;
                stack.push(Value::Bool(a && b));
            }
            Opcode::Or => {
                let (a, b) = pop_bool_pair(stack, "or")?;
                stack.push(Value::Bool(a || b));
            }
            Opcode::Not => {
                let v = stack.pop()?;
                match v {
                    Value::Bool(b) => stack.push(Value::Bool(!b)),
                    other => {
                        return Err(type_error(
                            "not",
                            &format!("expected bool, got {}", other.type_name()),
                        ))
                    }
                }
            }

            Opcode::LoadVar(idx) => {
                let name = constant_name(env.constants, idx)?;
                let value = env
                    .locals
                    .get(&name)
                    .or_else(|| env.globals.get(&name))
                    .cloned()
                    .ok_or_else(|| RuntimeError::UndefinedVariable(name.clone()))?;
                stack.push(value);
            }
            Opcode::StoreVar(idx) => {
                let name = constant_name(env.constants, idx)?;
                let value = stack.pop()?;
                if let Some(observations) = env.type_observations.as_deref_mut() {
                    observations.insert(name.clone(), value.type_name().to_string());
                }
                env.locals.insert(name, value);
            }

            Opcode::Jump(addr) => {
                pc = addr;
                continue;
            }
            Opcode::JumpIfFalse(addr) => {
                let predicate = pop_bool(stack, "jump-if-false")?;
                if !predicate {
                    pc = addr;
                    continue;
                }
            }
            Opcode::JumpIfTrue(addr) => {
                let predicate = pop_bool(stack, "jump-if-true")?;
                if predicate {
                    pc = addr;
                    continue;
                }
            }
            Opcode::Return => {
                return Ok(RunOutcome {
                    value: stack.peek().cloned().unwrap_or(Value::Null),
                    was_http_return: false,
                });
            }
            Opcode::Halt => {
                return Ok(RunOutcome {
                    value: stack.peek().cloned().unwrap_or(Value::Null),
                    was_http_return: false,
                });
            }
            Opcode::HttpReturn => {
                return Ok(RunOutcome {
                    value: stack.peek().cloned().unwrap_or(Value::Null),
                    was_http_return: true,
                });
            }

            Opcode::GetIter => {
                let collection = stack.pop()?;
                if !matches!(collection, Value::Array(_) | Value::Object(_)) {
                    return Err(type_error(
                        "get-iter",
                        &format!("expected array or object, got {}", collection.type_name()),
                    ));
                }
                let id = iterators.create(&collection);
                stack.push(Value::Int(id));
            }
            Opcode::IterHasNext => {
                let id = pop_iter_id(stack, "iter-has-next")?;
                let has_next = iterators.has_next(id).map_err(|e| iter_error("iter-has-next", e))?;
                stack.push(Value::Bool(has_next));
            }
            Opcode::IterNext(with_key) => {
                let id = pop_iter_id(stack, "iter-next")?;
                let (key, value) = iterators.next(id).map_err(|e| iter_error("iter-next", e))?;
                if with_key != 0 {
                    stack.push(key);
                }
                stack.push(value);
            }
            Opcode::GetIndex => {
                let index = pop_int(stack, "get-index")?;
                let array = stack.pop()?;
                match array {
                    Value::Array(items) => {
                        if index < 0 || index as usize >= items.len() {
                            return Err(RuntimeError::IndexOutOfBounds {
                                index,
                                length: items.len(),
                            });
                        }
                        stack.push(items[index as usize].clone());
                    }
                    other => {
                        return Err(type_error(
                            "get-index",
                            &format!("expected array, got {}", other.type_name()),
                        ))
                    }
                }
            }

            Opcode::BuildArray(count) => {
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(stack.pop()?);
                }
                items.reverse();
                stack.push(Value::Array(items));
            }
            Opcode::BuildObject(pair_count) => {
                let mut flat = Vec::with_capacity(pair_count as usize * 2);
                for _ in 0..(pair_count * 2) {
                    flat.push(stack.pop()?);
                }
                flat.reverse();
                let mut map = HashMap::with_capacity(pair_count as usize);
                for pair in flat.chunks_exact(2) {
                    let key = match &pair[0] {
                        Value::Str(s) => s.clone(),
                        other => {
                            return Err(type_error(
                                "build-object",
                                &format!("expected string key, got {}", other.type_name()),
                            ))
                        }
                    };
                    map.insert(key, pair[1].clone());
                }
                stack.push(Value::Object(map));
            }
            Opcode::GetField => {
                let key = match stack.pop()? {
                    Value::Str(s) => s,
                    other => {
                        return Err(type_error(
                            "get-field",
                            &format!("expected string key, got {}", other.type_name()),
                        ))
                    }
                };
                let object = stack.pop()?;
                match object {
                    Value::Object(map) => {
                        let value = map.get(&key).cloned().ok_or_else(|| {
                            RuntimeError::FieldNotFound(key.clone())
                        })?;
                        stack.push(value);
                    }
                    other => {
                        return Err(type_error(
                            "get-field",
                            &format!("expected object, got {}", other.type_name()),
                        ))
                    }
                }
            }

            Opcode::Call(arg_count) => {
                let mut args = Vec::with_capacity(arg_count as usize);
                for _ in 0..arg_count {
                    args.push(stack.pop()?);
                }
                args.reverse();
                let name = match stack.pop()? {
                    Value::Str(s) => s,
                    other => {
                        return Err(type_error(
                            "call",
                            &format!("expected function name string, got {}", other.type_name()),
                        ))
                    }
                };
                let result = env.builtins.call(&name, &args)?;
                stack.push(result);
            }

            Opcode::WsSend => ws_unary(stack, env.ws_host, "ws-send", |host, value| host.send(value))?,
            Opcode::WsBroadcast => {
                ws_unary(stack, env.ws_host, "ws-broadcast", |host, value| host.broadcast(value))?
            }
            Opcode::WsBroadcastRoom => {
                let value = stack.pop()?;
                let room = pop_string(stack, "ws-broadcast-room")?;
                let host = require_host(env.ws_host, "ws-broadcast-room")?;
                host.broadcast_to_room(&room, &value)
                    .map_err(RuntimeError::HostError)?;
            }
            Opcode::WsJoinRoom => {
                let room = pop_string(stack, "ws-join-room")?;
                let host = require_host(env.ws_host, "ws-join-room")?;
                host.join_room(&room).map_err(RuntimeError::HostError)?;
            }
            Opcode::WsLeaveRoom => {
                let room = pop_string(stack, "ws-leave-room")?;
                let host = require_host(env.ws_host, "ws-leave-room")?;
                host.leave_room(&room).map_err(RuntimeError::HostError)?;
            }
            Opcode::WsClose => {
                let reason = pop_string(stack, "ws-close")?;
                let host = require_host(env.ws_host, "ws-close")?;
                host.close(&reason).map_err(RuntimeError::HostError)?;
            }
            Opcode::WsGetRooms => {
                let host = require_host(env.ws_host, "ws-get-rooms")?;
                let rooms = host.rooms().into_iter().map(Value::Str).collect();
                stack.push(Value::Array(rooms));
            }
            Opcode::WsGetClients => {
                let room = pop_string(stack, "ws-get-clients")?;
                let host = require_host(env.ws_host, "ws-get-clients")?;
                let clients = host
                    .room_clients(&room)
                    .map_err(RuntimeError::HostError)?
                    .into_iter()
                    .map(Value::Str)
                    .collect();
                stack.push(Value::Array(clients));
            }
            Opcode::WsGetConnCount => {
                let count = env.ws_host.map(|h| h.connection_count()).unwrap_or(0);
                stack.push(Value::Int(count));
            }
            Opcode::WsGetUptime => {
                let uptime = env.ws_host.map(|h| h.uptime_seconds()).unwrap_or(0);
                stack.push(Value::Int(uptime));
            }

            Opcode::Async(body_len) => {
                let body_start = next_pc as usize - body_len as usize;
                let body = code[body_start..next_pc as usize].to_vec();
                let constants = env.constants.to_vec();
                let locals_snapshot = env.locals.clone();
                let globals_snapshot = env.globals.clone();
                let builtins_snapshot = env.builtins.clone();
                let future = async_runtime::spawn(move || {
                    run_async_body(body, constants, locals_snapshot, globals_snapshot, builtins_snapshot)
                });
                stack.push(Value::Future(future));
            }
            Opcode::Await => {
                let value = stack.pop()?;
                match value {
                    Value::Future(handle) => match handle.wait(None) {
                        Ok(resolved) => stack.push(resolved),
                        Err(core_types::FutureOutcome::Error(message)) => {
                            return Err(RuntimeError::HostError(message))
                        }
                        Err(core_types::FutureOutcome::TimedOut) => {
                            return Err(RuntimeError::HostError("await: timed out".to_string()))
                        }
                    },
                    other => stack.push(other),
                }
            }
        }

        pc = next_pc;
    }
}

/// Runs an `async` body to completion on its own thread with no shared
/// mutable state with the parent; used as the closure passed to
/// [`async_runtime::spawn`].
fn run_async_body(
    body: Vec<u8>,
    constants: Vec<Value>,
    mut locals: HashMap<String, Value>,
    mut globals: HashMap<String, Value>,
    builtins: Registry,
) -> Result<Value, String> {
    let mut stack = OperandStack::default();
    let mut iterators = IteratorTable::new();
    let mut env = ExecutionEnv {
        constants: &constants,
        locals: &mut locals,
        globals: &mut globals,
        builtins: &builtins,
        ws_host: None,
        max_steps: 0,
        type_observations: None,
    };
    let mut hook = crate::hook::NoopHook;
    run(&body, &mut env, &mut stack, &mut iterators, &mut hook)
        .map(|outcome| outcome.value)
        .map_err(|e| e.to_string())
}

fn constant_name(constants: &[Value], idx: u32) -> Result<String, RuntimeError> {
    match constants.get(idx as usize) {
        Some(Value::Str(s)) => Ok(s.clone()),
        _ => Ok(String::new()),
    }
}

fn type_error(opcode: &str, detail: &str) -> RuntimeError {
    RuntimeError::TypeError {
        opcode: opcode.to_string(),
        detail: detail.to_string(),
    }
}

fn iter_error(_opcode: &str, err: IterError) -> RuntimeError {
    match err {
        IterError::InvalidId => RuntimeError::InvalidIteratorId(-1),
        IterError::Exhausted => RuntimeError::IteratorExhausted,
    }
}

fn pop_pair(stack: &mut OperandStack) -> Result<(Value, Value), RuntimeError> {
    let b = stack.pop()?;
    let a = stack.pop()?;
    Ok((a, b))
}

fn pop_bool(stack: &mut OperandStack, _opcode: &str) -> Result<bool, RuntimeError> {
    match stack.pop()? {
        Value::Bool(b) => Ok(b),
        _ => Err(RuntimeError::PredicateNotBoolean),
    }
}

fn pop_bool_pair(stack: &mut OperandStack, opcode: &str) -> Result<(bool, bool), RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    let a = match a {
        Value::Bool(b) => b,
        other => {
            return Err(type_error(
                opcode,
                &format!("expected bool, got {}", other.type_name()),
            ))
        }
    };
    let b = match b {
        Value::Bool(b) => b,
        other => {
            return Err(type_error(
                opcode,
                &format!("expected bool, got {}", other.type_name()),
            ))
        }
    };
    Ok((a, b))
}

fn pop_int(stack: &mut OperandStack, opcode: &str) -> Result<i64, RuntimeError> {
    match stack.pop()? {
        Value::Int(i) => Ok(i),
        other => Err(type_error(
            opcode,
            &format!("expected int, got {}", other.type_name()),
        )),
    }
}

fn pop_string(stack: &mut OperandStack, opcode: &str) -> Result<String, RuntimeError> {
    match stack.pop()? {
        Value::Str(s) => Ok(s),
        other => Err(type_error(
            opcode,
            &format!("expected string, got {}", other.type_name()),
        )),
    }
}

fn pop_iter_id(stack: &mut OperandStack, opcode: &str) -> Result<i64, RuntimeError> {
    pop_int(stack, opcode)
}

fn binary_add(stack: &mut OperandStack) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    let result = match (a, b) {
        (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
        (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
        (Value::Int(a), Value::Float(b)) => Value::Float(a as f64 + b),
        (Value::Float(a), Value::Int(b)) => Value::Float(a + b as f64),
        (Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
        (Value::Array(mut a), Value::Array(b)) => {
            a.extend(b);
            Value::Array(a)
        }
        (a, b) => {
            return Err(type_error(
                "add",
                &format!("cannot add {} and {}", a.type_name(), b.type_name()),
            ))
        }
    };
    stack.push(result);
    Ok(())
}

fn binary_numeric(
    stack: &mut OperandStack,
    opcode: &str,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    let result = match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => Value::Int(int_op(*x, *y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Value::Float(float_op(x, y)),
            _ => {
                return Err(type_error(
                    opcode,
                    &format!("expected numbers, got {} and {}", a.type_name(), b.type_name()),
                ))
            }
        },
    };
    stack.push(result);
    Ok(())
}

fn binary_div_mod(stack: &mut OperandStack, is_div: bool) -> Result<(), RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
        if *y == 0 {
            return Err(if is_div {
                RuntimeError::DivisionByZero
            } else {
                RuntimeError::ModuloByZero
            });
        }
        stack.push(Value::Int(if is_div { x / y } else { x % y }));
        return Ok(());
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            if y == 0.0 {
                return Err(if is_div {
                    RuntimeError::DivisionByZero
                } else {
                    RuntimeError::ModuloByZero
                });
            }
            stack.push(Value::Float(if is_div { x / y } else { x % y }));
            Ok(())
        }
        _ => Err(type_error(
            if is_div { "div" } else { "mod" },
            &format!("expected numbers, got {} and {}", a.type_name(), b.type_name()),
        )),
    }
}

fn compare(stack: &mut OperandStack, opcode: &str) -> Result<std::cmp::Ordering, RuntimeError> {
    let (a, b) = pop_pair(stack)?;
    match (&a, &b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).ok_or_else(|| {
                type_error(opcode, "numeric comparison produced no ordering (NaN)")
            }),
            _ => Err(type_error(
                opcode,
                &format!(
                    "expected matching numbers or strings, got {} and {}",
                    a.type_name(),
                    b.type_name()
                ),
            )),
        },
    }
}

fn require_host<'a>(
    host: Option<&'a Arc<dyn WebSocketHost>>,
    _opcode: &str,
) -> Result<&'a Arc<dyn WebSocketHost>, RuntimeError> {
    host.ok_or(RuntimeError::HandlerNotAvailable)
}

fn ws_unary(
    stack: &mut OperandStack,
    host: Option<&Arc<dyn WebSocketHost>>,
    opcode: &str,
    f: fn(&Arc<dyn WebSocketHost>, &Value) -> Result<(), String>,
) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    let host = require_host(host, opcode)?;
    f(host, &value).map_err(RuntimeError::HostError)
}
