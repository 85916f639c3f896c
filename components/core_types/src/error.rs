//! Error taxonomy shared by the VM, JIT and debugger.
//!
//! Every error renders to a plain string; hosts that want richer structure
//! adapt these at the boundary (the errors collaborator is out of scope
//! for this crate).

use thiserror::Error;

/// Errors raised while parsing a bytecode blob into a compilation unit.
///
/// A load error leaves the VM's state undefined for that execution; the
/// instance should be reset before reuse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    /// The 4-byte magic did not read `GLYP`.
    #[error("bad magic")]
    BadMagic,
    /// The version field was not the one required version.
    #[error("unsupported version")]
    UnsupportedVersion,
    /// The constant count header claimed more constants than were present.
    #[error("truncated constant pool")]
    TruncatedConstantPool,
    /// An integer constant's 8-byte payload was cut short.
    #[error("truncated int")]
    TruncatedInt,
    /// A float constant's 8-byte payload was cut short.
    #[error("truncated float")]
    TruncatedFloat,
    /// A bool constant's 1-byte payload was cut short.
    #[error("truncated bool")]
    TruncatedBool,
    /// A string constant's length prefix or payload was cut short.
    #[error("truncated string")]
    TruncatedString,
    /// A constant tag byte did not match any known type.
    #[error("unknown constant tag: {0}")]
    UnknownConstantTag(u8),
    /// An opcode's 4-byte operand ran past the end of the buffer.
    #[error("truncated operand at pc={0}")]
    TruncatedOperand(u32),
}

/// Errors raised while executing bytecode.
///
/// Every variant aborts the current execution at the offending
/// instruction. A containing async future, if any, resolves with this
/// error's message.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuntimeError {
    /// An opcode's operands did not have compatible types.
    #[error("{opcode}: type error: {detail}")]
    TypeError {
        /// The opcode that raised the error.
        opcode: String,
        /// A short explanation.
        detail: String,
    },
    /// Division by zero.
    #[error("div: division by zero")]
    DivisionByZero,
    /// Modulo by zero.
    #[error("mod: modulo by zero")]
    ModuloByZero,
    /// `load-var` referenced a name not found in locals or globals.
    #[error("load-var: undefined variable '{0}'")]
    UndefinedVariable(String),
    /// `call` referenced a name with no registered built-in.
    #[error("call: undefined function '{0}'")]
    UndefinedFunction(String),
    /// `get-field` referenced a key absent from the object.
    #[error("get-field: field not found '{0}'")]
    FieldNotFound(String),
    /// `get-index` referenced an index outside `[0, length)`.
    #[error("get-index: index {index} out of bounds (length {length})")]
    IndexOutOfBounds {
        /// The requested index.
        index: i64,
        /// The collection length.
        length: usize,
    },
    /// `iter-next`/`iter-has-next` referenced an id with no live iterator.
    #[error("iterator: invalid iterator id {0}")]
    InvalidIteratorId(i64),
    /// `iter-next` was called on an iterator already at its end.
    #[error("iterator: exhausted")]
    IteratorExhausted,
    /// `pop` (or an opcode consuming stack inputs) ran below empty.
    #[error("stack underflow")]
    StackUnderflow,
    /// A conditional jump's predicate was not a boolean.
    #[error("jump-if: predicate is not boolean")]
    PredicateNotBoolean,
    /// A `call` argument had the wrong type or count for the built-in.
    #[error("call: {0}")]
    ArgumentError(String),
    /// A WebSocket opcode ran with no host attached.
    #[error("handler not available")]
    HandlerNotAvailable,
    /// A host built-in or the WebSocket host returned an error.
    #[error("{0}")]
    HostError(String),
    /// The step-count ceiling was exceeded.
    #[error("step limit exceeded")]
    StepLimitExceeded,
    /// Bytecode failed to load.
    #[error("load error: {0}")]
    Load(#[from] LoadError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_messages() {
        assert_eq!(LoadError::BadMagic.to_string(), "bad magic");
        assert_eq!(
            LoadError::UnsupportedVersion.to_string(),
            "unsupported version"
        );
        assert_eq!(LoadError::TruncatedInt.to_string(), "truncated int");
        assert_eq!(LoadError::TruncatedString.to_string(), "truncated string");
        assert_eq!(
            LoadError::TruncatedOperand(12).to_string(),
            "truncated operand at pc=12"
        );
    }

    #[test]
    fn runtime_error_identifies_opcode() {
        let err = RuntimeError::TypeError {
            opcode: "add".into(),
            detail: "cannot add bool and int".into(),
        };
        assert!(err.to_string().contains("add"));
    }
}
