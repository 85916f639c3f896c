//! The opcode set executed by the VM.
//!
//! Each opcode is a single tag byte optionally followed by a 4-byte
//! little-endian operand. `async` is the one exception: its operand is a
//! byte count, and that many raw instruction bytes (a nested bytecode
//! program with no `GLYP` header) immediately follow it in the stream.

use core_types::LoadError;

/// A decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    /// Push `constants[idx]` onto the operand stack.
    Push(u32),
    /// Pop and discard the top of the operand stack.
    Pop,

    /// Pop two numbers/strings/arrays, push their sum/concatenation.
    Add,
    /// Pop two numbers, push their difference.
    Sub,
    /// Pop two numbers, push their product.
    Mul,
    /// Pop two numbers, push their quotient.
    Div,
    /// Pop two numbers, push the remainder.
    Mod,
    /// Pop one number, push its negation.
    Neg,

    /// Pop two values, push whether they are equal.
    Eq,
    /// Pop two values, push whether they are not equal.
    Ne,
    /// Pop two values, push whether the first is less than the second.
    Lt,
    /// Pop two values, push whether the first is greater than the second.
    Gt,
    /// Pop two values, push whether the first is less than or equal.
    Le,
    /// Pop two values, push whether the first is greater than or equal.
    Ge,

    /// Pop two booleans, push their logical and.
    And,
    /// Pop two booleans, push their logical or.
    Or,
    /// Pop one boolean, push its negation.
    Not,

    /// Load the variable named by `constants[idx]` (locals then globals).
    LoadVar(u32),
    /// Pop a value and store it in the local named by `constants[idx]`.
    StoreVar(u32),

    /// Set the program counter to `addr`.
    Jump(u32),
    /// Pop a boolean predicate; jump to `addr` if it is false.
    JumpIfFalse(u32),
    /// Pop a boolean predicate; jump to `addr` if it is true.
    JumpIfTrue(u32),
    /// Stop execution, leaving the stack top as the result.
    Return,
    /// Stop execution, leaving the stack top as the result.
    Halt,

    /// Pop a collection, push a fresh iterator id.
    GetIter,
    /// Pop an iterator id; push value (and key, if operand is non-zero).
    IterNext(u32),
    /// Pop an iterator id, push whether it has more elements.
    IterHasNext,
    /// Pop an index then an array, push the element at that index.
    GetIndex,

    /// Pop `count` values, push them as an array in source order.
    BuildArray(u32),
    /// Pop `pair_count` key/value pairs, push them as an object.
    BuildObject(u32),
    /// Pop a key then an object, push the field's value.
    GetField,

    /// Pop `arg_count` arguments and a function name, push the call result.
    Call(u32),

    /// Stop execution; signals the host that the stack top is the response.
    HttpReturn,

    /// Send a value to the current connection via the WebSocket host.
    WsSend,
    /// Broadcast a value to all connections.
    WsBroadcast,
    /// Broadcast a value to a named room.
    WsBroadcastRoom,
    /// Join the current connection to a named room.
    WsJoinRoom,
    /// Remove the current connection from a named room.
    WsLeaveRoom,
    /// Close the current connection.
    WsClose,
    /// Push the list of room names.
    WsGetRooms,
    /// Push the list of client ids in a room.
    WsGetClients,
    /// Push the number of live connections.
    WsGetConnCount,
    /// Push the host's uptime in seconds.
    WsGetUptime,

    /// Spawn an independent execution of the following `body_len` raw
    /// instruction bytes; push a future for its result.
    Async(u32),
    /// Pop a value; if it is a future, block until resolved and push the
    /// result (or propagate its error). Non-futures pass through unchanged.
    Await,
}

macro_rules! tags {
    ($($name:ident = $val:expr),* $(,)?) => {
        $(const $name: u8 = $val;)*
    };
}

tags! {
    TAG_PUSH = 0x00, TAG_POP = 0x01,
    TAG_ADD = 0x02, TAG_SUB = 0x03, TAG_MUL = 0x04, TAG_DIV = 0x05, TAG_MOD = 0x06, TAG_NEG = 0x07,
    TAG_EQ = 0x08, TAG_NE = 0x09, TAG_LT = 0x0A, TAG_GT = 0x0B, TAG_LE = 0x0C, TAG_GE = 0x0D,
    TAG_AND = 0x0E, TAG_OR = 0x0F, TAG_NOT = 0x10,
    TAG_LOAD_VAR = 0x11, TAG_STORE_VAR = 0x12,
    TAG_JUMP = 0x13, TAG_JUMP_IF_FALSE = 0x14, TAG_JUMP_IF_TRUE = 0x15,
    TAG_RETURN = 0x16, TAG_HALT = 0x17,
    TAG_GET_ITER = 0x18, TAG_ITER_NEXT = 0x19, TAG_ITER_HAS_NEXT = 0x1A, TAG_GET_INDEX = 0x1B,
    TAG_BUILD_ARRAY = 0x1C, TAG_BUILD_OBJECT = 0x1D, TAG_GET_FIELD = 0x1E,
    TAG_CALL = 0x1F,
    TAG_HTTP_RETURN = 0x20,
    TAG_WS_SEND = 0x21, TAG_WS_BROADCAST = 0x22, TAG_WS_BROADCAST_ROOM = 0x23,
    TAG_WS_JOIN_ROOM = 0x24, TAG_WS_LEAVE_ROOM = 0x25, TAG_WS_CLOSE = 0x26,
    TAG_WS_GET_ROOMS = 0x27, TAG_WS_GET_CLIENTS = 0x28, TAG_WS_GET_CONN_COUNT = 0x29,
    TAG_WS_GET_UPTIME = 0x2A,
    TAG_ASYNC = 0x2B, TAG_AWAIT = 0x2C,
}

impl Opcode {
    /// The single-byte tag this opcode encodes to.
    pub fn tag(&self) -> u8 {
        match self {
            Opcode::Push(_) => TAG_PUSH,
            Opcode::Pop => TAG_POP,
            Opcode::Add => TAG_ADD,
            Opcode::Sub => TAG_SUB,
            Opcode::Mul => TAG_MUL,
            Opcode::Div => TAG_DIV,
            Opcode::Mod => TAG_MOD,
            Opcode::Neg => TAG_NEG,
            Opcode::Eq => TAG_EQ,
            Opcode::Ne => TAG_NE,
            Opcode::Lt => TAG_LT,
            Opcode::Gt => TAG_GT,
            Opcode::Le => TAG_LE,
            Opcode::Ge => TAG_GE,
            Opcode::And => TAG_AND,
            Opcode::Or => TAG_OR,
            Opcode::Not => TAG_NOT,
            Opcode::LoadVar(_) => TAG_LOAD_VAR,
            Opcode::StoreVar(_) => TAG_STORE_VAR,
            Opcode::Jump(_) => TAG_JUMP,
            Opcode::JumpIfFalse(_) => TAG_JUMP_IF_FALSE,
            Opcode::JumpIfTrue(_) => TAG_JUMP_IF_TRUE,
            Opcode::Return => TAG_RETURN,
            Opcode::Halt => TAG_HALT,
            Opcode::GetIter => TAG_GET_ITER,
            Opcode::IterNext(_) => TAG_ITER_NEXT,
            Opcode::IterHasNext => TAG_ITER_HAS_NEXT,
            Opcode::GetIndex => TAG_GET_INDEX,
            Opcode::BuildArray(_) => TAG_BUILD_ARRAY,
            Opcode::BuildObject(_) => TAG_BUILD_OBJECT,
            Opcode::GetField => TAG_GET_FIELD,
            Opcode::Call(_) => TAG_CALL,
            Opcode::HttpReturn => TAG_HTTP_RETURN,
            Opcode::WsSend => TAG_WS_SEND,
            Opcode::WsBroadcast => TAG_WS_BROADCAST,
            Opcode::WsBroadcastRoom => TAG_WS_BROADCAST_ROOM,
            Opcode::WsJoinRoom => TAG_WS_JOIN_ROOM,
            Opcode::WsLeaveRoom => TAG_WS_LEAVE_ROOM,
            Opcode::WsClose => TAG_WS_CLOSE,
            Opcode::WsGetRooms => TAG_WS_GET_ROOMS,
            Opcode::WsGetClients => TAG_WS_GET_CLIENTS,
            Opcode::WsGetConnCount => TAG_WS_GET_CONN_COUNT,
            Opcode::WsGetUptime => TAG_WS_GET_UPTIME,
            Opcode::Async(_) => TAG_ASYNC,
            Opcode::Await => TAG_AWAIT,
        }
    }

    /// Whether this opcode's encoding carries a 4-byte operand.
    pub fn has_operand(tag: u8) -> bool {
        matches!(
            tag,
            TAG_PUSH
                | TAG_LOAD_VAR
                | TAG_STORE_VAR
                | TAG_JUMP
                | TAG_JUMP_IF_FALSE
                | TAG_JUMP_IF_TRUE
                | TAG_ITER_NEXT
                | TAG_BUILD_ARRAY
                | TAG_BUILD_OBJECT
                | TAG_CALL
                | TAG_ASYNC
        )
    }

    /// Decodes the opcode at `tag` with the given raw operand (already read
    /// as 4 little-endian bytes, if [`Opcode::has_operand`] said it had one).
    pub fn from_tag(tag: u8, operand: u32) -> Option<Opcode> {
        Some(match tag {
            TAG_PUSH => Opcode::Push(operand),
            TAG_POP => Opcode::Pop,
            TAG_ADD => Opcode::Add,
            TAG_SUB => Opcode::Sub,
            TAG_MUL => Opcode::Mul,
            TAG_DIV => Opcode::Div,
            TAG_MOD => Opcode::Mod,
            TAG_NEG => Opcode::Neg,
            TAG_EQ => Opcode::Eq,
            TAG_NE => Opcode::Ne,
            TAG_LT => Opcode::Lt,
            TAG_GT => Opcode::Gt,
            TAG_LE => Opcode::Le,
            TAG_GE => Opcode::Ge,
            TAG_AND => Opcode::And,
            TAG_OR => Opcode::Or,
            TAG_NOT => Opcode::Not,
            TAG_LOAD_VAR => Opcode::LoadVar(operand),
            TAG_STORE_VAR => Opcode::StoreVar(operand),
            TAG_JUMP => Opcode::Jump(operand),
            TAG_JUMP_IF_FALSE => Opcode::JumpIfFalse(operand),
            TAG_JUMP_IF_TRUE => Opcode::JumpIfTrue(operand),
            TAG_RETURN => Opcode::Return,
            TAG_HALT => Opcode::Halt,
            TAG_GET_ITER => Opcode::GetIter,
            TAG_ITER_NEXT => Opcode::IterNext(operand),
            TAG_ITER_HAS_NEXT => Opcode::IterHasNext,
            TAG_GET_INDEX => Opcode::GetIndex,
            TAG_BUILD_ARRAY => Opcode::BuildArray(operand),
            TAG_BUILD_OBJECT => Opcode::BuildObject(operand),
            TAG_GET_FIELD => Opcode::GetField,
            TAG_CALL => Opcode::Call(operand),
            TAG_HTTP_RETURN => Opcode::HttpReturn,
            TAG_WS_SEND => Opcode::WsSend,
            TAG_WS_BROADCAST => Opcode::WsBroadcast,
            TAG_WS_BROADCAST_ROOM => Opcode::WsBroadcastRoom,
            TAG_WS_JOIN_ROOM => Opcode::WsJoinRoom,
            TAG_WS_LEAVE_ROOM => Opcode::WsLeaveRoom,
            TAG_WS_CLOSE => Opcode::WsClose,
            TAG_WS_GET_ROOMS => Opcode::WsGetRooms,
            TAG_WS_GET_CLIENTS => Opcode::WsGetClients,
            TAG_WS_GET_CONN_COUNT => Opcode::WsGetConnCount,
            TAG_WS_GET_UPTIME => Opcode::WsGetUptime,
            TAG_ASYNC => Opcode::Async(operand),
            TAG_AWAIT => Opcode::Await,
            _ => return None,
        })
    }

    /// The mnemonic used by the disassembler, matching the spec's opcode
    /// names (kebab-case).
    pub fn mnemonic(tag: u8) -> &'static str {
        match tag {
            TAG_PUSH => "push",
            TAG_POP => "pop",
            TAG_ADD => "add",
            TAG_SUB => "sub",
            TAG_MUL => "mul",
            TAG_DIV => "div",
            TAG_MOD => "mod",
            TAG_NEG => "neg",
            TAG_EQ => "eq",
            TAG_NE => "ne",
            TAG_LT => "lt",
            TAG_GT => "gt",
            TAG_LE => "le",
            TAG_GE => "ge",
            TAG_AND => "and",
            TAG_OR => "or",
            TAG_NOT => "not",
            TAG_LOAD_VAR => "load-var",
            TAG_STORE_VAR => "store-var",
            TAG_JUMP => "jump",
            TAG_JUMP_IF_FALSE => "jump-if-false",
            TAG_JUMP_IF_TRUE => "jump-if-true",
            TAG_RETURN => "return",
            TAG_HALT => "halt",
            TAG_GET_ITER => "get-iter",
            TAG_ITER_NEXT => "iter-next",
            TAG_ITER_HAS_NEXT => "iter-has-next",
            TAG_GET_INDEX => "get-index",
            TAG_BUILD_ARRAY => "build-array",
            TAG_BUILD_OBJECT => "build-object",
            TAG_GET_FIELD => "get-field",
            TAG_CALL => "call",
            TAG_HTTP_RETURN => "http-return",
            TAG_WS_SEND => "ws-send",
            TAG_WS_BROADCAST => "ws-broadcast",
            TAG_WS_BROADCAST_ROOM => "ws-broadcast-room",
            TAG_WS_JOIN_ROOM => "ws-join-room",
            TAG_WS_LEAVE_ROOM => "ws-leave-room",
            TAG_WS_CLOSE => "ws-close",
            TAG_WS_GET_ROOMS => "ws-get-rooms",
            TAG_WS_GET_CLIENTS => "ws-get-clients",
            TAG_WS_GET_CONN_COUNT => "ws-get-conn-count",
            TAG_WS_GET_UPTIME => "ws-get-uptime",
            TAG_ASYNC => "async",
            TAG_AWAIT => "await",
            _ => "UNKNOWN",
        }
    }

    /// Appends this opcode's wire encoding (tag, then operand if any) to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.tag());
        if let Some(operand) = self.operand() {
            out.extend_from_slice(&operand.to_le_bytes());
        }
    }

    /// The raw operand this opcode carries, if any.
    pub fn operand(&self) -> Option<u32> {
        match self {
            Opcode::Push(n)
            | Opcode::LoadVar(n)
            | Opcode::StoreVar(n)
            | Opcode::Jump(n)
            | Opcode::JumpIfFalse(n)
            | Opcode::JumpIfTrue(n)
            | Opcode::IterNext(n)
            | Opcode::BuildArray(n)
            | Opcode::BuildObject(n)
            | Opcode::Call(n)
            | Opcode::Async(n) => Some(*n),
            _ => None,
        }
    }
}

/// Decodes one instruction from `code` starting at `pc`.
///
/// Returns the opcode and the pc of the following instruction. `Async`'s
/// body bytes are skipped over (not decoded) so the returned `next_pc`
/// lands past the embedded child program.
pub fn decode_at(code: &[u8], pc: u32) -> Result<(Opcode, u32), LoadError> {
    let idx = pc as usize;
    let tag = *code
        .get(idx)
        .ok_or(LoadError::TruncatedOperand(pc))?;
    let mut cursor = idx + 1;
    let operand = if Opcode::has_operand(tag) {
        let bytes = code
            .get(cursor..cursor + 4)
            .ok_or(LoadError::TruncatedOperand(pc))?;
        cursor += 4;
        u32::from_le_bytes(bytes.try_into().unwrap())
    } else {
        0
    };
    let opcode = Opcode::from_tag(tag, operand).ok_or(LoadError::TruncatedOperand(pc))?;
    if let Opcode::Async(body_len) = opcode {
        cursor = cursor
            .checked_add(body_len as usize)
            .ok_or(LoadError::TruncatedOperand(pc))?;
        if cursor > code.len() {
            return Err(LoadError::TruncatedOperand(pc));
        }
    }
    Ok((opcode, cursor as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_opcode_without_operand() {
        for tag in [TAG_POP, TAG_ADD, TAG_RETURN, TAG_HALT, TAG_GET_ITER, TAG_AWAIT] {
            let op = Opcode::from_tag(tag, 0).unwrap();
            assert_eq!(op.tag(), tag);
        }
    }

    #[test]
    fn encodes_push_with_operand() {
        let mut out = Vec::new();
        Opcode::Push(7).encode(&mut out);
        assert_eq!(out, vec![TAG_PUSH, 7, 0, 0, 0]);
    }

    #[test]
    fn decode_at_skips_async_body() {
        let mut code = Vec::new();
        Opcode::Async(5).encode(&mut code);
        code.extend_from_slice(&[0xAA; 5]);
        Opcode::Halt.encode(&mut code);
        let (op, next_pc) = decode_at(&code, 0).unwrap();
        assert_eq!(op, Opcode::Async(5));
        assert_eq!(next_pc as usize, code.len() - 1);
    }

    #[test]
    fn unknown_mnemonic_renders_unknown() {
        assert_eq!(Opcode::mnemonic(0xFF), "UNKNOWN");
    }
}
