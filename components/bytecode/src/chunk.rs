//! The `GLYP` binary bytecode format: header, constant pool and raw
//! instruction stream.

use crate::opcode::Opcode;
use core_types::{LoadError, Value};

const MAGIC: [u8; 4] = *b"GLYP";
const VERSION: u32 = 1;

const TAG_NULL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_FLOAT: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_STRING: u8 = 4;

/// A loaded compilation unit: its constant pool and raw instruction bytes.
///
/// Constants are decoded once at load time and are immutable for the life
/// of the chunk. The instruction stream is kept as raw bytes rather than a
/// pre-decoded instruction list, because `pc` values in jumps and in the
/// debugger are byte offsets into this exact stream.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// The decoded constant pool.
    pub constants: Vec<Value>,
    /// The raw instruction stream (little-endian opcodes and operands).
    pub code: Vec<u8>,
}

impl Chunk {
    /// Parses a `GLYP`-formatted byte slice into a [`Chunk`].
    pub fn load(bytes: &[u8]) -> Result<Chunk, LoadError> {
        let mut cursor = 0usize;

        let magic = read_bytes(bytes, &mut cursor, 4).ok_or(LoadError::BadMagic)?;
        if magic != MAGIC {
            return Err(LoadError::BadMagic);
        }

        let version = read_u32(bytes, &mut cursor).ok_or(LoadError::UnsupportedVersion)?;
        if version != VERSION {
            return Err(LoadError::UnsupportedVersion);
        }

        let const_count = read_u32(bytes, &mut cursor).ok_or(LoadError::TruncatedConstantPool)?;
        let mut constants = Vec::with_capacity(const_count as usize);
        for _ in 0..const_count {
            constants.push(read_constant(bytes, &mut cursor)?);
        }

        // instr-count is informational only; execution is bounded by
        // end-of-buffer, halt, return or http-return.
        let _instr_count = read_u32(bytes, &mut cursor).ok_or(LoadError::TruncatedConstantPool)?;

        let code = bytes[cursor..].to_vec();
        Ok(Chunk { constants, code })
    }

    /// Encodes this chunk back to the `GLYP` wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(self.constants.len() as u32).to_le_bytes());
        for constant in &self.constants {
            write_constant(&mut out, constant);
        }
        // instr-count is informational; callers that build chunks by hand
        // via `ChunkBuilder` track it themselves, this path just reports 0.
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&self.code);
        out
    }
}

fn read_bytes<'a>(bytes: &'a [u8], cursor: &mut usize, len: usize) -> Option<&'a [u8]> {
    let slice = bytes.get(*cursor..*cursor + len)?;
    *cursor += len;
    Some(slice)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Option<u32> {
    let slice = read_bytes(bytes, cursor, 4)?;
    Some(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_constant(bytes: &[u8], cursor: &mut usize) -> Result<Value, LoadError> {
    let tag = *bytes.get(*cursor).ok_or(LoadError::TruncatedConstantPool)?;
    *cursor += 1;
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_INT => {
            let slice = read_bytes(bytes, cursor, 8).ok_or(LoadError::TruncatedInt)?;
            Ok(Value::Int(i64::from_le_bytes(slice.try_into().unwrap())))
        }
        TAG_FLOAT => {
            let slice = read_bytes(bytes, cursor, 8).ok_or(LoadError::TruncatedFloat)?;
            Ok(Value::Float(f64::from_bits(u64::from_le_bytes(
                slice.try_into().unwrap(),
            ))))
        }
        TAG_BOOL => {
            let slice = read_bytes(bytes, cursor, 1).ok_or(LoadError::TruncatedBool)?;
            Ok(Value::Bool(slice[0] != 0))
        }
        TAG_STRING => {
            let len = read_u32(bytes, cursor).ok_or(LoadError::TruncatedString)? as usize;
            let slice = read_bytes(bytes, cursor, len).ok_or(LoadError::TruncatedString)?;
            let s = std::str::from_utf8(slice)
                .map_err(|_| LoadError::TruncatedString)?
                .to_string();
            Ok(Value::Str(s))
        }
        other => Err(LoadError::UnknownConstantTag(other)),
    }
}

fn write_constant(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Int(i) => {
            out.push(TAG_INT);
            out.extend_from_slice(&i.to_le_bytes());
        }
        Value::Float(f) => {
            out.push(TAG_FLOAT);
            out.extend_from_slice(&f.to_bits().to_le_bytes());
        }
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(*b as u8);
        }
        Value::Str(s) => {
            out.push(TAG_STRING);
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(_) | Value::Object(_) | Value::Future(_) => {
            // Not representable in the constant pool; callers should never
            // construct a chunk with these as constants.
            out.push(TAG_NULL);
        }
    }
}

/// A convenience builder for assembling bytecode in tests and tooling,
/// without hand-encoding the `GLYP` wire format.
#[derive(Debug, Default, Clone)]
pub struct ChunkBuilder {
    constants: Vec<Value>,
    code: Vec<u8>,
}

impl ChunkBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a constant, returning its index in the pool.
    pub fn add_constant(&mut self, value: Value) -> u32 {
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    /// The current end-of-stream offset; useful for computing jump targets.
    pub fn offset(&self) -> u32 {
        self.code.len() as u32
    }

    /// Appends an instruction.
    pub fn emit(&mut self, op: Opcode) -> &mut Self {
        op.encode(&mut self.code);
        self
    }

    /// Appends an `async` opcode followed by the raw bytes of `body`.
    pub fn emit_async(&mut self, body: &ChunkBuilder) -> &mut Self {
        Opcode::Async(body.code.len() as u32).encode(&mut self.code);
        self.code.extend_from_slice(&body.code);
        self
    }

    /// Builds the in-memory [`Chunk`].
    pub fn build(self) -> Chunk {
        Chunk {
            constants: self.constants,
            code: self.code,
        }
    }

    /// Encodes directly to the `GLYP` wire format.
    pub fn build_bytes(self) -> Vec<u8> {
        self.build().to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let bytes = b"NOPE".to_vec();
        assert_eq!(Chunk::load(&bytes).unwrap_err(), LoadError::BadMagic);
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        assert_eq!(
            Chunk::load(&bytes).unwrap_err(),
            LoadError::UnsupportedVersion
        );
    }

    #[test]
    fn round_trips_every_constant_type() {
        let mut builder = ChunkBuilder::new();
        builder.add_constant(Value::Null);
        builder.add_constant(Value::Int(-42));
        builder.add_constant(Value::Float(1.5));
        builder.add_constant(Value::Bool(true));
        builder.add_constant(Value::Str("héllo".to_string()));
        builder.emit(Opcode::Halt);

        let bytes = builder.build_bytes();
        let chunk = Chunk::load(&bytes).unwrap();
        assert_eq!(chunk.constants.len(), 5);
        assert_eq!(chunk.constants[1], Value::Int(-42));
        assert_eq!(chunk.constants[4], Value::Str("héllo".to_string()));
    }

    #[test]
    fn truncated_string_constant_is_rejected() {
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(TAG_STRING);
        bytes.extend_from_slice(&10u32.to_le_bytes());
        bytes.extend_from_slice(b"short");
        assert_eq!(Chunk::load(&bytes).unwrap_err(), LoadError::TruncatedString);
    }
}
