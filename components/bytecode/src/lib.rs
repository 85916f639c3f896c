//! The `GLYP` bytecode format: opcodes, the binary chunk layout, and a
//! disassembler shared between the VM and the debugger.

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod chunk;
mod disassemble;
mod opcode;

pub use chunk::{Chunk, ChunkBuilder};
pub use disassemble::disassemble_one;
pub use opcode::{decode_at, Opcode};
