//! Single-instruction disassembly, shared by the debugger's `disassemble`
//! command.

use crate::opcode::Opcode;

/// Renders the instruction at `pc` in `code` as `mnemonic operand`, or
/// `UNKNOWN (0xXX)` for an unrecognized tag.
///
/// Returns the rendered line and the pc of the following instruction.
pub fn disassemble_one(code: &[u8], pc: u32) -> Option<(String, u32)> {
    let idx = pc as usize;
    let tag = *code.get(idx)?;
    if Opcode::from_tag(tag, 0).is_none() {
        return Some((format!("UNKNOWN (0x{:02X})", tag), pc + 1));
    }
    let (opcode, next_pc) = crate::opcode::decode_at(code, pc).ok()?;
    let mnemonic = Opcode::mnemonic(tag);
    let line = match opcode.operand() {
        Some(operand) => format!("{} {}", mnemonic, operand),
        None => mnemonic.to_string(),
    };
    Some((line, next_pc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkBuilder;

    #[test]
    fn disassembles_push_with_operand() {
        let mut builder = ChunkBuilder::new();
        builder.emit(Opcode::Push(3));
        let chunk = builder.build();
        let (line, _) = disassemble_one(&chunk.code, 0).unwrap();
        assert_eq!(line, "push 3");
    }

    #[test]
    fn unknown_tag_renders_hex() {
        let code = vec![0xFF];
        let (line, next) = disassemble_one(&code, 0).unwrap();
        assert_eq!(line, "UNKNOWN (0xFF)");
        assert_eq!(next, 1);
    }
}
