use crate::decoder::Instruction;
use crate::opcode::Opcode;
use selscope_utils::errors::EncodeError;

/// Assembles instructions back into bytecode.
///
/// Push immediates shorter than the push width are left-padded with zeros, so a `PUSH2` with a
/// one-byte immediate still encodes the same value. Immediates on non-push opcodes are rejected.
pub fn encode(instructions: &[Instruction]) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::with_capacity(instructions.len() * 3);
    for ins in instructions {
        bytes.push(ins.opcode.to_byte());

        match (ins.opcode, &ins.imm) {
            (Opcode::PUSH(n), imm) => {
                let imm = imm.as_deref().unwrap_or(&[]);
                let width = n as usize;
                if imm.len() > width {
                    return Err(EncodeError::InvalidImmediate {
                        pc: ins.pc,
                        width: n,
                        len: imm.len(),
                    });
                }
                bytes.extend(std::iter::repeat_n(0u8, width - imm.len()));
                bytes.extend_from_slice(imm);
            }
            (_, Some(_)) => {
                return Err(EncodeError::UnexpectedImmediate {
                    pc: ins.pc,
                    opcode: ins.opcode.to_string(),
                });
            }
            (_, None) => {}
        }
    }
    Ok(bytes)
}
