//! A small label-resolving assembler for building test bytecode.

use selscope_core::Opcode;
use selscope_core::decoder::Instruction;
use selscope_core::encoder::encode;
use selscope_utils::errors::EncodeError;
use std::collections::HashMap;
use thiserror::Error;

/// Failures while assembling test bytecode.
#[derive(Debug, Error)]
pub enum AsmError {
    /// A push refers to a label that is never placed.
    #[error("unknown label '{0}'")]
    UnknownLabel(String),
    /// The same label is placed twice.
    #[error("label '{0}' defined twice")]
    DuplicateLabel(String),
    /// The encoder rejected an instruction.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

#[derive(Debug, Clone)]
enum Item {
    Op(Opcode),
    Push(Vec<u8>),
    PushLabel(String),
    Label(String),
}

impl Item {
    fn size(&self) -> usize {
        match self {
            Self::Op(_) | Self::Label(_) => 1,
            Self::Push(bytes) => 1 + bytes.len(),
            Self::PushLabel(_) => 3,
        }
    }
}

/// Builds an instruction list; labels become `JUMPDEST`s and label pushes become `PUSH2`s.
#[derive(Debug, Default, Clone)]
pub struct Assembler {
    items: Vec<Item>,
}

impl Assembler {
    /// An empty program.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `opcode` with no immediate.
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.items.push(Item::Op(opcode));
        self
    }

    /// Appends each opcode in order.
    pub fn ops(&mut self, opcodes: &[Opcode]) -> &mut Self {
        for opcode in opcodes {
            self.op(*opcode);
        }
        self
    }

    /// Pushes `value` with the narrowest `PUSHn` that holds it (`PUSH1 0` for zero).
    pub fn push(&mut self, value: u64) -> &mut Self {
        let bytes = value.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(7);
        self.push_bytes(&bytes[first..])
    }

    /// Pushes `bytes` verbatim with `PUSH{bytes.len()}`.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.items.push(Item::Push(bytes.to_vec()));
        self
    }

    /// Pushes the offset of `label` as a `PUSH2`.
    pub fn push_label(&mut self, label: &str) -> &mut Self {
        self.items.push(Item::PushLabel(label.to_string()));
        self
    }

    /// Places a `JUMPDEST` named `label`.
    pub fn label(&mut self, label: &str) -> &mut Self {
        self.items.push(Item::Label(label.to_string()));
        self
    }

    /// Resolves labels and encodes the program.
    pub fn assemble(&self) -> Result<Vec<u8>, AsmError> {
        let mut labels = HashMap::new();
        let mut pc = 0;
        for item in &self.items {
            if let Item::Label(name) = item {
                if labels.insert(name.clone(), pc).is_some() {
                    return Err(AsmError::DuplicateLabel(name.clone()));
                }
            }
            pc += item.size();
        }

        let mut instructions = Vec::with_capacity(self.items.len());
        let mut pc = 0;
        for item in &self.items {
            let instruction = match item {
                Item::Op(opcode) => Instruction::new(pc, *opcode),
                Item::Label(_) => Instruction::new(pc, Opcode::JUMPDEST),
                Item::Push(bytes) => Instruction {
                    pc,
                    opcode: Opcode::PUSH(bytes.len() as u8),
                    imm: Some(bytes.clone()),
                },
                Item::PushLabel(name) => {
                    let dest = labels
                        .get(name)
                        .ok_or_else(|| AsmError::UnknownLabel(name.clone()))?;
                    Instruction {
                        pc,
                        opcode: Opcode::PUSH(2),
                        imm: Some((*dest as u16).to_be_bytes().to_vec()),
                    }
                }
            };
            pc += item.size();
            instructions.push(instruction);
        }
        Ok(encode(&instructions)?)
    }
}

/// A dispatcher laid out the way solc emits it: free-memory pointer setup, a short-calldata
/// guard, `SHR 224` selector extraction and one `DUP1 PUSH4 EQ PUSH2 JUMPI` test per function.
pub fn solc_dispatcher(selectors: &[[u8; 4]]) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new();
    asm.push(0x80).push(0x40).op(Opcode::MSTORE);
    asm.push(4)
        .op(Opcode::CALLDATASIZE)
        .op(Opcode::LT)
        .push_label("fallback")
        .op(Opcode::JUMPI);
    asm.push(0)
        .op(Opcode::CALLDATALOAD)
        .push(0xe0)
        .op(Opcode::SHR);
    for (i, selector) in selectors.iter().enumerate() {
        asm.op(Opcode::DUP(1))
            .push_bytes(selector)
            .op(Opcode::EQ)
            .push_label(&format!("fn{i}"))
            .op(Opcode::JUMPI);
    }
    asm.label("fallback")
        .push(0)
        .op(Opcode::DUP(1))
        .op(Opcode::REVERT);
    for i in 0..selectors.len() {
        // non-payable check, then return
        asm.label(&format!("fn{i}"))
            .op(Opcode::CALLVALUE)
            .op(Opcode::DUP(1))
            .op(Opcode::ISZERO)
            .push_label(&format!("body{i}"))
            .op(Opcode::JUMPI)
            .push(0)
            .op(Opcode::DUP(1))
            .op(Opcode::REVERT)
            .label(&format!("body{i}"))
            .op(Opcode::POP)
            .push(0x20)
            .push(0x80)
            .op(Opcode::RETURN);
    }
    asm.assemble()
}
