/// Module for recovering the Control Flow Graph (CFG) of EVM bytecode.
///
/// This module partitions a decoded instruction stream into basic blocks and connects them with
/// the edges that can be read off the bytecode alone. Blocks are split before every `JUMPDEST`
/// and after every jump or halting instruction. A jump whose target is pushed immediately before
/// it gets a static edge; any other jump target is a runtime stack value and is left for the
/// abstract interpreter to resolve, so the block is marked indirect here.
use crate::{Opcode, OpcodeExt};
use crate::decoder::{Instruction, decode};
use petgraph::graph::{DiGraph, NodeIndex};
use selscope_utils::errors::CfgIrError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Represents a node in the Control Flow Graph (CFG).
///
/// `Entry` and `Exit` are synthetic start and end nodes; every halting block and the end of the
/// code link to `Exit`.
#[derive(Default, Debug, Clone)]
pub enum Block {
    /// The entry point of the CFG, representing the start of execution.
    #[default]
    Entry,
    /// The exit point of the CFG, representing the end of execution (e.g., STOP, RETURN).
    Exit,
    /// A body block containing a sequence of instructions.
    Body(BasicBlock),
}

/// A maximal straight-line run of instructions.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    /// The program counter (PC) at which the block starts.
    pub start_pc: usize,
    /// The program counter just past the last instruction.
    pub end_pc: usize,
    /// The decoded instructions in the block, never empty.
    pub instructions: Vec<Instruction>,
    /// Peak stack growth reached while executing the block, relative to its entry height.
    pub max_stack: usize,
    /// How control leaves the block.
    pub exit: BlockExit,
}

/// How control leaves a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockExit {
    /// Execution continues at the next block.
    Fallthrough(usize),
    /// Unconditional `JUMP`.
    Jump(JumpTarget),
    /// Conditional `JUMPI`; `fallthrough` is `None` when the jump is the last instruction.
    Branch {
        /// Where the jump goes when taken.
        target: JumpTarget,
        /// Offset after the `JUMPI`, if any code follows.
        fallthrough: Option<usize>,
    },
    /// The last instruction halts (STOP, RETURN, REVERT, INVALID or SELFDESTRUCT).
    Halt,
    /// The block runs off the end of the code, which the EVM treats as STOP.
    EndOfCode,
}

/// What is statically known about a jump's destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpTarget {
    /// Pushed right before the jump and lands on a `JUMPDEST`.
    Static(usize),
    /// Pushed right before the jump but not a valid destination; the edge is dead.
    Invalid(usize),
    /// Taken from the stack at runtime.
    Indirect,
}

/// Represents the type of edge connecting blocks in the CFG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EdgeType {
    /// Sequential execution to the next block (e.g., after non-terminal instructions).
    Fallthrough,
    /// Unconditional jump to a target block (e.g., JUMP instruction).
    Jump,
    /// Conditional branch taken when the condition is true (e.g., JUMPI true branch).
    BranchTrue,
    /// Conditional branch taken when the condition is false (e.g., JUMPI false branch).
    BranchFalse,
}

/// Bundle of CFG and associated metadata for analysis.
#[derive(Debug, Clone)]
pub struct CfgIrBundle {
    /// Graph representing the CFG with blocks as nodes and edges as control flow.
    pub cfg: DiGraph<Block, EdgeType>,
    /// Mapping of block start program counters to block indices.
    pub pc_to_block: HashMap<usize, NodeIndex>,
    /// Offsets of every `JUMPDEST` that sits on an instruction boundary.
    pub jumpdests: BTreeSet<usize>,
    /// Length of the analysed bytecode in bytes.
    pub code_len: usize,
}

/// Decodes `bytecode` and builds its CFG in one step.
pub fn build_cfg_from_bytes(bytecode: &[u8]) -> Result<CfgIrBundle, CfgIrError> {
    build_cfg_ir(&decode(bytecode), bytecode)
}

/// Builds a CFG from decoded instructions.
///
/// # Arguments
/// * `instructions` - Decoded EVM instructions from `decoder.rs`.
/// * `bytecode` - Raw bytecode bytes the instructions came from.
///
/// # Returns
/// The `CfgIrBundle`, or `CfgIrError::NoEntryBlock` for an empty instruction stream.
///
/// # Examples
/// ```rust,ignore
/// let bytecode = hex::decode("6001600155").unwrap();
/// let cfg_ir = build_cfg_from_bytes(&bytecode).unwrap();
/// assert!(cfg_ir.cfg.node_count() >= 3);
/// ```
pub fn build_cfg_ir(
    instructions: &[Instruction],
    bytecode: &[u8],
) -> Result<CfgIrBundle, CfgIrError> {
    tracing::debug!(
        "Starting CFG construction with {} instructions",
        instructions.len()
    );

    let jumpdests: BTreeSet<usize> = instructions
        .iter()
        .filter(|i| i.opcode == Opcode::JUMPDEST)
        .map(|i| i.pc)
        .collect();

    // Step 1: Block splitter
    let blocks = split_blocks(instructions, &jumpdests, bytecode.len())?;
    tracing::debug!("Split into {} blocks", blocks.len());

    // Step 2: Edge builder
    let mut cfg = DiGraph::new();
    let entry = cfg.add_node(Block::Entry);
    let exit = cfg.add_node(Block::Exit);
    let mut pc_to_block = HashMap::with_capacity(blocks.len());
    for block in blocks {
        let start_pc = block.start_pc;
        let idx = cfg.add_node(Block::Body(block));
        pc_to_block.insert(start_pc, idx);
    }

    let edges = build_edges(&cfg, &pc_to_block, entry, exit);
    cfg.extend_with_edges(edges);
    tracing::debug!(
        "Built CFG with {} nodes and {} edges",
        cfg.node_count(),
        cfg.edge_count()
    );

    Ok(CfgIrBundle {
        cfg,
        pc_to_block,
        jumpdests,
        code_len: bytecode.len(),
    })
}

/// Splits instructions into blocks before every JUMPDEST and after every block-ending opcode.
fn split_blocks(
    instructions: &[Instruction],
    jumpdests: &BTreeSet<usize>,
    code_len: usize,
) -> Result<Vec<BasicBlock>, CfgIrError> {
    let mut blocks = Vec::new();
    let mut current: Vec<Instruction> = Vec::new();

    for instr in instructions {
        // 1. Split before a JUMPDEST only if current block is non-empty
        if instr.opcode == Opcode::JUMPDEST && !current.is_empty() {
            blocks.push(seal_block(std::mem::take(&mut current), jumpdests, code_len)?);
        }

        // 2. Record the instruction
        current.push(instr.clone());

        // 3. Seal after every block-ending instruction
        if instr.opcode.ends_block() {
            blocks.push(seal_block(std::mem::take(&mut current), jumpdests, code_len)?);
        }
    }

    // 4. Push trailing non-empty block
    if !current.is_empty() {
        blocks.push(seal_block(current, jumpdests, code_len)?);
    }

    if blocks.is_empty() {
        tracing::debug!("No blocks created, returning NoEntryBlock");
        return Err(CfgIrError::NoEntryBlock);
    }
    Ok(blocks)
}

/// Turns a run of instructions into a `BasicBlock`, classifying its terminator.
fn seal_block(
    instructions: Vec<Instruction>,
    jumpdests: &BTreeSet<usize>,
    code_len: usize,
) -> Result<BasicBlock, CfgIrError> {
    let (first, last) = match (instructions.first(), instructions.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(CfgIrError::NoEntryBlock),
    };
    let start_pc = first.pc;
    let end_pc = last.next_pc();

    let static_target = || {
        let pushed = instructions
            .len()
            .checked_sub(2)
            .and_then(|i| instructions.get(i))
            .filter(|prev| prev.opcode.pushes_constant())
            .and_then(Instruction::imm_word);
        match pushed.and_then(|word| word_to_pc(&word)) {
            Some(pc) if jumpdests.contains(&pc) => JumpTarget::Static(pc),
            Some(pc) => JumpTarget::Invalid(pc),
            // A pushed constant too large for an offset can never be a destination.
            None if pushed.is_some() => JumpTarget::Invalid(usize::MAX),
            None => JumpTarget::Indirect,
        }
    };

    let exit = match last.opcode {
        Opcode::JUMP => BlockExit::Jump(static_target()),
        Opcode::JUMPI => BlockExit::Branch {
            target: static_target(),
            fallthrough: (end_pc < code_len).then_some(end_pc),
        },
        op if op.halts() => BlockExit::Halt,
        _ if end_pc < code_len => BlockExit::Fallthrough(end_pc),
        _ => BlockExit::EndOfCode,
    };

    let max_stack = peak_stack_growth(&instructions);
    Ok(BasicBlock {
        start_pc,
        end_pc,
        instructions,
        max_stack,
        exit,
    })
}

/// Computes how far above its entry height a block pushes the stack.
fn peak_stack_growth(instructions: &[Instruction]) -> usize {
    let mut depth: isize = 0;
    let mut peak: isize = 0;
    for instr in instructions {
        let (pops, pushes) = instr.opcode.stack_effect();
        depth += pushes as isize - pops as isize;
        peak = peak.max(depth);
    }
    peak as usize
}

/// Converts a big-endian 32-byte word into an offset if it fits.
fn word_to_pc(word: &[u8; 32]) -> Option<usize> {
    let (high, low) = word.split_at(24);
    if high.iter().any(|b| *b != 0) {
        return None;
    }
    usize::try_from(u64::from_be_bytes(low.try_into().ok()?)).ok()
}

/// Builds edges between blocks from each block's terminator.
fn build_edges(
    cfg: &DiGraph<Block, EdgeType>,
    pc_to_block: &HashMap<usize, NodeIndex>,
    entry: NodeIndex,
    exit: NodeIndex,
) -> Vec<(NodeIndex, NodeIndex, EdgeType)> {
    let mut edges = Vec::new();

    // Add edge from Entry to the block at pc 0
    if let Some(&first) = pc_to_block.get(&0) {
        edges.push((entry, first, EdgeType::Fallthrough));
    }

    let target_node = |target: &JumpTarget| match target {
        JumpTarget::Static(pc) => pc_to_block.get(pc).copied(),
        JumpTarget::Invalid(_) | JumpTarget::Indirect => None,
    };

    for idx in cfg.node_indices() {
        let Block::Body(block) = &cfg[idx] else {
            continue;
        };
        match &block.exit {
            BlockExit::Fallthrough(next) => {
                if let Some(&next_idx) = pc_to_block.get(next) {
                    edges.push((idx, next_idx, EdgeType::Fallthrough));
                }
            }
            BlockExit::Jump(target) => {
                if let Some(t) = target_node(target) {
                    edges.push((idx, t, EdgeType::Jump));
                }
            }
            BlockExit::Branch {
                target,
                fallthrough,
            } => {
                if let Some(t) = target_node(target) {
                    edges.push((idx, t, EdgeType::BranchTrue));
                }
                let false_idx = fallthrough
                    .and_then(|pc| pc_to_block.get(&pc).copied())
                    .unwrap_or(exit);
                edges.push((idx, false_idx, EdgeType::BranchFalse));
            }
            BlockExit::Halt | BlockExit::EndOfCode => {
                edges.push((idx, exit, EdgeType::Fallthrough));
            }
        }
    }

    edges
}

impl Block {
    /// Returns the body of the block, if it is not `Entry` or `Exit`.
    pub const fn body(&self) -> Option<&BasicBlock> {
        match self {
            Self::Body(block) => Some(block),
            _ => None,
        }
    }
}

impl BasicBlock {
    /// The block's final instruction.
    pub fn terminator(&self) -> &Instruction {
        // Blocks are sealed only when non-empty.
        &self.instructions[self.instructions.len() - 1]
    }

    /// Whether the block ends in a jump whose destination is only known at runtime.
    pub const fn is_indirect(&self) -> bool {
        matches!(
            self.exit,
            BlockExit::Jump(JumpTarget::Indirect)
                | BlockExit::Branch {
                    target: JumpTarget::Indirect,
                    ..
                }
        )
    }
}

impl CfgIrBundle {
    /// Builds the CFG for raw bytecode.
    pub fn from_bytecode(bytecode: &[u8]) -> Result<Self, CfgIrError> {
        build_cfg_from_bytes(bytecode)
    }

    /// Looks up the block starting exactly at `pc`.
    pub fn block_at(&self, pc: usize) -> Option<&BasicBlock> {
        self.pc_to_block
            .get(&pc)
            .and_then(|&idx| self.cfg[idx].body())
    }

    /// Whether `pc` is a legal jump destination: a `JUMPDEST` on an instruction boundary.
    pub fn is_jump_target(&self, pc: usize) -> bool {
        pc < self.code_len && self.jumpdests.contains(&pc)
    }

    /// Iterates over body blocks in bytecode order.
    pub fn body_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        let mut blocks: Vec<&BasicBlock> =
            self.cfg.node_weights().filter_map(Block::body).collect();
        blocks.sort_by_key(|b| b.start_pc);
        blocks.into_iter()
    }

    /// Iterates over blocks whose jump destination is a runtime value.
    pub fn indirect_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.body_blocks().filter(|b| b.is_indirect())
    }

    /// Number of body blocks.
    pub fn block_count(&self) -> usize {
        self.pc_to_block.len()
    }
}
