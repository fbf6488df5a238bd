use crate::asm::{Assembler, solc_dispatcher};
use selscope_core::Opcode;
use selscope_core::cfg_ir::{BlockExit, CfgIrBundle, EdgeType, JumpTarget};
use selscope_core::signature::selector_of;

#[test]
fn test_dispatcher_blocks_have_static_targets() {
    let selectors = [selector_of("a()"), selector_of("b()")];
    let code = solc_dispatcher(&selectors).unwrap();
    let cfg = CfgIrBundle::from_bytecode(&code).unwrap();

    // every jump in the generated dispatcher pushes its destination right before it
    assert_eq!(cfg.indirect_blocks().count(), 0);
    let branches: Vec<_> = cfg
        .body_blocks()
        .filter_map(|b| match b.exit {
            BlockExit::Branch { target, .. } => Some(target),
            _ => None,
        })
        .collect();
    assert!(!branches.is_empty());
    assert!(branches.iter().all(|t| matches!(t, JumpTarget::Static(pc) if cfg.is_jump_target(*pc))));
}

#[test]
fn test_returning_helper_is_indirect() {
    let mut asm = Assembler::new();
    asm.push_label("ret").push_label("helper").op(Opcode::JUMP);
    asm.label("helper").op(Opcode::JUMP);
    asm.label("ret").op(Opcode::STOP);
    let code = asm.assemble().unwrap();
    let cfg = CfgIrBundle::from_bytecode(&code).unwrap();

    let indirect: Vec<_> = cfg.indirect_blocks().map(|b| b.start_pc).collect();
    // PUSH2 PUSH2 JUMP is 7 bytes; the helper starts right after
    assert_eq!(indirect, vec![7]);
}

#[test]
fn test_blocks_partition_the_code() {
    let code = solc_dispatcher(&[selector_of("x()")]).unwrap();
    let cfg = CfgIrBundle::from_bytecode(&code).unwrap();

    let mut next = 0;
    for block in cfg.body_blocks() {
        assert_eq!(block.start_pc, next);
        assert!(!block.instructions.is_empty());
        next = block.end_pc;
    }
    assert_eq!(next, code.len());
}

#[test]
fn test_branch_edges() {
    let mut asm = Assembler::new();
    asm.op(Opcode::CALLVALUE)
        .push_label("t")
        .op(Opcode::JUMPI)
        .op(Opcode::STOP)
        .label("t")
        .op(Opcode::STOP);
    let cfg = CfgIrBundle::from_bytecode(&asm.assemble().unwrap()).unwrap();

    let kinds: Vec<_> = cfg.cfg.edge_weights().cloned().collect();
    assert!(kinds.contains(&EdgeType::BranchTrue));
    assert!(kinds.contains(&EdgeType::BranchFalse));
    assert_eq!(cfg.block_count(), 3);
}
