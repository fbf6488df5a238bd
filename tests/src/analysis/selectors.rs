use crate::asm::{Assembler, solc_dispatcher};
use selscope_analysis::{ScanConfig, analyze, function_selectors};
use selscope_core::Opcode;
use selscope_core::signature::selector_of;
use std::collections::BTreeSet;

const ERC20: [&str; 6] = [
    "totalSupply()",
    "balanceOf(address)",
    "transfer(address,uint256)",
    "allowance(address,address)",
    "approve(address,uint256)",
    "transferFrom(address,address,uint256)",
];

fn erc20_selectors() -> Vec<[u8; 4]> {
    ERC20.iter().map(|sig| selector_of(sig)).collect()
}

#[test]
fn test_stop_yields_nothing() {
    assert!(function_selectors(&[0x00], 0).is_empty());
}

#[test]
fn test_push4_calldataload_eq_jumpi() {
    let mut asm = Assembler::new();
    asm.push_bytes(&[0x12, 0x34, 0x56, 0x78])
        .push(0)
        .op(Opcode::CALLDATALOAD)
        .op(Opcode::EQ)
        .push_label("dest")
        .op(Opcode::JUMPI)
        .op(Opcode::STOP)
        .label("dest")
        .op(Opcode::STOP);
    let code = asm.assemble().unwrap();
    assert_eq!(function_selectors(&code, 0), vec![[0x12, 0x34, 0x56, 0x78]]);
}

#[test]
fn test_single_selector_dispatcher() {
    let selector = selector_of("transfer(address,uint256)");
    let code = solc_dispatcher(&[selector]).unwrap();
    assert_eq!(function_selectors(&code, 0), vec![selector]);
}

#[test]
fn test_dispatcher_chain_in_discovery_order() {
    let selectors = erc20_selectors();
    let code = solc_dispatcher(&selectors).unwrap();
    assert_eq!(function_selectors(&code, 0), selectors);
}

#[test]
fn test_result_set_ignores_comparison_order() {
    let selectors = erc20_selectors();
    let mut reversed = selectors.clone();
    reversed.reverse();

    let forward: BTreeSet<_> = function_selectors(&solc_dispatcher(&selectors).unwrap(), 0)
        .into_iter()
        .collect();
    let backward: BTreeSet<_> = function_selectors(&solc_dispatcher(&reversed).unwrap(), 0)
        .into_iter()
        .collect();
    assert_eq!(forward, backward);
    assert_eq!(forward, selectors.into_iter().collect());
}

#[test]
fn test_idempotent() {
    let code = solc_dispatcher(&erc20_selectors()).unwrap();
    let config = ScanConfig::default();
    assert_eq!(analyze(&code, &config), analyze(&code, &config));
}

#[test]
fn test_budget_monotonicity() {
    let code = solc_dispatcher(&erc20_selectors()).unwrap();
    let mut previous: BTreeSet<[u8; 4]> = BTreeSet::new();
    for budget in [1, 5, 10, 15, 20, 30, 40, 60, 80, 120, 500, 5_000] {
        let found: BTreeSet<_> = function_selectors(&code, budget).into_iter().collect();
        assert!(
            previous.is_subset(&found),
            "budget {budget} lost selectors: {previous:?} -> {found:?}"
        );
        previous = found;
    }
    assert_eq!(previous.len(), ERC20.len());
}

#[test]
fn test_binary_search_dispatcher() {
    // solc splits large dispatchers with a GT pivot before the EQ chains
    let mut selectors = erc20_selectors();
    selectors.sort();
    let (lower, upper) = selectors.split_at(3);

    let mut asm = Assembler::new();
    asm.push(0).op(Opcode::CALLDATALOAD).push(0xe0).op(Opcode::SHR);
    asm.op(Opcode::DUP(1))
        .push_bytes(&upper[0])
        .op(Opcode::GT)
        .push_label("lower")
        .op(Opcode::JUMPI);
    for (half, name) in [(upper, "hi"), (lower, "lo")] {
        if name == "lo" {
            asm.label("lower");
        }
        for (i, selector) in half.iter().enumerate() {
            asm.op(Opcode::DUP(1))
                .push_bytes(selector)
                .op(Opcode::EQ)
                .push_label(&format!("{name}{i}"))
                .op(Opcode::JUMPI);
        }
        asm.push(0).op(Opcode::DUP(1)).op(Opcode::REVERT);
        for i in 0..half.len() {
            asm.label(&format!("{name}{i}")).op(Opcode::STOP);
        }
    }
    let code = asm.assemble().unwrap();

    let found: BTreeSet<_> = function_selectors(&code, 0).into_iter().collect();
    assert_eq!(found, selectors.into_iter().collect());
}

#[test]
fn test_xor_dispatcher() {
    // Vyper-style: jump away on mismatch, fall into the body on a match
    let selectors = erc20_selectors();
    let mut asm = Assembler::new();
    asm.push(0).op(Opcode::CALLDATALOAD).push(0xe0).op(Opcode::SHR);
    for (i, selector) in selectors.iter().enumerate() {
        asm.push_bytes(selector)
            .op(Opcode::DUP(2))
            .op(Opcode::XOR)
            .push_label(&format!("next{i}"))
            .op(Opcode::JUMPI)
            .op(Opcode::STOP)
            .label(&format!("next{i}"));
    }
    asm.push(0).op(Opcode::DUP(1)).op(Opcode::REVERT);
    let code = asm.assemble().unwrap();

    assert_eq!(function_selectors(&code, 0), selectors);
}

#[test]
fn test_sub_and_double_negation() {
    let mut asm = Assembler::new();
    asm.push(0).op(Opcode::CALLDATALOAD).push(0xe0).op(Opcode::SHR);
    // selector - c, then ISZERO ISZERO ISZERO: jump on a match
    asm.op(Opcode::DUP(1))
        .push_bytes(&[0xde, 0xad, 0xbe, 0xef])
        .op(Opcode::SWAP(1))
        .op(Opcode::SUB)
        .ops(&[Opcode::ISZERO, Opcode::ISZERO, Opcode::ISZERO])
        .push_label("hit")
        .op(Opcode::JUMPI)
        .op(Opcode::STOP)
        .label("hit")
        .op(Opcode::STOP);
    let code = asm.assemble().unwrap();

    assert_eq!(function_selectors(&code, 0), vec![[0xde, 0xad, 0xbe, 0xef]]);
}

#[test]
fn test_long_boolean_chains_are_not_selector_tests() {
    let mut asm = Assembler::new();
    asm.push(0).op(Opcode::CALLDATALOAD).push(0xe0).op(Opcode::SHR);
    asm.push_bytes(&[0xde, 0xad, 0xbe, 0xef]).op(Opcode::EQ);
    for _ in 0..10 {
        asm.op(Opcode::ISZERO);
    }
    asm.push_label("hit")
        .op(Opcode::JUMPI)
        .op(Opcode::STOP)
        .label("hit")
        .op(Opcode::STOP);
    let code = asm.assemble().unwrap();

    assert!(function_selectors(&code, 0).is_empty());
}

#[test]
fn test_legacy_div_dispatcher() {
    // PUSH29 0x0100..00 PUSH1 0 CALLDATALOAD DIV PUSH4 ffffffff AND
    let mut divisor = vec![0x01];
    divisor.extend([0u8; 28]);
    let selector = selector_of("balanceOf(address)");

    let mut asm = Assembler::new();
    asm.push_bytes(&divisor)
        .push(0)
        .op(Opcode::CALLDATALOAD)
        .op(Opcode::DIV)
        .push_bytes(&[0xff; 4])
        .op(Opcode::AND)
        .push_bytes(&selector)
        .op(Opcode::DUP(2))
        .op(Opcode::EQ)
        .push_label("hit")
        .op(Opcode::JUMPI)
        .op(Opcode::STOP)
        .label("hit")
        .op(Opcode::STOP);
    let code = asm.assemble().unwrap();

    assert_eq!(function_selectors(&code, 0), vec![selector]);
}

#[test]
fn test_selector_through_memory_and_internal_call() {
    let selector = selector_of("approve(address,uint256)");
    let mut asm = Assembler::new();
    // a helper returning through a pushed return address
    asm.push_label("ret").push_label("helper").op(Opcode::JUMP);
    asm.label("helper").op(Opcode::JUMP);
    asm.label("ret")
        .push(0)
        .op(Opcode::CALLDATALOAD)
        .push(0xe0)
        .op(Opcode::SHR)
        .push(0x80)
        .op(Opcode::MSTORE)
        .push(0x80)
        .op(Opcode::MLOAD)
        .push_bytes(&selector)
        .op(Opcode::EQ)
        .push_label("hit")
        .op(Opcode::JUMPI)
        .op(Opcode::STOP)
        .label("hit")
        .op(Opcode::STOP);
    let code = asm.assemble().unwrap();

    assert_eq!(function_selectors(&code, 0), vec![selector]);
}

#[test]
fn test_non_selector_comparisons_are_ignored() {
    let mut asm = Assembler::new();
    // compares the second calldata word, not the selector
    asm.push(4)
        .op(Opcode::CALLDATALOAD)
        .push_bytes(&[0x12, 0x34, 0x56, 0x78])
        .op(Opcode::EQ)
        .push_label("a")
        .op(Opcode::JUMPI)
        // compares an opaque value
        .op(Opcode::CALLVALUE)
        .push_bytes(&[0x12, 0x34, 0x56, 0x78])
        .op(Opcode::EQ)
        .push_label("a")
        .op(Opcode::JUMPI)
        .op(Opcode::STOP)
        .label("a")
        .op(Opcode::STOP);
    let code = asm.assemble().unwrap();

    assert!(function_selectors(&code, 0).is_empty());
}

#[test]
fn test_presets_agree_on_small_dispatchers() {
    let code = solc_dispatcher(&erc20_selectors()).unwrap();
    let quick = analyze(&code, &ScanConfig::quick());
    let thorough = analyze(&code, &ScanConfig::thorough());
    assert_eq!(quick.selectors, thorough.selectors);
    assert!(!quick.is_partial());
}
