use super::read_bytecode;
use async_trait::async_trait;
use clap::Args;
use selscope_core::cfg_ir::{Block, BlockExit, CfgIrBundle, EdgeType, build_cfg_ir};
use std::error::Error;
use std::fmt::Write as _;
use std::fs;

/// Arguments for `cfg`.
#[derive(Args)]
pub struct CfgArgs {
    /// Output file for Graphviz .dot (default: stdout)
    #[arg(short, long)]
    output: Option<String>,
}

#[async_trait]
impl super::Command for CfgArgs {
    async fn execute(self, input: &str) -> Result<(), Box<dyn Error>> {
        let (instructions, _, bytes) = read_bytecode(input)?;
        let cfg_ir = build_cfg_ir(&instructions, &bytes)?;

        let dot = generate_dot(&cfg_ir);
        if let Some(out_path) = self.output {
            fs::write(out_path, &dot)?;
        } else {
            println!("{dot}");
        }
        Ok(())
    }
}

fn generate_dot(cfg_ir: &CfgIrBundle) -> String {
    let mut dot = String::from("digraph CFG {\n");

    for node in cfg_ir.cfg.node_indices() {
        let label = match &cfg_ir.cfg[node] {
            Block::Entry => "Entry".to_string(),
            Block::Exit => "Exit".to_string(),
            Block::Body(block) => {
                let instrs: Vec<String> = block.instructions.iter().map(|i| i.to_string()).collect();
                format!("Block_{:#x}\\n{}", block.start_pc, instrs.join("\\n"))
            }
        };
        // Blocks whose jump target is a runtime value get a dashed outline.
        let style = match &cfg_ir.cfg[node] {
            Block::Body(block) if block.is_indirect() => ", style=dashed",
            Block::Body(block) if block.exit == BlockExit::Halt => ", shape=box",
            _ => "",
        };
        let _ = writeln!(dot, "    {} [label=\"{}\"{}];", node.index(), label, style);
    }

    for edge in cfg_ir.cfg.edge_indices() {
        let Some((src, dst)) = cfg_ir.cfg.edge_endpoints(edge) else {
            continue;
        };
        let label = match cfg_ir.cfg[edge] {
            EdgeType::Fallthrough => "Fallthrough",
            EdgeType::Jump => "Jump",
            EdgeType::BranchTrue => "BranchTrue",
            EdgeType::BranchFalse => "BranchFalse",
        };
        let _ = writeln!(
            dot,
            "    {} -> {} [label=\"{}\"];",
            src.index(),
            dst.index(),
            label
        );
    }

    dot.push_str("}\n");
    dot
}
