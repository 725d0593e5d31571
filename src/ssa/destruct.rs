//! SSA destruction: replace every phi with `id` copies on each incoming
//! edge, then drop the phis.

use crate::cfg::Cfg;
use crate::ir::{Instr, OpInstr, Opcode};
use crate::ssa::rename::UNDEFINED;
use petgraph::graph::NodeIndex;

/// For every phi `dest = phi [l1, l2, ...] [v1, v2, ...]` at block `b`:
/// in the block named `l_i`, insert `dest := id v_i` just after the most
/// recent definition of `v_i` in that block (or right before its
/// terminator if `v_i` isn't locally defined). `__undefined` sources are
/// skipped — the value is unreachable on that edge. Phis are removed
/// after every block has its copies inserted.
pub fn destruct_ssa(cfg: &mut Cfg) {
    let mut insertions: Vec<(String, Instr)> = Vec::new(); // (target block label, copy instr)

    for &node in cfg.order() {
        for instr in &cfg.block(node).instrs {
            let Some(op) = instr.as_op() else { continue };
            if op.op != Opcode::Phi {
                continue;
            }
            let dest = op.dest.clone().expect("phi has a dest");
            let ty = op.ty.clone().expect("phi has a type");
            for (label, var) in op.labels.iter().zip(op.args.iter()) {
                if var == UNDEFINED {
                    continue;
                }
                let copy = Instr::op(
                    OpInstr::new(Opcode::Id)
                        .with_dest(dest.clone(), ty.clone())
                        .with_args(vec![var.clone()]),
                );
                insertions.push((label.clone(), copy));
            }
        }
    }

    for (label, copy) in insertions {
        let Some(node) = cfg.node_by_label(&label) else { continue };
        let var = copy.args()[0].clone();
        let block = cfg.block_mut(node);
        let insert_at = block
            .instrs
            .iter()
            .rposition(|i| i.dest() == Some(var.as_str()))
            .map(|i| i + 1)
            .unwrap_or_else(|| {
                if block.terminator().is_some() {
                    block.instrs.len().saturating_sub(1)
                } else {
                    block.instrs.len()
                }
            });
        block.instrs.insert(insert_at, copy);
    }

    let order: Vec<NodeIndex> = cfg.order().to_vec();
    for node in order {
        let block = cfg.block_mut(node);
        block.instrs.retain(|i| !matches!(i.as_op(), Some(op) if op.op == Opcode::Phi));
    }
}
