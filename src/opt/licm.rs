//! Loop-invariant code motion.
//!
//! Requires SSA form. Does not perform loop normalization itself —
//! moving an instruction only happens when the loop header already has
//! exactly one non-back-edge predecessor; otherwise the candidate stays
//! invariant-marked (feeding further fixpoint iterations) but in place.

use crate::cfg::{Cfg, NaturalLoop};
use crate::ir::{Instr, Opcode};
use petgraph::graph::NodeIndex;
use std::collections::HashSet;

fn is_invariant_op(op: Opcode) -> bool {
    matches!(
        op,
        Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div | Opcode::Mod | Opcode::Eq | Opcode::Lt | Opcode::Gt | Opcode::Le | Opcode::Ge
    )
}

/// Hoist loop-invariant arithmetic/comparison ops out of every loop in
/// `loops`, one loop at a time. `arg_names` seeds the invariant set with
/// the function's parameters, which are invariant under any loop by
/// definition.
pub fn licm(cfg: &mut Cfg, loops: &[NaturalLoop], arg_names: &[String]) {
    for l in loops {
        run_one(cfg, l, arg_names);
    }
}

fn run_one(cfg: &mut Cfg, l: &NaturalLoop, arg_names: &[String]) {
    let mut invariant: HashSet<String> = arg_names.iter().cloned().collect();
    for &node in cfg.order() {
        if l.contains(node) {
            continue;
        }
        for instr in &cfg.block(node).instrs {
            if let Some(dest) = instr.dest() {
                invariant.insert(dest.to_string());
            }
        }
    }

    let non_backedge_preds: Vec<NodeIndex> = cfg
        .predecessors(l.header)
        .filter(|&p| p != l.latch)
        .collect();
    let target = if non_backedge_preds.len() == 1 {
        Some(non_backedge_preds[0])
    } else {
        None
    };

    let mut body: Vec<NodeIndex> = l.body.iter().copied().collect();
    body.sort_by_key(|n| n.index());

    loop {
        let mut changed = false;
        let mut hoisted: Vec<Instr> = Vec::new();

        for &node in &body {
            let block = cfg.block_mut(node);
            for instr in block.instrs.iter_mut() {
                let Some(op) = instr.as_op_mut() else { continue };
                if !is_invariant_op(op.op) {
                    continue;
                }
                let Some(dest) = op.dest.clone() else { continue };
                if invariant.contains(&dest) {
                    continue;
                }
                if !op.args.iter().all(|a| invariant.contains(a)) {
                    continue;
                }

                invariant.insert(dest);
                changed = true;

                if target.is_some() {
                    hoisted.push(std::mem::replace(instr, Instr::nop()));
                }
            }
        }

        if let Some(target) = target {
            if !hoisted.is_empty() {
                let block = cfg.block_mut(target);
                let insert_at = if block.terminator().is_some() {
                    block.instrs.len().saturating_sub(1)
                } else {
                    block.instrs.len()
                };
                for (offset, instr) in hoisted.into_iter().enumerate() {
                    block.instrs.insert(insert_at + offset, instr);
                }
            }
        }

        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{add_terminators, build, detect_natural_loops, DominatorTree};
    use crate::ir::{Literal, OpInstr, Type};

    #[test]
    fn hoists_loop_invariant_mul_to_preheader() {
        // i = 0; n = 10; x = 5; two = 2
        // loop: t = x * 2; i = i + 1; br (i < n) loop end
        // end: print t
        let instrs = vec![
            Instr::op(OpInstr::new(Opcode::Const).with_dest("i", Type::int()).with_value(Literal::Int(0))),
            Instr::op(OpInstr::new(Opcode::Const).with_dest("n", Type::int()).with_value(Literal::Int(10))),
            Instr::op(OpInstr::new(Opcode::Const).with_dest("x", Type::int()).with_value(Literal::Int(5))),
            Instr::op(OpInstr::new(Opcode::Const).with_dest("two", Type::int()).with_value(Literal::Int(2))),
            Instr::op(OpInstr::new(Opcode::Jmp).with_labels(vec!["loop".into()])),
            Instr::label("loop"),
            Instr::op(OpInstr::new(Opcode::Mul).with_dest("t", Type::int()).with_args(vec!["x".into(), "two".into()])),
            Instr::op(OpInstr::new(Opcode::Const).with_dest("one", Type::int()).with_value(Literal::Int(1))),
            Instr::op(OpInstr::new(Opcode::Add).with_dest("i", Type::int()).with_args(vec!["i".into(), "one".into()])),
            Instr::op(OpInstr::new(Opcode::Lt).with_dest("c", Type::bool()).with_args(vec!["i".into(), "n".into()])),
            Instr::op(OpInstr::new(Opcode::Br).with_args(vec!["c".into()]).with_labels(vec!["loop".into(), "end".into()])),
            Instr::label("end"),
            Instr::op(OpInstr::new(Opcode::Print).with_args(vec!["t".into()])),
            Instr::op(OpInstr::new(Opcode::Ret)),
        ];
        let mut cfg = build(&instrs);
        add_terminators(&mut cfg);
        let tree = DominatorTree::new(&cfg);
        let loops = detect_natural_loops(&cfg, &tree);
        assert_eq!(loops.len(), 1);

        licm(&mut cfg, &loops, &[]);

        let header = loops[0].header;
        let preds: Vec<_> = cfg.predecessors(header).filter(|&p| p != loops[0].latch).collect();
        assert_eq!(preds.len(), 1);
        let preheader_block = cfg.block(preds[0]);
        assert!(preheader_block
            .instrs
            .iter()
            .any(|i| matches!(i.as_op(), Some(op) if op.op == Opcode::Mul)));

        let loop_block = cfg.block(header);
        assert!(loop_block
            .instrs
            .iter()
            .all(|i| !matches!(i.as_op(), Some(op) if op.op == Opcode::Mul)));
    }
}
