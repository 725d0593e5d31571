//! Dominator-tree renaming: the second half of SSA construction.

use crate::cfg::{compute_dominance_frontiers, Cfg, DominatorTree};
use crate::ir::{Instr, OpInstr, Opcode, Type};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet};

pub const UNDEFINED: &str = "__undefined";

/// Phi bookkeeping collected during renaming: per block, the fresh phi
/// destination name for each original variable, and the incoming
/// `(predecessor, value)` pairs recorded from every predecessor's
/// renaming pass.
#[derive(Debug, Default, Clone)]
pub struct PhiTable {
    pub phi_dests: HashMap<NodeIndex, HashMap<String, String>>,
    pub phi_args: HashMap<NodeIndex, HashMap<String, Vec<(NodeIndex, String)>>>,
}

struct Renamer<'a> {
    cfg: &'a mut Cfg,
    tree: &'a DominatorTree,
    phis: &'a HashMap<NodeIndex, HashSet<String>>,
    stack: HashMap<String, Vec<String>>,
    counters: HashMap<String, usize>,
    table: PhiTable,
}

impl<'a> Renamer<'a> {
    fn fresh(&mut self, var: &str) -> String {
        let counter = self.counters.entry(var.to_string()).or_insert(0);
        let name = format!("{var}.{counter}");
        *counter += 1;
        self.stack.entry(var.to_string()).or_default().push(name.clone());
        name
    }

    fn top(&self, var: &str) -> Option<&String> {
        self.stack.get(var).and_then(|s| s.last())
    }

    fn rename(&mut self, block: NodeIndex) {
        let saved: HashMap<String, Vec<String>> = self.stack.clone();

        let mut phi_vars: Vec<String> = self.phis.get(&block).cloned().unwrap_or_default().into_iter().collect();
        phi_vars.sort();
        for var in &phi_vars {
            let fresh = self.fresh(var);
            self.table
                .phi_dests
                .entry(block)
                .or_default()
                .insert(var.clone(), fresh);
        }

        let instrs = self.cfg.block(block).instrs.clone();
        let mut rewritten = Vec::with_capacity(instrs.len());
        for instr in instrs {
            rewritten.push(self.rename_instr(instr));
        }
        self.cfg.block_mut(block).instrs = rewritten;

        let successors: Vec<NodeIndex> = self.cfg.successors(block).collect();
        for succ in successors {
            let vars = self.phis.get(&succ).cloned().unwrap_or_default();
            for var in vars {
                let value = self.top(&var).cloned().unwrap_or_else(|| UNDEFINED.to_string());
                self.table
                    .phi_args
                    .entry(succ)
                    .or_default()
                    .entry(var)
                    .or_default()
                    .push((block, value));
            }
        }

        let mut children: Vec<NodeIndex> = self.tree.children(block).to_vec();
        children.sort_by_key(|n| n.index());
        for child in children {
            self.rename(child);
        }

        self.stack = saved;
    }

    fn rename_instr(&mut self, instr: Instr) -> Instr {
        match instr {
            Instr::Label { .. } => instr,
            Instr::Op(mut op) => {
                op.args = op
                    .args
                    .iter()
                    .map(|a| self.top(a).cloned().unwrap_or_else(|| a.clone()))
                    .collect();
                if let Some(dest) = op.dest.clone() {
                    op.dest = Some(self.fresh(&dest));
                }
                Instr::Op(op)
            }
        }
    }
}

/// Build SSA form in place: place phis (via dominance frontiers), rename
/// every variable along a dominator-tree depth-first walk (children
/// visited in sorted order for determinism), and splice phi instructions
/// into the blocks that need them.
///
/// `arg_names` seeds the rename stack with each argument mapping to
/// itself; `types` maps every original (pre-rename) variable name to its
/// declared type, used to give inserted phi instructions the right type.
pub fn construct_ssa(cfg: &mut Cfg, arg_names: &[String], types: &HashMap<String, Type>) {
    let tree = DominatorTree::new(cfg);
    let defs = super::defining_blocks(cfg);
    let frontiers = compute_dominance_frontiers(cfg, &tree);
    let phis = super::place_phis(cfg, &frontiers, defs);

    let mut stack = HashMap::new();
    for name in arg_names {
        stack.insert(name.clone(), vec![name.clone()]);
    }

    let mut renamer = Renamer {
        cfg,
        tree: &tree,
        phis: &phis,
        stack,
        counters: HashMap::new(),
        table: PhiTable::default(),
    };
    let entry = renamer.cfg.entry();
    renamer.rename(entry);
    let table = renamer.table;

    insert_phis(cfg, &table, &phis, types);
}

/// Splice phi instructions into every block that needs one, right after
/// its leading instruction (the label record, for every block but the
/// synthetic entry — whose dominance frontier is empty in any reducible
/// single-entry CFG, so this edge case never actually fires there).
fn insert_phis(
    cfg: &mut Cfg,
    table: &PhiTable,
    phis: &HashMap<NodeIndex, HashSet<String>>,
    types: &HashMap<String, Type>,
) {
    for (&block, vars) in phis {
        if vars.is_empty() {
            continue;
        }
        let mut sorted_vars: Vec<&String> = vars.iter().collect();
        sorted_vars.sort();

        let empty_dests = HashMap::new();
        let empty_args = HashMap::new();
        let dests = table.phi_dests.get(&block).unwrap_or(&empty_dests);
        let args = table.phi_args.get(&block).unwrap_or(&empty_args);

        let mut phi_instrs = Vec::new();
        for var in sorted_vars {
            let dest = dests.get(var).cloned().unwrap_or_else(|| var.clone());
            let ty = types.get(var).cloned().unwrap_or_else(Type::int);
            let pairs = args.get(var).cloned().unwrap_or_default();
            let mut sorted_pairs = pairs;
            sorted_pairs.sort_by_key(|(n, _)| n.index());
            let labels: Vec<String> = sorted_pairs
                .iter()
                .map(|(n, _)| cfg.block(*n).label.clone())
                .collect();
            let values: Vec<String> = sorted_pairs.into_iter().map(|(_, v)| v).collect();

            phi_instrs.push(Instr::op(
                OpInstr::new(Opcode::Phi)
                    .with_dest(dest, ty)
                    .with_args(values)
                    .with_labels(labels),
            ));
        }

        let block_mut = cfg.block_mut(block);
        if block_mut.instrs.is_empty() {
            block_mut.instrs = phi_instrs;
        } else {
            let first = block_mut.instrs[0].clone();
            let rest = block_mut.instrs[1..].to_vec();
            let mut new_instrs = vec![first];
            new_instrs.extend(phi_instrs);
            new_instrs.extend(rest);
            block_mut.instrs = new_instrs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{add_terminators, build};
    use crate::ir::{Literal, OpInstr};

    #[test]
    fn diamond_gets_phi_at_join() {
        // if (c) { x = 1 } else { x = 2 }; print x
        let instrs = vec![
            Instr::op(OpInstr::new(Opcode::Const).with_dest("c", Type::bool()).with_value(Literal::Bool(true))),
            Instr::op(OpInstr::new(Opcode::Br).with_args(vec!["c".into()]).with_labels(vec!["l".into(), "r".into()])),
            Instr::label("l"),
            Instr::op(OpInstr::new(Opcode::Const).with_dest("x", Type::int()).with_value(Literal::Int(1))),
            Instr::op(OpInstr::new(Opcode::Jmp).with_labels(vec!["end".into()])),
            Instr::label("r"),
            Instr::op(OpInstr::new(Opcode::Const).with_dest("x", Type::int()).with_value(Literal::Int(2))),
            Instr::op(OpInstr::new(Opcode::Jmp).with_labels(vec!["end".into()])),
            Instr::label("end"),
            Instr::op(OpInstr::new(Opcode::Print).with_args(vec!["x".into()])),
            Instr::op(OpInstr::new(Opcode::Ret)),
        ];
        let mut cfg = build(&instrs);
        add_terminators(&mut cfg);

        let mut types = HashMap::new();
        types.insert("x".to_string(), Type::int());
        types.insert("c".to_string(), Type::bool());
        construct_ssa(&mut cfg, &[], &types);

        let end = cfg.node_by_label("end").unwrap();
        let has_phi = cfg
            .block(end)
            .instrs
            .iter()
            .any(|i| matches!(i.as_op(), Some(op) if op.op == Opcode::Phi));
        assert!(has_phi, "expected a phi at the join block");
    }
}
