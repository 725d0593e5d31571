//! Forward points-to analysis and the dead-store sweep it feeds. Memory
//! content is never modeled — only which abstract allocation sites a
//! pointer variable may refer to.

use crate::cfg::Cfg;
use crate::dataflow::{solve, Analysis, Direction, Solution};
use crate::error::Result;
use crate::ir::{Instr, Opcode};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet};

/// The universal token: a loaded pointer always resolves to `{"any"}`
/// since memory contents aren't modeled, and it aliases everything.
pub const ANY: &str = "any";

pub type PointerSet = HashSet<String>;
pub type PointerMap = HashMap<String, PointerSet>;

/// Apply one instruction's effect on the pointer map. Shared by the pure
/// analysis transfer and the dead-store sweep, which additionally tracks
/// pending stores alongside this.
fn apply_instr(label: &str, index: usize, op: &crate::ir::OpInstr, map: &mut PointerMap) {
    match op.op {
        Opcode::Alloc => {
            if let Some(dest) = &op.dest {
                map.insert(dest.clone(), [format!("{label}.{index}")].into_iter().collect());
            }
        }
        Opcode::Load => {
            if let Some(dest) = &op.dest {
                map.insert(dest.clone(), [ANY.to_string()].into_iter().collect());
            }
        }
        Opcode::Id | Opcode::PtrAdd => {
            if let (Some(dest), Some(arg0)) = (&op.dest, op.args.first()) {
                if let Some(set) = map.get(arg0).cloned() {
                    map.insert(dest.clone(), set);
                }
            }
        }
        _ => {}
    }
}

struct PointerAnalysis<'a> {
    arg_names: &'a [String],
    entry: NodeIndex,
}

impl<'a> Analysis for PointerAnalysis<'a> {
    type Value = PointerMap;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn bottom(&self) -> Self::Value {
        PointerMap::new()
    }

    fn meet(&self, inputs: &[&Self::Value]) -> Self::Value {
        let mut result: PointerMap = PointerMap::new();
        for map in inputs {
            for (key, set) in map.iter() {
                result.entry(key.clone()).or_default().extend(set.iter().cloned());
            }
        }
        result
    }

    fn transfer(&self, cfg: &Cfg, node: NodeIndex, value: &Self::Value) -> Self::Value {
        let block = cfg.block(node);
        let mut map = value.clone();
        for (i, instr) in block.instrs.iter().enumerate() {
            if let Some(op) = instr.as_op() {
                apply_instr(&block.label, i, op, &mut map);
            }
        }
        map
    }

    fn seed(&self, _cfg: &Cfg, node: NodeIndex) -> Option<Self::Value> {
        if node == self.entry {
            Some(
                self.arg_names
                    .iter()
                    .map(|name| (name.clone(), [ANY.to_string()].into_iter().collect()))
                    .collect(),
            )
        } else {
            None
        }
    }
}

/// Run points-to analysis to a fixpoint over the whole function.
pub fn pointer_analysis(cfg: &Cfg, arg_names: &[String]) -> Result<Solution<PointerMap>> {
    let analysis = PointerAnalysis { arg_names, entry: cfg.entry() };
    solve(cfg, &analysis)
}

/// Mark a pending store used by anything the loaded pointer may alias.
/// `"any"` is universal: it marks every pending store used outright
/// rather than narrowing by intersection.
fn mark_use(store_use: &mut HashMap<String, (usize, bool)>, loaded_var: &str, map: &PointerMap) {
    let Some(pointer) = map.get(loaded_var) else { return };
    if pointer.contains(ANY) {
        for entry in store_use.values_mut() {
            entry.1 = true;
        }
        return;
    }
    for (store_dest, entry) in store_use.iter_mut() {
        if let Some(store_ptr) = map.get(store_dest) {
            if !pointer.is_disjoint(store_ptr) {
                entry.1 = true;
            }
        }
    }
}

/// Eliminate dead stores: a `store` is dead if the most recent previous
/// store to a may-aliased pointer was never read (by a `load` whose
/// pointer may alias it) before this store overwrites it.
pub fn dead_store_elimination(cfg: &mut Cfg, arg_names: &[String]) -> Result<()> {
    let solution = pointer_analysis(cfg, arg_names)?;
    for &node in &cfg.order().to_vec() {
        let input = solution.entry[&node].clone();
        let label = cfg.block(node).label.clone();
        let block = cfg.block_mut(node);
        let mut map = input;
        let mut store_use: HashMap<String, (usize, bool)> = HashMap::new();

        for i in 0..block.instrs.len() {
            let Some(op) = block.instrs[i].as_op().cloned() else { continue };
            match op.op {
                Opcode::Load => {
                    apply_instr(&label, i, &op, &mut map);
                    if let Some(ptr_arg) = op.args.first() {
                        mark_use(&mut store_use, ptr_arg, &map);
                    }
                }
                Opcode::Store => {
                    if let Some(ptr_arg) = op.args.first() {
                        if let Some(&(prev_index, used)) = store_use.get(ptr_arg) {
                            if !used {
                                block.instrs[prev_index] = Instr::nop();
                            }
                        }
                        store_use.insert(ptr_arg.clone(), (i, false));
                    }
                }
                _ => apply_instr(&label, i, &op, &mut map),
            }
        }

        block.instrs.retain(|i| !i.is_nop());
    }
    Ok(())
}
