//! Forward constant propagation and folding.

use crate::cfg::Cfg;
use crate::dataflow::{solve, Analysis, Direction};
use crate::error::Result;
use crate::ir::{Instr, Literal, Opcode};
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

pub type ConstMap = HashMap<String, Literal>;

fn foldable(op: Opcode) -> bool {
    matches!(op, Opcode::Add | Opcode::Sub | Opcode::Mul)
}

fn fold(op: Opcode, a: i64, b: i64) -> i64 {
    match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        _ => unreachable!("foldable() guards the opcode"),
    }
}

/// Advance one block's const map, optionally rewriting foldable ops to
/// `const` in place. Shared by the pure analysis transfer and the real
/// rewriting sweep so both agree on exactly the same semantics.
fn step(instrs: &mut [Instr], input: &ConstMap) -> ConstMap {
    let mut map = input.clone();
    for instr in instrs.iter_mut() {
        let Some(op) = instr.as_op_mut() else { continue };
        match op.op {
            Opcode::Const => {
                if let Some(dest) = &op.dest {
                    if let Some(value) = op.value {
                        map.insert(dest.clone(), value);
                    }
                }
            }
            other if foldable(other) && op.args.len() == 2 => {
                let a = op.args[0].clone();
                let b = op.args[1].clone();
                match (map.get(&a).and_then(Literal::as_int), map.get(&b).and_then(Literal::as_int)) {
                    (Some(a), Some(b)) => {
                        let value = Literal::Int(fold(other, a, b));
                        if let Some(dest) = op.dest.clone() {
                            op.op = Opcode::Const;
                            op.args.clear();
                            op.value = Some(value);
                            map.insert(dest, value);
                        }
                    }
                    _ => {
                        if let Some(dest) = &op.dest {
                            map.remove(dest);
                        }
                    }
                }
            }
            _ => {
                if let Some(dest) = &op.dest {
                    map.remove(dest);
                }
            }
        }
    }
    map
}

struct ConstPropAnalysis;

impl Analysis for ConstPropAnalysis {
    type Value = ConstMap;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn bottom(&self) -> Self::Value {
        ConstMap::new()
    }

    fn meet(&self, inputs: &[&Self::Value]) -> Self::Value {
        let Some((first, rest)) = inputs.split_first() else {
            return ConstMap::new();
        };
        let mut result = (*first).clone();
        result.retain(|key, value| rest.iter().all(|m| m.get(key) == Some(value)));
        result
    }

    fn transfer(&self, cfg: &Cfg, node: NodeIndex, value: &Self::Value) -> Self::Value {
        let mut instrs = cfg.block(node).instrs.clone();
        step(&mut instrs, value)
    }
}

/// Propagate and fold constants across the whole CFG: for every block,
/// reconstruct its entry const map as computed by the fixpoint, then
/// rewrite the block's own instructions against that map for real.
pub fn const_prop_and_fold(cfg: &mut Cfg) -> Result<()> {
    let solution = solve(cfg, &ConstPropAnalysis)?;
    for &node in &cfg.order().to_vec() {
        let input = solution.entry[&node].clone();
        step(&mut cfg.block_mut(node).instrs, &input);
    }
    Ok(())
}
