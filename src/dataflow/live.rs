//! Backward live-variable analysis and the dead-code sweep it feeds.

use crate::cfg::Cfg;
use crate::dataflow::{solve, Analysis, Direction};
use crate::error::Result;
use crate::ir::Instr;
use petgraph::graph::NodeIndex;
use std::collections::HashSet;

pub type LiveSet = HashSet<String>;

fn block_in(instrs: &[Instr], out: &LiveSet) -> LiveSet {
    let mut live = out.clone();
    for instr in instrs.iter().rev() {
        if let Some(dest) = instr.dest() {
            live.remove(dest);
        }
        for arg in instr.args() {
            live.insert(arg.clone());
        }
    }
    live
}

struct LiveAnalysis;

impl Analysis for LiveAnalysis {
    type Value = LiveSet;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    fn bottom(&self) -> Self::Value {
        LiveSet::new()
    }

    fn meet(&self, inputs: &[&Self::Value]) -> Self::Value {
        inputs.iter().fold(LiveSet::new(), |mut acc, s| {
            acc.extend(s.iter().cloned());
            acc
        })
    }

    fn transfer(&self, cfg: &Cfg, node: NodeIndex, value: &Self::Value) -> Self::Value {
        block_in(&cfg.block(node).instrs, value)
    }
}

/// Run live-variable analysis to a fixpoint, returning per-block entry
/// ("in") and exit ("out") live sets.
pub fn live_variable_analysis(cfg: &Cfg) -> Result<crate::dataflow::Solution<LiveSet>> {
    solve(cfg, &LiveAnalysis)
}

/// Whether `instrs[index]`'s destination is read by a later instruction
/// in the same block.
fn used_later_locally(instrs: &[Instr], index: usize, dest: &str) -> bool {
    instrs[index + 1..].iter().any(|i| i.args().iter().any(|a| a == dest))
}

/// Use live-variable analysis to drop instructions whose destination is
/// dead at block exit and never read later within the same block, then
/// compact away the resulting `nop`s. Side-effecting ops without a `dest`
/// are never touched.
pub fn live_variable_dce(cfg: &mut Cfg) -> Result<()> {
    let solution = live_variable_analysis(cfg)?;
    for &node in &cfg.order().to_vec() {
        let out = solution.exit[&node].clone();
        let block = cfg.block_mut(node);
        for i in 0..block.instrs.len() {
            let Some(dest) = block.instrs[i].dest().map(str::to_string) else { continue };
            if !out.contains(&dest) && !used_later_locally(&block.instrs, i, &dest) {
                block.instrs[i] = Instr::nop();
            }
        }
        block.instrs.retain(|i| !i.is_nop());
    }
    Ok(())
}
