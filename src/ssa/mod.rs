//! SSA construction (phi placement + renaming) and destruction.

pub mod destruct;
pub mod rename;

pub use destruct::destruct_ssa;
pub use rename::{construct_ssa, PhiTable};

use crate::cfg::{Cfg, DominanceFrontiers};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet};

/// Per-variable defining-block sets, `D(v)`: every block that assigns
/// `v` a value, including phi destinations once they're added (phi
/// placement treats a phi as a definition, so `D(v)` grows as placement
/// proceeds).
pub fn defining_blocks(cfg: &Cfg) -> HashMap<String, HashSet<NodeIndex>> {
    let mut defs: HashMap<String, HashSet<NodeIndex>> = HashMap::new();
    for &node in cfg.order() {
        for instr in &cfg.block(node).instrs {
            if let Some(dest) = instr.dest() {
                defs.entry(dest.to_string()).or_default().insert(node);
            }
        }
    }
    defs
}

/// Iteratively place phis: for each variable `v` and each defining block
/// `d`, add a phi for `v` at every block in `DF(d)`; adding a phi counts
/// as a new definition of `v`, so the process repeats until no block
/// gains a new phi.
///
/// Returns, per block, the set of variables that need a phi there.
pub fn place_phis(
    cfg: &Cfg,
    frontiers: &DominanceFrontiers,
    mut defs: HashMap<String, HashSet<NodeIndex>>,
) -> HashMap<NodeIndex, HashSet<String>> {
    let mut phis: HashMap<NodeIndex, HashSet<String>> = HashMap::new();
    for &node in cfg.order() {
        phis.insert(node, HashSet::new());
    }

    let mut vars: Vec<String> = defs.keys().cloned().collect();
    vars.sort();

    for var in vars {
        let mut worklist: Vec<NodeIndex> = defs.get(&var).into_iter().flatten().copied().collect();
        worklist.sort_by_key(|n| n.index());
        let mut processed: HashSet<NodeIndex> = HashSet::new();

        while let Some(d) = worklist.pop() {
            if !processed.insert(d) {
                continue;
            }
            let mut frontier: Vec<NodeIndex> = frontiers.frontier(d).iter().copied().collect();
            frontier.sort_by_key(|n| n.index());
            for block in frontier {
                let already = phis.get_mut(&block).unwrap();
                if already.insert(var.clone()) {
                    let def_set = defs.entry(var.clone()).or_default();
                    if def_set.insert(block) {
                        worklist.push(block);
                    }
                }
            }
        }
    }

    phis
}
