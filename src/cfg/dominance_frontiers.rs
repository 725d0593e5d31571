//! Dominance frontier computation.
//!
//! The dominance frontier of a node n is the set of join points where n's
//! dominance ceases: successors of nodes n dominates that n does not
//! strictly dominate. Used to place SSA phi nodes.

use crate::cfg::dominators::DominatorTree;
use crate::cfg::Cfg;
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet};

/// Dominance frontiers for every node in a CFG, keyed by node.
#[derive(Debug, Clone)]
pub struct DominanceFrontiers {
    frontiers: HashMap<NodeIndex, HashSet<NodeIndex>>,
}

impl DominanceFrontiers {
    pub fn frontier(&self, node: NodeIndex) -> &HashSet<NodeIndex> {
        use std::sync::OnceLock;
        static EMPTY: OnceLock<HashSet<NodeIndex>> = OnceLock::new();
        self.frontiers
            .get(&node)
            .unwrap_or_else(|| EMPTY.get_or_init(HashSet::new))
    }
}

/// Compute dominance frontiers with Cytron et al.'s algorithm: process
/// nodes deepest-first in the dominator tree, seed each node's frontier
/// with successors it doesn't strictly dominate, then propagate upward
/// from dominator-tree children whose frontier escapes the parent
/// (DF(b) = { s in succ(d) : d in rev_dom(b) and (s not in rev_dom(b) or
/// s == b) }, computed bottom-up for efficiency).
pub fn compute_dominance_frontiers(cfg: &Cfg, tree: &DominatorTree) -> DominanceFrontiers {
    let mut frontiers: HashMap<NodeIndex, HashSet<NodeIndex>> = HashMap::new();
    for &node in &cfg.order().to_vec() {
        frontiers.entry(node).or_default();
    }

    for node in tree.nodes_by_depth_desc() {
        let mut df = HashSet::new();

        // Rule 1 (local): successors of `node` not strictly dominated by it.
        for succ in cfg.successors(node) {
            if !tree.strictly_dominates(node, succ) {
                df.insert(succ);
            }
        }

        // Rule 2 (up): frontier elements of dominator-tree children that
        // aren't strictly dominated by `node` itself propagate up.
        for &child in tree.children(node) {
            if let Some(child_df) = frontiers.get(&child).cloned() {
                for s in child_df {
                    if !tree.strictly_dominates(node, s) {
                        df.insert(s);
                    }
                }
            }
        }

        frontiers.insert(node, df);
    }

    DominanceFrontiers { frontiers }
}
