//! Generic worklist dataflow solver, plus three clients: constant
//! propagation and folding, live-variable analysis (feeding a dead-code
//! sweep), and points-to analysis (feeding dead-store elimination on
//! `store`).

pub mod alias;
pub mod constprop;
pub mod live;

pub use alias::{dead_store_elimination, pointer_analysis};
pub use constprop::const_prop_and_fold;
pub use live::{live_variable_analysis, live_variable_dce};

use crate::cfg::Cfg;
use crate::error::{Result, TacError};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, VecDeque};

/// Whether a client meets over predecessors and seeds the entry block, or
/// meets over successors and seeds the exit blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A dataflow client: a lattice value, a meet operator, and a per-block
/// transfer function. `transfer` must be pure (side-effect-free) — any
/// instruction rewriting a client wants to perform happens in a separate
/// sweep once `solve` has reached a fixpoint, using the per-block values
/// this records.
pub trait Analysis {
    type Value: Clone + PartialEq;

    fn direction(&self) -> Direction;

    /// The value a block starts with before any neighbour has reported in.
    fn bottom(&self) -> Self::Value;

    /// Combine the values flowing in from every predecessor (forward) or
    /// successor (backward). Called with an empty slice for blocks with no
    /// such neighbours (the CFG entry, for a forward analysis).
    fn meet(&self, inputs: &[&Self::Value]) -> Self::Value;

    /// Compute this block's output (forward) or input (backward) value
    /// from its just-computed input (forward) or output (backward) value.
    fn transfer(&self, cfg: &Cfg, node: NodeIndex, value: &Self::Value) -> Self::Value;

    /// Override the computed boundary value at a node (used by points-to
    /// analysis to seed function arguments at the entry block). Returning
    /// `None` leaves the meet's result untouched.
    fn seed(&self, _cfg: &Cfg, _node: NodeIndex) -> Option<Self::Value> {
        None
    }
}

/// Per-block entry/exit values once the worklist has reached a fixpoint.
pub struct Solution<V> {
    pub entry: HashMap<NodeIndex, V>,
    pub exit: HashMap<NodeIndex, V>,
}

/// Run the worklist to a fixpoint: a block is re-enqueued whenever its
/// neighbour's value changes, propagating downstream for forward clients
/// and upstream for backward ones. Bounded by a generous iteration cap;
/// exceeding it means the transfer function isn't monotone over a finite
/// lattice, which is a client bug rather than a property of the input.
pub fn solve<A: Analysis>(cfg: &Cfg, analysis: &A) -> Result<Solution<A::Value>> {
    let nodes: Vec<NodeIndex> = cfg.order().to_vec();
    let mut entry: HashMap<NodeIndex, A::Value> = nodes.iter().map(|&n| (n, analysis.bottom())).collect();
    let mut exit: HashMap<NodeIndex, A::Value> = nodes.iter().map(|&n| (n, analysis.bottom())).collect();

    let mut worklist: VecDeque<NodeIndex> = nodes.iter().copied().collect();
    let bound = nodes.len().saturating_mul(nodes.len()).saturating_add(nodes.len()).saturating_add(64);
    let mut steps = 0usize;

    while let Some(node) = worklist.pop_front() {
        steps += 1;
        if steps > bound {
            return Err(TacError::AnalysisFailure(
                "dataflow worklist exceeded its iteration bound".to_string(),
            ));
        }

        let (upstream, downstream): (Vec<NodeIndex>, Vec<NodeIndex>) = match analysis.direction() {
            Direction::Forward => (cfg.predecessors(node).collect(), cfg.successors(node).collect()),
            Direction::Backward => (cfg.successors(node).collect(), cfg.predecessors(node).collect()),
        };
        let mut upstream = upstream;
        upstream.sort_by_key(|n| n.index());

        let neighbour_values: Vec<&A::Value> = upstream
            .iter()
            .map(|n| match analysis.direction() {
                Direction::Forward => &exit[n],
                Direction::Backward => &entry[n],
            })
            .collect();
        let mut met = analysis.meet(&neighbour_values);
        if let Some(seeded) = analysis.seed(cfg, node) {
            met = seeded;
        }

        let (changed, mut downstream) = match analysis.direction() {
            Direction::Forward => {
                let input_changed = entry.get(&node) != Some(&met);
                entry.insert(node, met.clone());
                let output = analysis.transfer(cfg, node, &met);
                let output_changed = exit.get(&node) != Some(&output);
                exit.insert(node, output);
                (input_changed || output_changed, downstream)
            }
            Direction::Backward => {
                let output_changed = exit.get(&node) != Some(&met);
                exit.insert(node, met.clone());
                let input = analysis.transfer(cfg, node, &met);
                let input_changed = entry.get(&node) != Some(&input);
                entry.insert(node, input);
                (input_changed || output_changed, downstream)
            }
        };

        if changed {
            downstream.sort_by_key(|n| n.index());
            worklist.extend(downstream);
        }
    }

    Ok(Solution { entry, exit })
}
