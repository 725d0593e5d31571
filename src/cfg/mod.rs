//! Control-flow graph construction, rewriting, and serialization.
//!
//! A [`Cfg`] owns its blocks; edges and loop bodies only ever hold
//! back-references (`NodeIndex`) into it, per the ownership model: a CFG
//! exclusively owns its [`BasicBlock`]s, and auxiliary maps keyed by node
//! identity are discarded at pass boundaries.

pub mod dominance_frontiers;
pub mod dominators;
pub mod loops;

pub use dominance_frontiers::{compute_dominance_frontiers, DominanceFrontiers};
pub use dominators::DominatorTree;
pub use loops::{detect_natural_loops, normalize_loops, NaturalLoop};

use crate::ir::{Instr, Opcode};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Stable per-CFG block identity. Node indices are never reused or
/// renumbered once assigned, including across `insert_before`/`insert_after`,
/// so a `BlockId` captured before a rewrite stays valid after it.
pub type BlockId = NodeIndex;

/// The reserved label for the synthetic entry block every CFG starts with.
pub const SENTINEL_ENTRY: &str = "sentinel_entry";

/// A maximal straight-line instruction sequence with a single entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub instrs: Vec<Instr>,
}

impl BasicBlock {
    pub fn new(label: impl Into<String>) -> Self {
        BasicBlock {
            label: label.into(),
            instrs: Vec::new(),
        }
    }

    pub fn terminator(&self) -> Option<&Instr> {
        self.instrs.last().filter(|i| i.is_terminator())
    }
}

/// A control-flow graph over basic blocks, plus the block sequence
/// ("iteration order") serialization and fallthrough detection depend on.
/// Block insertion order is tracked explicitly in `order` because
/// `insert_before`/`insert_after` must be able to splice a node into the
/// middle of the sequence without petgraph renumbering existing indices.
#[derive(Debug, Clone)]
pub struct Cfg {
    graph: DiGraph<BasicBlock, ()>,
    order: Vec<NodeIndex>,
    label_to_node: HashMap<String, NodeIndex>,
    entry: NodeIndex,
}

impl Cfg {
    pub fn entry(&self) -> NodeIndex {
        self.entry
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.graph[id]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.graph[id]
    }

    pub fn node_by_label(&self, label: &str) -> Option<NodeIndex> {
        self.label_to_node.get(label).copied()
    }

    /// Blocks in deterministic iteration order (source order, as amended
    /// by `insert_before`/`insert_after`).
    pub fn order(&self) -> &[NodeIndex] {
        &self.order
    }

    pub fn successors(&self, id: BlockId) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(id, petgraph::Direction::Outgoing)
    }

    pub fn predecessors(&self, id: BlockId) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(id, petgraph::Direction::Incoming)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn graph(&self) -> &DiGraph<BasicBlock, ()> {
        &self.graph
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        self.graph.add_edge(from, to, ());
    }

    fn remove_edges_from(&mut self, node: NodeIndex) {
        let edges: Vec<_> = self
            .graph
            .edges_directed(node, petgraph::Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for e in edges {
            self.graph.remove_edge(e);
        }
    }

    /// Rebuild all outgoing edges of `node` from its current terminator.
    /// Used after rewriting a block's `labels` (loop normalization) or
    /// appending a terminator (terminator completion).
    fn relink_from_terminator(&mut self, node: NodeIndex) {
        self.remove_edges_from(node);
        let pos = self.order.iter().position(|&n| n == node);
        let targets = match self.block(node).terminator().and_then(|i| i.as_op()) {
            Some(op) if op.op.carries_labels() => op
                .labels
                .iter()
                .filter_map(|l| self.label_to_node.get(l).copied())
                .collect::<Vec<_>>(),
            Some(op) if op.op == Opcode::Ret => vec![],
            _ => {
                // No terminator yet: implicit fallthrough to the next
                // block in source order, used only pre-terminator-completion.
                match pos.and_then(|p| self.order.get(p + 1)) {
                    Some(&next) => vec![next],
                    None => vec![],
                }
            }
        };
        for t in targets {
            self.add_edge(node, t);
        }
    }

    /// Re-point `node`'s terminator from `old_label` to `new_label` in its
    /// `labels` field, then rebuild its edges. Used by loop normalization
    /// to redirect non-back-edge predecessors at the new pre-header and
    /// the latch at the new synthetic latch block.
    pub fn retarget_terminator(&mut self, node: NodeIndex, old_label: &str, new_label: &str) {
        if let Some(op) = self.block_mut(node).instrs.last_mut().and_then(|i| i.as_op_mut()) {
            for l in op.labels.iter_mut() {
                if l == old_label {
                    *l = new_label.to_string();
                }
            }
        }
        self.relink_from_terminator(node);
    }
}

/// Scan a flat instruction sequence into a CFG: a synthetic `sentinel_entry`
/// block is created first, and a new block starts at every label record.
pub fn build(instrs: &[Instr]) -> Cfg {
    let mut graph = DiGraph::new();
    let mut order = Vec::new();
    let mut label_to_node = HashMap::new();

    let entry = graph.add_node(BasicBlock::new(SENTINEL_ENTRY));
    order.push(entry);
    label_to_node.insert(SENTINEL_ENTRY.to_string(), entry);
    let mut current = entry;

    for instr in instrs {
        if let Instr::Label { label } = instr {
            if label != SENTINEL_ENTRY {
                let node = graph.add_node(BasicBlock::new(label.clone()));
                order.push(node);
                label_to_node.insert(label.clone(), node);
                current = node;
            }
        }
        graph[current].instrs.push(instr.clone());
    }

    let mut cfg = Cfg {
        graph,
        order,
        label_to_node,
        entry,
    };

    // Edge pass: control-flow terminators point at their named labels;
    // everything else gets a fallthrough edge to the next block.
    let nodes = cfg.order.clone();
    for node in nodes {
        cfg.relink_from_terminator(node);
    }

    cfg
}

/// Emit blocks in iteration order, concatenating their instruction lists.
/// Synthesizes a leading `sentinel_entry` label record if the first block
/// doesn't already start with one.
pub fn serialize(cfg: &Cfg) -> Vec<Instr> {
    let mut out = Vec::new();
    if let Some(&first) = cfg.order.first() {
        let needs_label = !matches!(
            cfg.block(first).instrs.first(),
            Some(Instr::Label { label }) if label == SENTINEL_ENTRY
        );
        if needs_label {
            out.push(Instr::label(SENTINEL_ENTRY));
        }
    }
    for &node in &cfg.order {
        out.extend(cfg.block(node).instrs.iter().cloned());
    }
    out
}

/// Append an explicit terminator to every block that falls off the end
/// without one: `jmp` to the next block in source order, or `ret` for the
/// last block. Updates CFG edges for newly added jumps.
pub fn add_terminators(cfg: &mut Cfg) {
    let order = cfg.order.clone();
    for (i, &node) in order.iter().enumerate() {
        let needs_terminator = !matches!(cfg.block(node).instrs.last(), Some(i) if i.is_terminator());
        if !needs_terminator {
            continue;
        }
        let new_instr = match order.get(i + 1) {
            Some(&next) => {
                let target = cfg.block(next).label.clone();
                Instr::op(crate::ir::OpInstr::new(Opcode::Jmp).with_labels(vec![target]))
            }
            None => Instr::op(crate::ir::OpInstr::new(Opcode::Ret)),
        };
        cfg.block_mut(node).instrs.push(new_instr);
        cfg.relink_from_terminator(node);
    }
}

/// Insert `block` into the iteration order immediately before `anchor`,
/// preserving all existing edges. The caller is responsible for wiring
/// the new block's own edges (it starts with none).
pub fn insert_before(cfg: &mut Cfg, block: BasicBlock, anchor: NodeIndex) -> NodeIndex {
    insert_at(cfg, block, anchor, 0)
}

/// Insert `block` into the iteration order immediately after `anchor`.
pub fn insert_after(cfg: &mut Cfg, block: BasicBlock, anchor: NodeIndex) -> NodeIndex {
    insert_at(cfg, block, anchor, 1)
}

fn insert_at(cfg: &mut Cfg, block: BasicBlock, anchor: NodeIndex, offset: usize) -> NodeIndex {
    let label = block.label.clone();
    let node = cfg.graph.add_node(block);
    let pos = cfg
        .order
        .iter()
        .position(|&n| n == anchor)
        .expect("anchor must be a member of this CFG");
    cfg.order.insert(pos + offset, node);
    cfg.label_to_node.insert(label, node);
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Literal, OpInstr, Type};

    fn instrs_diamond() -> Vec<Instr> {
        vec![
            Instr::op(OpInstr::new(Opcode::Const).with_dest("c", Type::bool()).with_value(Literal::Bool(true))),
            Instr::op(OpInstr::new(Opcode::Br).with_args(vec!["c".into()]).with_labels(vec!["left".into(), "right".into()])),
            Instr::label("left"),
            Instr::op(OpInstr::new(Opcode::Jmp).with_labels(vec!["end".into()])),
            Instr::label("right"),
            Instr::op(OpInstr::new(Opcode::Jmp).with_labels(vec!["end".into()])),
            Instr::label("end"),
            Instr::op(OpInstr::new(Opcode::Ret)),
        ]
    }

    #[test]
    fn build_creates_expected_blocks() {
        let cfg = build(&instrs_diamond());
        assert_eq!(cfg.node_count(), 4);
        assert_eq!(cfg.block(cfg.entry()).label, SENTINEL_ENTRY);
        let left = cfg.node_by_label("left").unwrap();
        let right = cfg.node_by_label("right").unwrap();
        let end = cfg.node_by_label("end").unwrap();
        assert_eq!(cfg.successors(cfg.entry()).count(), 2);
        assert_eq!(cfg.successors(left).collect::<Vec<_>>(), vec![end]);
        assert_eq!(cfg.successors(right).collect::<Vec<_>>(), vec![end]);
    }

    #[test]
    fn round_trip_is_stable() {
        let original = instrs_diamond();
        let cfg = build(&original);
        let out = serialize(&cfg);
        // The first block didn't carry an explicit sentinel_entry label in
        // the input, so one is synthesized on the way out.
        assert_eq!(out[0], Instr::label(SENTINEL_ENTRY));
        assert_eq!(&out[1..], &original[..]);
    }

    #[test]
    fn add_terminators_fills_fallthrough_blocks() {
        let instrs = vec![
            Instr::op(OpInstr::new(Opcode::Const).with_dest("a", Type::int()).with_value(Literal::Int(1))),
            Instr::label("next"),
            Instr::op(OpInstr::new(Opcode::Print).with_args(vec!["a".into()])),
        ];
        let mut cfg = build(&instrs);
        add_terminators(&mut cfg);
        assert!(cfg.block(cfg.entry()).terminator().unwrap().is_terminator());
        let next = cfg.node_by_label("next").unwrap();
        assert!(matches!(cfg.block(next).terminator().unwrap().as_op().unwrap().op, Opcode::Ret));
    }

    #[test]
    fn insert_before_splices_into_order() {
        let instrs = vec![
            Instr::label("h"),
            Instr::op(OpInstr::new(Opcode::Ret)),
        ];
        let mut cfg = build(&instrs);
        let h = cfg.node_by_label("h").unwrap();
        let pre = insert_before(&mut cfg, BasicBlock::new("h.preheader"), h);
        let idx_pre = cfg.order().iter().position(|&n| n == pre).unwrap();
        let idx_h = cfg.order().iter().position(|&n| n == h).unwrap();
        assert_eq!(idx_pre + 1, idx_h);
    }
}
