//! Natural loop detection, loop normalization, and loop-header queries.

use crate::cfg::dominators::DominatorTree;
use crate::cfg::{insert_after, insert_before, BasicBlock, Cfg};
use crate::ir::{Instr, OpInstr, Opcode};
use petgraph::graph::NodeIndex;
use std::collections::{HashSet, VecDeque};

/// A natural loop: `body` is exactly the set of nodes from which `latch`
/// is reachable without passing through `header`, identified by the
/// back edge `latch -> header`.
#[derive(Debug, Clone)]
pub struct NaturalLoop {
    pub header: NodeIndex,
    pub latch: NodeIndex,
    pub body: HashSet<NodeIndex>,
    pub pre_header: Option<NodeIndex>,
}

impl NaturalLoop {
    pub fn contains(&self, node: NodeIndex) -> bool {
        self.body.contains(&node)
    }
}

/// Detect every natural loop in the CFG: a back edge `u -> v` exists iff
/// `v` dominates `u`. One `NaturalLoop` is produced per back edge, so a
/// header shared by multiple latches yields multiple `NaturalLoop`s with
/// the same `header`.
pub fn detect_natural_loops(cfg: &Cfg, tree: &DominatorTree) -> Vec<NaturalLoop> {
    let mut loops = Vec::new();

    for &u in cfg.order() {
        for v in cfg.successors(u) {
            if tree.dominates(v, u) {
                let body = compute_loop_body(cfg, v, u);
                loops.push(NaturalLoop {
                    header: v,
                    latch: u,
                    body,
                    pre_header: None,
                });
            }
        }
    }

    loops
}

/// Reverse-reachability from `latch` up to (but not through) `header`.
fn compute_loop_body(cfg: &Cfg, header: NodeIndex, latch: NodeIndex) -> HashSet<NodeIndex> {
    let mut body = HashSet::new();
    let mut worklist = VecDeque::new();
    worklist.push_back(latch);

    while let Some(node) = worklist.pop_front() {
        if node == header || body.contains(&node) {
            continue;
        }
        body.insert(node);
        for pred in cfg.predecessors(node) {
            if pred != header && !body.contains(&pred) {
                worklist.push_back(pred);
            }
        }
    }

    body.insert(header);
    body
}

/// Normalize every loop header: synthesize a `<header>.preheader` block
/// (sole target of all non-back-edge in-edges) inserted just before the
/// header, and a `<header>.latch` block (target of every back edge)
/// inserted just after the textually last latch. Loops sharing a header
/// are normalized together so the header ends up with exactly one
/// non-back-edge predecessor (the pre-header).
///
/// Mutates `loops` in place to record the synthesized `pre_header`.
pub fn normalize_loops(cfg: &mut Cfg, loops: &mut [NaturalLoop]) {
    let mut headers: Vec<NodeIndex> = loops.iter().map(|l| l.header).collect();
    headers.sort_by_key(|n| n.index());
    headers.dedup();

    for header in headers {
        let header_label = cfg.block(header).label.clone();
        let pre_label = format!("{header_label}.preheader");
        let latch_label = format!("{header_label}.latch");

        let latches: Vec<NodeIndex> = loops
            .iter()
            .filter(|l| l.header == header)
            .map(|l| l.latch)
            .collect();

        let mut pre_header_block = BasicBlock::new(pre_label.clone());
        pre_header_block
            .instrs
            .push(Instr::label(pre_label.clone()));
        pre_header_block.instrs.push(Instr::op(
            OpInstr::new(Opcode::Jmp).with_labels(vec![header_label.clone()]),
        ));

        let mut latch_block = BasicBlock::new(latch_label.clone());
        latch_block.instrs.push(Instr::label(latch_label.clone()));
        latch_block.instrs.push(Instr::op(
            OpInstr::new(Opcode::Jmp).with_labels(vec![header_label.clone()]),
        ));

        let pre_header = insert_before(cfg, pre_header_block, header);

        let last_latch = *latches
            .iter()
            .max_by_key(|&&n| cfg.order().iter().position(|&o| o == n).unwrap_or(0))
            .expect("loop has at least one latch");
        let latch_node = insert_after(cfg, latch_block, last_latch);

        // Redirect every in-edge to the header that isn't a back edge.
        let preds: Vec<NodeIndex> = cfg.predecessors(header).collect();
        for pred in preds {
            if !latches.contains(&pred) {
                cfg.retarget_terminator(pred, &header_label, &pre_label);
            }
        }
        // Redirect every back edge (latch -> header) at the new latch.
        for &latch in &latches {
            cfg.retarget_terminator(latch, &header_label, &latch_label);
        }
        cfg.relink_from_terminator(pre_header);
        cfg.relink_from_terminator(latch_node);

        // The synthetic latch block is now the sole back-edge predecessor
        // and belongs to every loop that shares this header; the old
        // latches are still in the body, just one hop further from the
        // header than before.
        for l in loops.iter_mut().filter(|l| l.header == header) {
            l.pre_header = Some(pre_header);
            l.latch = latch_node;
            l.body.insert(latch_node);
        }
    }
}
