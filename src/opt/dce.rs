//! Local and global dead-code elimination.
//!
//! Both passes work by marking dead instructions as `nop` and then
//! compacting; neither ever touches an instruction that lacks a `dest`,
//! so ops whose only purpose is a side effect (`print`, `store`, `ret`,
//! branches) survive no matter what. `call` and `load` do carry a
//! `dest`, and a call kept only for its unused return value is eliminated
//! like any other dead definition — that's the whole of what the
//! invariant promises, not a guarantee that every call survives.

use crate::ir::Instr;
use std::collections::{HashMap, HashSet};

/// Single-block dead-store elimination: scan forward tracking the most
/// recent still-unused definition of each variable. A use clears the
/// entry; a redefinition while the prior one is still unused nops out
/// the prior instruction.
pub fn local_dce(instrs: &mut Vec<Instr>) {
    let mut pending: HashMap<String, usize> = HashMap::new();

    for i in 0..instrs.len() {
        for arg in instrs[i].args() {
            pending.remove(arg);
        }
        if let Some(dest) = instrs[i].dest() {
            let dest = dest.to_string();
            if let Some(&prev) = pending.get(&dest) {
                instrs[prev] = Instr::nop();
            }
            pending.insert(dest, i);
        }
    }

    instrs.retain(|i| !i.is_nop());
}

/// Whole-function dead-code elimination: an instruction with a `dest`
/// that no other instruction ever reads as an arg is dead. Removing it
/// can make another instruction dead in turn, so this runs to a
/// fixpoint.
pub fn global_dce(instrs: &mut Vec<Instr>) {
    loop {
        let used: HashSet<String> = instrs.iter().flat_map(|i| i.args()).cloned().collect();

        let mut changed = false;
        for instr in instrs.iter_mut() {
            if let Some(dest) = instr.dest() {
                if !used.contains(dest) {
                    *instr = Instr::nop();
                    changed = true;
                }
            }
        }

        instrs.retain(|i| !i.is_nop());
        if !changed {
            break;
        }
    }
}
