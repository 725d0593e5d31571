//! Local value numbering with copy propagation.
//!
//! Operates on a single basic block's instruction list in place. Never
//! moves instructions across block boundaries, never touches
//! side-effecting ops beyond normalizing their arguments, and never
//! exploits commutativity (`add a b` and `add b a` are distinct, per the
//! reference's documented weakness).

use crate::ir::{Instr, Literal, Opcode};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Number {
    Const(Literal),
    Id(String),
    Uninferable,
    Expr(Opcode, Vec<String>),
}

/// Run LVN over one block's instructions, rewriting redundant
/// computations into `id` copies and propagating copies to their
/// ultimate source.
pub fn lvn(instrs: &mut [Instr]) {
    // Insertion-ordered: `order` tracks keys in the sequence they were
    // first assigned, `table` gives O(1) lookup by dest name.
    let mut order: Vec<String> = Vec::new();
    let mut table: HashMap<String, Number> = HashMap::new();

    let set = |order: &mut Vec<String>, table: &mut HashMap<String, Number>, key: String, value: Number| {
        if !table.contains_key(&key) {
            order.push(key.clone());
        }
        table.insert(key, value);
    };

    for instr in instrs.iter_mut() {
        let Instr::Op(op) = instr else { continue };
        if op.args.is_empty() && op.dest.is_none() {
            continue;
        }

        let canonical_args: Vec<String> = op
            .args
            .iter()
            .map(|arg| {
                let canon = normalize(arg, &table);
                if !table.contains_key(&canon) {
                    set(&mut order, &mut table, canon.clone(), Number::Uninferable);
                }
                canon
            })
            .collect();
        op.args = canonical_args.clone();

        let Some(dest) = op.dest.clone() else { continue };

        match op.op {
            Opcode::Const => {
                let value = op.value.expect("const carries a value");
                set(&mut order, &mut table, dest, Number::Const(value));
            }
            Opcode::Id => {
                let source = canonical_args[0].clone();
                set(&mut order, &mut table, dest, Number::Id(source));
            }
            other if other.has_side_effects() => {
                // A side-effecting op that happens to define a dest
                // (`call`, `load`) is never deduplicated or rewritten;
                // its result is opaque to later lookups.
                set(&mut order, &mut table, dest, Number::Uninferable);
            }
            _ => {
                let expr = Number::Expr(op.op, canonical_args.clone());
                let existing = order.iter().find(|k| table.get(*k) == Some(&expr)).cloned();
                match existing {
                    Some(key) => {
                        op.op = Opcode::Id;
                        op.args = vec![key.clone()];
                        set(&mut order, &mut table, dest, Number::Id(key));
                    }
                    None => {
                        set(&mut order, &mut table, dest, expr);
                    }
                }
            }
        }
    }
}

fn normalize(var: &str, table: &HashMap<String, Number>) -> String {
    let mut current = var.to_string();
    loop {
        match table.get(&current) {
            Some(Number::Id(source)) => current = source.clone(),
            _ => return current,
        }
    }
}
