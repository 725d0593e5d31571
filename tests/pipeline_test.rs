//! End-to-end pass scenarios, run against the public library API rather
//! than the `tacopt` binary.

use tacopt::cfg::{add_terminators, build, detect_natural_loops, normalize_loops, serialize, DominatorTree};
use tacopt::dataflow::live_variable_dce;
use tacopt::ir::{Instr, Literal, OpInstr, Opcode, Type};
use tacopt::opt::{global_dce, licm, local_dce, lvn};
use tacopt::ssa::{construct_ssa, destruct_ssa};

fn op(o: Opcode) -> OpInstr {
    OpInstr::new(o)
}

#[test]
fn scenario_local_dce_drops_overwritten_const() {
    let mut instrs = vec![
        Instr::op(op(Opcode::Const).with_dest("a", Type::int()).with_value(Literal::Int(1))),
        Instr::op(op(Opcode::Const).with_dest("a", Type::int()).with_value(Literal::Int(2))),
        Instr::op(op(Opcode::Print).with_args(vec!["a".into()])),
    ];
    local_dce(&mut instrs);
    assert_eq!(instrs.len(), 2);
    assert_eq!(instrs[0].as_op().unwrap().value, Some(Literal::Int(2)));
    assert_eq!(instrs[1].as_op().unwrap().op, Opcode::Print);
}

#[test]
fn scenario_lvn_rewrites_redundant_add_as_id() {
    let mut instrs = vec![
        Instr::op(op(Opcode::Const).with_dest("a", Type::int()).with_value(Literal::Int(4))),
        Instr::op(op(Opcode::Const).with_dest("b", Type::int()).with_value(Literal::Int(4))),
        Instr::op(op(Opcode::Add).with_dest("c", Type::int()).with_args(vec!["a".into(), "b".into()])),
        Instr::op(op(Opcode::Add).with_dest("d", Type::int()).with_args(vec!["a".into(), "b".into()])),
        Instr::op(op(Opcode::Print).with_args(vec!["c".into()])),
        Instr::op(op(Opcode::Print).with_args(vec!["d".into()])),
    ];
    lvn(&mut instrs);
    let d = instrs[3].as_op().unwrap();
    assert_eq!(d.op, Opcode::Id);
    assert_eq!(d.args, vec!["c".to_string()]);
    assert!(instrs.iter().any(|i| matches!(i.as_op(), Some(o) if o.op == Opcode::Print && o.args == ["d"])));
}

#[test]
fn scenario_constant_folding_reduces_add_to_const() {
    let instrs = vec![
        Instr::op(op(Opcode::Const).with_dest("a", Type::int()).with_value(Literal::Int(2))),
        Instr::op(op(Opcode::Const).with_dest("b", Type::int()).with_value(Literal::Int(3))),
        Instr::op(op(Opcode::Add).with_dest("c", Type::int()).with_args(vec!["a".into(), "b".into()])),
        Instr::op(op(Opcode::Print).with_args(vec!["c".into()])),
        Instr::op(op(Opcode::Ret)),
    ];
    let mut cfg = build(&instrs);
    add_terminators(&mut cfg);
    tacopt::dataflow::const_prop_and_fold(&mut cfg).unwrap();
    let out = serialize(&cfg);
    let c = out.iter().find(|i| i.dest() == Some("c")).unwrap();
    assert_eq!(c.as_op().unwrap().op, Opcode::Const);
    assert_eq!(c.as_op().unwrap().value, Some(Literal::Int(5)));
}

#[test]
fn scenario_live_dce_drops_dead_branch_definition() {
    // if (p) { x = 1; y = 2 } else { x = 3 }; print x -- y is dead
    let instrs = vec![
        Instr::op(op(Opcode::Const).with_dest("p", Type::bool()).with_value(Literal::Bool(true))),
        Instr::op(op(Opcode::Br).with_args(vec!["p".into()]).with_labels(vec!["l".into(), "r".into()])),
        Instr::label("l"),
        Instr::op(op(Opcode::Const).with_dest("x", Type::int()).with_value(Literal::Int(1))),
        Instr::op(op(Opcode::Const).with_dest("y", Type::int()).with_value(Literal::Int(2))),
        Instr::op(op(Opcode::Jmp).with_labels(vec!["end".into()])),
        Instr::label("r"),
        Instr::op(op(Opcode::Const).with_dest("x", Type::int()).with_value(Literal::Int(3))),
        Instr::op(op(Opcode::Jmp).with_labels(vec!["end".into()])),
        Instr::label("end"),
        Instr::op(op(Opcode::Print).with_args(vec!["x".into()])),
        Instr::op(op(Opcode::Ret)),
    ];
    let mut cfg = build(&instrs);
    add_terminators(&mut cfg);
    live_variable_dce(&mut cfg).unwrap();

    let l = cfg.node_by_label("l").unwrap();
    assert!(!cfg.block(l).instrs.iter().any(|i| i.dest() == Some("y")));
    assert!(cfg.block(l).instrs.iter().any(|i| i.dest() == Some("x")));
}

#[test]
fn scenario_ssa_round_trip_on_while_loop_has_no_phis() {
    // i = 0; while (i < n) { i = i + 1 }; print i
    let instrs = vec![
        Instr::op(op(Opcode::Const).with_dest("i", Type::int()).with_value(Literal::Int(0))),
        Instr::op(op(Opcode::Const).with_dest("n", Type::int()).with_value(Literal::Int(10))),
        Instr::op(op(Opcode::Jmp).with_labels(vec!["header".into()])),
        Instr::label("header"),
        Instr::op(op(Opcode::Lt).with_dest("cond", Type::bool()).with_args(vec!["i".into(), "n".into()])),
        Instr::op(op(Opcode::Br).with_args(vec!["cond".into()]).with_labels(vec!["body".into(), "exit".into()])),
        Instr::label("body"),
        Instr::op(op(Opcode::Const).with_dest("one", Type::int()).with_value(Literal::Int(1))),
        Instr::op(op(Opcode::Add).with_dest("i", Type::int()).with_args(vec!["i".into(), "one".into()])),
        Instr::op(op(Opcode::Jmp).with_labels(vec!["header".into()])),
        Instr::label("exit"),
        Instr::op(op(Opcode::Print).with_args(vec!["i".into()])),
        Instr::op(op(Opcode::Ret)),
    ];
    let mut cfg = build(&instrs);
    add_terminators(&mut cfg);

    let mut types = std::collections::HashMap::new();
    types.insert("i".to_string(), Type::int());
    types.insert("n".to_string(), Type::int());
    types.insert("cond".to_string(), Type::bool());
    types.insert("one".to_string(), Type::int());
    construct_ssa(&mut cfg, &[], &types);

    let has_phi = |cfg: &tacopt::cfg::Cfg| {
        cfg.order()
            .iter()
            .any(|&n| cfg.block(n).instrs.iter().any(|i| matches!(i.as_op(), Some(o) if o.op == Opcode::Phi)))
    };
    assert!(has_phi(&cfg), "loop header should gain a phi for i");

    destruct_ssa(&mut cfg);
    assert!(!has_phi(&cfg));
}

#[test]
fn scenario_licm_hoists_invariant_mul_after_normalization() {
    // k, two invariant; loop: t = mul k 2; i = i + 1; br (i < n) loop end
    let instrs = vec![
        Instr::op(op(Opcode::Const).with_dest("i", Type::int()).with_value(Literal::Int(0))),
        Instr::op(op(Opcode::Const).with_dest("n", Type::int()).with_value(Literal::Int(10))),
        Instr::op(op(Opcode::Const).with_dest("k", Type::int()).with_value(Literal::Int(7))),
        Instr::op(op(Opcode::Const).with_dest("two", Type::int()).with_value(Literal::Int(2))),
        Instr::op(op(Opcode::Jmp).with_labels(vec!["loop".into()])),
        Instr::label("loop"),
        Instr::op(op(Opcode::Mul).with_dest("t", Type::int()).with_args(vec!["k".into(), "two".into()])),
        Instr::op(op(Opcode::Const).with_dest("one", Type::int()).with_value(Literal::Int(1))),
        Instr::op(op(Opcode::Add).with_dest("i", Type::int()).with_args(vec!["i".into(), "one".into()])),
        Instr::op(op(Opcode::Lt).with_dest("c", Type::bool()).with_args(vec!["i".into(), "n".into()])),
        Instr::op(op(Opcode::Br).with_args(vec!["c".into()]).with_labels(vec!["loop".into(), "end".into()])),
        Instr::label("end"),
        Instr::op(op(Opcode::Print).with_args(vec!["t".into()])),
        Instr::op(op(Opcode::Ret)),
    ];
    let mut cfg = build(&instrs);
    add_terminators(&mut cfg);

    let tree = DominatorTree::new(&cfg);
    let mut loops = detect_natural_loops(&cfg, &tree);
    normalize_loops(&mut cfg, &mut loops);
    licm(&mut cfg, &loops, &[]);

    let preheader = cfg.node_by_label("loop.preheader").unwrap();
    assert!(cfg.block(preheader).instrs.iter().any(|i| matches!(i.as_op(), Some(o) if o.op == Opcode::Mul)));

    let header = loops[0].header;
    assert!(!cfg.block(header).instrs.iter().any(|i| matches!(i.as_op(), Some(o) if o.op == Opcode::Mul)));
}

#[test]
fn scenario_dead_store_elimination_drops_overwritten_store() {
    let instrs = vec![
        Instr::op(op(Opcode::Const).with_dest("one", Type::int()).with_value(Literal::Int(1))),
        Instr::op(op(Opcode::Alloc).with_dest("p", Type::Ptr { ptr: Box::new(Type::int()) }).with_args(vec!["one".into()])),
        Instr::op(op(Opcode::Const).with_dest("a", Type::int()).with_value(Literal::Int(1))),
        Instr::op(op(Opcode::Store).with_args(vec!["p".into(), "a".into()])),
        Instr::op(op(Opcode::Const).with_dest("b", Type::int()).with_value(Literal::Int(2))),
        Instr::op(op(Opcode::Store).with_args(vec!["p".into(), "b".into()])),
        Instr::op(op(Opcode::Load).with_dest("x", Type::int()).with_args(vec!["p".into()])),
        Instr::op(op(Opcode::Print).with_args(vec!["x".into()])),
        Instr::op(op(Opcode::Ret)),
    ];
    let mut cfg = build(&instrs);
    add_terminators(&mut cfg);
    tacopt::dataflow::dead_store_elimination(&mut cfg, &[]).unwrap();

    let stores: Vec<&Instr> = cfg
        .order()
        .iter()
        .flat_map(|&n| cfg.block(n).instrs.iter())
        .filter(|i| matches!(i.as_op(), Some(o) if o.op == Opcode::Store))
        .collect();
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].as_op().unwrap().args, vec!["p".to_string(), "b".to_string()]);
}

#[test]
fn scenario_global_dce_removes_transitively_unused_chain() {
    let mut instrs = vec![
        Instr::op(op(Opcode::Const).with_dest("a", Type::int()).with_value(Literal::Int(1))),
        Instr::op(op(Opcode::Id).with_dest("b", Type::int()).with_args(vec!["a".into()])),
        Instr::op(op(Opcode::Const).with_dest("c", Type::int()).with_value(Literal::Int(2))),
        Instr::op(op(Opcode::Print).with_args(vec!["c".into()])),
        Instr::op(op(Opcode::Ret)),
    ];
    global_dce(&mut instrs);
    assert!(!instrs.iter().any(|i| i.dest() == Some("a") || i.dest() == Some("b")));
    assert!(instrs.iter().any(|i| i.dest() == Some("c")));
}
