//! Shared stdin/stdout plumbing and per-pass dispatch for the `tacopt`
//! subcommands.

use crate::cfg::{add_terminators, build, detect_natural_loops, normalize_loops, serialize, compute_dominance_frontiers, DominatorTree};
use crate::dataflow::{const_prop_and_fold, dead_store_elimination, live_variable_dce};
use crate::error::{Result, TacError};
use crate::ir::{Function, Program, Type};
use crate::opt::{global_dce, licm, local_dce, lvn};
use crate::ssa::{construct_ssa, destruct_ssa};
use std::collections::HashMap;
use std::io::Write;

use super::Commands;

pub fn pass_name(cmd: &Commands) -> String {
    match cmd {
        Commands::Lvn => "lvn",
        Commands::LocalDce => "local-dce",
        Commands::GlobalDce => "global-dce",
        Commands::NormalizeLoops => "normalize-loops",
        Commands::ToSsa => "to-ssa",
        Commands::FromSsa => "from-ssa",
        Commands::ConstProp => "const-prop",
        Commands::LiveDce => "live-dce",
        Commands::DeadStore => "dead-store",
        Commands::Licm => "licm",
        Commands::AddTerminators => "add-terminators",
        Commands::Dominators | Commands::Frontiers | Commands::Loops | Commands::Pipeline { .. } => {
            unreachable!("query and pipeline commands dispatch directly, never through pass_name")
        }
    }
    .to_string()
}

fn read_program() -> Result<Program> {
    serde_json::from_reader(std::io::stdin().lock()).map_err(TacError::from)
}

fn write_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut handle, value)?;
    } else {
        serde_json::to_writer(&mut handle, value)?;
    }
    handle.write_all(b"\n")?;
    Ok(())
}

fn arg_names(function: &Function) -> Vec<String> {
    function.args.iter().map(|a| a.name.clone()).collect()
}

/// Every variable's declared type, gathered from the function's formal
/// arguments plus every instruction that carries one — enough to give
/// synthesized instructions (phis, hoisted invariants) the right type.
fn collect_types(function: &Function) -> HashMap<String, Type> {
    let mut types = HashMap::new();
    for arg in &function.args {
        types.insert(arg.name.clone(), arg.ty.clone());
    }
    for instr in &function.instrs {
        if let Some(op) = instr.as_op() {
            if let (Some(dest), Some(ty)) = (&op.dest, &op.ty) {
                types.insert(dest.clone(), ty.clone());
            }
        }
    }
    types
}

/// Apply one named pass to a single function, in place.
fn apply_pass(name: &str, function: &mut Function) -> Result<()> {
    match name {
        "lvn" => {
            let mut cfg = build(&function.instrs);
            for &node in &cfg.order().to_vec() {
                lvn(&mut cfg.block_mut(node).instrs);
            }
            function.instrs = serialize(&cfg);
        }
        "local-dce" => {
            let mut cfg = build(&function.instrs);
            for &node in &cfg.order().to_vec() {
                local_dce(&mut cfg.block_mut(node).instrs);
            }
            function.instrs = serialize(&cfg);
        }
        "global-dce" => {
            global_dce(&mut function.instrs);
        }
        "add-terminators" => {
            let mut cfg = build(&function.instrs);
            add_terminators(&mut cfg);
            function.instrs = serialize(&cfg);
        }
        "normalize-loops" => {
            let mut cfg = build(&function.instrs);
            add_terminators(&mut cfg);
            let tree = DominatorTree::new(&cfg);
            let mut loops = detect_natural_loops(&cfg, &tree);
            normalize_loops(&mut cfg, &mut loops);
            function.instrs = serialize(&cfg);
        }
        "to-ssa" => {
            let mut cfg = build(&function.instrs);
            add_terminators(&mut cfg);
            let names = arg_names(function);
            let types = collect_types(function);
            construct_ssa(&mut cfg, &names, &types);
            function.instrs = serialize(&cfg);
        }
        "from-ssa" => {
            let mut cfg = build(&function.instrs);
            add_terminators(&mut cfg);
            destruct_ssa(&mut cfg);
            function.instrs = serialize(&cfg);
        }
        "const-prop" => {
            let mut cfg = build(&function.instrs);
            add_terminators(&mut cfg);
            const_prop_and_fold(&mut cfg)?;
            function.instrs = serialize(&cfg);
        }
        "live-dce" => {
            let mut cfg = build(&function.instrs);
            add_terminators(&mut cfg);
            live_variable_dce(&mut cfg)?;
            function.instrs = serialize(&cfg);
        }
        "dead-store" => {
            let mut cfg = build(&function.instrs);
            add_terminators(&mut cfg);
            let names = arg_names(function);
            dead_store_elimination(&mut cfg, &names)?;
            function.instrs = serialize(&cfg);
        }
        "licm" => {
            let mut cfg = build(&function.instrs);
            add_terminators(&mut cfg);
            let tree = DominatorTree::new(&cfg);
            let loops = detect_natural_loops(&cfg, &tree);
            let names = arg_names(function);
            licm(&mut cfg, &loops, &names);
            function.instrs = serialize(&cfg);
        }
        other => return Err(TacError::UnsupportedIr(format!("unknown pass: {other}"))),
    }
    Ok(())
}

/// Run `passes` over every function in order, then write the result.
pub fn run_transform(passes: &[String], pretty: bool) -> Result<()> {
    let mut program = read_program()?;
    for function in &mut program.functions {
        for pass in passes {
            apply_pass(pass, function)?;
        }
    }
    let value = serde_json::to_value(&program)?;
    write_json(&value, pretty)
}

pub enum Query {
    Dominators,
    Frontiers,
    Loops,
}

/// Run a read-only analysis over every function and print its result as
/// JSON, keyed by function name. Unlike the transform passes, the output
/// isn't a valid `Program` — there's no sense in which dominators or
/// loops round-trip back through the IR.
pub fn run_query(query: Query, pretty: bool) -> Result<()> {
    let program = read_program()?;
    let mut functions = serde_json::Map::new();

    for function in &program.functions {
        let mut cfg = build(&function.instrs);
        add_terminators(&mut cfg);
        let tree = DominatorTree::new(&cfg);

        let entry = match query {
            Query::Dominators => {
                let mut idoms = serde_json::Map::new();
                for &node in cfg.order() {
                    let label = cfg.block(node).label.clone();
                    let idom = tree.immediate_dominator(node).map(|n| cfg.block(n).label.clone());
                    idoms.insert(label, serde_json::json!(idom));
                }
                serde_json::Value::Object(idoms)
            }
            Query::Frontiers => {
                let frontiers = compute_dominance_frontiers(&cfg, &tree);
                let mut map = serde_json::Map::new();
                for &node in cfg.order() {
                    let label = cfg.block(node).label.clone();
                    let mut members: Vec<String> = frontiers.frontier(node).iter().map(|&n| cfg.block(n).label.clone()).collect();
                    members.sort();
                    map.insert(label, serde_json::json!(members));
                }
                serde_json::Value::Object(map)
            }
            Query::Loops => {
                let loops = detect_natural_loops(&cfg, &tree);
                let items: Vec<serde_json::Value> = loops
                    .iter()
                    .map(|l| {
                        let mut body: Vec<String> = l.body.iter().map(|&n| cfg.block(n).label.clone()).collect();
                        body.sort();
                        serde_json::json!({
                            "header": cfg.block(l.header).label,
                            "latch": cfg.block(l.latch).label,
                            "body": body,
                        })
                    })
                    .collect();
                serde_json::Value::Array(items)
            }
        };

        functions.insert(function.name.clone(), entry);
    }

    write_json(&serde_json::Value::Object(functions), pretty)
}
