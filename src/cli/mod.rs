//! Command-line surface: one subcommand per pass, each a stdin-JSON ->
//! stdout-JSON filter.

pub mod pipeline;

use clap::{Parser, Subcommand};

/// `tacopt` — a suite of filters over the three-address JSON IR used in
/// CS6120-style compiler coursework: CFG construction, dominance, SSA,
/// local value numbering, dead-code elimination, a dataflow framework,
/// and loop-invariant code motion.
#[derive(Parser, Debug, Clone)]
#[command(name = "tacopt")]
#[command(author, version, about)]
pub struct Cli {
    /// Pretty-print the output JSON instead of emitting it compact.
    #[arg(global = true, long)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Local value numbering with copy propagation, per block.
    Lvn,
    /// Single-block dead-store elimination.
    LocalDce,
    /// Whole-function dead-code elimination, run to a fixpoint.
    GlobalDce,
    /// Print each function's immediate-dominator map.
    Dominators,
    /// Print each function's dominance frontiers.
    Frontiers,
    /// Print each function's natural loops.
    Loops,
    /// Synthesize pre-header/latch blocks for every natural loop.
    NormalizeLoops,
    /// Build SSA form (phi placement + dominator-tree renaming).
    ToSsa,
    /// Destruct SSA form back to ordinary copies.
    FromSsa,
    /// Forward constant propagation and folding.
    ConstProp,
    /// Backward live-variable analysis feeding a dead-code sweep.
    LiveDce,
    /// Points-to analysis feeding dead-store elimination.
    DeadStore,
    /// Loop-invariant code motion. Requires SSA input.
    Licm,
    /// Materialize an explicit terminator on every fallthrough block.
    AddTerminators,
    /// Run a comma-separated sequence of passes in order.
    Pipeline {
        /// e.g. `to-ssa,licm,from-ssa,global-dce`
        #[arg(long, value_delimiter = ',')]
        passes: Vec<String>,
    },
}

/// Dispatch a parsed CLI invocation. Reads the program from stdin, runs
/// the requested pass(es), and writes the result to stdout — the whole
/// output is buffered and written in one call, so a failing pass never
/// leaves a partial program on stdout.
pub fn run(cli: Cli) -> crate::error::Result<()> {
    match cli.command {
        Commands::Dominators => pipeline::run_query(pipeline::Query::Dominators, cli.pretty),
        Commands::Frontiers => pipeline::run_query(pipeline::Query::Frontiers, cli.pretty),
        Commands::Loops => pipeline::run_query(pipeline::Query::Loops, cli.pretty),
        Commands::Pipeline { passes } => pipeline::run_transform(&passes, cli.pretty),
        other => pipeline::run_transform(&[pipeline::pass_name(&other)], cli.pretty),
    }
}
