// tacopt: optimization and analysis passes over a JSON three-address IR.

#![allow(dead_code)]

use clap::Parser;

mod cfg;
mod cli;
mod dataflow;
mod error;
mod ir;
mod opt;
mod ssa;

use cli::Cli;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    cli::run(cli).map_err(|e| anyhow::anyhow!(e))
}
