//! CLI commands module.

use anyhow::Result;
use clap::Subcommand;

mod keygen;
mod run;

#[derive(Subcommand)]
pub enum Commands {
    /// Generate validator key material
    Keygen(keygen::KeygenArgs),
    /// Run a validator node
    Run(run::RunArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Keygen(args) => keygen::run(args),
        Commands::Run(args) => run::run(args),
    }
}
