//! Generate validator key material.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use quorumchain_core::{DirKeyStore, GENESIS_ID};
use std::path::PathBuf;

#[derive(Args)]
pub struct KeygenArgs {
    /// Validator ids to generate keys for
    #[arg(short, long, value_delimiter = ',', required = true)]
    ids: Vec<String>,

    /// Key store directory
    #[arg(short, long, default_value = "validators")]
    keys: PathBuf,

    /// Skip generating the shared Genesis key
    #[arg(long)]
    no_genesis: bool,
}

pub fn run(args: KeygenArgs) -> Result<()> {
    println!("{}", "Generating validator keys...".bold().cyan());
    println!();

    let store = DirKeyStore::new(&args.keys);

    let mut ids = args.ids.clone();
    if !args.no_genesis && !ids.iter().any(|id| id == GENESIS_ID) {
        ids.push(GENESIS_ID.to_string());
    }

    for id in &ids {
        let keypair = store
            .generate_validator(id)
            .with_context(|| format!("failed to generate keys for {id:?}"))?;
        println!(
            "{}  {}: {}",
            "✓".green().bold(),
            id,
            keypair.public_key.to_base64().bright_yellow()
        );
    }

    println!();
    println!(
        "Keys written to {}",
        args.keys.display().to_string().bright_cyan()
    );
    Ok(())
}
