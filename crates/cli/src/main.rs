//! quorumchain CLI entry point.

use clap::Parser;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "quorumchain")]
#[command(about = "A permissioned, round-based block agreement network", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<commands::Commands>,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(cmd) => {
            if let Err(e) = commands::run(cmd) {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
        None => {
            println!("quorumchain - a permissioned block agreement network");
            println!("Run 'quorumchain --help' for usage information.");
        }
    }
}
