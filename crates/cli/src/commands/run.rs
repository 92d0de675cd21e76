//! Run a validator node: wire the key store, ledger, engine, and transport
//! together and drive them from an interactive prompt.

use crate::config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use quorumchain_consensus::{Engine, EngineConfig};
use quorumchain_core::DirKeyStore;
use quorumchain_ledger::Ledger;
use quorumchain_transport::Transport;
use std::io::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Args)]
pub struct RunArgs {
    /// Validator identity
    #[arg(short, long)]
    id: String,

    /// CSV file describing the whole deployment (overrides the flags below)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Peer addresses, host:port, comma separated
    #[arg(long, value_delimiter = ',')]
    peers: Vec<SocketAddr>,

    /// Shared reference model string
    #[arg(short, long)]
    model: Option<String>,

    /// Assumed upper bound on faulty validators
    #[arg(short, long)]
    faulty: Option<u32>,

    /// Round timeout in seconds
    #[arg(short, long)]
    timeout_secs: Option<u64>,

    /// Key store directory
    #[arg(short, long, default_value = "validators")]
    keys: PathBuf,
}

struct NodeSettings {
    port: u16,
    peers: Vec<SocketAddr>,
    model: String,
    faulty: u32,
    timeout: Duration,
}

fn resolve_settings(args: &RunArgs) -> Result<NodeSettings> {
    if let Some(path) = &args.config {
        let configs = config::load(path)?;
        let own = config::find(&configs, &args.id)?;
        return Ok(NodeSettings {
            port: own.port,
            peers: config::peers_for(&configs, &args.id),
            model: own.model.clone(),
            faulty: own.faulty,
            timeout: Duration::from_secs(own.timeout_secs),
        });
    }

    Ok(NodeSettings {
        port: args.port.context("--port is required without --config")?,
        peers: args.peers.clone(),
        model: args
            .model
            .clone()
            .context("--model is required without --config")?,
        faulty: args.faulty.context("--faulty is required without --config")?,
        timeout: Duration::from_secs(
            args.timeout_secs
                .context("--timeout-secs is required without --config")?,
        ),
    })
}

pub fn run(args: RunArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(node_loop(args))
}

async fn node_loop(args: RunArgs) -> Result<()> {
    let settings = resolve_settings(&args)?;

    let keystore = DirKeyStore::new(&args.keys);
    let ledger = Ledger::new(&args.id, &settings.model, settings.faulty, &keystore)
        .context("failed to initialize ledger")?;

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let (engine, handle) = Engine::new(
        ledger,
        EngineConfig {
            timeout: settings.timeout,
        },
        settings.peers.len(),
        outbound_tx,
    )
    .context("failed to start consensus engine")?;

    let listen: SocketAddr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let transport = Arc::new(
        Transport::bind(listen, settings.peers, handle.inbound_sender())
            .await
            .with_context(|| format!("failed to bind {listen}"))?,
    );

    tokio::spawn(engine.run());
    let broadcaster = Arc::clone(&transport);
    tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            broadcaster.broadcast(&msg).await;
        }
    });

    println!(
        "{} {} listening on {}, {} peers",
        "Validator".bold().cyan(),
        args.id.bold(),
        transport.local_addr(),
        transport.peer_count()
    );
    println!("Commands: chain | json | propose <data-path> | validate | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "quorumchain>".bold());
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let mut words = line.split_whitespace();
        match words.next() {
            Some("chain") => print!("{}", handle.render_chain()),
            Some("json") => {
                let snapshot = handle.snapshot();
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
            Some("propose") => match words.next() {
                Some(path) => match handle.propose(path) {
                    Ok(block) => println!(
                        "{} proposed block {} for round {}",
                        "✓".green().bold(),
                        block.hash.bright_yellow(),
                        block.index
                    ),
                    Err(e) => println!("{} {e}", "✗".red().bold()),
                },
                None => println!("usage: propose <data-path>"),
            },
            Some("validate") => {
                if handle.validate_chain() {
                    println!("{} chain is valid", "✓".green().bold());
                } else {
                    println!("{} chain is INVALID", "✗".red().bold());
                }
            }
            Some("quit") | Some("exit") => break,
            Some(other) => println!("unknown command: {other}"),
            None => {}
        }
    }
    Ok(())
}
