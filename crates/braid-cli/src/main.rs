//! Braid CLI
//!
//! Command-line interface for running Braid nodes.

use braid_node::{BraidNode, NodeConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "braid")]
#[command(author = "Braidnet Labs")]
#[command(version = "0.1.0")]
#[command(about = "Braid - Byzantine fault-tolerant gossip ledger node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a Braid node
    Node {
        /// Configuration file path
        #[arg(short, long, default_value = "braid.toml")]
        config: PathBuf,

        /// Data directory; overrides the configured one
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Version information
    Version,
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Node { config, data_dir } => {
            let mut node_config = NodeConfig::load(&config)?;
            if let Some(data_dir) = data_dir {
                node_config.node.data_dir = data_dir.display().to_string();
            }

            tracing::info!("Chain ID: {}", node_config.node.chain_id);
            tracing::info!("Config: {:?}", config);
            tracing::info!("Data: {}", node_config.node.data_dir);

            std::fs::create_dir_all(&node_config.node.data_dir)?;

            let mut node = BraidNode::new(node_config);
            node.run().await?;
        }

        Commands::Version => {
            println!("Braid v0.1.0");
            println!("Build: release");
            println!();
            println!("Features:");
            println!("  - Gossip event DAG with orphan resolution");
            println!("  - Per-peer intake backpressure");
            println!("  - Synthetic snapshot reconnect bootstrap");
        }
    }

    Ok(())
}
