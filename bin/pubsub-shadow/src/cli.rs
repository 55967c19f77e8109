//! Command line entry point.

use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, WrapErr};
use pubsub_shadow_node::{Exit, FaultArgs, NodeConfig, PublishArgs, SimulationArgs, run_node};
use pubsub_shadow_observability::{LogArgs, init_logging};
use pubsub_shadow_overlay::OverlayArgs;
use std::path::PathBuf;
use tracing::info;

/// Gossipsub simulation node.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration (applies to all subcommands).
    #[command(flatten)]
    logs: LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run a simulation node.
    Node(NodeArgs),

    /// Summarise message arrival and duplicates from node logs.
    Analyze {
        /// Node log files, one per node.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Arguments for the `node` command.
#[derive(Debug, clap::Args)]
pub(crate) struct NodeArgs {
    #[command(flatten)]
    simulation: SimulationArgs,

    #[command(flatten)]
    overlay: OverlayArgs,

    #[command(flatten)]
    publish: PublishArgs,

    #[command(flatten)]
    fault: FaultArgs,

    /// TOML file layered over the flags and environment.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl NodeArgs {
    fn into_config(self) -> eyre::Result<NodeConfig> {
        let base = NodeConfig {
            simulation: self.simulation,
            overlay: self.overlay,
            publish: self.publish,
            fault: self.fault,
        };
        base.load(self.config.as_deref())
            .wrap_err("invalid node configuration")
    }
}

pub(crate) async fn run() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(&cli.logs)?;

    match cli.command {
        Commands::Node(args) => {
            let config = args.into_config()?;
            match run_node(config).await? {
                Exit::Completed => info!("Node loop finished"),
                Exit::Shutdown(request) => info!(trigger = %request.trigger, "Node shut down"),
            }
        }
        Commands::Analyze { files } => {
            let analysis = pubsub_shadow_analysis::analyze_files(&files)
                .wrap_err("failed to analyse logs")?;
            println!("{analysis}");
        }
    }

    Ok(())
}
