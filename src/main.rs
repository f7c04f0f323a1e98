//! Command-line entry point: run a match locally against spawned agent
//! subprocesses, or serve it over TCP.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;

use grid_arena::channel::spawn_agents;
use grid_arena::config::{MapConfig, MatchSettings};
use grid_arena::logger::init_logger;
use grid_arena::match_loop::MatchLoop;
use grid_arena::server::serve;
use grid_arena::world::World;

#[derive(Parser)]
#[command(
    name = "grid-arena",
    about = "Turn-based grid combat server for autonomous agents",
    version
)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    /// Write logs to a timestamped file instead of stderr
    #[arg(long, global = true)]
    log_file: bool,

    /// Where to persist the match log
    #[arg(long, global = true, default_value = "result.json")]
    output: PathBuf,

    /// Hard cap on match length, in ticks
    #[arg(long, global = true, default_value_t = 100)]
    max_ticks: u32,

    /// Per-agent deadline for delivering a message, in milliseconds
    #[arg(long, global = true, default_value_t = 2000)]
    response_timeout_ms: u64,

    /// Per-agent deadline for a command batch, in milliseconds
    #[arg(long, global = true, default_value_t = 5000)]
    execution_timeout_ms: u64,
}

#[derive(Subcommand)]
enum Mode {
    /// Spawn agent subprocesses and run the match locally
    Local {
        /// Path to the JSON map file
        #[arg(long)]
        map: PathBuf,

        /// Shell commands starting the agents, one per team
        #[arg(required = true)]
        strategies: Vec<String>,
    },
    /// Wait for agents over TCP, then run the match
    Serve {
        /// Path to the JSON map file
        #[arg(long)]
        map: PathBuf,

        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(long)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_file);

    let settings = MatchSettings::new()
        .with_max_ticks(cli.max_ticks)
        .with_response_timeout(Duration::from_millis(cli.response_timeout_ms))
        .with_execution_timeout(Duration::from_millis(cli.execution_timeout_ms))
        .with_log_path(cli.output.clone());

    let world = match cli.mode {
        Mode::Local { map, strategies } => {
            let config = MapConfig::load(&map)?;
            let world = World::from_config(&config)?;
            let teams = world.remaining_teams().len();
            if strategies.len() != teams {
                bail!("{teams} teams on the map but {} strategies given", strategies.len());
            }
            let channels = spawn_agents(&strategies)?;
            MatchLoop::new(world, channels, settings).run().await?
        }
        Mode::Serve { map, host, port } => {
            let config = MapConfig::load(&map)?;
            let world = World::from_config(&config)?;
            serve(&format!("{host}:{port}"), world, settings).await?
        }
    };

    info!(
        ticks = world.ticks(),
        winners = ?world.winners(),
        log = %cli.output.display(),
        "match finished"
    );
    Ok(())
}
