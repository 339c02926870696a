use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tideline::{
    config::ServerConfig,
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
    web::{self, WebServerConfig},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Tideline hex-grid nation server")]
struct Cli {
    /// Server configuration YAML (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve a session over HTTP and tick it in real time
    Serve {
        #[arg(long, default_value = "scenarios/delta_coast.yaml")]
        scenario: PathBuf,

        /// Saved map to load over the generated one
        #[arg(long)]
        map: Option<PathBuf>,
    },
    /// Tick a session headlessly
    Run {
        #[arg(long, default_value = "scenarios/delta_coast.yaml")]
        scenario: PathBuf,

        /// Override tick count (uses scenario default when omitted)
        #[arg(long)]
        ticks: Option<u64>,

        /// Simulated seconds per tick
        #[arg(long)]
        tick_seconds: Option<f64>,

        /// Directory for snapshots
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Seat a placeholder player on every nation (implied by the
        /// scenario's `auto_seat`)
        #[arg(long)]
        seat_all: bool,
    },
    /// Write the scenario's generated map in the binary map format
    ExportMap {
        #[arg(long, default_value = "scenarios/delta_coast.yaml")]
        scenario: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let server = ServerConfig::load_or_default(cli.config.as_deref())?;
    init_tracing(&server.logging.level);
    let loader = ScenarioLoader::new(".");

    match cli.command {
        Command::Serve { scenario, map } => {
            let scenario = loader.load(&scenario)?;
            web::run(WebServerConfig {
                scenario,
                server,
                map,
            })
            .await
        }
        Command::Run {
            scenario,
            ticks,
            tick_seconds,
            snapshot_dir,
            seat_all,
        } => {
            let scenario = loader.load(&scenario)?;
            let ticks = scenario.ticks(ticks);
            let mut session = scenario.build_session();
            if seat_all || scenario.auto_seat {
                let seated = scenario.seat_nations(&mut session)?;
                info!(players = seated.len(), "run.nations_seated");
            }
            let mut engine = EngineBuilder::new(EngineSettings {
                scenario_name: scenario.name.clone(),
                tick_seconds: tick_seconds.unwrap_or_else(|| server.tick_seconds()),
                snapshot_interval_ticks: server.snapshot.interval_ticks,
                snapshot_dir: snapshot_dir.unwrap_or(server.snapshot.output_dir),
            })
            .with_standard_systems()
            .build();

            engine.run(&mut session, ticks)?;
            info!(
                scenario = %scenario.name,
                ticks,
                sea_level = session.clock().sea_level(),
                "run.completed"
            );
            Ok(())
        }
        Command::ExportMap { scenario, out } => {
            let scenario = loader.load(&scenario)?;
            let bytes = scenario.build_session().save_map();
            fs::write(&out, &bytes)
                .with_context(|| format!("Failed to write map {}", out.display()))?;
            info!(path = %out.display(), bytes = bytes.len(), "map.exported");
            Ok(())
        }
    }
}
