//! tileworld-sim binary
//!
//! Loads a world document, holds a scripted command set for a number of
//! ticks and prints the final snapshot as JSON.
//!
//! ## Configuration (CLI / env / settings file via `config` crate)
//!
//! | Key                        | Default           | Description                      |
//! |----------------------------|-------------------|----------------------------------|
//! | `TILEWORLD_WORLD`          | *(required)*      | World definition JSON            |
//! | `TILEWORLD_SETTINGS`       | *(none)*          | Settings file (TOML/JSON/YAML)   |
//! | `TILEWORLD_TICK_RATE_HZ`   | `30`              | Tick rate                        |
//! | `TILEWORLD_TICKS`          | `90`              | Ticks to run before exiting      |
//! | `TILEWORLD_HOLD`           | *(empty)*         | Held commands, e.g. `up,sprint`  |

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tileworld::{
    runner::{RunnerConfig, WorldRunner},
    settings::Settings,
    Command, CommandSet, WorldDefinition, WorldSession,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "tileworld-sim", about = "Tileworld headless simulator", version)]
struct Args {
    /// World definition document (JSON)
    #[arg(long, env = "TILEWORLD_WORLD")]
    world: PathBuf,

    /// Optional settings file
    #[arg(long, env = "TILEWORLD_SETTINGS")]
    settings: Option<PathBuf>,

    /// Tick rate (Hz), overrides the settings file
    #[arg(long, env = "TILEWORLD_TICK_RATE_HZ")]
    tick_rate_hz: Option<f64>,

    /// Number of ticks to simulate
    #[arg(long, env = "TILEWORLD_TICKS", default_value_t = 90)]
    ticks: u64,

    /// Comma separated commands held for the whole run (up, down, left, right, sprint)
    #[arg(long, env = "TILEWORLD_HOLD", value_delimiter = ',')]
    hold: Vec<String>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.settings.as_deref()).context("Failed to load settings")?;
    if let Some(hz) = args.tick_rate_hz {
        settings.tick_rate_hz = hz;
    }

    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(settings.log_filter.parse()?),
        )
        .init();

    let held: CommandSet = args
        .hold
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Command>())
        .collect::<Result<_, _>>()
        .context("Invalid --hold command")?;

    log::info!(
        "Starting tileworld-sim (world='{}', ticks={}, hold={:?})",
        args.world.display(),
        args.ticks,
        held,
    );

    let definition = WorldDefinition::from_path(&args.world)
        .with_context(|| format!("Failed to load world {}", args.world.display()))?;
    let session = WorldSession::build(&definition, settings.session_config())
        .context("Failed to build world session")?;
    let session = Arc::new(Mutex::new(session));

    let runner_config = RunnerConfig {
        tick_rate_hz: settings.tick_rate_hz,
        resize_debounce: settings.resize_debounce(),
        max_ticks: Some(args.ticks),
    };
    let (runner, handle) = WorldRunner::new(runner_config, session.clone());
    handle.hold(held);

    let ticks = runner.run().await?;

    let session = session.lock();
    log::info!("Ran {} ticks: {:?}", ticks, session.stats());
    println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    Ok(())
}
