//! CLI Entry Point for xy-stage
//!
//! Connects to the configured X and Y stage controllers, runs one command and
//! disconnects.
//!
//! # Usage
//!
//! ```bash
//! xy-stage position
//! xy-stage move 10.0 5.0
//! xy-stage home --no-wait
//! xy-stage selftest --x 10.0 --y 5.0
//! xy-stage run coords.csv --dwell 3.0
//! xy-stage --config bench.toml show-config
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use stage_core::{AxisDriverFactory, DriverError, DriverErrorKind};
use stage_driver_mock::MockAxisFactory;
use std::path::PathBuf;
use tracing::{error, info};
use xy_stage::config::{AppConfig, RunnerConfig, DEFAULT_CONFIG_PATH};
use xy_stage::path_runner::{self, PathRunner};
use xy_stage::tracing_setup::{self, TracingConfig};
use xy_stage::{MotionError, MotionSystem};

#[derive(Parser)]
#[command(name = "xy-stage")]
#[command(about = "Two-axis motorized stage control", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current stage position
    Position,

    /// Move both stages to an absolute position
    Move {
        /// Target X position
        #[arg(allow_hyphen_values = true)]
        x: f64,
        /// Target Y position
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },

    /// Home both stages
    Home {
        /// Return once the home commands are accepted
        #[arg(long)]
        no_wait: bool,
    },

    /// Connect, read, move to a test point, home, disconnect
    Selftest {
        /// Test X position
        #[arg(long, default_value_t = 10.0, allow_hyphen_values = true)]
        x: f64,
        /// Test Y position
        #[arg(long, default_value_t = 5.0, allow_hyphen_values = true)]
        y: f64,
    },

    /// Visit every X,Y point listed in a coordinate file
    Run {
        /// Comma-separated coordinate file, one X,Y pair per line
        file: PathBuf,
        /// Seconds to stay at each point (overrides `runner.dwell_s`)
        #[arg(long)]
        dwell: Option<f64>,
        /// Start from the current position instead of the origin
        #[arg(long)]
        no_origin: bool,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_validated(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.application.log_level = level;
    }

    let tracing_config = TracingConfig::from_app_config(&config).map_err(anyhow::Error::msg)?;
    tracing_setup::init(tracing_config).map_err(anyhow::Error::msg)?;

    if matches!(cli.command, Commands::ShowConfig) {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let factory = driver_factory(&config)?;
    info!(
        app = %config.application.name,
        driver = factory.name(),
        "Stage driver selected"
    );

    let mut motion = MotionSystem::from_config(factory, &config.motion)?;
    let outcome = match cli.command {
        Commands::Run {
            file,
            dwell,
            no_origin,
        } => run_path(&mut motion, &config.runner, &file, dwell, no_origin),
        command => {
            motion.connect()?;
            let outcome = run(&mut motion, command);
            motion.disconnect();
            outcome
        }
    };

    if let Err(e) = &outcome {
        error!(error = %e, "Command failed");
    }
    outcome
}

/// Startup capability check: only drivers compiled into this binary are usable.
fn driver_factory(config: &AppConfig) -> Result<Box<dyn AxisDriverFactory>, MotionError> {
    match config.motion.driver.as_str() {
        "mock" => Ok(Box::new(MockAxisFactory::with_config(config.mock.clone()))),
        other => Err(MotionError::DriverUnavailable(DriverError::new(
            other,
            DriverErrorKind::Unavailable,
            "driver is not available in this build",
        ))),
    }
}

fn run<F: AxisDriverFactory>(motion: &mut MotionSystem<F>, command: Commands) -> Result<()> {
    match command {
        Commands::Position => {
            println!("{}", motion.get_position()?);
        }
        Commands::Move { x, y } => {
            motion.move_to(x, y)?;
            println!("{}", motion.get_position()?);
        }
        Commands::Home { no_wait } => {
            motion.home(!no_wait)?;
        }
        Commands::Selftest { x, y } => selftest(motion, x, y)?,
        Commands::Run { .. } | Commands::ShowConfig => {
            bail!("command is not a single-session stage command")
        }
    }
    Ok(())
}

/// Load the coordinate file first, then let the runner own the connection.
fn run_path<F: AxisDriverFactory>(
    motion: &mut MotionSystem<F>,
    runner_config: &RunnerConfig,
    file: &std::path::Path,
    dwell: Option<f64>,
    no_origin: bool,
) -> Result<()> {
    let points = path_runner::load_coordinates(file)
        .with_context(|| format!("Failed to load coordinates from {}", file.display()))?;

    let mut runner_config = runner_config.clone();
    if let Some(dwell) = dwell {
        runner_config.dwell_s = dwell;
    }
    if no_origin {
        runner_config.start_at_origin = false;
    }

    let runner = PathRunner::from_config(points, &runner_config)?;
    println!(
        "{} points, estimated {}",
        runner.points().len(),
        path_runner::format_hms(runner.estimate_duration())
    );

    let report = runner.run(motion)?;
    println!(
        "visited {} points in {}",
        report.points_visited,
        path_runner::format_hms(report.elapsed)
    );
    Ok(())
}

fn selftest<F: AxisDriverFactory>(motion: &mut MotionSystem<F>, x: f64, y: f64) -> Result<()> {
    info!("Testing motion system");

    let initial = motion.get_position()?;
    info!(%initial, "Initial position");

    info!(x, y, "Moving to test point");
    motion.move_to(x, y)?;
    let moved = motion.get_position()?;
    info!(%moved, "Position after move");

    info!("Homing");
    motion.home(true)?;
    let homed = motion.get_position()?;
    info!(%homed, "Position after homing");

    println!("initial {initial}\nmoved   {moved}\nhomed   {homed}");
    info!("Motion system self-test finished");
    Ok(())
}
