// CLI entry point for Wayfield.
//
// Builds nav meshes from scene files into a mesh store and queries them.
// See `commands.rs` for what each command does.
//
// Usage:
//   wayfield [--log-level LEVEL] build --scene S --volume V --store F [--config C] [--name N]
//   wayfield [--log-level LEVEL] path --store F --mesh N --from x,y,z --to x,y,z
//                                     [--algorithm a-star|jump-point] [--timeout-ms T]
//   wayfield [--log-level LEVEL] inspect --store F
//
// Results go to stdout as JSON; logs go to stderr. `RUST_LOG` overrides
// `--log-level`. Any error exits with status 1.

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;
use wayfield_cli::commands::{self, BuildArgs, PathArgs};
use wayfield_nav::{NavError, NavResult, PathAlgorithm, Vec3};

#[derive(Parser, Debug)]
#[command(name = "wayfield")]
#[command(about = "Build and query navigation meshes")]
#[command(version)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a mesh for one volume of a scene and store it
    Build {
        /// Scene file (JSON BoxWorld)
        #[arg(long)]
        scene: PathBuf,
        /// Build volume name in the scene
        #[arg(long)]
        volume: String,
        /// Mesh store (.json for JSON, anything else for binary)
        #[arg(long)]
        store: PathBuf,
        /// Config file (JSON NavConfig)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Mesh name (defaults to the volume name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Find a path on a stored mesh
    Path {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        mesh: String,
        /// Start position as x,y,z
        #[arg(long, allow_hyphen_values = true)]
        from: Vec3,
        /// Goal position as x,y,z
        #[arg(long, allow_hyphen_values = true)]
        to: Vec3,
        #[arg(long, value_enum, default_value_t = AlgorithmArg::AStar)]
        algorithm: AlgorithmArg,
        /// Search deadline in milliseconds (0 disables it)
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,
    },
    /// Summarize every mesh in a store
    Inspect {
        #[arg(long)]
        store: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum AlgorithmArg {
    AStar,
    JumpPoint,
}

impl From<AlgorithmArg> for PathAlgorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::AStar => PathAlgorithm::AStar,
            AlgorithmArg::JumpPoint => PathAlgorithm::JumpPoint,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    initialize_logging(&cli.log_level);

    if let Err(e) = run(cli.command) {
        error!("{e}");
        eprintln!("wayfield: {e}");
        std::process::exit(1);
    }
}

fn initialize_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command) -> NavResult<()> {
    match command {
        Command::Build {
            scene,
            volume,
            store,
            config,
            name,
        } => {
            let report = commands::build(&BuildArgs {
                scene,
                volume,
                store,
                config,
                name,
            })?;
            print_json(&report)
        }
        Command::Path {
            store,
            mesh,
            from,
            to,
            algorithm,
            timeout_ms,
        } => {
            let output = commands::path(&PathArgs {
                store,
                mesh,
                from,
                to,
                algorithm: algorithm.into(),
                timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
            })?;
            print_json(&output)
        }
        Command::Inspect { store } => print_json(&commands::inspect(&store)?),
    }
}

fn print_json(value: &impl Serialize) -> NavResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(NavError::from)?;
    println!("{text}");
    Ok(())
}
