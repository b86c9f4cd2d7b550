//! cindir CLI: import, process and export point clouds.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "cindir")]
#[command(version, about = "Point cloud cleanup and surface reconstruction")]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a point cloud, run the processing stages and save the results.
    Process(commands::ProcessArgs),

    /// Print point count, bounds and attributes of a point cloud file.
    Info {
        /// Path to a .las, .laz, .ply, .pcd or .xyz file.
        input: PathBuf,
    },

    /// Write the default pipeline configuration as TOML.
    InitConfig {
        /// Destination file.
        path: PathBuf,
    },
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Process(args) => commands::process(args),
        Commands::Info { input } => commands::info(&input),
        Commands::InitConfig { path } => commands::init_config(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}
