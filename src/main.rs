// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "guided-filter")]
#[command(about = "Refine a coarse mask along the edges of a guide image")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter a mask against a guide image and write the result as PNG
    Refine(cli::RefineArgs),

    /// Show the GPU adapter and whether it can run the filter
    Info,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=guided_filter=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Refine(args) => cli::refine(args),
        Commands::Info => cli::info(),
    }
}
