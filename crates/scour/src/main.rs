//! scour CLI - post-build optimizer for exported static sites.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "scour")]
#[command(about = "Strip JavaScript, trim CSS and minify HTML of an exported static site")]
#[command(version)]
pub struct Cli {
    /// Defaults to `optimize`
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to scour.toml config file
    #[arg(short, long, default_value = "scour.toml", global = true)]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site, then run strip, styles and minify in order
    Optimize,

    /// Remove scripts, script preloads and inline handlers; delete script files
    Strip,

    /// Purge and minify CSS, inline critical CSS, load the rest async
    Styles,

    /// Minify every HTML file and print a size summary
    Minify,

    /// Write a default scour.toml
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        yes: bool,
    },

    /// Preview the optimized site
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to the configured output directory)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command.unwrap_or(Commands::Optimize) {
        Commands::Optimize => {
            commands::optimize::run(&cli.config, cli.verbose).await?;
        }
        Commands::Strip => {
            commands::strip::run(&cli.config).await?;
        }
        Commands::Styles => {
            commands::styles::run(&cli.config).await?;
        }
        Commands::Minify => {
            commands::minify::run(&cli.config).await?;
        }
        Commands::Init { yes } => {
            commands::init::run(&cli.config, yes).await?;
        }
        Commands::Serve { port, dir, no_open } => {
            commands::serve::run(&cli.config, port, dir, !no_open).await?;
        }
    }

    Ok(())
}
