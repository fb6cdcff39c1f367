//! Steadyget CLI - Fetch lists of URLs over unreliable links
//!
//! Every transfer resumes where it can, reconnects when throughput drops
//! and is validated before it is moved into place.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Steadyget - Resilient batch downloader
#[derive(Parser)]
#[command(name = "steadyget")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Options file (defaults to the per-user config directory)
    #[arg(long, env = "STEADYGET_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "human", global = true)]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Table,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ModeArg {
    Aggregated,
    Messages,
    Silent,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every task in a JSON tasks file
    Run {
        /// JSON array of {"url", "destination", "label"} objects
        tasks: PathBuf,

        /// Number of concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Progress display
        #[arg(short, long)]
        mode: Option<ModeArg>,

        /// Drop tasks whose destination already exists
        #[arg(long)]
        skip_existing: bool,
    },

    /// Download a single URL
    Get {
        /// URL to download
        url: String,

        /// Output file path (defaults to the last URL segment)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the multipart ETag of a local file
    Etag {
        /// File to hash
        file: PathBuf,

        /// Part size in bytes
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Show or create the options file
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective options
    Show,

    /// Write the default options file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the options file location
    Path,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("steadyget=debug,steadyget_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.config.clone();

    let all_done = match cli.command {
        Commands::Run {
            tasks,
            workers,
            mode,
            skip_existing,
        } => {
            let config = commands::resolve_config(config_path.as_deref(), workers, mode).await?;
            commands::run_tasks(config, &tasks, skip_existing, cli.output).await?
        }

        Commands::Get { url, output } => {
            let config = commands::resolve_config(config_path.as_deref(), None, None).await?;
            commands::get_url(config, &url, output, cli.output).await?
        }

        Commands::Etag { file, chunk_size } => {
            commands::print_etag(config_path.as_deref(), &file, chunk_size, cli.output).await?;
            true
        }

        Commands::Config { action } => {
            commands::config_action(config_path.as_deref(), action, cli.output).await?;
            true
        }

        Commands::Completions { shell } => {
            use clap::CommandFactory;
            clap_complete::generate(shell, &mut Cli::command(), "steadyget", &mut std::io::stdout());
            true
        }
    };

    if !all_done {
        std::process::exit(1);
    }

    Ok(())
}
