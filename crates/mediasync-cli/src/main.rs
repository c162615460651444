use clap::{ArgAction, Parser, Subcommand};
use commands::{clear, config, sync};
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "mediasync")]
#[command(about = "mediasync - Keep your local movie and show library in sync with Trakt")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Also write logs to this file (rotated daily)
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the local library with Trakt
    #[command(long_about = "Reconcile the local library with the Trakt collection and watched history, then send what Trakt is missing. If no direction flag is given, the directions enabled in the configuration are used.")]
    Sync {
        /// Sync the collection
        #[arg(long, action = ArgAction::SetTrue)]
        collection: bool,

        /// Sync the watched history
        #[arg(long, action = ArgAction::SetTrue)]
        watched: bool,

        /// Only sync the library entries with these keys
        #[arg(long, value_name = "KEY", num_args = 1..)]
        only: Vec<String>,

        /// Library directory (overrides the configured path)
        #[arg(long, value_name = "DIR")]
        library: Option<PathBuf>,

        /// Reconcile and build batches, but do not send anything to Trakt
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Remove everything from the Trakt collection and history
    #[command(long_about = "Remove every movie and/or show from your Trakt collection and watched history. The local library is not touched. Without --movies or --shows both are cleared.")]
    Clear {
        /// Clear movies
        #[arg(long, action = ArgAction::SetTrue)]
        movies: bool,

        /// Clear shows
        #[arg(long, action = ArgAction::SetTrue)]
        shows: bool,

        /// Do not ask for confirmation
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
    /// Configure credentials and settings
    #[command(long_about = "Manage configuration and credentials. Use subcommands to view the configuration, authenticate with Trakt, or change sync options.")]
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    #[command(long_about = "Display the current configuration. Client secrets and tokens are masked. Use --full to show masked values.")]
    Show {
        /// Show full configuration including masked secrets
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },

    /// Configure Trakt (OAuth PIN flow)
    #[command(long_about = "Configure Trakt API credentials and authenticate with a PIN. You'll need to create a Trakt API application at https://trakt.tv/oauth/applications first.")]
    Trakt {
        /// Trakt Client ID (if not provided, will prompt)
        #[arg(long)]
        client_id: Option<String>,

        /// Trakt Client Secret (if not provided, will prompt)
        #[arg(long)]
        client_secret: Option<String>,
    },

    /// Configure sync options
    #[command(long_about = "Configure which directions are synced by default and how many shows are sent per request.")]
    Sync {
        /// Sync the collection by default
        #[arg(long)]
        collection: Option<bool>,

        /// Sync the watched history by default
        #[arg(long)]
        watched: Option<bool>,

        /// Shows per write request (0 sends all shows at once)
        #[arg(long)]
        shows_per_request: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    logging::init_logging(cli.verbose, cli.quiet, cli.log_file.clone())
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Sync {
            collection,
            watched,
            only,
            library,
            dry_run,
        } => sync::run_sync(collection, watched, only, library, dry_run, &output).await,
        Commands::Clear { movies, shows, yes } => clear::run_clear(movies, shows, yes, &output).await,
        Commands::Config { cmd } => config::run_config(cmd, &output).await,
    }
}
