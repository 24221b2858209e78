mod cmd;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use gridbot_core::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gridbot",
    about = "Queue move/rotate commands for a grid robot and track where it ends up",
    version,
    propagate_version = true
)]
struct Cli {
    /// Path to the robot database
    #[arg(long, global = true, env = "GRIDBOT_DB", default_value = "gridbot.redb")]
    db: PathBuf,

    /// YAML config file (defaults are used when omitted)
    #[arg(long, global = true, env = "GRIDBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API with the periodic worker
    Serve {
        /// Port to listen on (overrides server.port; 0 = OS-assigned)
        #[arg(long)]
        port: Option<u16>,

        /// Serve the API only, without the periodic worker
        #[arg(long)]
        no_worker: bool,
    },

    /// Run the periodic parse/process worker without the API
    Worker,

    /// Run one parse pass and one process pass, then exit
    Tick,

    /// Queue a command string (letters F, B, L, R)
    Submit { text: String },

    /// Show the robot's current position and status
    Status,

    /// Show a command and its actions
    Show { id: String },

    /// Delete a command and all of its actions
    Forget { id: String },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Worker => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = Config::resolve(cli.config.as_deref())
        .context("failed to load config")
        .and_then(|config| dispatch(cli.command, &cli.db, config, cli.json));

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn dispatch(
    command: Commands,
    db: &std::path::Path,
    config: Config,
    json: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Serve { port, no_worker } => cmd::run::serve(db, config, port, no_worker),
        Commands::Worker => cmd::run::worker(db, config),
        Commands::Tick => cmd::run::tick(db, &config, json),
        Commands::Submit { text } => cmd::command::submit(db, &text, json),
        Commands::Status => cmd::command::status(db, &config.robot, json),
        Commands::Show { id } => cmd::command::show(db, &id, json),
        Commands::Forget { id } => cmd::command::forget(db, &id, json),
        Commands::Config { subcommand } => cmd::config::run(&config, subcommand, json),
    }
}
