//! PaperDB CLI
//!
//! Command-line tools for PaperDB databases.
//!
//! # Commands
//!
//! - `init` - Create the database and seed its defaults
//! - `inspect` - Display entity types and row counts
//! - `get` - Print matching entities as API views
//! - `delete` - Delete matching entities
//! - `settings` - Read or write the settings row
//! - `queue` - Maintain the image display queue

mod commands;

use clap::{Parser, Subcommand};
use paperdb_core::{Config, Store};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// PaperDB command-line database tools.
#[derive(Parser)]
#[command(name = "paperdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file (defaults to $PAPER_DB_PATH)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing tables and seed their default rows
    Init,

    /// Display entity types and row counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print entities of a type as JSON
    Get {
        /// Entity type name
        entity: String,

        /// Exact match as key=value; repeatable
        #[arg(short = 'm', long = "match")]
        matches: Vec<String>,
    },

    /// Delete entities of a type
    Delete {
        /// Entity type name
        entity: String,

        /// Exact match as key=value; repeatable, at least one required
        #[arg(short = 'm', long = "match", required = true)]
        matches: Vec<String>,

        /// Leave owned children alone
        #[arg(long)]
        no_cascade: bool,
    },

    /// Read or write the settings row
    Settings {
        #[command(subcommand)]
        command: commands::settings::SettingsCommand,
    },

    /// Maintain the image display queue
    Queue {
        #[command(subcommand)]
        command: commands::queue::QueueCommand,
    },

    /// Show version information
    Version,
}

fn open(path: Option<PathBuf>) -> Result<Store, Box<dyn std::error::Error>> {
    let mut config = Config::from_env()?;
    if let Some(path) = path {
        config = config.path(path);
    }
    if config.path.is_none() {
        return Err("Database path required (--path or PAPER_DB_PATH)".into());
    }
    Ok(Store::open(config)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            let store = open(cli.path)?;
            commands::init::run(&store)?;
        }
        Commands::Inspect { format } => {
            let store = open(cli.path)?;
            commands::inspect::run(&store, &format)?;
        }
        Commands::Get { entity, matches } => {
            let store = open(cli.path)?;
            commands::entities::get(&store, &entity, &matches)?;
        }
        Commands::Delete {
            entity,
            matches,
            no_cascade,
        } => {
            let store = open(cli.path)?;
            commands::entities::delete(&store, &entity, &matches, !no_cascade)?;
        }
        Commands::Settings { command } => {
            let store = open(cli.path)?;
            commands::settings::run(&store, command)?;
        }
        Commands::Queue { command } => {
            let store = open(cli.path)?;
            commands::queue::run(&store, command)?;
        }
        Commands::Version => {
            println!("PaperDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("PaperDB Core v{}", paperdb_core::VERSION);
        }
    }

    Ok(())
}
