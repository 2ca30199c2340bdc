//! SaneSQL CLI
//!
//! Command-line client for SaneSQL databases.
//!
//! # Commands
//!
//! - `query` - Run a query and print the rows
//! - `update` - Run an update and print the affected rows and generated keys
//! - `ping` - Check that the database answers
//! - `script` - Run a file of statements inside one scoped transaction

mod commands;

use clap::{Parser, Subcommand};
use commands::OutputFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SaneSQL command-line client.
#[derive(Parser)]
#[command(name = "sanesql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database file (`:memory:` for a scratch database)
    #[arg(global = true, short, long)]
    database: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print the rows
    Query {
        /// SQL text with `?N` placeholders
        sql: String,

        /// Positional parameter, repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Run an INSERT, UPDATE or DELETE
    Update {
        /// SQL text with `?N` placeholders
        sql: String,

        /// Positional parameter, repeatable
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Check that the database answers
    Ping,

    /// Run `;`-separated statements from a file in one transaction
    Script {
        /// Path to the script
        file: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Query {
            sql,
            params,
            format,
        } => {
            let db = commands::open(cli.database.as_deref(), "query")?;
            commands::query::run(&db, &sql, &params, format)?;
        }
        Commands::Update {
            sql,
            params,
            format,
        } => {
            let db = commands::open(cli.database.as_deref(), "update")?;
            commands::update::run(&db, &sql, &params, format)?;
        }
        Commands::Ping => {
            let db = commands::open(cli.database.as_deref(), "ping")?;
            commands::ping::run(&db)?;
        }
        Commands::Script { file } => {
            let db = commands::open(cli.database.as_deref(), "script")?;
            commands::script::run(&db, &file)?;
        }
        Commands::Version => {
            println!("SaneSQL CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
