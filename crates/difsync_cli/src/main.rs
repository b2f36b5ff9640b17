//! difsync CLI
//!
//! Command-line client for differential synchronization gateways.
//!
//! # Commands
//!
//! - `share` - Keep files in sync with the gateway until interrupted
//! - `sync` - Run a single sync cycle for files
//! - `download` - Print or save the server text of documents
//! - `upload` - Overwrite the server text of documents with local files

mod commands;
mod endpoint;
mod error;
mod gateway;
mod http;
mod state;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use difsync_engine::{SessionConfig, SyncMode};
use tracing_subscriber::EnvFilter;

use crate::commands::share::ShareOptions;

/// difsync command-line client.
#[derive(Parser)]
#[command(name = "difsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gateway URL (http://, https:// or telnet://host:port)
    #[arg(global = true, short, long, default_value = "http://localhost/scripts/q.py")]
    gateway: String,

    /// Namespace prefix for document ids on the wire
    #[arg(global = true, long, default_value = "")]
    prefix: String,

    /// Cookie header sent with HTTP requests
    #[arg(global = true, long)]
    cookie: Option<String>,

    /// Exchange timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Merge,
    Overwrite,
    Auto,
}

impl From<Mode> for SyncMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Merge => SyncMode::Merge,
            Mode::Overwrite => SyncMode::Overwrite,
            Mode::Auto => SyncMode::Auto,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Keep files in sync with the gateway until interrupted
    Share {
        /// Files to share
        files: Vec<PathBuf>,

        /// Document id (defaults to the file name; single file only)
        #[arg(long)]
        id: Option<String>,

        /// State file
        #[arg(short, long, default_value = ".difsync.json")]
        state: PathBuf,

        /// How concurrent edits are combined (new documents default to
        /// merge; resumed documents keep their saved mode)
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,

        /// Shortest pause between cycles in milliseconds
        #[arg(long, default_value = "1000")]
        min_interval: u64,

        /// Longest pause between cycles in milliseconds
        #[arg(long, default_value = "10000")]
        max_interval: u64,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },

    /// Run a single sync cycle for files
    Sync {
        /// Files to sync
        files: Vec<PathBuf>,

        /// Document id (defaults to the file name; single file only)
        #[arg(long)]
        id: Option<String>,

        /// State file
        #[arg(short, long, default_value = ".difsync.json")]
        state: PathBuf,

        /// How concurrent edits are combined (new documents default to
        /// merge; resumed documents keep their saved mode)
        #[arg(short, long, value_enum)]
        mode: Option<Mode>,
    },

    /// Print or save the server text of documents
    Download {
        /// Document ids
        ids: Vec<String>,

        /// Directory to write one file per document into
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Overwrite the server text of documents with local files
    Upload {
        /// Files to upload
        files: Vec<PathBuf>,

        /// Document id (defaults to the file name; single file only)
        #[arg(long)]
        id: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = SessionConfig::new(cli.gateway)
        .with_id_prefix(cli.prefix)
        .with_timeout(Duration::from_secs(cli.timeout));
    if let Some(cookie) = cli.cookie {
        config = config.with_cookie(cookie);
    }

    match cli.command {
        Commands::Share {
            files,
            id,
            state,
            mode,
            min_interval,
            max_interval,
            cycles,
        } => {
            let config = config.with_interval_bounds(
                Duration::from_millis(min_interval),
                Duration::from_millis(max_interval),
            );
            let options = ShareOptions {
                files,
                id,
                state,
                mode: mode.map(SyncMode::from),
                cycles,
            };
            commands::share::run(config, &options)?;
        }
        Commands::Sync {
            files,
            id,
            state,
            mode,
        } => {
            let options = ShareOptions {
                files,
                id,
                state,
                mode: mode.map(SyncMode::from),
                cycles: Some(1),
            };
            commands::share::run(config, &options)?;
        }
        Commands::Download { ids, out } => {
            commands::download::run(config, &ids, out.as_deref())?;
        }
        Commands::Upload { files, id } => {
            commands::upload::run(config, &files, id.as_deref())?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_share_arguments() {
        let cli = Cli::try_parse_from([
            "difsync",
            "-g",
            "telnet://localhost:3017",
            "share",
            "notes.txt",
            "--mode",
            "auto",
            "--cycles",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.gateway, "telnet://localhost:3017");
        match cli.command {
            Commands::Share {
                files, mode, cycles, ..
            } => {
                assert_eq!(files, vec![PathBuf::from("notes.txt")]);
                assert_eq!(mode.map(SyncMode::from), Some(SyncMode::Auto));
                assert_eq!(cycles, Some(3));
            }
            _ => panic!("expected share"),
        }
    }
}
