//! syncbox CLI
//!
//! Command-line tools for inspecting and exercising a syncbox outbox.
//!
//! # Commands
//!
//! - `inspect` - Display outbox and record statistics
//! - `pending` - List queue items waiting for delivery
//! - `failed` - List permanently failed queue items
//! - `enqueue` - Append a mutation to the outbox
//! - `simulate` - Run one sync cycle against an in-process remote

mod commands;
mod workspace;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use syncbox_protocol::{Operation, RecordId};
use tracing_subscriber::EnvFilter;

/// syncbox command-line outbox tools.
#[derive(Parser)]
#[command(name = "syncbox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the sync data directory
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
    /// Display outbox and record statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List queue items waiting for delivery
    Pending {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List permanently failed queue items
    Failed {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Append a mutation to the outbox
    Enqueue {
        /// Target record id
        #[arg(short, long)]
        record: RecordId,

        /// Mutation kind
        #[arg(short, long, value_enum)]
        op: OpArg,

        /// Field snapshot as a JSON object
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Run one sync cycle against an in-process remote authority
    Simulate {
        /// Records the remote should reject
        #[arg(long)]
        reject: Vec<RecordId>,

        /// Items per batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Simulate an unreachable remote
        #[arg(long)]
        offline: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum OpArg {
    Create,
    Update,
    Delete,
}

impl From<OpArg> for Operation {
    fn from(op: OpArg) -> Self {
        match op {
            OpArg::Create => Operation::Create,
            OpArg::Update => Operation::Update,
            OpArg::Delete => Operation::Delete,
        }
    }
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
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Pending { format } => {
            let path = cli.path.ok_or("Data path required for pending")?;
            commands::queue::run_pending(&path, &format)?;
        }
        Commands::Failed { format } => {
            let path = cli.path.ok_or("Data path required for failed")?;
            commands::queue::run_failed(&path, &format)?;
        }
        Commands::Enqueue {
            record,
            op,
            payload,
        } => {
            let path = cli.path.ok_or("Data path required for enqueue")?;
            commands::enqueue::run(&path, record, op.into(), &payload)?;
        }
        Commands::Simulate {
            reject,
            batch_size,
            offline,
            format,
        } => {
            let path = cli.path.ok_or("Data path required for simulate")?;
            let options = commands::simulate::Options {
                reject,
                batch_size,
                offline,
            };
            commands::simulate::run(&path, &options, &format)?;
        }
        Commands::Version => {
            println!("syncbox CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
