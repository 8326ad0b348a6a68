//! Command line interface for the message service.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "message-service")]
#[command(about = "Message CRUD service: serve, reconcile, seed", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the HTTP service (default; config from env).
    Serve,
    /// Repair the message index of a key-value backend.
    Reconcile {
        /// Entries examined per scan call
        #[arg(short, long, default_value = "100")]
        batch_size: u64,
    },
    /// Insert synthetic messages directly into the configured store.
    Seed {
        #[arg(short, long, default_value = "10000")]
        count: u64,
        /// Number of distinct random senders
        #[arg(short, long, default_value = "100")]
        users: usize,
    },
}

impl Cli {
    /// The subcommand to run; `serve` when none is given.
    pub fn command(&self) -> Commands {
        match &self.command {
            Some(Commands::Reconcile { batch_size }) => Commands::Reconcile {
                batch_size: *batch_size,
            },
            Some(Commands::Seed { count, users }) => Commands::Seed {
                count: *count,
                users: *users,
            },
            Some(Commands::Serve) | None => Commands::Serve,
        }
    }
}
