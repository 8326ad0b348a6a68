//! Message service: a JSON HTTP API for creating, reading, listing, updating and
//! deleting short text messages, persisted through [`message_store`].

pub mod cli;
pub mod config;
pub mod core;
pub mod http;
pub mod runner;

pub use cli::{Cli, Commands};
pub use config::{ServiceConfig, StoreBackend};
pub use crate::core::init_tracing;
pub use http::{router, ApiError, AppState};
pub use runner::{build_store, run_reconcile, run_seed, run_server, seed_messages, serve};
