//! Process-wide plumbing shared by every command.

mod logger;

pub use logger::init_tracing;
