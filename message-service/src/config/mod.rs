//! Service configuration, loaded from env.

mod service_config;

#[cfg(test)]
mod tests;

pub use service_config::{ServiceConfig, StoreBackend};
