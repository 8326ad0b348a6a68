//! HTTP layer: JSON CRUD endpoints over a [`message_store::MessageRepository`].

mod error;
mod handlers;
mod middleware;
mod routes;

pub use error::ApiError;
pub use handlers::{AppState, CreateMessage, ListResponse, UpdateMessage};
pub use routes::router;
