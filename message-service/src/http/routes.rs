use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;

use super::handlers::{
    create_message, delete_message, get_message, health, list_messages, update_message, AppState,
};
use super::middleware::log_requests;

/// Builds the service router: `/health` plus the `/messages` resource.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/messages", get(list_messages).post(create_message))
        .route(
            "/messages/:id",
            get(get_message).put(update_message).delete(delete_message),
        )
        .layer(from_fn(log_requests))
        .with_state(state)
}
