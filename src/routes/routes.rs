//! Defines the routes of the expander service.
//!
//! - `POST /events`  -> S3 event notification intake
//! - `GET  /healthz` -> liveness
//! - `GET  /readyz`  -> readiness (staging root writable)

use crate::{
    handlers::{
        event_handlers::receive_events,
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router. The caller attaches [`AppState`] with `with_state`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/events", post(receive_events))
}
