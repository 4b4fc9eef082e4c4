//! Notification intake.
//!
//! `POST /events` takes an S3 event notification body, runs it through the
//! expander and reports the outcome. A 500 tells the notifier the
//! invocation failed so it can redeliver.

use crate::{
    errors::AppError,
    models::event::S3Event,
    services::expander::ExpandReport,
    state::AppState,
};
use axum::{Json, extract::State};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub status: String,
    #[serde(flatten)]
    pub report: ExpandReport,
}

/// `POST /events`
pub async fn receive_events(
    State(state): State<AppState>,
    Json(event): Json<S3Event>,
) -> Result<Json<EventResponse>, AppError> {
    let settings = state.settings.current();
    let report = state.expander.handle(&event.records, &settings).await?;

    tracing::info!(
        expanded = report.expanded,
        skipped = report.skipped,
        published = report.published,
        deleted = report.deleted,
        "invocation complete"
    );

    Ok(Json(EventResponse {
        status: "ok".into(),
        report,
    }))
}
