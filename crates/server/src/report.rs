//! Result-delivery endpoint.

use api_types::report::{Empty, ReportResult};
use axum::{Json, extract::State};

use crate::{ServerError, server::ServerState};

/// Push a computed report onto the result channel.
///
/// Waits for room when the channel is full; the caller sees the delay.
pub async fn send(
    State(state): State<ServerState>,
    Json(payload): Json<ReportResult>,
) -> Result<Json<Empty>, ServerError> {
    if let Err(err) = payload.dates() {
        return Err(ServerError::Generic(format!("invalid report dates: {err}")));
    }

    let user_id = payload.user_id;
    state
        .results
        .send(payload)
        .await
        .map_err(|_| ServerError::Unavailable("result dispatcher stopped".to_string()))?;
    tracing::debug!(user_id, "report result queued for dispatch");
    Ok(Json(Empty {}))
}
