use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

pub use dispatcher::{Notifier, NotifyError, ResultDispatcher, render_report};
pub use scrape::{METRICS_PATH, metrics_router, run_metrics};
pub use server::{ServerState, router, run, run_with_listener, spawn_with_listener};

mod dispatcher;
mod report;
mod scrape;
mod server;

#[derive(Debug)]
pub enum ServerError {
    Generic(String),
    Unavailable(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
            ServerError::Unavailable(err) => {
                tracing::error!("rejecting report result: {err}");
                (StatusCode::SERVICE_UNAVAILABLE, err)
            }
        };

        (status, Json(Error { error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unavailable_maps_to_503() {
        let res = ServerError::Unavailable("closed".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
