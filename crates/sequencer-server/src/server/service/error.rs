//! Error type for the HTTP surface.
//!
//! [`ApiError`] captures everything that can go wrong while answering an ID
//! request and implements [`IntoResponse`] so handlers can return it with `?`.
//! Every case maps to `500 Internal Server Error` with a JSON body:
//!
//! ```json
//! {"error": "clock moved backwards: last issued at 100 ms, clock reads 99 ms", "kind": "clock_regression"}
//! ```
//!
//! `kind` is the stable machine-readable part; `error` is for humans.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Unified error type for the ID endpoints.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// The sequencer refused to issue an ID.
    #[error(transparent)]
    Sequencer(#[from] sequencer::Error),

    /// The blocking task running the sequencer panicked or was cancelled.
    #[error("id generation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    /// Short, stable name of the failure, sent as the `kind` field of the
    /// response body.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Sequencer(err) => err.kind(),
            Self::Task(_) => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
