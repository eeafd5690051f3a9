//! Global panic handling for request handlers.
//!
//! A panicking handler (the host's or an extension's) becomes an HTTP 500
//! with a JSON body instead of a dropped connection.

use std::panic::AssertUnwindSafe;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use exthost_core::panic_message;
use futures::FutureExt;
use serde::Serialize;

pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected internal server error has occurred.";

/// Whether error responses carry the panic message.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicPolicy {
    pub expose_details: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: &'static str,
    pub details: Option<String>,
    pub path: String,
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn catch_panics(
    State(policy): State<PanicPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(path = %path, panic = %message, "Unhandled panic caught by global handler");

            let status = StatusCode::INTERNAL_SERVER_ERROR;
            let body = ErrorBody {
                status_code: status.as_u16(),
                message: INTERNAL_ERROR_MESSAGE,
                details: policy.expose_details.then_some(message),
                path,
            };
            (status, Json(body)).into_response()
        }
    }
}
