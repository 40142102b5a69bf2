//! HTTP object API

pub mod range;
pub mod server;

pub use server::{AppState, ObjectServer};

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::error::Error;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("request failed: {}", self);
            // Do not echo filesystem details back to the client
            return (status, "internal server error").into_response();
        }

        match self {
            Error::RangeNotSatisfiable { total } => (
                status,
                [(header::CONTENT_RANGE, range::unsatisfiable_content_range(total))],
                self.to_string(),
            )
                .into_response(),
            _ => (status, self.to_string()).into_response(),
        }
    }
}
