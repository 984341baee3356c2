//! API error mapping

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::routes::Envelope;

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request itself was malformed (bad query parameters).
    #[error("{0}")]
    BadRequest(String),

    /// A dispatched operation failed; status comes from the error's
    /// classification.
    #[error(transparent)]
    Dispatch(#[from] scraper_pool::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(e) => StatusCode::from_u16(e.external_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        (status, Json(Envelope::<()>::failure(message))).into_response()
    }
}
