//! Maps `dip_core::Error` onto the HTTP boundary (`spec.md` §7): status
//! code per `Error::status_code`, body `{"detail": "..."}`. Grounded on
//! `aion-server::errors::AppError`'s match-on-status-code +
//! `Json(json!({...}))` shape, but wrapping `dip_core::Error` rather than
//! redefining the taxonomy — `dip_core::Error` can't implement
//! `axum::response::IntoResponse` itself without pulling `axum` into
//! `dip_core`, so this newtype is the seam instead.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct AppError(pub dip_core::Error);

impl From<dip_core::Error> for AppError {
    fn from(err: dip_core::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        tracing::error!(code = self.0.code(), status = status.as_u16(), error = %self.0, "request failed");
        let body = Json(json!({ "detail": self.0.to_string() }));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
