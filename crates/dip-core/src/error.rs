use http::StatusCode;
use thiserror::Error;

/// The shared error taxonomy for every `dip-*` crate. Each variant maps to
/// exactly one REST status code and one `error.code` string, enforced at the
/// `dip-server` boundary rather than re-derived per handler.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("kubernetes error: {0}")]
    Kube(String),

    #[error("helm error: {0}")]
    Helm(String),

    /// Not part of spec.md §7: a template referenced a variable the caller
    /// never supplied. Always a bug in how `dip-orchestrator` built the
    /// render context, never user input — surfaces as `internal_error`.
    #[error("template error: {0}")]
    Template(String),

    #[error("internal error: {0}")]
    Internal(String),

    /// Not part of spec.md §7's seven-code taxonomy: raised only when a
    /// per-cluster worker's command queue (capacity 8, §4.8) is full.
    #[error("cluster worker busy: {0}")]
    Unavailable(String),
}

impl Error {
    /// Machine-readable error code returned in the JSON body's `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Provider(_) => "provider_error",
            Error::Kube(_) => "kube_error",
            Error::Helm(_) => "helm_error",
            Error::Template(_) => "internal_error",
            Error::Internal(_) => "internal_error",
            Error::Unavailable(_) => "service_unavailable",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Provider(_) | Error::Kube(_) | Error::Helm(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) | Error::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Error::NotFound(entity.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Error::Conflict(msg.into())
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Error::NotFound("record".to_string()),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(Error::validation("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(Error::not_found("cluster").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(Error::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(Error::Provider("x".into()).status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(Error::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let e: Error = sqlx::Error::RowNotFound.into();
        assert_eq!(e.code(), "not_found");
    }
}
