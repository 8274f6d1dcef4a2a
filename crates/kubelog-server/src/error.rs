use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Key Required")]
    Unauthorized,

    #[error("{0:#}")]
    Cluster(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::Cluster(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text rendition for the legacy route
    pub fn into_text_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Cluster(e) = &self {
            tracing::error!("cluster request failed: {e:#}");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
