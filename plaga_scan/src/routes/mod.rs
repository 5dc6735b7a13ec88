mod analyze;
mod health;
mod index;
mod metrics;
mod reports;

use crate::{scanner::ScanError, server::SharedState, storage::StorageError};
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use leaf_detection::ModelService;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Batch not found: {0}")]
    UnknownBatch(String),
    #[error("Metrics encoding failed: {0}")]
    Metrics(String),
    #[error("HTTP builder failed: {0}")]
    HttpBuilder(String),
}

fn storage_status(e: &StorageError) -> StatusCode {
    match e {
        StorageError::InvalidFileName(_)
        | StorageError::BatchNotFound(_)
        | StorageError::FileNotFound(_) => StatusCode::NOT_FOUND,
        StorageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::Multipart(e) => e.status(),
            RouteError::Scan(ScanError::NoImages)
            | RouteError::Scan(ScanError::UnsupportedImage(_))
            | RouteError::Scan(ScanError::Decode { .. }) => StatusCode::BAD_REQUEST,
            RouteError::Scan(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RouteError::Storage(e) => storage_status(e),
            RouteError::UnknownBatch(_) => StatusCode::NOT_FOUND,
            RouteError::Metrics(_) | RouteError::HttpBuilder(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn api_routes<M: ModelService>() -> Router<SharedState<M>> {
    Router::new()
        .route("/", get(index::upload_form::<M>))
        .route("/analyze", post(analyze::analyze_page::<M>))
        .route("/api/v1/scan", post(analyze::analyze_json::<M>))
        .route("/reports/{batch}/report.pdf", get(reports::download_report::<M>))
        .route("/reports/{batch}/images/{file}", get(reports::batch_image::<M>))
        .route("/health", get(health::healthcheck))
        .route("/metrics", get(metrics::metrics_handler::<M>))
}
