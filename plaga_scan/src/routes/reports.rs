use crate::{routes::RouteError, server::SharedState, storage::BatchId};
use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
};
use leaf_detection::ModelService;
use tracing::instrument;

fn parse_batch(batch: &str) -> Result<BatchId, RouteError> {
    batch
        .parse()
        .map_err(|_| RouteError::UnknownBatch(batch.to_string()))
}

fn content_type_for(file_name: &str) -> &'static str {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[instrument(skip(state))]
pub async fn download_report<M: ModelService>(
    State(state): State<SharedState<M>>,
    Path(batch): Path<String>,
) -> Result<Response, RouteError> {
    state.metrics.record_request("/reports/{batch}/report.pdf");

    let batch_id = parse_batch(&batch)?;
    let report_name = state.scanner.report_name();
    let pdf = state.scanner.store().read(&batch_id, report_name).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", report_name),
        )
        .body(Body::from(pdf))
        .map_err(|e| RouteError::HttpBuilder(e.to_string()))
}

#[instrument(skip(state))]
pub async fn batch_image<M: ModelService>(
    State(state): State<SharedState<M>>,
    Path((batch, file_name)): Path<(String, String)>,
) -> Result<Response, RouteError> {
    state.metrics.record_request("/reports/{batch}/images/{file}");

    let batch_id = parse_batch(&batch)?;
    let data = state.scanner.store().read(&batch_id, &file_name).await?;

    Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&file_name))
        .body(Body::from(data))
        .map_err(|e| RouteError::HttpBuilder(e.to_string()))
}
