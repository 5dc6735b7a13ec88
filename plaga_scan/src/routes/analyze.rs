use crate::{
    page,
    routes::RouteError,
    scanner::{BatchReport, Upload},
    server::SharedState,
};
use axum::{
    extract::{Multipart, State},
    response::{Html, IntoResponse, Json, Response},
};
use leaf_detection::ModelService;
use std::time::Instant;
use tracing::instrument;

/// Multipart field carrying the uploaded images.
pub const IMAGES_FIELD: &str = "images";

async fn collect_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, RouteError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGES_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;

        // browsers send one empty part when no file was picked
        if file_name.is_empty() && data.is_empty() {
            continue;
        }
        uploads.push(Upload::new(file_name, data));
    }
    Ok(uploads)
}

async fn run_scan<M: ModelService>(
    state: &SharedState<M>,
    multipart: Multipart,
    route: &str,
) -> Result<BatchReport, RouteError> {
    let uploads = collect_uploads(multipart).await?;
    let start = Instant::now();
    let report = state.scanner.scan_batch(&uploads).await?;

    state.metrics.record_scan(
        report.images.len() as u64,
        report.total_detections() as u64,
        start.elapsed().as_millis() as u64,
        route,
    );
    Ok(report)
}

#[instrument(skip_all)]
pub async fn analyze_page<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Multipart,
) -> Response {
    state.metrics.record_request("/analyze");

    match run_scan(&state, multipart, "/analyze").await {
        Ok(report) => Html(page::results_page(&report, state.server.max_upload_mb)).into_response(),
        Err(e) => {
            tracing::warn!("Scan failed: {}", e);
            (
                e.status(),
                Html(page::error_page(&e.to_string(), state.server.max_upload_mb)),
            )
                .into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn analyze_json<M: ModelService>(
    State(state): State<SharedState<M>>,
    multipart: Multipart,
) -> Result<Json<BatchReport>, RouteError> {
    state.metrics.record_request("/api/v1/scan");

    let report = run_scan(&state, multipart, "/api/v1/scan")
        .await
        .inspect_err(|e| tracing::warn!("Scan failed: {}", e))?;
    Ok(Json(report))
}
