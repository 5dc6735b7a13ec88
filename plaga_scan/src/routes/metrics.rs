use crate::{routes::RouteError, server::SharedState};
use axum::extract::State;
use leaf_detection::ModelService;
use prometheus::{Encoder, TextEncoder};

pub async fn metrics_handler<M: ModelService>(
    State(state): State<SharedState<M>>,
) -> Result<String, RouteError> {
    let metric_families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|e| RouteError::Metrics(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| RouteError::Metrics(e.to_string()))
}
