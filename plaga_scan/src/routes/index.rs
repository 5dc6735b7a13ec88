use crate::{page, server::SharedState};
use axum::{extract::State, response::Html};
use leaf_detection::ModelService;

pub async fn upload_form<M: ModelService>(State(state): State<SharedState<M>>) -> Html<String> {
    state.metrics.record_request("/");
    Html(page::upload_page(state.server.max_upload_mb))
}
