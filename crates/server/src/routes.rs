pub mod counters;

use std::sync::Arc;

use axum::{
    routing::get,
    Json, Router,
};
use common::types::Health;
use service::counter::{repository::CounterRepository, CounterService};
use tower_http::{
    cors::CorsLayer,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;

use counters::AppState;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub async fn metrics() -> (axum::http::StatusCode, String) {
    common::metrics::encode_metrics()
}

/// Build the full application router around an already constructed counter service
pub fn build_router<R: CounterRepository + 'static>(counters: Arc<CounterService<R>>, cors: CorsLayer) -> Router {
    let state = AppState { counters };

    let api = Router::new()
        .route(
            "/increment",
            get(counters::list::<R>)
                .post(counters::increment::<R>)
                .put(counters::increment::<R>)
                .delete(counters::delete::<R>),
        )
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(api)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                // 响应返回时打点，包含状态码与耗时
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
