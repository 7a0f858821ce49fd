pub mod handler;

use crate::bitrix::DataSource;
use crate::rollup::RollupService;
use axum::http::Method;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Read-only routes over the rollup service.
pub fn router<D: DataSource>(svc: Arc<RollupService<D>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/performance", get(handler::performance::<D>))
        .route("/performance/monthly", get(handler::monthly::<D>))
        .route("/performance/yearly", get(handler::yearly::<D>))
        .route("/ranking", get(handler::ranking::<D>))
        .route("/health", get(handler::health::<D>))
        .method_not_allowed_fallback(handler::method_not_allowed)
        .fallback(handler::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(svc)
}
