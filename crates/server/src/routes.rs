//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Unauthenticated for probes
        .route("/v1/health", get(handlers::health_check))
        .route(
            "/v1/imports",
            post(handlers::start_import).get(handlers::list_imports),
        )
        .route("/v1/imports/{job_id}", get(handlers::get_import))
        .route("/v1/franchises", get(handlers::list_franchises))
        .route("/v1/franchises/search", get(handlers::search_franchises))
        .route("/v1/franchises/metrics", get(handlers::franchise_metrics))
        .route("/v1/lookup/{fid}/{oid}", get(handlers::lookup_outlet));

    let mut router = Router::new().merge(api_routes);

    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
