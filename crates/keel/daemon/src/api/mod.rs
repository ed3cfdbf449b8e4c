//! REST surface over the object store

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/kinds", get(handlers::list_kinds))
        .route("/objects", post(handlers::apply_objects))
        .route("/objects/:kind", get(handlers::list_objects))
        .route(
            "/objects/:kind/:name",
            get(handlers::get_object).delete(handlers::delete_object),
        );

    Router::new()
        .route("/healthz", get(handlers::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
