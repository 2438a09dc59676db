//! API Routes
//!
//! Configures the Axum router with the content and cache admin endpoints.

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, get_item_handler, get_options_handler, health_handler, invalidate_handler,
    list_items_handler, options_handler, preview_item_handler, stats_handler, status_handler,
    update_item_handler, AppState,
};
use super::hooks::{disable_cache, enable_cache};

/// Creates the main router with all endpoints configured.
///
/// Content pages carry one of the cache hooks: `enable_cache` on the GET
/// side of `/item/:id` and `/items`, `disable_cache` on previews. The
/// admin routes carry neither.
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cached = || from_fn_with_state(state.clone(), enable_cache);

    Router::new()
        .route(
            "/item/:id",
            get(get_item_handler)
                .layer(cached())
                .put(update_item_handler),
        )
        .route("/items", get(list_items_handler).layer(cached()))
        .route(
            "/preview/item/:id",
            get(preview_item_handler).layer(from_fn(disable_cache)),
        )
        .route("/cache", delete(clear_handler))
        .route("/cache/stats", get(stats_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache/status", put(status_handler))
        .route(
            "/cache/options",
            get(get_options_handler).patch(options_handler),
        )
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
