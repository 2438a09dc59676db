//! API Module
//!
//! HTTP handlers, cache hooks and routing.
//!
//! # Endpoints
//! - `GET /item/:id` - Item page, served through the view cache
//! - `PUT /item/:id` - Update an item and purge its cached pages
//! - `GET /items` - Item list page, served through the view cache
//! - `GET /preview/item/:id` - Item page that never touches the view cache
//! - `GET /cache/stats` - Per-store statistics
//! - `DELETE /cache` - Clear both stores
//! - `POST /cache/invalidate` - Purge by key or pattern
//! - `PUT /cache/status` - Switch caching on or off
//! - `GET|PATCH /cache/options` - Read or merge options
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod hooks;
pub mod routes;

pub use handlers::*;
pub use hooks::{
    disable_cache, enable_cache, CacheMarker, CACHE_DISABLED_HEADER, CACHE_RESULT_HEADER,
};
pub use routes::create_router;
