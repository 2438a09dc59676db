//! Request-pipeline hooks
//!
//! Two middlewares decide per route whether the view cache takes part:
//! `disable_cache` marks a request as bypassing the cache, `enable_cache`
//! marks it eligible and answers straight from the view cache on a hit.
//!
//! The marker travels as a request extension so handlers know whether to
//! store what they render.

use axum::{
    extract::{Request, State},
    http::{header::HeaderName, HeaderValue, Method, Uri},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};
use tracing::{debug, instrument, warn};

use super::handlers::AppState;

/// `true` when the cache was bypassed for this request, `false` otherwise.
pub const CACHE_DISABLED_HEADER: &str = "x-periodic-cache-disabled";
/// `hit` or `miss` for eligible requests while the view cache is active.
pub const CACHE_RESULT_HEADER: &str = "x-periodic-cache";

/// Request-scoped cache decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMarker {
    Bypass,
    Eligible,
}

/// Canonical URL used for view keys: path plus query string.
pub fn request_url(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

fn mark(mut response: Response, name: &'static str, value: &'static str) -> Response {
    response
        .headers_mut()
        .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    response
}

// == Disable Cache ==
/// Marks the request as cache-bypassing and always proceeds.
///
/// A request an outer layer already marked eligible keeps its marker.
pub async fn disable_cache(mut request: Request, next: Next) -> Response {
    let eligible = request.extensions().get::<CacheMarker>() == Some(&CacheMarker::Eligible);
    if eligible {
        return next.run(request).await;
    }

    request.extensions_mut().insert(CacheMarker::Bypass);
    debug!(path = %request.uri().path(), "view cache bypassed");
    mark(next.run(request).await, CACHE_DISABLED_HEADER, "true")
}

// == Enable Cache ==
/// Marks the request as cache-eligible and serves cached views.
///
/// When global and view-cache status are both active the view cache is
/// consulted: a hit is written straight to the response without running
/// the handler, a miss proceeds. Only GET requests take part. A failing
/// lookup is logged and treated as a miss.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn enable_cache(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    request.extensions_mut().insert(CacheMarker::Eligible);

    if !state.cache.view_enabled().await {
        return mark(next.run(request).await, CACHE_DISABLED_HEADER, "false");
    }

    let url = request_url(request.uri());
    match state.cache.get_view(&url).await {
        Ok(Some(body)) => {
            debug!(cache = "view", outcome = "hit", "serving cached view");
            let response = mark(Html(body).into_response(), CACHE_DISABLED_HEADER, "false");
            mark(response, CACHE_RESULT_HEADER, "hit")
        }
        Ok(None) => {
            debug!(cache = "view", outcome = "miss", "running handler");
            let response = mark(next.run(request).await, CACHE_DISABLED_HEADER, "false");
            mark(response, CACHE_RESULT_HEADER, "miss")
        }
        Err(err) => {
            warn!(cache = "view", error = %err, "view cache lookup failed");
            let response = mark(next.run(request).await, CACHE_DISABLED_HEADER, "false");
            mark(response, CACHE_RESULT_HEADER, "miss")
        }
    }
}
