//! API Handlers
//!
//! Content routes that read through the cache, and admin routes that
//! inspect and purge it.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::Uri,
    response::Html,
    Extension, Json,
};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::hooks::{request_url, CacheMarker};
use crate::cache::{CacheFacade, ContentCategory, InvalidationQuery, PatternQuery};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    render_list, ClearResponse, ContentRepo, HealthResponse, InvalidateRequest,
    InvalidateResponse, Item, OptionsResponse, StatsResponse, StatusRequest, StatusResponse,
    UpdateItemRequest,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<CacheFacade>,
    /// Content repository standing in for the application database
    pub content: Arc<RwLock<ContentRepo>>,
}

impl AppState {
    pub fn new(cache: Arc<CacheFacade>, content: ContentRepo) -> Self {
        Self {
            cache,
            content: Arc::new(RwLock::new(content)),
        }
    }

    /// In-memory caches with default options over the seeded repository.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(CacheFacade::default()), ContentRepo::seeded())
    }

    /// Builds the caches described by the configuration over the seeded
    /// repository.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let cache = CacheFacade::from_config(config).await?;
        Ok(Self::new(Arc::new(cache), ContentRepo::seeded()))
    }
}

// == Content Helpers ==

/// Loads an item through the data cache.
///
/// Cache faults are logged and the repository is used instead.
async fn load_item(state: &AppState, id: &str) -> Result<Item> {
    let key = state.cache.data_key(&format!("item/{id}"));

    match state.cache.get_data(&key).await {
        Ok(Some(value)) => match serde_json::from_value::<Item>(value) {
            Ok(item) => {
                debug!(cache = "data", outcome = "hit", %key);
                return Ok(item);
            }
            Err(err) => warn!(%key, error = %err, "discarding undecodable cached item"),
        },
        Ok(None) => debug!(cache = "data", outcome = "miss", %key),
        Err(err) => warn!(%key, error = %err, "data cache lookup failed"),
    }

    let item = state
        .content
        .read()
        .await
        .get(id)
        .cloned()
        .ok_or_else(|| CacheError::NotFound(format!("item {id}")))?;

    let value = serde_json::to_value(&item)?;
    if let Err(err) = state
        .cache
        .set_data(Some(ContentCategory::Item), &key, value)
        .await
    {
        warn!(%key, error = %err, "data cache store failed");
    }
    Ok(item)
}

/// Stores a rendered view when the request was marked cache-eligible.
async fn store_view(
    state: &AppState,
    marker: Option<Extension<CacheMarker>>,
    uri: &Uri,
    html: &str,
) {
    if !matches!(marker, Some(Extension(CacheMarker::Eligible))) {
        return;
    }
    let url = request_url(uri);
    if let Err(err) = state.cache.set_view(&url, html.to_string()).await {
        warn!(%url, error = %err, "view cache store failed");
    }
}

/// Purges `query` from the selected caches concurrently.
///
/// Both sides always run; each failure is logged and the first one is
/// returned once both have finished.
async fn invalidate_caches(
    state: &AppState,
    query: &InvalidationQuery,
    data: bool,
    view: bool,
) -> Result<InvalidateResponse> {
    let (data_purged, view_purged) = tokio::join!(
        async {
            if data {
                state.cache.invalidate_data(query).await
            } else {
                Ok(0)
            }
        },
        async {
            if view {
                state.cache.invalidate_views(query).await
            } else {
                Ok(0)
            }
        },
    );

    if let Err(err) = &data_purged {
        warn!(error = %err, "data cache invalidation failed");
    }
    if let Err(err) = &view_purged {
        warn!(error = %err, "view cache invalidation failed");
    }
    Ok(InvalidateResponse {
        data_purged: data_purged?,
        view_purged: view_purged?,
    })
}

// == Content Handlers ==

/// Handler for GET /item/:id
pub async fn get_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    marker: Option<Extension<CacheMarker>>,
    uri: Uri,
) -> Result<Html<String>> {
    let html = load_item(&state, &id).await?.render();
    store_view(&state, marker, &uri, &html).await;
    Ok(Html(html))
}

/// Handler for GET /items
pub async fn list_items_handler(
    State(state): State<AppState>,
    marker: Option<Extension<CacheMarker>>,
    uri: Uri,
) -> Result<Html<String>> {
    let items = state.content.read().await.list();
    let html = render_list(&items);
    store_view(&state, marker, &uri, &html).await;
    Ok(Html(html))
}

/// Handler for GET /preview/item/:id
///
/// Routed through `disable_cache`, so the page is never stored.
pub async fn preview_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    marker: Option<Extension<CacheMarker>>,
    uri: Uri,
) -> Result<Html<String>> {
    let item = state
        .content
        .read()
        .await
        .get(&id)
        .cloned()
        .ok_or_else(|| CacheError::NotFound(format!("item {id}")))?;
    let html = item.render();
    store_view(&state, marker, &uri, &html).await;
    Ok(Html(html))
}

/// Handler for PUT /item/:id
///
/// Saves the item, then purges its data record, its pages and every item
/// list page from both caches.
pub async fn update_item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state
        .content
        .write()
        .await
        .upsert(Item::new(id.clone(), req.title, req.body));

    let query: InvalidationQuery = PatternQuery::collection(ContentCategory::Item.as_str())
        .with_plural("items")
        .with_entity_id(id.clone())
        .into();
    let response = invalidate_caches(&state, &query, true, true).await?;

    info!(
        item = %id,
        data_purged = response.data_purged,
        view_purged = response.view_purged,
        "item updated"
    );
    Ok(Json(response))
}

// == Admin Handlers ==

/// Handler for GET /cache/stats
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let stats = state.cache.stats().await?;
    Ok(Json(StatsResponse::new(state.cache.get_status().await, stats)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let report = state.cache.clear_all().await?;
    Ok(Json(ClearResponse::from(&report)))
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    let query = req.query();
    let response = invalidate_caches(
        &state,
        &query,
        req.cache.includes_data(),
        req.cache.includes_view(),
    )
    .await?;
    Ok(Json(response))
}

/// Handler for PUT /cache/status
pub async fn status_handler(
    State(state): State<AppState>,
    Json(req): Json<StatusRequest>,
) -> Json<StatusResponse> {
    state.cache.set_status(&req.status).await;
    Json(StatusResponse {
        status: state.cache.get_status().await,
    })
}

/// Handler for GET /cache/options
pub async fn get_options_handler(State(state): State<AppState>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        options: state.cache.options().await.to_map(),
    })
}

/// Handler for PATCH /cache/options
pub async fn options_handler(
    State(state): State<AppState>,
    Json(overrides): Json<Map<String, Value>>,
) -> Result<Json<OptionsResponse>> {
    let options = state.cache.set_options(&overrides).await?;
    Ok(Json(OptionsResponse {
        options: options.to_map(),
    }))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
