//! Response DTOs for the HTTP API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cache::{CacheStats, CacheStatus, ClearReport, FacadeStats};

/// Usage figures for one store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatsResponse {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<CacheStats> for StoreStatsResponse {
    fn from(stats: CacheStats) -> Self {
        Self {
            size: stats.size,
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for GET /cache/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub status: CacheStatus,
    pub data: StoreStatsResponse,
    pub view: StoreStatsResponse,
}

impl StatsResponse {
    pub fn new(status: CacheStatus, stats: FacadeStats) -> Self {
        Self {
            status,
            data: stats.data.into(),
            view: stats.view.into(),
        }
    }
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub data: String,
    pub view: String,
}

impl From<&ClearReport> for ClearResponse {
    fn from(report: &ClearReport) -> Self {
        fn side(r: &crate::error::Result<crate::cache::ClearOutcome>) -> String {
            match r {
                Ok(outcome) => outcome.to_string(),
                Err(err) => err.to_string(),
            }
        }
        Self {
            data: side(&report.data),
            view: side(&report.view),
        }
    }
}

/// Response body for invalidation (POST /cache/invalidate, PUT /item/:id)
#[derive(Debug, Clone, Default, Serialize)]
pub struct InvalidateResponse {
    pub data_purged: usize,
    pub view_purged: usize,
}

/// Response body for PUT /cache/status
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: CacheStatus,
}

/// Response body for PATCH /cache/options
#[derive(Debug, Clone, Serialize)]
pub struct OptionsResponse {
    pub options: Map<String, Value>,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
