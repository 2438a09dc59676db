//! Request, response and content models
//!
//! DTOs used for serializing/deserializing HTTP bodies, plus the demo
//! content records.

pub mod content;
pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use content::{render_list, ContentRepo, Item};
pub use requests::{CacheTarget, InvalidateRequest, StatusRequest, UpdateItemRequest};
pub use responses::{
    ClearResponse, ErrorResponse, HealthResponse, InvalidateResponse, OptionsResponse,
    StatsResponse, StatusResponse, StoreStatsResponse,
};
