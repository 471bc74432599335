// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregator;
pub mod api;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod error;
pub mod normalize;
pub mod providers;
pub mod ratelimit;

// ---- Re-exports for stable public API ----
pub use crate::aggregator::{AggregateResult, NewsAggregator};
pub use crate::api::{router, AppState};
pub use crate::config::Config;
pub use crate::error::{ApiError, UpstreamError};
