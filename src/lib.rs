// src/lib.rs
// Public library surface for the CLI, integration tests and reuse.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod present;
pub mod smooth;

// Batch driver, sinks and instrumentation around the core
pub mod metrics;
pub mod pipeline;
pub mod sink;
pub mod timing;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{aggregate, aggregate_with, per_minute, Bucket, BucketMode};
pub use crate::error::DensityError;
pub use crate::ingest::types::{ChatMessage, ChatSource};
pub use crate::present::{present, ChartKind, Labels, RenderRequest, Series};
pub use crate::smooth::{smooth, smooth_buckets, SmoothedPoint};
