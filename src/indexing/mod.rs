pub mod builder;
pub mod cache;

pub use builder::{BuildProgress, IndexBuilder};
pub use cache::{Freshness, IndexCache, IndexHandle, IndexStatus, StaleReason};
