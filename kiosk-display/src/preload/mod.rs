//! Catalog preloading under a bounded concurrency limit

pub mod preloader;
pub mod scheduler;

pub use preloader::{PairOutcome, PreloadSummary, Preloader};
pub use scheduler::{BoundedScheduler, Slot, DEFAULT_CONCURRENCY};
