//! Media resources: handles, fetching, and the preload cache

pub mod cache;
pub mod fetcher;
pub mod handle;
pub mod probe;

pub use cache::{CacheEntry, MediaCache};
pub use fetcher::{HttpFetcher, MediaFetcher};
pub use handle::{AudioHandle, BufferStatus, ImageHandle};
