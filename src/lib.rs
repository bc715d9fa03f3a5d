// remote-svg library.
// Fetches remote SVG content with in-flight deduplication and a persisted, self-sweeping cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod store;

pub use cache::{ResolveOptions, ResourceCache, SweepCoordinator};
pub use config::Config;
pub use error::{RemoteSvgError, Result};
pub use fetch::{Deduplicator, Fetcher, HttpFetcher};
pub use store::{FileStore, KeyValueStore, MemoryStore};
