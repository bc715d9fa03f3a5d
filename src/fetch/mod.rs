// Fetch module.
// Retrieves remote resources and deduplicates concurrent retrievals.

pub mod client;
pub mod dedup;

pub use client::{DEFAULT_USER_AGENT, Fetcher, HttpFetcher};
pub use dedup::Deduplicator;
