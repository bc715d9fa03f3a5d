// Cache module for remotely hosted SVG content.
// Persisted entries with per-entry expiry and a periodic global sweep.

pub mod entry;
pub mod keys;
pub mod manager;
pub mod sweep;

pub use entry::{CacheEntry, DEFAULT_FRESHNESS};
pub use manager::{DEFAULT_FALLBACK_SVG, ResolveOptions, ResourceCache, StoredEntry};
pub use sweep::{DEFAULT_RESET_INTERVAL, SweepCoordinator, SweepOutcome, SweepState};
