// Global cache sweep.
// Periodically purges every persisted cache entry, checked at most once per activation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::KeyValueStore;

use super::entry::{decode_timestamp, encode_timestamp, has_elapsed};
use super::keys::{GLOBAL_TIMESTAMP_KEY, is_cache_key};

/// Default interval between sweeps: 10 minutes.
pub const DEFAULT_RESET_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Whether the coordinator has already looked at the global timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepState {
    #[default]
    Unchecked,
    Checked,
}

/// What an activation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// This coordinator already ran its check.
    AlreadyChecked,
    /// No global timestamp existed; one was written and nothing deleted.
    Initialized,
    /// The last sweep is younger than the reset interval.
    NotDue,
    /// The interval had elapsed and this many keys were deleted.
    Swept { deleted: usize },
    /// The store could not be read or enumerated; the check will be retried.
    Failed,
}

/// Runs the check-and-maybe-sweep logic once per activation.
///
/// One coordinator is shared by every cache that should observe the same
/// "once" guarantee. `reset` returns it to `Unchecked`, which is equivalent
/// to a process restart.
#[derive(Debug)]
pub struct SweepCoordinator {
    interval: Duration,
    state: Mutex<SweepState>,
}

impl Default for SweepCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_RESET_INTERVAL)
    }
}

impl SweepCoordinator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(SweepState::Unchecked),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn state(&self) -> SweepState {
        *self.state.lock().await
    }

    /// Forget that the check ran.
    pub async fn reset(&self) {
        *self.state.lock().await = SweepState::Unchecked;
    }

    /// Run the check if it has not run yet. Never fails; errors are logged.
    pub async fn activate(&self, store: &dyn KeyValueStore) -> SweepOutcome {
        self.activate_at(store, Utc::now()).await
    }

    /// `activate` with an explicit current time.
    pub async fn activate_at(&self, store: &dyn KeyValueStore, now: DateTime<Utc>) -> SweepOutcome {
        // Held across the whole check so concurrent first activations run it once.
        let mut state = self.state.lock().await;
        if *state == SweepState::Checked {
            return SweepOutcome::AlreadyChecked;
        }

        match self.check(store, now).await {
            Ok(outcome) => {
                *state = SweepState::Checked;
                outcome
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache sweep check failed, will retry");
                SweepOutcome::Failed
            }
        }
    }

    /// Sweep immediately regardless of the interval and restamp the global timestamp.
    pub async fn force_sweep(&self, store: &dyn KeyValueStore) -> Result<usize> {
        let mut state = self.state.lock().await;
        let deleted = purge_cache_keys(store).await?;
        store
            .set(GLOBAL_TIMESTAMP_KEY, &encode_timestamp(Utc::now()))
            .await?;
        *state = SweepState::Checked;
        Ok(deleted)
    }

    async fn check(&self, store: &dyn KeyValueStore, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let last_swept = store
            .get(GLOBAL_TIMESTAMP_KEY)
            .await?
            .as_deref()
            .and_then(decode_timestamp);

        match last_swept {
            None => {
                store
                    .set(GLOBAL_TIMESTAMP_KEY, &encode_timestamp(now))
                    .await?;
                tracing::debug!("Initialized global cache sweep timestamp");
                Ok(SweepOutcome::Initialized)
            }
            Some(last) if has_elapsed(last, self.interval, now) => {
                let deleted = purge_cache_keys(store).await?;
                store
                    .set(GLOBAL_TIMESTAMP_KEY, &encode_timestamp(now))
                    .await?;
                tracing::info!(deleted, "Swept persisted cache");
                Ok(SweepOutcome::Swept { deleted })
            }
            Some(last) => {
                tracing::trace!(last_swept = %last, "Cache sweep not due");
                Ok(SweepOutcome::NotDue)
            }
        }
    }
}

/// Delete every key holding cache content or a cache timestamp.
///
/// Fails only if the keys cannot be enumerated. Individual delete failures
/// are logged and skipped. Returns the number of keys deleted.
pub async fn purge_cache_keys(store: &dyn KeyValueStore) -> Result<usize> {
    let keys = store.list_keys().await?;

    let mut deleted = 0;
    for key in keys.iter().filter(|k| is_cache_key(k)) {
        match store.delete(key).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to delete cache key"),
        }
    }

    Ok(deleted)
}
