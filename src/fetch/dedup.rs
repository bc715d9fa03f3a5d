// In-flight request deduplication.
// Guarantees at most one outstanding retrieval per resource identifier.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::{RemoteSvgError, Result};

type SharedRetrieval = Shared<BoxFuture<'static, std::result::Result<String, Arc<RemoteSvgError>>>>;

type InFlightMap = Arc<Mutex<HashMap<String, SharedRetrieval>>>;

/// Map from resource identifier to the retrieval currently running for it.
///
/// Clones share the same map. Each retrieval is spawned onto the runtime, so
/// it runs to completion even when every caller waiting on it goes away.
/// The entry is removed just before the result is handed to waiters,
/// whether the retrieval succeeded, failed, or panicked.
#[derive(Clone, Default)]
pub struct Deduplicator {
    in_flight: InFlightMap,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the retrieval in flight for `identifier`, or start one with `start`.
    ///
    /// `start` is only invoked when no retrieval is running. Failures are
    /// propagated to every waiter as `RemoteSvgError::Retrieval`.
    pub async fn retrieve<F, Fut>(&self, identifier: &str, start: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let retrieval = {
            let mut in_flight = lock(&self.in_flight);

            if let Some(existing) = in_flight.get(identifier) {
                tracing::debug!(identifier, "Joining in-flight retrieval");
                existing.clone()
            } else {
                let settled = Settled {
                    map: Arc::clone(&self.in_flight),
                    key: identifier.to_string(),
                };
                let work = start();

                let retrieval = async move {
                    let result = work.await.map_err(Arc::new);
                    drop(settled);
                    result
                }
                .boxed()
                .shared();

                in_flight.insert(identifier.to_string(), retrieval.clone());
                tokio::spawn(retrieval.clone());
                retrieval
            }
        };

        retrieval.await.map_err(RemoteSvgError::Retrieval)
    }

    /// Number of retrievals currently running.
    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Whether a retrieval for `identifier` is currently running.
    pub fn is_in_flight(&self, identifier: &str) -> bool {
        lock(&self.in_flight).contains_key(identifier)
    }
}

/// Removes an identifier from the in-flight map when dropped.
///
/// Dropped explicitly once the retrieval settles, or during unwinding if the
/// retrieval panics, so a panicking fetch never leaves a poisoned entry behind.
struct Settled {
    map: InFlightMap,
    key: String,
}

impl Drop for Settled {
    fn drop(&mut self) {
        lock(&self.map).remove(&self.key);
    }
}

fn lock(map: &InFlightMap) -> MutexGuard<'_, HashMap<String, SharedRetrieval>> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Returns a retrieval that waits on `gate` and counts its starts.
    fn gated(
        calls: Arc<AtomicUsize>,
        gate: Arc<Semaphore>,
        result: Result<String>,
    ) -> impl Future<Output = Result<String>> + Send + 'static {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
            gate.acquire().await.unwrap().forget();
            result
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_retrieval() {
        let dedup = Deduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let waiters = (0..5).map(|_| {
            dedup.retrieve("https://cdn.example/test.svg", || {
                gated(calls.clone(), gate.clone(), Ok("<svg/>".to_string()))
            })
        });

        let release = async {
            tokio::task::yield_now().await;
            assert_eq!(dedup.in_flight(), 1);
            gate.add_permits(1);
        };

        let (results, ()) = tokio::join!(futures::future::join_all(waiters), release);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert_eq!(result.unwrap(), "<svg/>");
        }
        assert_eq!(dedup.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_reaches_every_waiter_and_clears_entry() {
        let dedup = Deduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        let waiters = (0..3).map(|_| {
            dedup.retrieve("a.svg", || {
                gated(calls.clone(), gate.clone(), Err(RemoteSvgError::Other("boom".into())))
            })
        });

        let release = async {
            tokio::task::yield_now().await;
            gate.add_permits(1);
        };

        let (results, ()) = tokio::join!(futures::future::join_all(waiters), release);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for result in results {
            assert!(matches!(result, Err(RemoteSvgError::Retrieval(_))));
        }
        assert!(!dedup.is_in_flight("a.svg"));

        // A settled failure does not block the next attempt.
        gate.add_permits(1);
        let retry = dedup
            .retrieve("a.svg", || gated(calls.clone(), gate.clone(), Ok("ok".into())))
            .await;
        assert_eq!(retry.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sequential_calls_start_new_retrievals() {
        let dedup = Deduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(2));

        for _ in 0..2 {
            dedup
                .retrieve("a.svg", || gated(calls.clone(), gate.clone(), Ok("x".into())))
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_identifiers_are_independent() {
        let dedup = Deduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(2));

        let (a, b) = tokio::join!(
            dedup.retrieve("https://one.example/icon.svg", || {
                gated(calls.clone(), gate.clone(), Ok("one".into()))
            }),
            dedup.retrieve("https://two.example/icon.svg", || {
                gated(calls.clone(), gate.clone(), Ok("two".into()))
            }),
        );

        assert_eq!(a.unwrap(), "one");
        assert_eq!(b.unwrap(), "two");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    fn explode() -> Result<String> {
        panic!("fetcher exploded")
    }

    #[tokio::test]
    async fn test_panicking_retrieval_clears_entry() {
        let dedup = Deduplicator::new();
        let gate = Arc::new(Semaphore::new(0));

        {
            let gate = gate.clone();
            let waiter = dedup.retrieve("boom.svg", move || async move {
                gate.acquire().await.unwrap().forget();
                explode()
            });
            assert!(futures::poll!(Box::pin(waiter)).is_pending());
        }

        assert!(dedup.is_in_flight("boom.svg"));
        gate.add_permits(1);

        while dedup.is_in_flight("boom.svg") {
            tokio::task::yield_now().await;
        }

        // The next caller starts a fresh retrieval instead of joining the dead one.
        let retry = dedup
            .retrieve("boom.svg", || async {
                Ok::<_, RemoteSvgError>("recovered".to_string())
            })
            .await;
        assert_eq!(retry.unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_abandoned_retrieval_runs_to_completion() {
        let dedup = Deduplicator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));

        {
            let done = Arc::clone(&completed);
            let work = gated(calls.clone(), gate.clone(), Ok("late".into()));
            let waiter = dedup.retrieve("late.svg", move || async move {
                let result = work.await;
                done.fetch_add(1, Ordering::SeqCst);
                result
            });
            // Poll once so the retrieval is registered, then drop the waiter.
            assert!(futures::poll!(Box::pin(waiter)).is_pending());
        }

        assert!(dedup.is_in_flight("late.svg"));
        gate.add_permits(1);

        while dedup.is_in_flight("late.svg") {
            tokio::task::yield_now().await;
        }
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }
}
