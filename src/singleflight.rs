//! Single-flight request collapsing
//!
//! Concurrent callers asking for the same key while a computation for it is
//! still running attach to that computation and receive a clone of its
//! output. The entry is dropped as soon as the computation finishes, so the
//! next call after completion starts fresh.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type Flight<V> = Shared<BoxFuture<'static, V>>;

/// Map of in-flight computations keyed by request identity
pub struct SingleFlight<K, V> {
    flights: Arc<Mutex<HashMap<K, Flight<V>>>>,
}

impl<K, V> Clone for SingleFlight<K, V> {
    fn clone(&self) -> Self {
        Self {
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `make()` for `key`, or join the run already in progress
    ///
    /// `make` is only called when no flight exists for `key`.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let flight = {
            let mut flights = lock(&self.flights);
            match flights.get(&key) {
                Some(existing) => {
                    debug!(?key, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    let registry = Arc::clone(&self.flights);
                    let owned_key = key.clone();
                    let work = make();
                    let flight = async move {
                        let value = work.await;
                        lock(&registry).remove(&owned_key);
                        value
                    }
                    .boxed()
                    .shared();
                    flights.insert(key, flight.clone());
                    flight
                }
            }
        };
        flight.await
    }

    /// Number of keys currently being computed
    pub fn in_flight(&self) -> usize {
        lock(&self.flights).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counted(
        calls: &Arc<AtomicUsize>,
        value: u32,
    ) -> impl Future<Output = u32> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            value
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let flights: SingleFlight<String, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flights.run("x".to_string(), || counted(&calls, 1)),
            flights.run("x".to_string(), || counted(&calls, 2)),
        );

        assert_eq!(a, 1);
        assert_eq!(b, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_separately() {
        let flights: SingleFlight<String, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            flights.run("x".to_string(), || counted(&calls, 1)),
            flights.run("y".to_string(), || counted(&calls, 2)),
        );

        assert_eq!((a, b), (1, 2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_completed_flight_is_not_reused() {
        let flights: SingleFlight<String, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(flights.run("x".to_string(), || counted(&calls, 1)).await, 1);
        assert_eq!(flights.run("x".to_string(), || counted(&calls, 2)).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
