//! Single-flight expiring value cache.
//!
//! An [`ExpiringValue`] holds one lazily computed value with a time-to-live.
//! A miss starts exactly one computation; callers arriving while it runs
//! await the same shared future and observe the same result, success or
//! failure. Failures are never cached.

use crate::error::CloudResult;
use crate::metrics;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

type Factory<T> = Arc<dyn Fn() -> BoxFuture<'static, CloudResult<T>> + Send + Sync>;
type Flight<T> = Shared<BoxFuture<'static, CloudResult<T>>>;

struct State<T: Clone> {
    value: Option<(T, Instant)>,
    /// In-flight computation tagged with the generation that started it.
    flight: Option<(u64, Flight<T>)>,
    generation: u64,
}

/// A cached value recomputed on first access after expiry or [`expire`].
///
/// [`expire`]: ExpiringValue::expire
pub struct ExpiringValue<T: Clone + Send + Sync + 'static> {
    name: &'static str,
    ttl: Duration,
    factory: Factory<T>,
    state: Mutex<State<T>>,
}

impl<T: Clone + Send + Sync + 'static> ExpiringValue<T> {
    /// Create an empty cache. `name` labels logs and metrics.
    pub fn new<F, Fut>(name: &'static str, ttl: Duration, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CloudResult<T>> + Send + 'static,
    {
        Self {
            name,
            ttl,
            factory: Arc::new(move || factory().boxed()),
            state: Mutex::new(State {
                value: None,
                flight: None,
                generation: 0,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached value, computing it if absent or expired.
    pub async fn get(&self) -> CloudResult<T> {
        let (generation, flight) = {
            let mut state = self.lock();
            if let Some((value, computed_at)) = &state.value {
                if computed_at.elapsed() < self.ttl {
                    return Ok(value.clone());
                }
            }
            match &state.flight {
                Some((generation, flight)) => (*generation, flight.clone()),
                None => {
                    debug!(cache = self.name, "value missing or expired, recomputing");
                    metrics::CACHE_REFRESHES
                        .with_label_values(&[self.name])
                        .inc();
                    state.generation += 1;
                    let flight = (self.factory)().shared();
                    state.flight = Some((state.generation, flight.clone()));
                    (state.generation, flight)
                }
            }
        };

        let result = flight.await;

        let mut state = self.lock();
        let current = matches!(&state.flight, Some((g, _)) if *g == generation);
        if current {
            state.flight = None;
            match &result {
                Ok(value) => state.value = Some((value.clone(), Instant::now())),
                Err(e) => debug!(cache = self.name, error = %e, "recomputation failed"),
            }
        }
        result
    }

    /// Mark the value stale; the next [`get`](Self::get) recomputes.
    ///
    /// A computation already in flight still completes for its waiters but
    /// its result is not stored.
    pub fn expire(&self) {
        let mut state = self.lock();
        state.value = None;
        state.flight = None;
        debug!(cache = self.name, "expired");
    }

    /// Drop the stored value but let a computation already in flight store
    /// its result.
    ///
    /// Used when a dependency was refreshed: a computation running right now
    /// already observes the new dependency, an older stored value does not.
    pub fn clear(&self) {
        self.lock().value = None;
    }

    /// The cached value if present and fresh, without computing.
    pub fn peek(&self) -> Option<T> {
        let state = self.lock();
        state
            .value
            .as_ref()
            .filter(|(_, computed_at)| computed_at.elapsed() < self.ttl)
            .map(|(value, _)| value.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send + Sync + 'static> std::fmt::Debug for ExpiringValue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringValue")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
