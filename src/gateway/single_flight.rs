use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{BoxFuture, FutureExt, Shared};

/// The shared work stopped without producing an output (it panicked, or the
/// runtime shut down under it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("in-flight call was aborted before completing")]
pub struct FlightAborted;

type Call<T> = Shared<BoxFuture<'static, Result<T, FlightAborted>>>;

struct Flight<T> {
    id: u64,
    call: Call<T>,
}

type Flights<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

/// Coalesces concurrent calls for the same key into one execution.
///
/// The first caller for a key spawns the work as its own task; callers
/// arriving while it is in flight await the same shared result. The task
/// clears its entry when it finishes, whether or not anyone is still
/// waiting, so a later call never joins a finished or abandoned flight.
pub struct SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    calls: Flights<T>,
    next_id: AtomicU64,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Returns the output and whether this caller started the work.
    ///
    /// `work` is only invoked by the leader. Dropping any caller, the leader
    /// included, does not cancel the work.
    pub async fn run<F, Fut>(&self, key: &str, work: F) -> (Result<T, FlightAborted>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (call, leader) = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            match calls.get(key) {
                Some(flight) => (flight.call.clone(), false),
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let landing = Landing {
                        calls: Arc::clone(&self.calls),
                        key: key.to_string(),
                        id,
                    };
                    let work = work();
                    let task = tokio::spawn(async move {
                        let _landing = landing;
                        work.await
                    });
                    let call = async move { task.await.map_err(|_| FlightAborted) }
                        .boxed()
                        .shared();
                    calls.insert(
                        key.to_string(),
                        Flight {
                            id,
                            call: call.clone(),
                        },
                    );
                    (call, true)
                }
            }
        };

        (call.await, leader)
    }

    pub fn in_flight(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Removes its flight's entry when the spawned work ends, however it ends.
struct Landing<T>
where
    T: Clone + Send + Sync + 'static,
{
    calls: Flights<T>,
    key: String,
    id: u64,
}

impl<T> Drop for Landing<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        if calls.get(&self.key).is_some_and(|flight| flight.id == self.id) {
            calls.remove(&self.key);
        }
    }
}
