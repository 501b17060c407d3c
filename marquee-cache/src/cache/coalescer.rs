//! In-flight origin call tracking (stampede protection).
//!
//! At most one origin call runs per key. The first caller for a key becomes
//! the leader and registers a shared future; every caller that arrives while
//! that future is pending joins it instead of calling the origin again.
//!
//! The in-flight record is removed inside the shared future, under the table
//! lock, before its output is published. A caller that arrives afterwards
//! therefore starts a fresh call, and a caller that joined before removal
//! always receives the completed result.
//!
//! Waiters are counted. Dropping a waiter leaves the call running for the
//! others; dropping the last one before completion removes the record and
//! drops the origin future.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use marquee_core::{CacheKey, OriginError};

type SharedCall<T> = Shared<BoxFuture<'static, Result<T, OriginError>>>;

struct InFlight<T> {
    id: u64,
    call: SharedCall<T>,
    waiters: usize,
}

type InFlightTable<T> = Mutex<HashMap<CacheKey, InFlight<T>>>;

fn lock_table<T>(table: &InFlightTable<T>) -> MutexGuard<'_, HashMap<CacheKey, InFlight<T>>> {
    match table.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("In-flight table lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

fn remove_if_current<T>(
    table: &mut HashMap<CacheKey, InFlight<T>>,
    key: &CacheKey,
    id: u64,
) -> Option<InFlight<T>> {
    match table.get(key) {
        Some(record) if record.id == id => table.remove(key),
        _ => None,
    }
}

/// How a caller takes part in an origin call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Started the origin call.
    Leader,
    /// Joined a call started by someone else.
    Follower,
}

/// Tracks in-flight origin calls by key.
pub struct Coalescer<T> {
    table: Arc<InFlightTable<T>>,
    next_id: AtomicU64,
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `origin` for `key`, or join the call already in flight.
    pub async fn run_exclusive<F, Fut>(&self, key: CacheKey, origin: F) -> Result<T, OriginError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, OriginError>> + Send + 'static,
    {
        self.join(key, origin).await
    }

    /// Register interest in `key` and return a future for its result.
    ///
    /// `origin` is only invoked if no call is in flight for `key`, and only
    /// once the returned waiter (or another waiter on the same call) is
    /// polled.
    pub fn join<F, Fut>(&self, key: CacheKey, origin: F) -> Waiter<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, OriginError>> + Send + 'static,
    {
        let mut table = lock_table(&self.table);

        if let Some(record) = table.get_mut(&key) {
            record.waiters += 1;
            tracing::trace!(key = %key, waiters = record.waiters, "Joining in-flight origin call");
            return Waiter {
                guard: WaiterGuard {
                    table: Arc::clone(&self.table),
                    key,
                    id: record.id,
                    finished: false,
                },
                call: record.call.clone(),
                role: Role::Follower,
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cleanup_table = Arc::clone(&self.table);
        let cleanup_key = key.clone();
        let call = async move {
            let result = origin().await;
            let finished = {
                let mut table = lock_table(&cleanup_table);
                remove_if_current(&mut table, &cleanup_key, id)
            };
            drop(finished);
            result
        }
        .boxed()
        .shared();

        table.insert(
            key.clone(),
            InFlight {
                id,
                call: call.clone(),
                waiters: 1,
            },
        );
        tracing::trace!(key = %key, "Starting origin call");

        Waiter {
            guard: WaiterGuard {
                table: Arc::clone(&self.table),
                key,
                id,
                finished: false,
            },
            call,
            role: Role::Leader,
        }
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        lock_table(&self.table).contains_key(key)
    }

    /// Number of keys with a call in flight.
    pub fn in_flight(&self) -> usize {
        lock_table(&self.table).len()
    }

    /// Number of live waiters on the call in flight for `key`.
    pub fn waiters(&self, key: &CacheKey) -> usize {
        lock_table(&self.table)
            .get(key)
            .map(|record| record.waiters)
            .unwrap_or(0)
    }
}

struct WaiterGuard<T> {
    table: Arc<InFlightTable<T>>,
    key: CacheKey,
    id: u64,
    finished: bool,
}

impl<T> Drop for WaiterGuard<T> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        let abandoned = {
            let mut table = lock_table(&self.table);
            match table.get_mut(&self.key) {
                Some(record) if record.id == self.id => {
                    record.waiters = record.waiters.saturating_sub(1);
                    if record.waiters == 0 {
                        table.remove(&self.key)
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };

        if abandoned.is_some() {
            tracing::debug!(key = %self.key, "Last waiter dropped, abandoning origin call");
        }
        // Dropped outside the lock: this may drop the origin future itself.
        drop(abandoned);
    }
}

/// Future resolving to the result of a (possibly shared) origin call.
pub struct Waiter<T> {
    // Declared before `call` so the guard releases the record first.
    guard: WaiterGuard<T>,
    call: SharedCall<T>,
    role: Role,
}

impl<T> Waiter<T> {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn key(&self) -> &CacheKey {
        &self.guard.key
    }
}

impl<T: Clone> Future for Waiter<T> {
    type Output = Result<T, OriginError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let poll = this.call.poll_unpin(cx);
        if poll.is_ready() {
            this.guard.finished = true;
        }
        poll
    }
}
