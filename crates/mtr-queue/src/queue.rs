use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::Backoff;

/// Deduplicating, retry-counted queue of object keys.
///
/// Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    backoff: Backoff,
    state: Mutex<State>,
    notify: Notify,
}

#[derive(Default)]
struct State {
    queue: VecDeque<String>,
    /// Keys waiting to be processed, whether or not they sit in `queue`.
    dirty: HashSet<String>,
    processing: HashSet<String>,
    failures: HashMap<String, u32>,
    /// Earliest pending `add_after` deadline per key. One timer per key.
    waiting: HashMap<String, Instant>,
    shutting_down: bool,
}

impl WorkQueue {
    pub fn new(name: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                backoff,
                state: Mutex::new(State::default()),
                notify: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn add(&self, key: impl Into<String>) {
        let key = key.into();
        let mut st = self.state();
        if st.shutting_down || !st.dirty.insert(key.clone()) {
            return;
        }
        if st.processing.contains(&key) {
            // queued again by `done`
            return;
        }
        st.queue.push_back(key);
        drop(st);
        self.inner.notify.notify_one();
    }

    /// Add `key` once `delay` has elapsed. Must be called within a Tokio
    /// runtime.
    ///
    /// Delayed adds of one key collapse: while a timer for `key` is pending
    /// with an earlier or equal deadline, this is a no-op.
    pub fn add_after(&self, key: impl Into<String>, delay: Duration) {
        let key = key.into();
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let deadline = Instant::now() + delay;
        {
            let mut st = self.state();
            if st.shutting_down {
                return;
            }
            if st.waiting.get(&key).is_some_and(|at| *at <= deadline) {
                return;
            }
            st.waiting.insert(key.clone(), deadline);
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            queue.fire(key, deadline);
        });
    }

    /// Number of keys with a pending delayed add.
    pub fn waiting(&self) -> usize {
        self.state().waiting.len()
    }

    fn fire(&self, key: String, deadline: Instant) {
        {
            let mut st = self.state();
            match st.waiting.get(&key) {
                Some(at) if *at == deadline => {
                    st.waiting.remove(&key);
                }
                // superseded by an earlier timer that already fired
                _ => return,
            }
        }
        self.add(key);
    }

    /// Add `key` after its backoff delay and count one more failure.
    pub fn add_rate_limited(&self, key: impl Into<String>) {
        let key = key.into();
        let failures = {
            let mut st = self.state();
            let n = st.failures.entry(key.clone()).or_insert(0);
            let prior = *n;
            *n += 1;
            prior
        };
        self.add_after(key, self.inner.backoff.delay(failures));
    }

    /// Wait for the next key. `None` once the queue is shut down.
    ///
    /// The caller must call [`WorkQueue::done`] with the key when finished.
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut st = self.state();
                if st.shutting_down {
                    return None;
                }
                if let Some(key) = st.queue.pop_front() {
                    st.dirty.remove(&key);
                    st.processing.insert(key.clone());
                    let more = !st.queue.is_empty();
                    drop(st);
                    if more {
                        self.inner.notify.notify_one();
                    }
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Release `key`. If it was re-added while held, queue it again.
    pub fn done(&self, key: &str) {
        let mut st = self.state();
        st.processing.remove(key);
        if st.dirty.contains(key) && !st.shutting_down {
            st.queue.push_back(key.to_string());
            drop(st);
            self.inner.notify.notify_one();
        }
    }

    /// Reset the failure count of `key`.
    pub fn forget(&self, key: &str) {
        self.state().failures.remove(key);
    }

    pub fn num_requeues(&self, key: &str) -> u32 {
        self.state().failures.get(key).copied().unwrap_or(0)
    }

    /// Keys waiting to be handed to a worker.
    pub fn len(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently held by workers.
    pub fn in_flight(&self) -> usize {
        self.state().processing.len()
    }

    /// Stop handing out keys. Workers blocked in `get` return `None`;
    /// keys already held run to completion.
    pub fn shut_down(&self) {
        self.state().shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state().shutting_down
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state();
        f.debug_struct("WorkQueue")
            .field("name", &self.inner.name)
            .field("pending", &st.queue.len())
            .field("processing", &st.processing.len())
            .field("shutting_down", &st.shutting_down)
            .finish()
    }
}
