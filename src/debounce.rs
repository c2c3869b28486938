//! Keyed cancel-and-reschedule timers.
//!
//! Scheduling a key aborts its pending timer and arms a fresh one. A timer
//! that fires sends `(key, generation)` on the channel returned by
//! [`Debouncer::new`]; the receiver checks it with [`Debouncer::accept`],
//! which only lets the latest generation of a key through.

use futures::future::{AbortHandle, Abortable};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

pub struct Debouncer<K> {
    wait: Duration,
    next_generation: u64,
    pending: HashMap<K, (u64, AbortHandle)>,
    tx: UnboundedSender<(K, u64)>,
}

impl<K> Debouncer<K>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + 'static,
{
    pub fn new(wait: Duration) -> (Self, UnboundedReceiver<(K, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            wait,
            next_generation: 0,
            pending: HashMap::new(),
            tx,
        };
        (debouncer, rx)
    }

    pub fn wait(&self) -> Duration {
        self.wait
    }

    /// (Re)arms the timer of `key`. Must be called inside a tokio runtime.
    pub fn schedule(&mut self, key: K) {
        self.cancel(&key);
        self.next_generation += 1;
        let generation = self.next_generation;
        let (handle, registration) = AbortHandle::new_pair();
        let tx = self.tx.clone();
        let wait = self.wait;
        let fired = key.clone();
        tokio::spawn(Abortable::new(
            async move {
                tokio::time::sleep(wait).await;
                // The receiver is gone once the owner shut down.
                let _ = tx.send((fired, generation));
            },
            registration,
        ));
        trace!("Armed {:?} generation {}", key, generation);
        self.pending.insert(key, (generation, handle));
    }

    /// Drops the pending timer of `key`, if any.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Whether a fired timer is still the latest one of its key. Accepting
    /// consumes it.
    pub fn accept(&mut self, key: &K, generation: u64) -> bool {
        match self.pending.get(key) {
            Some((pending, _)) if *pending == generation => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, (_, handle)) in self.pending.drain() {
            handle.abort();
        }
    }
}
