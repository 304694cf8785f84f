//! Keyed debounce scheduler.
//!
//! Each key owns at most one scheduled value. Scheduling again replaces the
//! value and pushes the deadline out by the quiet window. The host drives the
//! scheduler by calling [`Debouncer::take_due`] from its event loop; nothing
//! fires on its own.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Cancellation token for one scheduling of a key.
///
/// A handle is invalidated as soon as the key is rescheduled, fired or
/// cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceHandle<K> {
    key: K,
    generation: u64,
}

impl<K> DebounceHandle<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

#[derive(Debug)]
struct Scheduled<V> {
    deadline: Instant,
    value: V,
    generation: u64,
}

/// Coalesces values per key until a quiet window elapses.
#[derive(Debug)]
pub struct Debouncer<K: Ord + Clone, V> {
    delay: Duration,
    scheduled: BTreeMap<K, Scheduled<V>>,
    next_generation: u64,
}

impl<K: Ord + Clone, V> Debouncer<K, V> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            scheduled: BTreeMap::new(),
            next_generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `value` for `key`, replacing any value already waiting.
    pub fn schedule(&mut self, key: K, value: V, now: Instant) -> DebounceHandle<K> {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.scheduled.insert(
            key.clone(),
            Scheduled {
                deadline: now + self.delay,
                value,
                generation,
            },
        );
        DebounceHandle { key, generation }
    }

    /// Cancels whatever is scheduled for `key`, returning the dropped value.
    pub fn cancel(&mut self, key: &K) -> Option<V> {
        self.scheduled.remove(key).map(|s| s.value)
    }

    /// Cancels the scheduling identified by `handle`.
    ///
    /// Returns false if the key has been rescheduled or already fired.
    pub fn cancel_handle(&mut self, handle: &DebounceHandle<K>) -> bool {
        match self.scheduled.get(&handle.key) {
            Some(s) if s.generation == handle.generation => {
                self.scheduled.remove(&handle.key);
                true
            }
            _ => false,
        }
    }

    /// Removes every scheduled key for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.scheduled.retain(|k, _| keep(k));
    }

    /// Removes and returns every entry whose quiet window has elapsed,
    /// earliest deadline first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let due: Vec<K> = self
            .scheduled
            .iter()
            .filter(|(_, s)| s.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();

        let mut fired: Vec<(Instant, K, V)> = due
            .into_iter()
            .filter_map(|k| self.scheduled.remove(&k).map(|s| (s.deadline, k, s.value)))
            .collect();
        fired.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        fired.into_iter().map(|(_, k, v)| (k, v)).collect()
    }

    /// Removes and returns everything, regardless of deadline.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        std::mem::take(&mut self.scheduled)
            .into_iter()
            .map(|(k, s)| (k, s.value))
            .collect()
    }

    /// Earliest pending deadline, for hosts that sleep until the next wakeup.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduled.values().map(|s| s.deadline).min()
    }

    pub fn is_scheduled(&self, key: &K) -> bool {
        self.scheduled.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.scheduled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty()
    }
}
