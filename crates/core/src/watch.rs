//! Runtime model of queue slots and their watchers.
//!
//! The generated datapack keeps one counter per (instance, slot) in the
//! reserved objective. This module is the compiler-side model of that
//! store and of the watcher state machine each `__mcfn/<instance>/w<k>`
//! artifact implements, so the wait rules can be checked without a game.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Counter key of one slot in one function instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub instance: String,
    pub slot: String,
}

impl SlotKey {
    pub fn new(instance: impl Into<String>, slot: impl Into<String>) -> Self {
        SlotKey {
            instance: instance.into(),
            slot: slot.into(),
        }
    }
}

/// Renders the score holder name, `#<instance>.<slot>`.
impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.instance, self.slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Counter is 0 or unset.
    Closed,
    /// Counter is 1.
    Open,
}

/// The shared counter store, keyed by [`SlotKey`]. Missing keys are closed.
#[derive(Debug, Clone, Default)]
pub struct CounterStore {
    counters: BTreeMap<SlotKey, SlotState>,
}

impl CounterStore {
    pub fn state(&self, key: &SlotKey) -> SlotState {
        self.counters
            .get(key)
            .copied()
            .unwrap_or(SlotState::Closed)
    }

    pub fn is_open(&self, key: &SlotKey) -> bool {
        self.state(key) == SlotState::Open
    }

    /// Construct entry. Opening an open slot is a re-arm and leaves it open.
    pub fn open(&mut self, key: &SlotKey) {
        self.counters.insert(key.clone(), SlotState::Open);
    }

    /// Only a watcher closes its own slot.
    fn close(&mut self, key: &SlotKey) {
        self.counters.insert(key.clone(), SlotState::Closed);
    }

    /// The `__mcfn/any_open` check.
    pub fn any_open<'k>(&self, keys: impl IntoIterator<Item = &'k SlotKey>) -> bool {
        keys.into_iter().any(|k| self.is_open(k))
    }

    pub fn open_keys(&self) -> impl Iterator<Item = &SlotKey> {
        self.counters
            .iter()
            .filter(|(_, s)| **s == SlotState::Open)
            .map(|(k, _)| k)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Scheduled for the next tick, not yet run.
    Armed,
    /// Ran, found an open descendant and rescheduled itself.
    Polling,
    /// Closed its slot and released the continuation.
    Satisfied,
}

/// One watcher: polls the descendants of its slot once per tick.
#[derive(Debug, Clone)]
pub struct Watcher {
    key: SlotKey,
    descendants: BTreeSet<SlotKey>,
    state: WatcherState,
}

impl Watcher {
    /// A watcher for a slot that has just been opened.
    pub fn new(key: SlotKey, descendants: BTreeSet<SlotKey>) -> Self {
        Watcher {
            key,
            descendants,
            state: WatcherState::Armed,
        }
    }

    pub fn key(&self) -> &SlotKey {
        &self.key
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    /// Construct entry: open the slot and (re)schedule. A pending schedule
    /// is replaced, so re-entry while open collapses into one release.
    pub fn arm(&mut self, store: &mut CounterStore) {
        store.open(&self.key);
        self.state = WatcherState::Armed;
    }

    /// Whether this watcher runs on the next tick.
    pub fn is_scheduled(&self) -> bool {
        self.state != WatcherState::Satisfied
    }

    /// One scheduled run. Returns `true` when the slot closed and the
    /// continuation was released during this run.
    pub fn tick(&mut self, store: &mut CounterStore) -> bool {
        if !self.is_scheduled() {
            return false;
        }
        if store.any_open(&self.descendants) {
            self.state = WatcherState::Polling;
            return false;
        }
        store.close(&self.key);
        self.state = WatcherState::Satisfied;
        true
    }
}
