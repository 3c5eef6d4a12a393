// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Fan-out: read indexable composites from one upstream, expose one lazy
//! child sequence per key, and keep any one child's consumer from starving
//! the others.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use tokio::sync::Mutex;

use crate::{
    error::{PipelineError, PipelineResult},
    job::Job,
};

/// A value that can be decomposed into one component per splitter key.
pub trait SplitSource<K> {
    type Item;

    /// Returns this value's component for `key`, or `None` if the composite
    /// doesn't carry that key — an indexing failure the caller turns into a
    /// `PipelineError::BadKey` for whichever child asked for it, rather than
    /// silently skipping the key for that round.
    fn component(&self, key: &K) -> Option<Self::Item>;
}

impl<K, V> SplitSource<K> for HashMap<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    type Item = V;

    fn component(&self, key: &K) -> Option<Self::Item> { self.get(key).cloned() }
}

impl<T: Clone> SplitSource<usize> for Vec<T> {
    type Item = T;

    fn component(&self, key: &usize) -> Option<Self::Item> { self.get(*key).cloned() }
}

struct SplitterShared<T, K, Item> {
    upstream: Job<T>,
    keys: Vec<K>,
    // Each entry is the outcome of indexing one upstream composite for this
    // key: `Ok` when the composite carried the key, `Err(BadKey)` when it
    // didn't — a per-key miss is queued rather than silently dropped, so it
    // still surfaces to whichever child is waiting on that key and the
    // k-th-composite-to-k-th-value correspondence in SPEC_FULL.md §5 holds
    // even for a ragged/ill-shaped composite.
    queues: Mutex<HashMap<K, VecDeque<PipelineResult<Item>>>>,
}

/// A splitter over an upstream `Job<T>` whose items implement
/// `SplitSource<K>`. Construct with [`Splitter::new`], then take one
/// [`SplitterChild`] per key with [`Splitter::child`].
pub struct Splitter<T, K, Item> {
    shared: Arc<SplitterShared<T, K, Item>>,
}

impl<T, K, Item> Clone for Splitter<T, K, Item> {
    fn clone(&self) -> Self { Self { shared: Arc::clone(&self.shared) } }
}

impl<T, K, Item> Splitter<T, K, Item>
where
    T: SplitSource<K, Item = Item> + serde::Serialize + serde::de::DeserializeOwned + Send + 'static,
    K: std::hash::Hash + Eq + Clone + std::fmt::Debug + Send + Sync + 'static,
    Item: Send + 'static,
{
    pub fn new(upstream: Job<T>, keys: Vec<K>) -> Self {
        let queues = keys.iter().cloned().map(|k| (k, VecDeque::new())).collect();
        Self {
            shared: Arc::new(SplitterShared { upstream, keys, queues: Mutex::new(queues) }),
        }
    }

    /// Returns one child stream for `key`. May be called more than once for
    /// the same key; the resulting children share the same buffered queue.
    pub fn child(&self, key: K) -> SplitterChild<T, K, Item> {
        SplitterChild { shared: Arc::clone(&self.shared), key }
    }
}

/// One key's view of a [`Splitter`].
pub struct SplitterChild<T, K, Item> {
    shared: Arc<SplitterShared<T, K, Item>>,
    key: K,
}

impl<T, K, Item> Clone for SplitterChild<T, K, Item> {
    fn clone(&self) -> Self { Self { shared: Arc::clone(&self.shared), key: self.key.clone() } }
}

impl<T, K, Item> SplitterChild<T, K, Item>
where
    T: SplitSource<K, Item = Item> + serde::Serialize + serde::de::DeserializeOwned + Send + 'static,
    K: std::hash::Hash + Eq + Clone + std::fmt::Debug + Send + Sync + 'static,
    Item: Send + 'static,
{
    /// Pulls this key's next value, pulling one upstream composite and
    /// distributing it across every key's queue if this key's queue is
    /// currently empty.
    ///
    /// The queue lock is held across the upstream pull itself (not just the
    /// bookkeeping around it): a sibling that finds its own queue empty
    /// while another child is already waiting on upstream blocks on this
    /// same lock instead of issuing a second concurrent pull, so the
    /// composite at the head of the upstream sequence is only ever fetched
    /// once. Other stages in the pipeline still make progress while this
    /// wait is outstanding, since the upstream `Job::next` drives the
    /// shared scheduler rather than this lock.
    pub async fn next(&self) -> Option<PipelineResult<Item>> {
        loop {
            let mut queues = self.shared.queues.lock().await;
            if let Some(item) = queues.get_mut(&self.key).and_then(VecDeque::pop_front) {
                return Some(item);
            }

            match self.shared.upstream.next().await {
                Some(Ok(composite)) => {
                    for key in &self.shared.keys {
                        let entry = composite
                            .component(key)
                            .ok_or_else(|| PipelineError::BadKey { key: format!("{key:?}") });
                        queues.entry(key.clone()).or_default().push_back(entry);
                    }
                }
                Some(Err(err)) => return Some(Err(err)),
                None => return None,
            }
        }
    }
}
