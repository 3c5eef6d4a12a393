// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The process-wide scheduler. Every [`crate::job::Job`] registers itself
//! here once, at spawn time; from then on a single call to [`tick`] drives
//! every live stage forward by one step. This is what lets a consumer
//! polling the last stage of a ten-stage pipeline make the whole chain
//! progress from one `.await` point, the same way the host crate family's
//! `resilient_reactor_thread` lets many subscribers share one dedicated
//! thread's wakeups.

use std::sync::{Arc, OnceLock, Weak};

use tokio::sync::Mutex;
use tracing::trace;

/// Per-stage hooks the scheduler needs. Implemented by `job::JobInner`, kept
/// object-safe (via `async-trait`) so `WorkerQueue` can hold a
/// heterogeneous set of stages with different item types behind one
/// registry.
#[async_trait::async_trait]
pub(crate) trait StageDriver: Send + Sync {
    /// Refill the dispatch window and answer any pending input pulls.
    async fn do_pre_poll(&self);

    /// No workers left to produce or fail; the stage will never change
    /// state again.
    async fn is_settled(&self) -> bool;

    /// Wait for and fully process exactly one message from one busy
    /// worker. A no-op future if no worker is currently busy.
    async fn poll_once(&self);
}

/// Process-wide registry of live stages, shared by every `Job<T>` in the
/// process regardless of its item type.
pub(crate) struct WorkerQueue {
    stages: Mutex<Vec<Weak<dyn StageDriver>>>,
}

static GLOBAL: OnceLock<WorkerQueue> = OnceLock::new();

impl WorkerQueue {
    fn new() -> Self { Self { stages: Mutex::new(Vec::new()) } }

    /// The single scheduler shared by every stage in this process.
    pub(crate) fn global() -> &'static WorkerQueue { GLOBAL.get_or_init(WorkerQueue::new) }

    pub(crate) async fn register(&self, stage: Arc<dyn StageDriver>) {
        let mut stages = self.stages.lock().await;
        stages.retain(|weak| weak.strong_count() > 0);
        stages.push(Arc::downgrade(&stage));
    }

    /// One scheduling step: refill every stage's dispatch window, then wait
    /// for the next message from any one busy worker, anywhere in the
    /// process, and process it.
    pub(crate) async fn tick(&self) {
        let live: Vec<Arc<dyn StageDriver>> = {
            let mut stages = self.stages.lock().await;
            stages.retain(|weak| weak.strong_count() > 0);
            stages.iter().filter_map(Weak::upgrade).collect()
        };

        for stage in &live {
            stage.do_pre_poll().await;
        }

        let mut pollable = Vec::with_capacity(live.len());
        for stage in &live {
            if !stage.is_settled().await {
                pollable.push(stage.poll_once());
            }
        }

        if pollable.is_empty() {
            trace!("tick: nothing pollable");
            return;
        }

        let boxed: Vec<_> = pollable.into_iter().map(Box::pin).collect();
        futures_util::future::select_all(boxed).await;
    }
}
