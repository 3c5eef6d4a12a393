// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! [`Job`] is the driver for one pipeline stage: it owns a pool of workers,
//! keeps their dispatch window full, answers the inputs they ask for, and
//! hands the values (or the one error) they produce to its own consumer.

use std::{
    collections::{HashMap, VecDeque},
    future::Future,
    path::PathBuf,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_core::Stream;
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, instrument, warn};

use crate::{
    error::{PipelineError, PipelineResult},
    protocol::{DriverMsg, WorkerMsg},
    queue::{StageDriver, WorkerQueue},
    tempfile_codec,
    worker::{self, AsyncInput, Inputs, UserClosure, UserIterator, WORKER_CHANNEL_CAPACITY},
};

/// Tuning knobs for a stage, set via the builder and fixed for the life of
/// the job.
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Number of worker threads producing output concurrently.
    pub workers: usize,
    /// How many extra values to keep pre-produced ahead of consumer demand.
    pub buffer: usize,
    /// Whether workers serialize their output to a scratch file instead of
    /// sending the value itself.
    pub tempfile_output: bool,
}

impl Default for JobOptions {
    fn default() -> Self { Self { workers: 1, buffer: 0, tempfile_output: false } }
}

/// Anything a job can pull named input values from: a plain in-memory
/// sequence, or another job's output (recursing into the same scheduler).
#[async_trait::async_trait]
pub(crate) trait UpstreamSource<T>: Send + Sync {
    /// Whether this source can hand back an already-serialized tempfile
    /// instead of a materialized value (only ever true for a `Job<T>`
    /// source that was itself built with `tempfile_output(true)`).
    fn supports_tempfile(&self) -> bool;
    async fn pull_value(&self) -> UpstreamPull<T>;
    async fn pull_tempfile(&self) -> UpstreamPull<T>;
}

pub(crate) enum UpstreamPull<T> {
    Value(T),
    Tempfile(PathBuf),
    End,
    Error(PipelineError),
}

struct IterSource<T> {
    iter: Mutex<Box<dyn Iterator<Item = T> + Send>>,
}

#[async_trait::async_trait]
impl<T: Send + 'static> UpstreamSource<T> for IterSource<T> {
    fn supports_tempfile(&self) -> bool { false }

    async fn pull_value(&self) -> UpstreamPull<T> {
        let mut iter = self.iter.lock().await;
        match iter.next() {
            Some(value) => UpstreamPull::Value(value),
            None => UpstreamPull::End,
        }
    }

    async fn pull_tempfile(&self) -> UpstreamPull<T> { self.pull_value().await }
}

struct JobSource<T> {
    job: Job<T>,
}

#[async_trait::async_trait]
impl<T> UpstreamSource<T> for JobSource<T>
where T: Serialize + DeserializeOwned + Send + 'static
{
    fn supports_tempfile(&self) -> bool { self.job.0.options.tempfile_output }

    async fn pull_value(&self) -> UpstreamPull<T> {
        match self.job.0.next_materialized().await {
            Ok(Some(value)) => UpstreamPull::Value(value),
            Ok(None) => UpstreamPull::End,
            Err(err) => UpstreamPull::Error(err),
        }
    }

    async fn pull_tempfile(&self) -> UpstreamPull<T> {
        match self.job.0.next_tempfile().await {
            Ok(Some(path)) => UpstreamPull::Tempfile(path),
            Ok(None) => UpstreamPull::End,
            Err(err) => UpstreamPull::Error(err),
        }
    }
}

/// Converts a value into something a job can wire up with `.input(name,
/// source)`. Implemented for any owned iterable, and for another job's
/// handle (so stages can be chained).
pub trait IntoPipelineSource<T> {
    #[doc(hidden)]
    fn into_source(self) -> Arc<dyn UpstreamSource<T>>;
}

impl<T, I> IntoPipelineSource<T> for I
where
    I: IntoIterator<Item = T> + Send + 'static,
    I::IntoIter: Send + 'static,
    T: Send + 'static,
{
    fn into_source(self) -> Arc<dyn UpstreamSource<T>> {
        Arc::new(IterSource { iter: Mutex::new(Box::new(self.into_iter())) })
    }
}

impl<T> IntoPipelineSource<T> for Job<T>
where T: Serialize + DeserializeOwned + Send + 'static
{
    fn into_source(self) -> Arc<dyn UpstreamSource<T>> { Arc::new(JobSource { job: self }) }
}

enum ReadyDatum<T> {
    Value(T),
    ValueTempfile(PathBuf),
    Error(PipelineError),
}

struct WorkerSlot<T> {
    id: u64,
    to_worker: mpsc::Sender<DriverMsg<T>>,
    // Wrapped so `poll_once` can clone a handle to the receiver and await it
    // without ever removing the slot itself from `state.busy` — see the
    // comment on `JobInner::poll_once` for why that matters.
    from_worker: Arc<Mutex<mpsc::Receiver<WorkerMsg<T>>>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl<T> Drop for WorkerSlot<T> {
    fn drop(&mut self) {
        let _ = self.to_worker.try_send(DriverMsg::Quit);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

struct State<T> {
    idle: VecDeque<WorkerSlot<T>>,
    busy: HashMap<u64, WorkerSlot<T>>,
    waiting_input: VecDeque<(u64, String)>,
    ready_data: VecDeque<ReadyDatum<T>>,
    waiting_data: usize,
    stopped: bool,
}

/// The driver for one pipeline stage. Cheap to clone — it's a handle around
/// shared state, the same way the rest of this crate's handles are thin
/// wrappers around an `Arc`.
pub struct Job<T>(Arc<JobInner<T>>);

impl<T> Clone for Job<T> {
    fn clone(&self) -> Self { Self(Arc::clone(&self.0)) }
}

type PendingNext<T> = Pin<Box<dyn std::future::Future<Output = Option<PipelineResult<T>>> + Send>>;

struct JobInner<T> {
    state: Mutex<State<T>>,
    inputs: HashMap<String, Arc<dyn UpstreamSource<T>>>,
    options: JobOptions,
    /// The in-flight future behind the current `poll_next`, kept across
    /// polls so a `Pending` result doesn't abandon (and leak) the
    /// in-progress `waiting_data` accounting in `wait_for_ready`.
    pending_next: std::sync::Mutex<Option<PendingNext<T>>>,
}

/// Builder for a [`Job`]; see the crate docs for a full example.
pub struct JobBuilder<T> {
    closure: UserClosure<T>,
    input_names: Vec<String>,
    inputs: HashMap<String, Arc<dyn UpstreamSource<T>>>,
    /// Input names declared via `.requires(..)` / `Job::builder_with_inputs`,
    /// mirroring the `@async('i', 'j', ...)` decorator form (SPEC_FULL.md
    /// §6). Checked against `inputs` synchronously in `.spawn()`, before any
    /// worker is started — unlike `input_names`, this list can be non-empty
    /// without a matching `.input()` call, which is exactly the state
    /// `MissingInput` reports.
    required_inputs: Vec<String>,
    options: JobOptions,
}

impl<T> JobBuilder<T>
where T: Serialize + DeserializeOwned + Send + 'static
{
    pub fn workers(mut self, n: usize) -> Self {
        self.options.workers = n;
        self
    }

    pub fn buffer(mut self, n: usize) -> Self {
        self.options.buffer = n;
        self
    }

    pub fn tempfile_output(mut self, enabled: bool) -> Self {
        self.options.tempfile_output = enabled;
        self
    }

    pub fn input<S: IntoPipelineSource<T>>(mut self, name: impl Into<String>, source: S) -> Self {
        let name = name.into();
        self.input_names.push(name.clone());
        self.inputs.insert(name, source.into_source());
        self
    }

    /// Declares the input names this job's closure requires, mirroring the
    /// `@async('i', 'j', ...)` decorator form from the source system
    /// (SPEC_FULL.md §6's "N string positional arguments"). `.spawn()` fails
    /// synchronously, before any worker thread is started, if a declared
    /// name here has no matching `.input(name, source)` call.
    pub fn requires(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_inputs.extend(names.into_iter().map(Into::into));
        self
    }

    /// Spawns the worker threads and registers the stage with the shared
    /// scheduler. Fails synchronously, before any worker runs its closure,
    /// if the requested configuration is invalid, a name declared via
    /// `.requires(..)` was never supplied with `.input(..)`, or a worker
    /// thread itself fails to start.
    #[instrument(skip_all, fields(workers = self.options.workers, buffer = self.options.buffer))]
    pub async fn spawn(self) -> PipelineResult<Job<T>> {
        if self.options.workers == 0 {
            return Err(PipelineError::UnknownOption {
                reason: "workers must be at least 1".to_string(),
            });
        }
        for name in &self.required_inputs {
            if !self.inputs.contains_key(name) {
                return Err(PipelineError::MissingInput { name: name.clone() });
            }
        }

        let mut idle = VecDeque::with_capacity(self.options.workers);
        for id in 0..self.options.workers as u64 {
            idle.push_back(
                spawn_worker(id, Arc::clone(&self.closure), self.input_names.clone()).await?,
            );
        }

        let inner = Arc::new(JobInner {
            state: Mutex::new(State {
                idle,
                busy: HashMap::new(),
                waiting_input: VecDeque::new(),
                ready_data: VecDeque::new(),
                waiting_data: 0,
                stopped: false,
            }),
            inputs: self.inputs,
            options: self.options,
            pending_next: std::sync::Mutex::new(None),
        });

        WorkerQueue::global().register(inner.clone() as Arc<dyn StageDriver>).await;
        info!("job spawned");
        Ok(Job(inner))
    }
}

async fn spawn_worker<T>(
    id: u64,
    closure: UserClosure<T>,
    input_names: Vec<String>,
) -> PipelineResult<WorkerSlot<T>>
where T: Serialize + DeserializeOwned + Send + 'static {
    let (to_worker_tx, to_worker_rx) = mpsc::channel(WORKER_CHANNEL_CAPACITY);
    let (from_worker_tx, mut from_worker_rx) = mpsc::channel(WORKER_CHANNEL_CAPACITY);

    let thread = std::thread::Builder::new()
        .name(format!("r3bl-pipeline-worker-{id}"))
        .spawn(move || worker::run_worker_thread(closure, input_names, to_worker_rx, from_worker_tx))
        .map_err(|err| PipelineError::WorkerStartup { reason: err.to_string() })?;

    match from_worker_rx.recv().await {
        Some(WorkerMsg::Ready) => Ok(WorkerSlot {
            id,
            to_worker: to_worker_tx,
            from_worker: Arc::new(Mutex::new(from_worker_rx)),
            thread: Some(thread),
        }),
        Some(other) => Err(PipelineError::WorkerStartup {
            reason: format!("expected Ready handshake, got {other:?}"),
        }),
        None => {
            Err(PipelineError::WorkerStartup { reason: "worker exited before Ready".to_string() })
        }
    }
}

impl<T> JobInner<T>
where T: Serialize + DeserializeOwned + Send + 'static
{
    async fn dispatch_more(&self) {
        let mut state = self.state.lock().await;
        loop {
            let in_flight = state.ready_data.len() + state.busy.len();
            if in_flight >= self.options.buffer + state.waiting_data {
                break;
            }
            let Some(slot) = state.idle.pop_front() else { break };
            let msg = if self.options.tempfile_output {
                DriverMsg::PullOutputTempfile
            } else {
                DriverMsg::PullOutput
            };
            if slot.to_worker.try_send(msg).is_ok() {
                state.busy.insert(slot.id, slot);
            }
            // A send failure means the worker thread died; dropping `slot`
            // here removes it from both idle and busy permanently.
        }
        if state.idle.is_empty() && state.busy.is_empty() && !state.stopped {
            state.stopped = true;
        }
    }

    async fn serve_input_requests(&self) {
        let pending_ids: Vec<(u64, String)> = {
            let mut state = self.state.lock().await;
            state.waiting_input.drain(..).collect()
        };
        if pending_ids.is_empty() {
            return;
        }

        let mut senders = Vec::with_capacity(pending_ids.len());
        {
            let state = self.state.lock().await;
            for (id, name) in &pending_ids {
                if let Some(slot) = state.busy.get(id) {
                    senders.push((*id, name.clone(), slot.to_worker.clone()));
                }
            }
        }

        for (_id, name, sender) in senders {
            let reply = self.answer_input(&name).await;
            let _ = sender.send(reply).await;
        }
    }

    async fn answer_input(&self, name: &str) -> DriverMsg<T> {
        let Some(source) = self.inputs.get(name) else {
            return DriverMsg::InputError(PipelineError::MissingInput { name: name.to_string() });
        };
        let want_tempfile = self.options.tempfile_output && source.supports_tempfile();
        if want_tempfile {
            match source.pull_tempfile().await {
                UpstreamPull::Tempfile(path) => DriverMsg::NextInputTempfile(path),
                UpstreamPull::Value(value) => match tempfile_codec::write_tempfile(&value) {
                    Ok(path) => DriverMsg::NextInputTempfile(path),
                    Err(err) => DriverMsg::InputError(err),
                },
                UpstreamPull::End => DriverMsg::InputEnd,
                UpstreamPull::Error(err) => DriverMsg::InputError(err),
            }
        } else {
            match source.pull_value().await {
                UpstreamPull::Value(value) => DriverMsg::NextInput(value),
                UpstreamPull::Tempfile(path) => match tempfile_codec::read_and_remove_tempfile(&path) {
                    Ok(value) => DriverMsg::NextInput(value),
                    Err(err) => DriverMsg::InputError(err),
                },
                UpstreamPull::End => DriverMsg::InputEnd,
                UpstreamPull::Error(err) => DriverMsg::InputError(err),
            }
        }
    }

    async fn handle_worker_message(&self, id: u64, msg: Option<WorkerMsg<T>>) {
        let mut state = self.state.lock().await;
        match msg {
            Some(WorkerMsg::PullInput(name)) => state.waiting_input.push_back((id, name)),
            Some(WorkerMsg::NextValue(value)) => {
                state.ready_data.push_back(ReadyDatum::Value(value));
                if let Some(slot) = state.busy.remove(&id) {
                    state.idle.push_back(slot);
                }
            }
            Some(WorkerMsg::NextValueTempfile(path)) => {
                state.ready_data.push_back(ReadyDatum::ValueTempfile(path));
                if let Some(slot) = state.busy.remove(&id) {
                    state.idle.push_back(slot);
                }
            }
            Some(WorkerMsg::StopIteration) => {
                state.busy.remove(&id);
            }
            Some(WorkerMsg::Error(err)) => {
                warn!(%err, "worker failed, tearing down stage");
                state.ready_data.clear();
                state.ready_data.push_back(ReadyDatum::Error(err));
                state.busy.remove(&id);
                // The original implementation leaves siblings running until
                // they next try to produce; we additionally ask them to
                // quit now, a modest resource-hygiene improvement (see
                // SPEC_FULL.md open questions).
                for (_, slot) in state.busy.drain() {
                    let _ = slot.to_worker.try_send(DriverMsg::Quit);
                }
                state.idle.clear();
                state.stopped = true;
            }
            Some(WorkerMsg::Ready) | None => {
                state.busy.remove(&id);
            }
        }
        drop(state);
        self.dispatch_more().await;
    }

    async fn wait_for_ready(&self) {
        {
            let mut state = self.state.lock().await;
            state.waiting_data += 1;
        }
        loop {
            {
                let state = self.state.lock().await;
                if !state.ready_data.is_empty() || state.stopped {
                    break;
                }
            }
            WorkerQueue::global().tick().await;
        }
        let mut state = self.state.lock().await;
        state.waiting_data -= 1;
    }

    async fn next_materialized(&self) -> PipelineResult<Option<T>> {
        self.wait_for_ready().await;
        let datum = {
            let mut state = self.state.lock().await;
            state.ready_data.pop_front()
        };
        match datum {
            Some(ReadyDatum::Value(value)) => Ok(Some(value)),
            Some(ReadyDatum::ValueTempfile(path)) => {
                Ok(Some(tempfile_codec::read_and_remove_tempfile(&path)?))
            }
            Some(ReadyDatum::Error(err)) => Err(err),
            None => Ok(None),
        }
    }

    async fn next_tempfile(&self) -> PipelineResult<Option<PathBuf>> {
        self.wait_for_ready().await;
        let datum = {
            let mut state = self.state.lock().await;
            state.ready_data.pop_front()
        };
        match datum {
            Some(ReadyDatum::ValueTempfile(path)) => Ok(Some(path)),
            Some(ReadyDatum::Value(value)) => Ok(Some(tempfile_codec::write_tempfile(&value)?)),
            Some(ReadyDatum::Error(err)) => Err(err),
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl<T> StageDriver for JobInner<T>
where T: Serialize + DeserializeOwned + Send + 'static
{
    async fn do_pre_poll(&self) {
        self.dispatch_more().await;
        self.serve_input_requests().await;
    }

    async fn is_settled(&self) -> bool {
        let state = self.state.lock().await;
        state.stopped || state.busy.is_empty()
    }

    // Only clones a cheap `Arc<Mutex<Receiver>>` handle per busy worker and
    // never removes the `WorkerSlot` from `state.busy` — `tick()` races this
    // future against every other stage's `poll_once()` via `select_all`, and
    // a losing future is dropped on the spot. Both `Mutex::lock` and
    // `Receiver::recv` are cancel-safe, so dropping this future at any await
    // point here loses nothing and leaves no worker stranded outside of
    // `{idle, busy, terminated}`. An earlier version moved the `WorkerSlot`s
    // themselves into a local `Vec` for the duration of the await and
    // reinserted them afterwards; that left them owned by this future across
    // a cancellation point, so a losing race synchronously ran
    // `Drop for WorkerSlot` (a blocking `thread::join()`) on the runtime
    // thread and lost the worker's slot entirely.
    async fn poll_once(&self) {
        let receivers: Vec<(u64, Arc<Mutex<mpsc::Receiver<WorkerMsg<T>>>>)> = {
            let state = self.state.lock().await;
            state.busy.iter().map(|(id, slot)| (*id, Arc::clone(&slot.from_worker))).collect()
        };
        if receivers.is_empty() {
            return;
        }

        let futs = receivers.into_iter().map(|(id, receiver)| {
            Box::pin(async move {
                let mut receiver = receiver.lock().await;
                (id, receiver.recv().await)
            })
        });
        let ((id, msg), _idx, _rest) = futures_util::future::select_all(futs).await;
        self.handle_worker_message(id, msg).await;
    }
}

impl<T> Job<T>
where T: Serialize + DeserializeOwned + Send + 'static
{
    /// Starts building a job around `closure`. The closure is called once
    /// per worker, on that worker's dedicated thread, and must return an
    /// iterator; see the crate docs for the exact contract.
    pub fn builder<F, I>(closure: F) -> JobBuilder<T>
    where
        F: Fn(Inputs<T>) -> I + Send + Sync + 'static,
        I: Iterator<Item = PipelineResult<T>> + Send + 'static,
    {
        let wrapped: UserClosure<T> =
            Arc::new(move |inputs| Box::new(closure(inputs)) as UserIterator<T>);
        JobBuilder {
            closure: wrapped,
            input_names: Vec::new(),
            inputs: HashMap::new(),
            required_inputs: Vec::new(),
            options: JobOptions::default(),
        }
    }

    /// Equivalent to `Job::builder(closure).requires(input_names)`: declares
    /// the named async inputs the closure requires up front, the same shape
    /// as the `@async('i', 'j', ...)` decorator form from the source system
    /// (SPEC_FULL.md §6). `.spawn()` on the returned builder fails
    /// synchronously if any declared name is never given a matching
    /// `.input(name, source)` call.
    pub fn builder_with_inputs<F, I>(input_names: &[&str], closure: F) -> JobBuilder<T>
    where
        F: Fn(Inputs<T>) -> I + Send + Sync + 'static,
        I: Iterator<Item = PipelineResult<T>> + Send + 'static,
    {
        Self::builder(closure).requires(input_names.iter().map(|name| (*name).to_string()))
    }

    /// Pulls the next materialized value, driving the shared scheduler as
    /// needed. Returns `None` once the stage is exhausted; subsequent calls
    /// keep returning `None`.
    pub async fn next(&self) -> Option<PipelineResult<T>> {
        match self.0.next_materialized().await {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl<T> Stream for Job<T>
where T: Serialize + DeserializeOwned + Send + 'static
{
    type Item = PipelineResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut guard = this.0.pending_next.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if guard.is_none() {
            let job = this.clone();
            *guard = Some(Box::pin(async move { job.next().await }));
        }
        let poll_result = guard.as_mut().expect("just populated").as_mut().poll(cx);
        if let Poll::Ready(_) = &poll_result {
            *guard = None;
        }
        poll_result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug)]
    struct BoomError;

    impl std::fmt::Display for BoomError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for BoomError {}

    /// Exercises the dispatch-window bound from `SPEC_FULL.md` §3/§4.2
    /// directly: with a single worker and no consumer ever asking for a
    /// value, repeated scheduler ticks alone should still pre-produce up to
    /// `buffer` values before dispatch stops.
    #[tokio::test]
    async fn dispatch_window_fills_buffer_ahead_of_any_consumer_pull() {
        let job = Job::<i32>::builder(|_inputs| (0..50).map(Ok)).buffer(4).spawn().await.unwrap();

        for _ in 0..200 {
            WorkerQueue::global().tick().await;
            let state = job.0.state.lock().await;
            let in_flight = state.ready_data.len() + state.busy.len();
            if in_flight >= job.0.options.buffer + state.waiting_data {
                break;
            }
        }

        let state = job.0.state.lock().await;
        assert_eq!(state.busy.len(), 0);
        assert_eq!(state.ready_data.len(), 4);
    }

    /// Scenario: chaining a `tempfile_output` job into another's input
    /// should forward the scratch file by path rather than the driver
    /// materializing and re-serializing it at the stage boundary. The
    /// directly observable consequence is that every tempfile this test
    /// creates is eventually read back exactly once — no leaks.
    #[tokio::test]
    async fn tempfile_chain_forwards_and_leaves_no_leaked_scratch_files() {
        tempfile_codec::LIVE_TEMPFILES.store(0, Ordering::SeqCst);

        let inner = Job::<i32>::builder(|inputs| {
            let i = inputs.get("i").unwrap();
            i.map(|r| r.map(|v| v + 1))
        })
        .input("i", vec![1, 2, 3])
        .tempfile_output(true)
        .spawn()
        .await
        .unwrap();

        let outer = Job::<i32>::builder(|inputs| {
            let i = inputs.get("i").unwrap();
            i.map(|r| r.map(|v| v + 1))
        })
        .input("i", inner)
        .tempfile_output(true)
        .spawn()
        .await
        .unwrap();

        let mut out = Vec::new();
        while let Some(v) = outer.next().await {
            out.push(v.unwrap());
        }
        assert_eq!(out, vec![3, 4, 5]);
        assert_eq!(tempfile_codec::LIVE_TEMPFILES.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn worker_error_latches_end_of_stream_after_one_error() {
        let job = Job::<i32>::builder(|inputs| {
            let mut raises = inputs.get("raises").unwrap();
            let mut should_raise: Option<bool> = None;
            std::iter::from_fn(move || {
                let flag =
                    *should_raise.get_or_insert_with(|| matches!(raises.next(), Some(Ok(true))));
                if flag {
                    Some(Err(PipelineError::User(Arc::new(BoomError))))
                } else {
                    Some(Ok(7))
                }
            })
        })
        .workers(2)
        .input("raises", vec![true, false])
        .spawn()
        .await
        .unwrap();

        let first = job.next().await.expect("stage produced one item");
        assert!(first.is_err());

        for _ in 0..3 {
            assert!(job.next().await.is_none());
        }
    }
}
