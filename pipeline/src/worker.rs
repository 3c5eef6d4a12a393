// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A worker is one instance of the user's iterator, isolated on its own OS
//! thread. This mirrors the dedicated-thread isolation pattern used by the
//! host crate family's `resilient_reactor_thread` module (a worker thread
//! that owns its resources and talks to the rest of the system only through
//! a channel), generalized here from "one long-lived event source" to "one
//! generator instance driven by pull requests".
//!
//! A real process-per-worker transport (closer to the isolation the
//! original Python implementation achieves via `pprocess`) would satisfy
//! the same [`WorkerMsg`]/[`DriverMsg`] contract; see `SPEC_FULL.md` §9.

use std::{cell::RefCell, collections::HashMap, rc::Rc, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::{
    error::{PipelineError, PipelineResult},
    protocol::{DriverMsg, WorkerMsg},
    tempfile_codec,
};

/// Channel size for the driver<->worker protocol. Only one request is ever
/// outstanding per direction at a time, so a small bound just needs to be
/// nonzero for sends to never block behind a pending recv.
pub(crate) const WORKER_CHANNEL_CAPACITY: usize = 8;

struct WorkerChannel<T> {
    to_driver: mpsc::Sender<WorkerMsg<T>>,
    from_driver: mpsc::Receiver<DriverMsg<T>>,
}

/// Handed to the user closure in place of each declared input. Pulling a
/// value sends a request to this worker's driver and blocks until answered;
/// the driver may itself need to recurse into an upstream stage to satisfy
/// the request, but from the worker's point of view that's invisible
/// latency: the worker thread is not async and never touches a runtime.
pub struct AsyncInput<T> {
    key: String,
    channel: Rc<RefCell<WorkerChannel<T>>>,
}

impl<T> Clone for AsyncInput<T> {
    fn clone(&self) -> Self {
        Self { key: self.key.clone(), channel: Rc::clone(&self.channel) }
    }
}

impl<T: DeserializeOwned> Iterator for AsyncInput<T> {
    type Item = PipelineResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        trace!(input = %self.key, "worker pulling input");
        {
            let mut channel = self.channel.borrow_mut();
            channel.to_driver.blocking_send(WorkerMsg::PullInput(self.key.clone())).ok()?;
        }
        let reply = self.channel.borrow_mut().from_driver.blocking_recv();
        match reply {
            Some(DriverMsg::NextInput(value)) => Some(Ok(value)),
            Some(DriverMsg::NextInputTempfile(path)) => {
                Some(tempfile_codec::read_and_remove_tempfile(&path))
            }
            Some(DriverMsg::InputEnd) => None,
            Some(DriverMsg::InputError(err)) => Some(Err(PipelineError::Upstream(Box::new(err)))),
            Some(other) => Some(Err(PipelineError::Protocol(format!(
                "unexpected message while awaiting input reply: {other:?}"
            )))),
            None => None,
        }
    }
}

/// Names-to-proxies map handed to the user closure.
pub struct Inputs<T> {
    slots: HashMap<String, AsyncInput<T>>,
}

impl<T> Inputs<T> {
    fn new(slots: HashMap<String, AsyncInput<T>>) -> Self { Self { slots } }

    /// Returns the proxy for a declared input name.
    ///
    /// Unlike the decorator the original implementation inspected argument
    /// names with, a Rust closure can't be introspected ahead of calling
    /// it — so this is where `MissingInput` is actually detected, the
    /// first time the closure asks for a name that was never wired with
    /// `.input()` on the builder.
    pub fn get(&self, name: &str) -> PipelineResult<AsyncInput<T>> {
        self.slots
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::MissingInput { name: name.to_string() })
    }
}

pub(crate) type UserIterator<T> = Box<dyn Iterator<Item = PipelineResult<T>> + Send>;
pub(crate) type UserClosure<T> = Arc<dyn Fn(Inputs<T>) -> UserIterator<T> + Send + Sync>;

/// One worker thread's command loop: receive a `DriverMsg`, act, reply.
/// Runs until it receives `Quit` or the driver's sender is dropped.
pub(crate) fn run_worker_thread<T>(
    closure: UserClosure<T>,
    input_names: Vec<String>,
    from_driver: mpsc::Receiver<DriverMsg<T>>,
    to_driver: mpsc::Sender<WorkerMsg<T>>,
) where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let channel = Rc::new(RefCell::new(WorkerChannel { to_driver: to_driver.clone(), from_driver }));
    let slots = input_names
        .into_iter()
        .map(|name| (name.clone(), AsyncInput { key: name, channel: Rc::clone(&channel) }))
        .collect();

    if to_driver.blocking_send(WorkerMsg::Ready).is_err() {
        return;
    }

    let mut iter = closure(Inputs::new(slots));

    loop {
        let command = channel.borrow_mut().from_driver.blocking_recv();
        match command {
            Some(DriverMsg::PullOutput) => match iter.next() {
                Some(Ok(value)) => {
                    if to_driver.blocking_send(WorkerMsg::NextValue(value)).is_err() {
                        return;
                    }
                }
                Some(Err(err)) => {
                    let _ = to_driver.blocking_send(WorkerMsg::Error(err));
                    return;
                }
                None => {
                    let _ = to_driver.blocking_send(WorkerMsg::StopIteration);
                    return;
                }
            },
            Some(DriverMsg::PullOutputTempfile) => match iter.next() {
                Some(Ok(value)) => match tempfile_codec::write_tempfile(&value) {
                    Ok(path) => {
                        if to_driver.blocking_send(WorkerMsg::NextValueTempfile(path)).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = to_driver.blocking_send(WorkerMsg::Error(err));
                        return;
                    }
                },
                Some(Err(err)) => {
                    let _ = to_driver.blocking_send(WorkerMsg::Error(err));
                    return;
                }
                None => {
                    let _ = to_driver.blocking_send(WorkerMsg::StopIteration);
                    return;
                }
            },
            Some(DriverMsg::Quit) | None => {
                debug!("worker received quit");
                return;
            }
            Some(other) => {
                let _ = to_driver.blocking_send(WorkerMsg::Error(PipelineError::Protocol(
                    format!("worker received unexpected driver message: {other:?}"),
                )));
                return;
            }
        }
    }
}
