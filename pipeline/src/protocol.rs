// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The message types exchanged between a [`crate::job::Job`] and the worker
//! threads it owns. See the module-level docs in `worker.rs` for the
//! handshake rules these messages participate in.

use std::path::PathBuf;

use crate::error::PipelineError;

/// Sent from the driver to a worker thread.
pub enum DriverMsg<T> {
    /// Ask the worker to advance its iterator and send back the next value.
    PullOutput,
    /// Same as `PullOutput`, but the worker should serialize the value to a
    /// scratch file and reply with its path instead of the value itself.
    PullOutputTempfile,
    /// Answer to a worker's `WorkerMsg::PullInput`: here is the next value.
    NextInput(T),
    /// Answer to a worker's `WorkerMsg::PullInput`: here is a tempfile
    /// containing the next value.
    NextInputTempfile(PathBuf),
    /// Answer to a worker's `WorkerMsg::PullInput`: the upstream source is
    /// exhausted. The worker observes this as a clean end of iteration.
    InputEnd,
    /// Answer to a worker's `WorkerMsg::PullInput`: the upstream source
    /// failed. The worker observes this as an `Err` from `AsyncInput`.
    InputError(PipelineError),
    /// Terminate. No further messages will be sent or accepted.
    Quit,
}

/// Sent from a worker thread to its driver.
pub enum WorkerMsg<T> {
    /// One-time handshake: the user closure has been entered and an
    /// iterator obtained from it.
    Ready,
    /// The worker's iterator needs a value from the named input slot.
    PullInput(String),
    /// One produced value, in response to `DriverMsg::PullOutput`.
    NextValue(T),
    /// One produced value, serialized to a tempfile, in response to
    /// `DriverMsg::PullOutputTempfile`.
    NextValueTempfile(PathBuf),
    /// The iterator is exhausted.
    StopIteration,
    /// The user closure's iterator yielded `Err`; the worker stops.
    Error(PipelineError),
}

// Manual `Debug` impls: deriving would require `T: Debug`, but these
// messages are logged only by their kind (the payload itself is opaque to
// the driver), so the bound would be an unnecessary restriction on every
// job's item type.
impl<T> std::fmt::Debug for DriverMsg<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverMsg::PullOutput => "PullOutput",
            DriverMsg::PullOutputTempfile => "PullOutputTempfile",
            DriverMsg::NextInput(_) => "NextInput",
            DriverMsg::NextInputTempfile(_) => "NextInputTempfile",
            DriverMsg::InputEnd => "InputEnd",
            DriverMsg::InputError(_) => "InputError",
            DriverMsg::Quit => "Quit",
        };
        f.write_str(label)
    }
}

impl<T> std::fmt::Debug for WorkerMsg<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WorkerMsg::Ready => "Ready",
            WorkerMsg::PullInput(_) => "PullInput",
            WorkerMsg::NextValue(_) => "NextValue",
            WorkerMsg::NextValueTempfile(_) => "NextValueTempfile",
            WorkerMsg::StopIteration => "StopIteration",
            WorkerMsg::Error(_) => "Error",
        };
        f.write_str(label)
    }
}
