// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Error types shared by every stage of a pipeline.

use std::sync::Arc;

/// All the ways a pipeline stage can fail, from misconfiguration at `spawn()`
/// time through a user closure raising mid-stream.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum PipelineError {
    /// A name declared with `.requires(..)` (or `Job::builder_with_inputs`)
    /// has no matching `.input(name, source)` call. Raised synchronously
    /// from `.spawn()`, before any worker thread is started.
    #[error("no input named {name:?} was provided to this job")]
    #[diagnostic(
        code(r3bl_pipeline::missing_input),
        help("call `.input({name:?}, source)` on the builder before `.spawn()`")
    )]
    MissingInput { name: String },

    /// A builder option was set to a value the runtime rejects (e.g. zero
    /// workers).
    #[error("invalid job option: {reason}")]
    #[diagnostic(code(r3bl_pipeline::unknown_option))]
    UnknownOption { reason: String },

    /// A worker thread failed before completing its `Ready` handshake.
    #[error("worker failed to start: {reason}")]
    #[diagnostic(code(r3bl_pipeline::worker_startup))]
    WorkerStartup { reason: String },

    /// The user closure's iterator yielded `Err`.
    #[error("user closure failed: {0}")]
    #[diagnostic(code(r3bl_pipeline::user))]
    // Not marked `#[source]`: std doesn't implement `Error` for `Arc<dyn
    // Error>` (only for `Box<dyn Error>`), and this field needs `Arc` so
    // `PipelineError` itself stays `Clone` for multi-hop forwarding.
    User(Arc<dyn std::error::Error + Send + Sync>),

    /// An upstream stage errored while this stage was pulling an input from
    /// it; forwarded verbatim so the user closure can decide how to react.
    #[error("upstream input failed: {0}")]
    #[diagnostic(code(r3bl_pipeline::upstream))]
    Upstream(Box<PipelineError>),

    /// The worker protocol received a message it did not expect in the
    /// current state. Always a defect in this crate, never the user's fault.
    #[error("pipeline protocol violation: {0}")]
    #[diagnostic(code(r3bl_pipeline::protocol))]
    Protocol(String),

    /// A splitter key was requested for a composite that doesn't carry it.
    #[error("key {key:?} was not found in the upstream value")]
    #[diagnostic(code(r3bl_pipeline::bad_key))]
    BadKey { key: String },

    // Holds a rendered message rather than `#[from] std::io::Error` directly:
    // neither `io::Error` nor `bincode::Error` is `Clone`, and this enum must
    // stay `Clone` to be forwarded to more than one recipient.
    #[error("tempfile io error: {0}")]
    #[diagnostic(code(r3bl_pipeline::io))]
    Io(String),

    #[error("tempfile serialization error: {0}")]
    #[diagnostic(code(r3bl_pipeline::serialization))]
    Serialization(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self { PipelineError::Io(e.to_string()) }
}

impl From<bincode::Error> for PipelineError {
    fn from(e: bincode::Error) -> Self { PipelineError::Serialization(e.to_string()) }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
