// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! A parallel generator pipeline: run a closure that builds an iterator on
//! one or more isolated worker threads, and drive its output as a lazy,
//! pull-based [`futures_core::Stream`]. Stages chain by feeding one job's
//! output into another's named input, so a whole pipeline of concurrent
//! stages is driven from a single consumer poll.
//!
//! ```ignore
//! use r3bl_pipeline::Job;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let squares = Job::builder(|_inputs| (0..5).map(Ok))
//!     .workers(2)
//!     .buffer(4)
//!     .spawn()
//!     .await?;
//!
//! while let Some(value) = squares.next().await {
//!     println!("{}", value?);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod generator_map;
mod job;
mod protocol;
mod queue;
mod splitter;
mod tempfile_codec;
mod worker;

pub use error::{PipelineError, PipelineResult};
pub use generator_map::generator_map;
pub use job::{IntoPipelineSource, Job, JobBuilder, JobOptions};
pub use splitter::{SplitSource, Splitter, SplitterChild};
pub use worker::{AsyncInput, Inputs};
