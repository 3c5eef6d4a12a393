// Copyright (c) 2026 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Scratch-file handoff for large values, modeled on the `TempDir` helper in
//! the host crate family's `core::misc::temp_dir` module: a single owned
//! resource, created under `std::env::temp_dir()`, removed exactly once.
//!
//! Unlike `TempDir`, a pipeline tempfile is not removed on `Drop` — ownership
//! transfers by message (see `SPEC_FULL.md` §5), and the receiving end is
//! responsible for the read-then-delete. A file that is never claimed (e.g.
//! the consumer stops polling) is simply leaked, matching the "no explicit
//! cancellation" design.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::PipelineResult;

/// Net count of scratch files written but not yet read-and-removed. Exists
/// only under `cfg(test)`, as a hook for asserting the exactly-once-delete
/// invariant from the inside; production builds don't pay for it.
#[cfg(test)]
pub(crate) static LIVE_TEMPFILES: std::sync::atomic::AtomicIsize =
    std::sync::atomic::AtomicIsize::new(0);

/// Serializes `value` to a new scratch file and returns its path.
pub fn write_tempfile<T: Serialize>(value: &T) -> PipelineResult<PathBuf> {
    let path = std::env::temp_dir().join(format!("r3bl_pipeline-{}.bin", uuid::Uuid::new_v4()));
    let bytes = bincode::serialize(value)?;
    std::fs::write(&path, bytes)?;
    #[cfg(test)]
    LIVE_TEMPFILES.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    Ok(path)
}

/// Reads and removes the scratch file at `path`, deserializing its contents.
pub fn read_and_remove_tempfile<T: DeserializeOwned>(path: &Path) -> PipelineResult<T> {
    let bytes = std::fs::read(path)?;
    std::fs::remove_file(path)?;
    #[cfg(test)]
    LIVE_TEMPFILES.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    let value = bincode::deserialize(&bytes)?;
    Ok(value)
}
