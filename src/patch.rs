// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source patch synchronization.
//!
//! Hand-written modifications to decompiled sources cannot be stored as the
//! modified sources themselves, because the decompiled sources get replaced
//! wholesale every time the upstream server archive changes. Instead, srcpatch
//! stores one __source patch__ per modified file, and re-derives the modified
//! files from fresh decompiles by replaying those patches.
//!
//! # The Three Trees
//!
//! Synchronization works over three directory trees that share one relative
//! path layout:
//!
//! - __Reference tree__: pristine decompiled sources. Never touched here.
//! - __Working tree__: sources the developer edits.
//! - __Patch store__: one patch per modified working tree file, with the
//!   source extension swapped for the patch extension.
//!
//! The [`Extractor`] keeps the patch store in sync with the working tree. The
//! [`Applier`] rebuilds the working tree from the reference tree and the
//! patch store.
//!
//! # Patch Format
//!
//! Patches are unified diffs with minimal hunks. Carriage returns are stripped
//! from both sides before diffing, so line ending churn from the decompiler or
//! the developer's editor never produces a patch. Header paths are the
//! relative path of the file behind the synthetic `a/` and `b/` side markers,
//! which are stripped again when the patch is applied.
//!
//! This is a deliberate departure from a bare no-prefix format, where headers
//! would read `--- com/Foo.java`. The side markers let every patch be applied
//! with a fixed strip of one component, by either engine and by a plain
//! `git apply -p1` run by hand.
//!
//! # See Also
//!
//! 1. [`engine`]
//! 2. [`path`](crate::path)

pub mod apply;
pub mod engine;
pub mod extract;

pub use apply::{ApplyEntry, ApplyOutcome, ApplyReport, Applier};
pub use engine::{DiffEngine, Engine, PatchEngine, PatchOutcome};
pub use extract::{ExtractOptions, ExtractSummary, Extractor};

use std::{
    fs,
    path::{Path, PathBuf},
};

/// Read file in full.
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|err| SyncError::Read {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Write file, creating parent directories as needed.
pub(crate) fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    create_parent(path)?;
    fs::write(path, data).map_err(|err| SyncError::Write {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Copy file byte for byte, creating parent directories as needed.
pub(crate) fn copy_file(from: &Path, to: &Path) -> Result<()> {
    create_parent(to)?;
    fs::copy(from, to).map_err(|err| SyncError::Copy {
        source: err,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    })?;

    Ok(())
}

/// Remove file.
pub(crate) fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|err| SyncError::Remove {
        source: err,
        path: path.to_path_buf(),
    })
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        mkdirp::mkdirp(parent).map_err(|err| SyncError::CreateDir {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }

    Ok(())
}

/// Source patch synchronization error types.
///
/// Everything here aborts a run. Per-file problems like missing baselines or
/// rejected patches are reported through summaries instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Directory tree cannot be walked.
    #[error(transparent)]
    Walk(#[from] crate::path::PathError),

    /// Diff engine fails to run.
    #[error(transparent)]
    Engine(#[from] crate::patch::engine::EngineError),

    /// File cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// File cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Scratch directory for staging cannot be created.
    #[error("failed to create staging directory")]
    Staging(#[source] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
