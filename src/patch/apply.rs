// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch application.
//!
//! Rebuild working tree files from the reference tree and the patch store.
//!
//! Every patch is replayed on top of a fresh copy of its pristine reference
//! file inside a scoped staging directory that mirrors the project layout.
//! Only a patched result that applied cleanly is copied into the working tree.
//! Thus, a rejected patch leaves its working tree file exactly as it was, and
//! never leaves a half-patched file behind.

use crate::{
    config::Layout,
    patch::{
        copy_file,
        engine::{Engine, PatchEngine, PatchOutcome},
        read_file, Result, SyncError,
    },
    path::{patch_to_source, walk_files},
};

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{error, info, instrument, warn};

/// Leading path components stripped from patch headers, i.e., `a/` and `b/`.
const STRIP_COMPONENTS: usize = 1;

/// Outcome of replaying one patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Patch applied, and working tree file was rewritten.
    Applied { output: String },

    /// Reference file is gone, so there is nothing to patch.
    MissingBaseline,

    /// Patch no longer fits its reference file.
    Conflict { diagnostic: String },

    /// Patch engine could not run for this file.
    ToolFailure { diagnostic: String },
}

/// Patch replay record for one patch file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyEntry {
    /// Patch path relative to patch store.
    pub patch: PathBuf,

    /// Source path relative to reference and working trees.
    pub source: PathBuf,

    /// What happened.
    pub outcome: ApplyOutcome,
}

/// Per-file report of patch application.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub entries: Vec<ApplyEntry>,
}

impl ApplyReport {
    /// Number of patches that applied.
    pub fn applied(&self) -> usize {
        self.count(|outcome| matches!(outcome, ApplyOutcome::Applied { .. }))
    }

    /// Number of patches that were rejected or could not be attempted.
    pub fn failed(&self) -> usize {
        self.count(|outcome| {
            matches!(
                outcome,
                ApplyOutcome::Conflict { .. } | ApplyOutcome::ToolFailure { .. }
            )
        })
    }

    /// Number of patches skipped for lack of a reference file.
    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, ApplyOutcome::MissingBaseline))
    }

    /// Check if every patch applied.
    pub fn is_clean(&self) -> bool {
        self.applied() == self.entries.len()
    }

    fn count(&self, predicate: impl Fn(&ApplyOutcome) -> bool) -> usize {
        self.entries
            .iter()
            .filter(|entry| predicate(&entry.outcome))
            .count()
    }
}

/// Rebuild working tree from reference tree and patch store.
#[derive(Debug)]
pub struct Applier<P = Engine>
where
    P: PatchEngine,
{
    layout: Layout,
    engine: P,
}

impl<P> Applier<P>
where
    P: PatchEngine,
{
    /// Construct new applier.
    pub fn new(layout: Layout, engine: P) -> Self {
        Self { layout, engine }
    }

    /// Replay every patch in the patch store onto the working tree.
    ///
    /// Each patch is attempted independently. Missing reference files,
    /// rejected patches, and patch engine failures are recorded in the
    /// returned report, and the next patch is attempted regardless.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Walk`] if the patch store cannot be traversed.
    /// - Return filesystem variants of [`SyncError`] if files cannot be read,
    ///   copied, or staged.
    #[instrument(skip(self), level = "debug")]
    pub fn apply(&self) -> Result<ApplyReport> {
        let patch_store_dir = self.layout.patch_store_dir();
        info!("apply source patches from {:?}", patch_store_dir.display());

        let mut report = ApplyReport::default();
        for patch in walk_files(&patch_store_dir, &self.layout.extensions.patch)? {
            let source = patch_to_source(&patch, &self.layout.extensions);
            let outcome = self.apply_patch(&patch, &source)?;

            match &outcome {
                ApplyOutcome::Applied { output } => {
                    info!("applied {:?}", patch.display());
                    if !output.is_empty() {
                        info!("{output}");
                    }
                }
                ApplyOutcome::MissingBaseline => warn!(
                    "skip {:?}, no reference file at {:?}",
                    patch.display(),
                    source.display()
                ),
                ApplyOutcome::Conflict { diagnostic } => {
                    error!("failed to apply {:?}:\n{diagnostic}", patch.display())
                }
                ApplyOutcome::ToolFailure { diagnostic } => {
                    error!("cannot run patch engine for {:?}:\n{diagnostic}", patch.display())
                }
            }

            report.entries.push(ApplyEntry {
                patch,
                source,
                outcome,
            });
        }

        info!(
            "{} patch(es) applied, {} failed, {} skipped",
            report.applied(),
            report.failed(),
            report.skipped()
        );

        Ok(report)
    }

    fn apply_patch(&self, patch: &Path, source: &Path) -> Result<ApplyOutcome> {
        let reference_path = self.layout.reference_dir().join(source);
        if !reference_path.is_file() {
            return Ok(ApplyOutcome::MissingBaseline);
        }

        let patch_data = read_file(&self.layout.patch_store_dir().join(patch))?;

        // INVARIANT: Stage pristine reference bytes, never normalized ones.
        let staging = TempDir::new().map_err(SyncError::Staging)?;
        let redirect = self.layout.working_redirect();
        let staged_path = staging.path().join(&redirect).join(source);
        copy_file(&reference_path, &staged_path)?;

        let outcome = match self
            .engine
            .apply(&patch_data, staging.path(), STRIP_COMPONENTS, &redirect)
        {
            Ok(PatchOutcome::Applied { output }) => {
                copy_file(&staged_path, &self.layout.working_dir().join(source))?;
                ApplyOutcome::Applied { output }
            }
            Ok(PatchOutcome::Rejected { diagnostic }) => ApplyOutcome::Conflict { diagnostic },
            Err(err) => ApplyOutcome::ToolFailure {
                diagnostic: err.to_string(),
            },
        };

        Ok(outcome)
    }
}
