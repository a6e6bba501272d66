// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Patch extraction.
//!
//! Walk the working tree, diff every source file against its reference
//! counterpart, and bring the patch store in line with the result.

use crate::{
    config::Layout,
    patch::{
        engine::{DiffEngine, Engine},
        read_file, remove_file, write_file, Result,
    },
    path::{patch_to_source, source_to_patch, strip_carriage_returns, to_slash, walk_files},
};

use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Extraction options.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Delete patches whose working tree file no longer exists.
    pub prune_orphans: bool,
}

/// Tally of what extraction did to the patch store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Patches created or updated.
    pub written: usize,

    /// Patches already up to date.
    pub unchanged: usize,

    /// Patches deleted because their file matches the reference again.
    pub removed: usize,

    /// Working tree files without a reference counterpart.
    pub skipped: usize,

    /// Patches left behind for working tree files that no longer exist.
    pub orphaned: usize,

    /// Orphaned patches that were deleted.
    pub pruned: usize,
}

/// What happened to a single working tree file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extraction {
    Written,
    Unchanged,
    Removed,
    Clean,
    NoBaseline,
}

/// Keep patch store in sync with working tree.
#[derive(Debug)]
pub struct Extractor<D = Engine>
where
    D: DiffEngine,
{
    layout: Layout,
    engine: D,
}

impl<D> Extractor<D>
where
    D: DiffEngine,
{
    /// Construct new extractor.
    pub fn new(layout: Layout, engine: D) -> Self {
        Self { layout, engine }
    }

    /// Create, update, or delete patches to reflect the working tree.
    ///
    /// Only the patch store is ever written to. Working tree files lacking a
    /// reference counterpart are skipped. Rewriting a patch with identical
    /// content is avoided entirely, so repeated runs over an unchanged working
    /// tree leave the patch store untouched.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Walk`](crate::patch::SyncError::Walk) if a tree
    ///   cannot be traversed.
    /// - Return [`SyncError::Engine`](crate::patch::SyncError::Engine) if the
    ///   diff engine fails to run.
    /// - Return filesystem variants of
    ///   [`SyncError`](crate::patch::SyncError) if files cannot be read,
    ///   written, or removed.
    #[instrument(skip(self), level = "debug")]
    pub fn extract(&self, opts: ExtractOptions) -> Result<ExtractSummary> {
        let working_dir = self.layout.working_dir();
        info!("extract source patches from {:?}", working_dir.display());

        let mut summary = ExtractSummary::default();
        for rel in walk_files(&working_dir, &self.layout.extensions.source)? {
            match self.extract_file(&rel)? {
                Extraction::Written => summary.written += 1,
                Extraction::Unchanged => summary.unchanged += 1,
                Extraction::Removed => summary.removed += 1,
                Extraction::NoBaseline => summary.skipped += 1,
                Extraction::Clean => {}
            }
        }

        self.sweep_orphans(opts, &mut summary)?;

        info!(
            "{} patch(es) created or updated, {} removed, {} unchanged",
            summary.written, summary.removed, summary.unchanged
        );

        Ok(summary)
    }

    fn extract_file(&self, rel: &Path) -> Result<Extraction> {
        let reference_path = self.layout.reference_dir().join(rel);
        if !reference_path.is_file() {
            debug!("no reference for {:?}, skipping", rel.display());
            return Ok(Extraction::NoBaseline);
        }

        let working_path = self.layout.working_dir().join(rel);
        let reference = read_file(&reference_path)?;
        let working = read_file(&working_path)?;
        let reference = strip_carriage_returns(&reference);
        let working = strip_carriage_returns(&working);

        let diff = if reference == working {
            Vec::new()
        } else {
            // INVARIANT: Headers keep the `a/` and `b/` markers that apply strips.
            let name = to_slash(rel);
            self.engine.diff(
                format!("a/{name}").as_str(),
                &reference,
                format!("b/{name}").as_str(),
                &working,
            )?
        };

        let patch_path = self
            .layout
            .patch_store_dir()
            .join(source_to_patch(rel, &self.layout.extensions));

        if diff.is_empty() {
            if patch_path.is_file() {
                info!("remove patch {:?}, file matches reference", rel.display());
                remove_file(&patch_path)?;
                return Ok(Extraction::Removed);
            }

            return Ok(Extraction::Clean);
        }

        // INVARIANT: Never rewrite a patch whose content would not change.
        if patch_path.is_file() && read_file(&patch_path)? == diff {
            debug!("patch for {:?} is up to date", rel.display());
            return Ok(Extraction::Unchanged);
        }

        info!("write patch for {:?}", rel.display());
        write_file(&patch_path, &diff)?;

        Ok(Extraction::Written)
    }

    fn sweep_orphans(&self, opts: ExtractOptions, summary: &mut ExtractSummary) -> Result<()> {
        let patch_store_dir = self.layout.patch_store_dir();
        let working_dir = self.layout.working_dir();

        for rel in walk_files(&patch_store_dir, &self.layout.extensions.patch)? {
            let source = patch_to_source(&rel, &self.layout.extensions);
            if working_dir.join(&source).exists() {
                continue;
            }

            if opts.prune_orphans {
                info!("prune patch {:?}, {:?} was deleted", rel.display(), source.display());
                remove_file(&patch_store_dir.join(&rel))?;
                summary.pruned += 1;
            } else {
                warn!(
                    "patch {:?} has no working tree file at {:?}, keeping it",
                    rel.display(),
                    source.display()
                );
                summary.orphaned += 1;
            }
        }

        Ok(())
    }
}
