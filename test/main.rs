// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use srcpatch::{
    patch::{engine::GitCliEngine, ApplyOutcome, DiffEngine, PatchEngine},
    Applier, ApplyReport, Engine, ExtractOptions, ExtractSummary, Extractor, Layout,
};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// Scratch project with the default tree layout.
pub(crate) struct ProjectFixture {
    root: TempDir,
    layout: Layout,
}

impl ProjectFixture {
    pub(crate) fn new() -> Result<Self> {
        let root = tempfile::tempdir()?;
        let layout = Layout::new(root.path());
        fs::create_dir_all(layout.reference_dir())?;
        fs::create_dir_all(layout.working_dir())?;

        Ok(Self { root, layout })
    }

    pub(crate) fn root(&self) -> &Path {
        self.root.path()
    }

    pub(crate) fn put_reference(&self, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        put(self.layout.reference_dir().join(rel), contents)
    }

    pub(crate) fn put_working(&self, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        put(self.layout.working_dir().join(rel), contents)
    }

    pub(crate) fn read_working(&self, rel: impl AsRef<Path>) -> Result<String> {
        Ok(fs::read_to_string(self.layout.working_dir().join(rel))?)
    }

    pub(crate) fn remove_working(&self, rel: impl AsRef<Path>) -> Result<()> {
        Ok(fs::remove_file(self.layout.working_dir().join(rel))?)
    }

    pub(crate) fn patch_path(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.layout.patch_store_dir().join(rel)
    }

    pub(crate) fn put_patch(&self, rel: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
        put(self.patch_path(rel), contents)
    }

    pub(crate) fn read_patch(&self, rel: impl AsRef<Path>) -> Result<String> {
        Ok(fs::read_to_string(self.patch_path(rel))?)
    }

    /// Snapshot every patch in the store as (relative path, contents).
    pub(crate) fn patch_store_snapshot(&self) -> Result<Vec<(PathBuf, Vec<u8>)>> {
        let store = self.layout.patch_store_dir();
        let mut snapshot = Vec::new();
        for rel in srcpatch::path::walk_files(&store, "patch")? {
            let contents = fs::read(store.join(&rel))?;
            snapshot.push((rel, contents));
        }

        Ok(snapshot)
    }

    pub(crate) fn extract(&self) -> Result<ExtractSummary> {
        self.extract_with(Engine::default())
    }

    pub(crate) fn extract_with(&self, engine: impl DiffEngine) -> Result<ExtractSummary> {
        let extractor = Extractor::new(self.layout.clone(), engine);
        Ok(extractor.extract(ExtractOptions::default())?)
    }

    pub(crate) fn apply(&self) -> Result<ApplyReport> {
        self.apply_with(Engine::default())
    }

    pub(crate) fn apply_with(&self, engine: impl PatchEngine) -> Result<ApplyReport> {
        let applier = Applier::new(self.layout.clone(), engine);
        Ok(applier.apply()?)
    }
}

/// Look up what happened to the patch for given source path.
pub(crate) fn outcome<'a>(report: &'a ApplyReport, source: &str) -> Option<&'a ApplyOutcome> {
    report
        .entries
        .iter()
        .find(|entry| entry.source == Path::new(source))
        .map(|entry| &entry.outcome)
}

pub(crate) fn git_cli() -> Option<GitCliEngine> {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|_| GitCliEngine)
}

fn put(path: PathBuf, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;

    Ok(())
}
