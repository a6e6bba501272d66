// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Diff and patch engines.
//!
//! Source patch synchronization never computes or applies diffs itself. It
//! hands that work off to an engine through the [`DiffEngine`] and
//! [`PatchEngine`] traits. Two engines are available:
//!
//! - [`Git2Engine`]: runs in-process through libgit2.
//! - [`GitCliEngine`]: shells out to the Git binary, i.e., `git diff --no-index`
//!   and `git apply`.
//!
//! Both engines produce and consume the same patch format: unified diff text,
//! minimal hunks, with the synthetic side markers `a/` and `b/` as the only
//! leading path component. Patches made by one engine can be applied by the
//! other.
//!
//! Note that diffs are taken with prefixes disabled, but the header paths
//! handed in already carry `a/` and `b/`. Stored patches therefore do __not__
//! have bare, prefix-free headers like `--- com/Foo.java`. They read
//! `--- a/com/Foo.java`, and applying them must strip one path component.
//! An engine fed prefix-free patches with a strip of one would drop the first
//! directory of every path.

use crate::{
    config::EngineKind,
    path::to_slash,
    syscall::{output_message, syscall_non_interactive, SyscallError},
};

use git2::{ApplyLocation, Diff, DiffOptions, ErrorClass, ErrorCode, Patch, Repository};
use std::{
    fs::write,
    path::{Path, PathBuf},
};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, instrument};

/// Compute textual diffs between two file contents.
pub trait DiffEngine {
    /// Diff `old` against `new` in no-index, minimal, no-prefix mode.
    ///
    /// Both paths are written verbatim into the diff header. An empty result
    /// means that both contents are identical.
    fn diff(&self, old_path: &str, old: &[u8], new_path: &str, new: &[u8]) -> Result<Vec<u8>>;
}

/// Apply textual diffs to files on disk.
pub trait PatchEngine {
    /// Apply `patch` to files under `base_dir`.
    ///
    /// Strips `strip` leading components from every path named in the patch,
    /// then prefixes `directory` to the result before resolving it against
    /// `base_dir`.
    ///
    /// A patch that does not apply is not an error. Errors are reserved for
    /// when the engine itself cannot run.
    fn apply(
        &self,
        patch: &[u8],
        base_dir: &Path,
        strip: usize,
        directory: &Path,
    ) -> Result<PatchOutcome>;
}

/// Outcome of patch application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Patch applied cleanly.
    Applied { output: String },

    /// Patch was refused, e.g., context mismatch or malformed patch.
    Rejected { diagnostic: String },
}

/// Engine selected at runtime from configuration.
#[derive(Debug, Clone, Copy)]
pub enum Engine {
    Git2(Git2Engine),
    GitCli(GitCliEngine),
}

impl From<EngineKind> for Engine {
    fn from(kind: EngineKind) -> Self {
        match kind {
            EngineKind::Git2 => Self::Git2(Git2Engine),
            EngineKind::GitCli => Self::GitCli(GitCliEngine),
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::from(EngineKind::default())
    }
}

impl DiffEngine for Engine {
    fn diff(&self, old_path: &str, old: &[u8], new_path: &str, new: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Git2(engine) => engine.diff(old_path, old, new_path, new),
            Self::GitCli(engine) => engine.diff(old_path, old, new_path, new),
        }
    }
}

impl PatchEngine for Engine {
    fn apply(
        &self,
        patch: &[u8],
        base_dir: &Path,
        strip: usize,
        directory: &Path,
    ) -> Result<PatchOutcome> {
        match self {
            Self::Git2(engine) => engine.apply(patch, base_dir, strip, directory),
            Self::GitCli(engine) => engine.apply(patch, base_dir, strip, directory),
        }
    }
}

/// Engine backed by libgit2.
///
/// Diffs are generated straight from in-memory buffers. Patches are applied
/// through a throwaway repository initialized on the target directory, because
/// libgit2 can only apply patches relative to a repository work tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Engine;

impl DiffEngine for Git2Engine {
    #[instrument(skip(self, old, new), level = "debug")]
    fn diff(&self, old_path: &str, old: &[u8], new_path: &str, new: &[u8]) -> Result<Vec<u8>> {
        let mut opts = DiffOptions::new();
        opts.minimal(true)
            .force_text(true)
            .old_prefix("")
            .new_prefix("");

        let mut patch = Patch::from_buffers(
            old,
            Some(Path::new(old_path)),
            new,
            Some(Path::new(new_path)),
            Some(&mut opts),
        )?;

        if patch.num_hunks() == 0 {
            return Ok(Vec::new());
        }

        Ok(patch.to_buf()?.to_vec())
    }
}

impl PatchEngine for Git2Engine {
    #[instrument(skip(self, patch), level = "debug")]
    fn apply(
        &self,
        patch: &[u8],
        base_dir: &Path,
        strip: usize,
        directory: &Path,
    ) -> Result<PatchOutcome> {
        // INVARIANT: libgit2 always strips exactly one leading component.
        if strip != 1 {
            return Err(EngineError::UnsupportedStrip(strip));
        }

        let diff = match Diff::from_buffer(patch) {
            Ok(diff) => diff,
            Err(err) => {
                return Ok(PatchOutcome::Rejected {
                    diagnostic: err.message().to_string(),
                })
            }
        };

        // INVARIANT: A patch without file changes is rejected, like `git apply` does.
        if diff.deltas().len() == 0 {
            return Ok(PatchOutcome::Rejected {
                diagnostic: "no valid patches in input".into(),
            });
        }

        let work_dir = base_dir.join(directory);
        mkdirp::mkdirp(&work_dir).map_err(|err| EngineError::Stage {
            source: err,
            path: work_dir.clone(),
        })?;
        let repository = Repository::init(&work_dir)?;

        match repository.apply(&diff, ApplyLocation::WorkDir, None) {
            Ok(()) => {
                let stats = diff.stats()?;
                Ok(PatchOutcome::Applied {
                    output: format!(
                        "{} file(s) changed, {} insertion(s), {} deletion(s)",
                        stats.files_changed(),
                        stats.insertions(),
                        stats.deletions()
                    ),
                })
            }
            Err(err) if is_rejection(&err) => Ok(PatchOutcome::Rejected {
                diagnostic: err.message().to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

fn is_rejection(err: &git2::Error) -> bool {
    err.code() == ErrorCode::ApplyFail
        || matches!(err.class(), ErrorClass::Patch | ErrorClass::Checkout)
}

/// Engine backed by the Git binary.
///
/// Diffs are computed by staging both sides into a scratch directory, because
/// `git diff --no-index` only compares files on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCliEngine;

impl DiffEngine for GitCliEngine {
    #[instrument(skip(self, old, new), level = "debug")]
    fn diff(&self, old_path: &str, old: &[u8], new_path: &str, new: &[u8]) -> Result<Vec<u8>> {
        if old_path == new_path {
            return Err(EngineError::SamePath(old_path.to_string()));
        }

        let scratch = TempDir::new().map_err(|err| EngineError::Stage {
            source: err,
            path: std::env::temp_dir(),
        })?;
        stage_file(scratch.path(), old_path, old)?;
        stage_file(scratch.path(), new_path, new)?;

        let output = syscall_non_interactive(
            "git",
            [
                "-c",
                "core.autocrlf=false",
                "diff",
                "--no-index",
                "--minimal",
                "--no-prefix",
                "--no-color",
                "--no-ext-diff",
                "--",
                old_path,
                new_path,
            ],
            scratch.path(),
        )?;

        // INVARIANT: Exit code 0 means no difference, 1 means difference.
        match output.status.code() {
            Some(0) => Ok(Vec::new()),
            Some(1) => Ok(output.stdout),
            _ => Err(EngineError::Command {
                program: "git diff".into(),
                message: output_message(&output),
            }),
        }
    }
}

impl PatchEngine for GitCliEngine {
    #[instrument(skip(self, patch), level = "debug")]
    fn apply(
        &self,
        patch: &[u8],
        base_dir: &Path,
        strip: usize,
        directory: &Path,
    ) -> Result<PatchOutcome> {
        let mut patch_file = NamedTempFile::new().map_err(|err| EngineError::Stage {
            source: err,
            path: std::env::temp_dir(),
        })?;
        std::io::Write::write_all(&mut patch_file, patch).map_err(|err| EngineError::Stage {
            source: err,
            path: patch_file.path().to_path_buf(),
        })?;

        let args = vec![
            "apply".to_string(),
            format!("-p{strip}"),
            format!("--directory={}", to_slash(directory)),
            "--verbose".to_string(),
            patch_file.path().to_string_lossy().into_owned(),
        ];
        debug!("git {}", args.join(" "));

        let output = syscall_non_interactive("git", &args, base_dir)?;
        let message = output_message(&output);
        if output.status.success() {
            Ok(PatchOutcome::Applied { output: message })
        } else {
            Ok(PatchOutcome::Rejected {
                diagnostic: message,
            })
        }
    }
}

fn stage_file(root: &Path, rel: &str, data: &[u8]) -> Result<()> {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        mkdirp::mkdirp(parent).map_err(|err| EngineError::Stage {
            source: err,
            path: parent.to_path_buf(),
        })?;
    }

    write(&path, data).map_err(|err| EngineError::Stage { source: err, path })
}

/// Engine error types.
///
/// Only covers failures of the engine itself. Patches that do not apply are
/// reported through [`PatchOutcome::Rejected`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// External tool cannot be spawned.
    #[error(transparent)]
    Syscall(#[from] SyscallError),

    /// External tool ran but failed outright.
    #[error("command {program:?} failed:\n{message}")]
    Command { program: String, message: String },

    /// Scratch files cannot be staged.
    #[error("failed to stage scratch file at {:?}", path.display())]
    Stage {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Strip count not supported by engine.
    #[error("cannot strip {0} leading path components, only 1 is supported")]
    UnsupportedStrip(usize),

    /// Both sides of a diff name the same path.
    #[error("diff sides must name distinct paths, both are {0:?}")]
    SamePath(String),
}

/// Friendly result alias :3
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    #[test]
    fn git2_diff_of_identical_content_is_empty() -> anyhow::Result<()> {
        let result = Git2Engine.diff("a/Foo.java", b"class Foo {}\n", "b/Foo.java", b"class Foo {}\n")?;
        assert!(result.is_empty());

        Ok(())
    }

    #[test]
    fn git2_diff_uses_synthetic_paths() -> anyhow::Result<()> {
        let result = Git2Engine.diff(
            "a/com/foo/Foo.java",
            b"class Foo {}\n",
            "b/com/foo/Foo.java",
            b"class Foo { int x; }\n",
        )?;
        let text = String::from_utf8(result)?;

        assert!(text.starts_with("diff --git a/com/foo/Foo.java b/com/foo/Foo.java\n"));
        assert!(text.contains("--- a/com/foo/Foo.java\n"));
        assert!(text.contains("+++ b/com/foo/Foo.java\n"));
        assert!(text.contains("-class Foo {}\n"));
        assert!(text.contains("+class Foo { int x; }\n"));

        Ok(())
    }

    #[test]
    fn git2_apply_patches_redirected_file() -> anyhow::Result<()> {
        let base = tempfile::tempdir()?;
        let target = base.path().join("server/src/Foo.java");
        fs::create_dir_all(target.parent().unwrap())?;
        fs::write(&target, "class Foo {}\n")?;

        let patch = Git2Engine.diff("a/Foo.java", b"class Foo {}\n", "b/Foo.java", b"class Foo { int x; }\n")?;
        let result = Git2Engine.apply(&patch, base.path(), 1, Path::new("server/src"))?;

        assert!(matches!(result, PatchOutcome::Applied { .. }));
        assert_eq!(fs::read_to_string(&target)?, "class Foo { int x; }\n");

        Ok(())
    }

    #[test]
    fn git2_apply_rejects_context_mismatch() -> anyhow::Result<()> {
        let base = tempfile::tempdir()?;
        let target = base.path().join("src/Foo.java");
        fs::create_dir_all(target.parent().unwrap())?;
        fs::write(&target, "class Bar {}\n")?;

        let patch = Git2Engine.diff("a/Foo.java", b"class Foo {}\n", "b/Foo.java", b"class Foo { int x; }\n")?;
        let result = Git2Engine.apply(&patch, base.path(), 1, Path::new("src"))?;

        assert!(matches!(result, PatchOutcome::Rejected { .. }));
        assert_eq!(fs::read_to_string(&target)?, "class Bar {}\n");

        Ok(())
    }

    #[test]
    fn git2_apply_rejects_malformed_patch() -> anyhow::Result<()> {
        let base = tempfile::tempdir()?;
        let patch = indoc! {r#"
            diff --git a/Foo.java b/Foo.java
            --- a/Foo.java
            +++ b/Foo.java
            @@ this is not a hunk header @@
        "#};

        let result = Git2Engine.apply(patch.as_bytes(), base.path(), 1, Path::new("src"))?;
        assert!(matches!(result, PatchOutcome::Rejected { .. }));

        Ok(())
    }

    #[test]
    fn git2_apply_rejects_empty_patch() -> anyhow::Result<()> {
        let base = tempfile::tempdir()?;
        let target = base.path().join("src/Foo.java");
        fs::create_dir_all(target.parent().unwrap())?;
        fs::write(&target, "class Foo { mine }\n")?;

        for patch in [&b""[..], b"\n", b"not a diff at all\n"] {
            let result = Git2Engine.apply(patch, base.path(), 1, Path::new("src"))?;
            assert!(matches!(result, PatchOutcome::Rejected { .. }));
        }
        assert_eq!(fs::read_to_string(&target)?, "class Foo { mine }\n");

        Ok(())
    }

    #[test]
    fn git2_apply_only_strips_one_component() {
        let base = tempfile::tempdir().unwrap();
        let result = Git2Engine.apply(b"", base.path(), 2, Path::new("src"));
        assert!(matches!(result, Err(EngineError::UnsupportedStrip(2))));
    }

    #[test]
    fn git_cli_diff_and_apply() -> anyhow::Result<()> {
        if !git_available() {
            return Ok(());
        }

        let patch = GitCliEngine.diff(
            "a/com/Foo.java",
            b"class Foo {}\n",
            "b/com/Foo.java",
            b"class Foo { int x; }\n",
        )?;
        let text = String::from_utf8(patch.clone())?;
        assert!(text.contains("--- a/com/Foo.java\n"));
        assert!(text.contains("+++ b/com/Foo.java\n"));

        let base = tempfile::tempdir()?;
        let target = base.path().join("server/com/Foo.java");
        fs::create_dir_all(target.parent().unwrap())?;
        fs::write(&target, "class Foo {}\n")?;

        let result = GitCliEngine.apply(&patch, base.path(), 1, Path::new("server"))?;
        assert!(matches!(result, PatchOutcome::Applied { .. }));
        assert_eq!(fs::read_to_string(&target)?, "class Foo { int x; }\n");

        Ok(())
    }

    #[test]
    fn git_cli_apply_rejects_empty_patch() -> anyhow::Result<()> {
        if !git_available() {
            return Ok(());
        }

        let base = tempfile::tempdir()?;
        let result = GitCliEngine.apply(b"", base.path(), 1, Path::new("src"))?;
        assert!(matches!(result, PatchOutcome::Rejected { .. }));

        Ok(())
    }

    #[test]
    fn git_cli_diff_of_identical_content_is_empty() -> anyhow::Result<()> {
        if !git_available() {
            return Ok(());
        }

        let result = GitCliEngine.diff("a/Foo.java", b"same\n", "b/Foo.java", b"same\n")?;
        assert!(result.is_empty());

        Ok(())
    }

    #[test]
    fn git_cli_diff_refuses_same_path() {
        let result = GitCliEngine.diff("Foo.java", b"a\n", "Foo.java", b"b\n");
        assert!(matches!(result, Err(EngineError::SamePath(_))));
    }
}
