// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the configuration file that srcpatch uses to locate
//! its trees and external tools. File I/O is left to the caller to figure out.
//!
//! # General Layout
//!
//! The configuration is split into three sections: layout, engine, and setup.
//! The layout section names the project root and the three trees that source
//! patch synchronization works over. The engine section selects how diffs are
//! computed and applied. The setup section describes how the reference tree is
//! produced from the upstream server archive.
//!
//! Every relative path is resolved against the project root. Every path is
//! shell expanded after parsing, so `$HOME/hytale` and `~/hytale` work.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Full srcpatch configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory layout for patch synchronization.
    pub layout: Layout,

    /// Diff and patch engine selection.
    pub engine: EngineSettings,

    /// Reference tree production settings.
    pub setup: SetupSettings,
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        let layout = &mut config.layout;
        layout.project_root = expand_path(&layout.project_root)?;
        layout.reference_root = expand_path(&layout.reference_root)?;
        layout.working_root = expand_path(&layout.working_root)?;
        layout.patch_store_root = expand_path(&layout.patch_store_root)?;

        let setup = &mut config.setup;
        setup.work_dir = expand_path(&setup.work_dir)?;
        setup.download_dir = expand_path(&setup.download_dir)?;
        setup.decompiler = expand_path(&setup.decompiler)?;

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Tree layout of a project.
///
/// Names the project root, and the reference tree, working tree, and patch
/// store relative to it. All three trees share the same relative path layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Layout {
    /// Root of the whole project.
    pub project_root: PathBuf,

    /// Pristine decompiled sources.
    pub reference_root: PathBuf,

    /// Hand-edited sources inside the generated project.
    pub working_root: PathBuf,

    /// Stored per-file patches.
    pub patch_store_root: PathBuf,

    /// Source and patch file extensions.
    pub extensions: Extensions,
}

impl Layout {
    /// Construct layout with default tree locations under project root.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Absolute or cwd-relative path to the reference tree.
    pub fn reference_dir(&self) -> PathBuf {
        self.project_root.join(&self.reference_root)
    }

    /// Absolute or cwd-relative path to the working tree.
    pub fn working_dir(&self) -> PathBuf {
        self.project_root.join(&self.working_root)
    }

    /// Absolute or cwd-relative path to the patch store.
    pub fn patch_store_dir(&self) -> PathBuf {
        self.project_root.join(&self.patch_store_root)
    }

    /// Working tree location relative to the project root.
    ///
    /// Used as the directory redirect when applying patches. A working tree
    /// living outside of the project root falls back to its final component.
    pub fn working_redirect(&self) -> PathBuf {
        if self.working_root.is_relative() {
            return self.working_root.clone();
        }

        match self.working_root.strip_prefix(&self.project_root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => self
                .working_root
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("work-tree")),
        }
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            reference_root: PathBuf::from("work/decompile"),
            working_root: PathBuf::from("hytale-server/src/main/java"),
            patch_store_root: PathBuf::from("src-patches"),
            extensions: Extensions::default(),
        }
    }
}

/// File extensions used for path correspondence.
///
/// Extensions are stored without the leading dot.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Extensions {
    /// Extension of source files in reference and working trees.
    pub source: String,

    /// Extension of patch files in the patch store.
    pub patch: String,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            source: "java".into(),
            patch: "patch".into(),
        }
    }
}

/// Engine selection.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Which engine computes and applies patches.
    pub kind: EngineKind,
}

/// Available diff and patch engines.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// In-process through libgit2.
    #[default]
    Git2,

    /// External `git` binary.
    GitCli,
}

/// Settings for producing the reference tree.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SetupSettings {
    /// Name of server archive to look for in the project root.
    pub server_jar: String,

    /// Environment variable that may point at the server archive.
    pub server_jar_env: String,

    /// Scratch directory wiped at the start of every setup.
    pub work_dir: PathBuf,

    /// Directory the server archive is copied into.
    pub download_dir: PathBuf,

    /// Decompiler archive run through `java -jar`.
    pub decompiler: PathBuf,

    /// Extra arguments handed to the decompiler.
    pub decompiler_args: Vec<String>,

    /// Minimum major JDK version required.
    pub min_java_version: u32,
}

impl Default for SetupSettings {
    fn default() -> Self {
        Self {
            server_jar: "HytaleServer.jar".into(),
            server_jar_env: "HYTALESERVER_JAR_PATH".into(),
            work_dir: PathBuf::from("work"),
            download_dir: PathBuf::from("work/download"),
            decompiler: PathBuf::from("tools/fernflower.jar"),
            decompiler_args: ["-dgs=1", "-hdc=0", "-rbr=0", "-asc=1", "-udv=1"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_java_version: 25,
        }
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned();

    Ok(PathBuf::from(expanded))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
