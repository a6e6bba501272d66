// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path correspondence utilities.
//!
//! The reference tree, the working tree, and the patch store all share one
//! relative path layout. A source file at `com/foo/Bar.java` in the working
//! tree has its pristine counterpart at `com/foo/Bar.java` in the reference
//! tree, and its stored patch at `com/foo/Bar.patch` in the patch store. The
//! only thing that ever changes between the three roots is the file
//! extension of the patch store entry.

use crate::config::Extensions;

use ignore::WalkBuilder;
use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

/// Map relative source path to relative patch path.
///
/// Swaps the source extension for the patch extension, keeping the directory
/// structure intact.
pub fn source_to_patch(rel: impl AsRef<Path>, extensions: &Extensions) -> PathBuf {
    rel.as_ref().with_extension(&extensions.patch)
}

/// Map relative patch path to relative source path.
///
/// Inverse of [`source_to_patch`].
pub fn patch_to_source(rel: impl AsRef<Path>, extensions: &Extensions) -> PathBuf {
    rel.as_ref().with_extension(&extensions.source)
}

/// Check if path carries target extension.
pub fn has_extension(path: impl AsRef<Path>, extension: impl AsRef<str>) -> bool {
    path.as_ref()
        .extension()
        .is_some_and(|ext| ext == extension.as_ref())
}

/// Recursively list files with target extension under root.
///
/// Returned paths are relative to `root` and sorted. No ignore files are
/// honored, because decompiled trees and patch stores must be walked in full.
/// A missing root is treated as an empty tree.
///
/// # Errors
///
/// - Return [`PathError::Walk`] if directory traversal fails.
pub fn walk_files(root: impl AsRef<Path>, extension: impl AsRef<str>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry.map_err(|err| PathError::Walk {
            source: err,
            root: root.to_path_buf(),
        })?;

        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }

        if !has_extension(entry.path(), extension.as_ref()) {
            continue;
        }

        // INVARIANT: Walker only yields entries beneath its root.
        if let Ok(rel) = entry.path().strip_prefix(root) {
            entries.push(rel.to_path_buf());
        }
    }

    entries.sort();
    Ok(entries)
}

/// Remove every carriage return byte from file content.
///
/// Borrows the input untouched when there is nothing to strip.
pub fn strip_carriage_returns(data: &[u8]) -> Cow<'_, [u8]> {
    if !data.contains(&b'\r') {
        return Cow::Borrowed(data);
    }

    Cow::Owned(data.iter().copied().filter(|byte| *byte != b'\r').collect())
}

/// Render relative path with forward slashes.
///
/// Diff headers always use forward slashes no matter the host platform.
pub fn to_slash(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Path walking error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// Directory traversal failed.
    #[error("failed to walk directory tree at {:?}", root.display())]
    Walk {
        #[source]
        source: ignore::Error,
        root: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
