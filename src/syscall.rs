// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process invocation.

use std::{
    ffi::OsStr,
    path::Path,
    process::{Command, Output},
};

/// Run external command to completion and capture its output.
///
/// The command always runs from `cwd`. Git repository discovery is capped at
/// `cwd` so that scratch directories nested inside some unrelated repository
/// never get treated as part of it.
///
/// # Errors
///
/// - Return [`SyscallError`] if the command cannot be spawned.
pub(crate) fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    cwd: impl AsRef<Path>,
) -> Result<Output> {
    let cwd = cwd.as_ref();
    let mut command = Command::new(cmd.as_ref());
    command.args(args).current_dir(cwd);
    if let Some(parent) = cwd.parent().filter(|parent| parent.is_absolute()) {
        command.env("GIT_CEILING_DIRECTORIES", parent);
    }

    command.output().map_err(|err| SyscallError {
        source: err,
        program: cmd.as_ref().to_string_lossy().into_owned(),
    })
}

/// Merge stdout and stderr of finished command into one message.
pub(crate) fn output_message(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        if !message.is_empty() && !message.ends_with('\n') {
            message.push('\n');
        }
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// External command could not be spawned.
#[derive(Debug, thiserror::Error)]
#[error("failed to run {program:?}")]
pub struct SyscallError {
    #[source]
    pub source: std::io::Error,
    pub program: String,
}

/// Friendly result alias :3
type Result<T, E = SyscallError> = std::result::Result<T, E>;
