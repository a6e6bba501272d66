// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reference tree production.
//!
//! Before any source patch can be extracted or applied, a reference tree has
//! to exist. Setup produces it in four steps:
//!
//! 1. Preflight: make sure Git, a recent enough JDK, and the `jar` utility
//!    are on PATH.
//! 2. Wipe the work directory from any previous run.
//! 3. Locate the server archive, and copy it into the download directory.
//! 4. Decompile the archive into the reference tree.
//!
//! The decompiler emits an archive of sources rather than loose files, so it
//! is unpacked in place with `jar xf` and then deleted.

use crate::{
    config::Config,
    syscall::{output_message, syscall_non_interactive, SyscallError},
};

use std::{
    env,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Output,
};
use tracing::{debug, info, instrument};

/// Versions of external tools found during preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub git: String,
    pub java: String,
    pub jar: String,
}

/// Check that every external tool setup relies on is usable.
///
/// # Errors
///
/// - Return [`SetupError::MissingTool`] if a tool cannot be run.
/// - Return [`SetupError::JavaVersion`] if the JDK is older than
///   `min_java_version` or reports a version that cannot be understood.
#[instrument(skip(cwd), level = "debug")]
pub fn preflight(cwd: &Path, min_java_version: u32) -> Result<Toolchain> {
    let git = tool_version(cwd, "git", "--version")?;
    info!("git check success: {git}");

    // INVARIANT: Java reports its version on stderr.
    let output = run_tool(cwd, "java", ["-version"])?;
    let report = String::from_utf8_lossy(&output.stderr).into_owned();
    let java = quoted_version(&report).unwrap_or_default().to_string();
    match parse_java_major(&java) {
        Some(major) if major >= min_java_version => info!("java check success: {java}"),
        _ => {
            return Err(SetupError::JavaVersion {
                found: java,
                required: min_java_version,
            })
        }
    }

    let jar = tool_version(cwd, "jar", "--version")?;
    info!("jar utility check success: {jar}");

    Ok(Toolchain { git, java, jar })
}

/// Extract major version from a JDK version string.
///
/// Handles both modern versions like "25.0.1", and legacy versions like
/// "1.8.0_402" whose major version is the second component.
pub fn parse_java_major(version: &str) -> Option<u32> {
    let mut parts = version.split(['.', '-', '+', '_']);
    let major = parts.next()?.parse::<u32>().ok()?;
    if major == 1 {
        return parts.next()?.parse::<u32>().ok();
    }

    Some(major)
}

fn quoted_version(report: &str) -> Option<&str> {
    let start = report.find('"')? + 1;
    let len = report[start..].find('"')?;
    Some(&report[start..start + len])
}

/// Locate the server archive.
///
/// Looks for the configured archive name in the project root first, then for
/// a path in the configured environment variable.
///
/// # Errors
///
/// - Return [`SetupError::ServerJarNotFound`] if neither location holds a
///   file.
pub fn locate_server_jar(config: &Config) -> Result<PathBuf> {
    let local = config.layout.project_root.join(&config.setup.server_jar);
    if local.is_file() {
        info!("using local {:?}", local.display());
        return Ok(local);
    }

    if let Some(path) = env::var_os(&config.setup.server_jar_env).map(PathBuf::from) {
        if path.is_file() {
            info!("using {} at {:?}", config.setup.server_jar_env, path.display());
            return Ok(path);
        }
        debug!(
            "{} points at missing file {:?}",
            config.setup.server_jar_env,
            path.display()
        );
    }

    Err(SetupError::ServerJarNotFound {
        name: config.setup.server_jar.clone(),
        dir: config.layout.project_root.clone(),
        env: config.setup.server_jar_env.clone(),
    })
}

/// Decompile server archive into output directory.
///
/// # Errors
///
/// - Return [`SetupError::InvalidInput`] if the archive or output directory
///   does not exist.
/// - Return [`SetupError::Command`] if the decompiler or `jar` fails.
/// - Return [`SetupError::Io`] if the intermediate source archive cannot be
///   removed.
#[instrument(skip(config), level = "debug")]
pub fn decompile(config: &Config, jar: &Path, out_dir: &Path) -> Result<()> {
    if !jar.is_file() {
        return Err(SetupError::InvalidInput {
            reason: "input jar does not exist",
            path: jar.to_path_buf(),
        });
    }

    if !out_dir.is_dir() {
        return Err(SetupError::InvalidInput {
            reason: "output directory does not exist",
            path: out_dir.to_path_buf(),
        });
    }

    // INVARIANT: Tools run from other directories, so hand them absolute paths.
    let decompiler = absolute(&config.layout.project_root.join(&config.setup.decompiler))?;
    let mut args: Vec<String> = vec!["-jar".into(), decompiler.to_string_lossy().into_owned()];
    args.extend(config.setup.decompiler_args.iter().cloned());
    args.push(absolute(jar)?.to_string_lossy().into_owned());
    args.push(absolute(out_dir)?.to_string_lossy().into_owned());

    info!("decompile {:?} into {:?}", jar.display(), out_dir.display());
    let output = run_tool(&config.layout.project_root, "java", &args)?;
    checked("java", output)?;

    // INVARIANT: Decompiler emits an archive named after its input.
    let Some(name) = jar.file_name() else {
        return Err(SetupError::InvalidInput {
            reason: "input jar has no file name",
            path: jar.to_path_buf(),
        });
    };
    let sources = absolute(&out_dir.join(name))?;
    let output = run_tool(out_dir, "jar", ["xf".into(), sources.to_string_lossy().into_owned()])?;
    checked("jar", output)?;

    fs::remove_file(&sources).map_err(|err| SetupError::Io {
        source: err,
        path: sources.clone(),
    })?;

    Ok(())
}

/// Produce a fresh reference tree.
///
/// Returns path to the reference tree.
///
/// # Errors
///
/// - Return any [`SetupError`] raised by the individual setup steps.
#[instrument(skip(config), level = "debug")]
pub fn run(config: &Config, skip_preflight: bool) -> Result<PathBuf> {
    let project_root = &config.layout.project_root;
    if !skip_preflight {
        preflight(project_root, config.setup.min_java_version)?;
    }

    let work_dir = project_root.join(&config.setup.work_dir);
    info!("remove previous work directory {:?}", work_dir.display());
    match fs::remove_dir_all(&work_dir) {
        Err(err) if err.kind() != ErrorKind::NotFound => {
            return Err(SetupError::Io {
                source: err,
                path: work_dir,
            })
        }
        _ => {}
    }

    let download_dir = project_root.join(&config.setup.download_dir);
    let reference_dir = config.layout.reference_dir();
    for dir in [&download_dir, &reference_dir, &config.layout.patch_store_dir()] {
        mkdirp::mkdirp(dir).map_err(|err| SetupError::Io {
            source: err,
            path: dir.to_path_buf(),
        })?;
    }

    let server_jar = locate_server_jar(config)?;
    let download = download_dir.join(&config.setup.server_jar);
    info!("copy {:?} to {:?}", server_jar.display(), download.display());
    fs::copy(&server_jar, &download).map_err(|err| SetupError::Io {
        source: err,
        path: download.clone(),
    })?;

    decompile(config, &download, &reference_dir)?;
    info!("reference tree ready at {:?}", reference_dir.display());

    Ok(reference_dir)
}

fn tool_version(cwd: &Path, tool: &'static str, flag: &str) -> Result<String> {
    let output = run_tool(cwd, tool, [flag])?;
    if !output.status.success() {
        return Err(SetupError::MissingTool {
            tool,
            message: output_message(&output),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn run_tool(
    cwd: &Path,
    tool: &'static str,
    args: impl IntoIterator<Item = impl AsRef<std::ffi::OsStr>>,
) -> Result<Output> {
    syscall_non_interactive(tool, args, cwd).map_err(|err: SyscallError| {
        SetupError::MissingTool {
            tool,
            message: err.source.to_string(),
        }
    })
}

fn checked(program: &'static str, output: Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    Err(SetupError::Command {
        program,
        message: output_message(&output),
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|err| SetupError::Io {
        source: err,
        path: path.to_path_buf(),
    })
}

/// Setup error types.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// External tool is missing or unusable.
    #[error("{tool} not found or unusable, make sure it is installed and on PATH: {message}")]
    MissingTool { tool: &'static str, message: String },

    /// JDK is too old, or its version cannot be determined.
    #[error("JDK {required} or newer is required, found {found:?}")]
    JavaVersion { found: String, required: u32 },

    /// Server archive cannot be found.
    #[error("{name} not found in {:?}, and {env} does not name an existing file", dir.display())]
    ServerJarNotFound {
        name: String,
        dir: PathBuf,
        env: String,
    },

    /// Setup step was handed a path that does not exist.
    #[error("{reason}: {:?}", path.display())]
    InvalidInput { reason: &'static str, path: PathBuf },

    /// External tool ran but failed.
    #[error("command {program:?} failed:\n{message}")]
    Command {
        program: &'static str,
        message: String,
    },

    /// Filesystem operation fails.
    #[error("filesystem operation failed at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = SetupError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    /// Decompiler stand-in that copies its input archive into the output
    /// directory, like the real one emits a source archive of the same name.
    #[cfg(unix)]
    const FAKE_JAVA: &str = r#"#!/bin/sh
for arg in "$@"; do jar="$out"; out="$arg"; done
cp "$jar" "$out/"
"#;

    /// Archive tool stand-in that insists on being handed an existing archive.
    #[cfg(unix)]
    const FAKE_JAR: &str = r#"#!/bin/sh
[ -f "$2" ] || { echo "missing $2" >&2; exit 1; }
mkdir -p com/hypixel && echo 'class Server {}' > com/hypixel/Server.java
"#;

    #[cfg(unix)]
    fn install_fake_tools() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let bin = env::current_dir()?.join("fake-bin");
        fs::create_dir_all(&bin)?;
        for (name, script) in [("java", FAKE_JAVA), ("jar", FAKE_JAR)] {
            let path = bin.join(name);
            fs::write(&path, script)?;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }

        let path = env::var_os("PATH").unwrap_or_default();
        let mut paths = vec![bin];
        paths.extend(env::split_paths(&path));
        env::set_var("PATH", env::join_paths(paths)?);

        Ok(())
    }

    #[test_case("25.0.1", Some(25); "modern release")]
    #[test_case("25", Some(25); "bare major")]
    #[test_case("21-ea", Some(21); "early access")]
    #[test_case("17.0.9+9", Some(17); "build metadata")]
    #[test_case("1.8.0_402", Some(8); "legacy scheme")]
    #[test_case("", None; "empty")]
    #[test_case("openjdk", None; "garbage")]
    #[test]
    fn java_major_version(version: &str, expect: Option<u32>) {
        assert_eq!(parse_java_major(version), expect);
    }

    #[test]
    fn quoted_version_from_report() {
        let report = "openjdk version \"25.0.1\" 2025-10-21\nOpenJDK Runtime Environment\n";
        assert_eq!(quoted_version(report), Some("25.0.1"));
        assert_eq!(quoted_version("no quotes here"), None);
    }

    #[sealed_test(env = [("HYTALESERVER_JAR_PATH", "/nonexistent/HytaleServer.jar")])]
    fn local_server_jar_wins() -> anyhow::Result<()> {
        fs::write("HytaleServer.jar", b"PK")?;

        let result = locate_server_jar(&Config::default())?;
        assert_eq!(result, PathBuf::from("./HytaleServer.jar"));

        Ok(())
    }

    #[sealed_test]
    fn server_jar_from_environment() -> anyhow::Result<()> {
        let jar = env::current_dir()?.join("elsewhere/server.jar");
        fs::create_dir_all(jar.parent().unwrap())?;
        fs::write(&jar, b"PK")?;
        env::set_var("HYTALESERVER_JAR_PATH", &jar);

        let result = locate_server_jar(&Config::default())?;
        assert_eq!(result, jar);

        Ok(())
    }

    #[sealed_test(env = [("HYTALESERVER_JAR_PATH", "/nonexistent/HytaleServer.jar")])]
    fn missing_server_jar_is_reported() {
        let result = locate_server_jar(&Config::default());
        assert!(matches!(result, Err(SetupError::ServerJarNotFound { .. })));
    }

    #[test]
    fn decompile_requires_existing_inputs() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let config = Config::default();

        let result = decompile(&config, &root.path().join("missing.jar"), root.path());
        assert!(matches!(result, Err(SetupError::InvalidInput { .. })));

        let jar = root.path().join("server.jar");
        fs::write(&jar, b"PK")?;
        let result = decompile(&config, &jar, &root.path().join("missing"));
        assert!(matches!(result, Err(SetupError::InvalidInput { .. })));

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn decompile_with_relative_paths() -> anyhow::Result<()> {
        install_fake_tools()?;
        let config = Config::default();
        let reference_dir = config.layout.reference_dir();
        fs::create_dir_all(&reference_dir)?;
        fs::create_dir_all("work/download")?;
        fs::write("work/download/HytaleServer.jar", b"PK")?;

        let jar = Path::new("./work/download/HytaleServer.jar");
        decompile(&config, jar, &reference_dir)?;

        assert!(reference_dir.join("com/hypixel/Server.java").is_file());
        assert!(!reference_dir.join("HytaleServer.jar").exists());

        Ok(())
    }

    #[cfg(unix)]
    #[sealed_test]
    fn setup_produces_reference_tree() -> anyhow::Result<()> {
        install_fake_tools()?;
        fs::write("HytaleServer.jar", b"PK")?;
        fs::create_dir_all("work/decompile/stale")?;
        fs::write("work/decompile/stale/Old.java", "class Old {}\n")?;

        let config = Config::default();
        let reference_dir = run(&config, true)?;

        assert_eq!(reference_dir, config.layout.reference_dir());
        assert!(reference_dir.join("com/hypixel/Server.java").is_file());
        assert!(!reference_dir.join("stale/Old.java").exists());
        assert!(Path::new("work/download/HytaleServer.jar").is_file());
        assert!(config.layout.patch_store_dir().is_dir());

        Ok(())
    }
}
