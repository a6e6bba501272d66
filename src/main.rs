// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use srcpatch::{setup, Applier, Config, Engine, ExtractOptions, Extractor};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs::read_to_string, path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration file picked up from the current directory when present.
const DEFAULT_CONFIG: &str = "srcpatch.toml";

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "srcpatch [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config = load_config(self.config)?;
        match self.command {
            Command::Setup(opts) => run_setup(&config, opts),
            Command::MakeSourcePatches(opts) => run_make_source_patches(config, opts),
            Command::ApplySourcePatches => run_apply_source_patches(config),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Decompile server archive into a fresh reference tree.
    #[command(override_usage = "srcpatch setup [options]")]
    Setup(SetupOptions),

    /// Store working tree modifications as source patches.
    #[command(
        name = "makeSourcePatches",
        visible_alias = "make-source-patches",
        override_usage = "srcpatch makeSourcePatches [options]"
    )]
    MakeSourcePatches(MakeSourcePatchesOptions),

    /// Rebuild working tree files from reference tree and source patches.
    #[command(
        name = "applySourcePatches",
        visible_alias = "apply-source-patches",
        override_usage = "srcpatch applySourcePatches"
    )]
    ApplySourcePatches,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SetupOptions {
    /// Do not check for git, java, and jar before setup.
    #[arg(long)]
    pub skip_preflight: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MakeSourcePatchesOptions {
    /// Delete patches whose working tree file no longer exists.
    #[arg(short, long)]
    pub prune: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG);
            if !path.is_file() {
                return Ok(Config::default());
            }
            path
        }
    };

    let data = read_to_string(&path)
        .with_context(|| format!("failed to read configuration file {:?}", path.display()))?;
    let config = data
        .parse::<Config>()
        .with_context(|| format!("invalid configuration file {:?}", path.display()))?;

    Ok(config)
}

fn run_setup(config: &Config, opts: SetupOptions) -> Result<()> {
    setup::run(config, opts.skip_preflight)?;
    Ok(())
}

fn run_make_source_patches(config: Config, opts: MakeSourcePatchesOptions) -> Result<()> {
    let engine = Engine::from(config.engine.kind);
    let extractor = Extractor::new(config.layout, engine);
    let summary = extractor.extract(ExtractOptions {
        prune_orphans: opts.prune,
    })?;

    info!("created or updated {} source patch(es)", summary.written);
    if summary.orphaned > 0 {
        warn!(
            "{} source patch(es) have no working tree file, rerun with --prune to delete them",
            summary.orphaned
        );
    }

    Ok(())
}

fn run_apply_source_patches(config: Config) -> Result<()> {
    let engine = Engine::from(config.engine.kind);
    let applier = Applier::new(config.layout, engine);
    let report = applier.apply()?;

    // INVARIANT: Individual patch failures never change the exit status.
    if !report.is_clean() {
        warn!(
            "{} of {} source patch(es) did not apply",
            report.entries.len() - report.applied(),
            report.entries.len()
        );
    }

    Ok(())
}
