// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source patch management for decompiled server projects.
//!
//! Srcpatch decompiles an upstream server archive into a __reference tree__,
//! and keeps hand-written modifications to those sources as one patch per
//! file in a __patch store__. Whenever the upstream archive changes, the
//! reference tree is regenerated and the patches are replayed on top of it to
//! rebuild the developer's __working tree__.
//!
//! # See Also
//!
//! 1. [`patch`] for the synchronization model.
//! 2. [`config`] for the configuration file layout.
//! 3. [`setup`] for reference tree production.

pub mod config;
pub mod patch;
pub mod path;
pub mod setup;

mod syscall;

pub use config::{Config, Layout};
pub use patch::{Applier, ApplyReport, Engine, ExtractOptions, ExtractSummary, Extractor};
