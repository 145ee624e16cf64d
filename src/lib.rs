// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Build a list of git commits once per distinct set of build settings and
//! benchmark the resulting programs.
//!
//! Every commit goes through [`pipeline::Stage`]s in order: its reference is
//! resolved to a commit id, the commit is checked out into
//! `<workspace root>/<commit id>`, built unless the settings fingerprint in
//! the workspace's marker file still matches, and finally run repeatedly
//! under a timer.

pub mod bench;
pub mod cache;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod resolve;
pub mod settings;
pub mod shell;
pub mod stats;
pub mod workspace;

pub use bench::BenchmarkResult;
pub use config::{BenchConfig, CommitSpec};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, Schedule, Stage, StageFailure};
pub use settings::Settings;
