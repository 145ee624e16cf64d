// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Loading `config.json`.
//!
//! ```json
//! {
//!   "remote": "https://github.com/example/engine.git",
//!   "baseSettings": { "runs": 10, "depth": 6, "buildCmd": "make", "runCmd": "./bin/engine %p" },
//!   "commits": [
//!     { "hash": "HEAD", "label": "latest" },
//!     { "hash": "4f1c...", "label": "before refactor", "settings": { "depth": 5 } }
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::resolve::Reference;
use crate::settings::Settings;
use crate::shell::{DEFAULT_SHELL, Shell};
use crate::workspace::DEFAULT_ARTIFACT_DIR;

const DEFAULT_LIST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    base_settings: Settings,
    remote: String,
    commits: Vec<RawCommit>,
    artifact_dir: Option<PathBuf>,
    shell: Option<String>,
    list_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    hash: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    settings: Settings,
}

/// One commit to build and benchmark, with fully merged settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSpec {
    pub reference: Reference,
    pub label: String,
    pub settings: Settings,
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub remote_url: String,
    pub commits: Vec<CommitSpec>,
    /// Build output location, relative to a workspace
    pub artifact_dir: PathBuf,
    pub shell: Shell,
    /// Bound on listing the remote's refs when resolving `HEAD`
    pub list_timeout: Duration,
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<BenchConfig> {
        let data = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("can't read {}: {}", path.display(), e)))?;
        Self::from_json(&data)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_json(data: &str) -> Result<BenchConfig> {
        let raw: RawConfig =
            serde_json::from_str(data).map_err(|e| Error::Config(format!("invalid config: {}", e)))?;
        if raw.remote.trim().is_empty() {
            return Err(Error::Config("`remote` is empty".into()));
        }

        let commits = raw
            .commits
            .into_iter()
            .map(|commit| {
                let label = if commit.label.is_empty() {
                    commit.hash.clone()
                } else {
                    commit.label
                };
                let settings = commit.settings.inherit(&raw.base_settings);
                settings.validate(&label)?;
                Ok(CommitSpec {
                    reference: commit.hash.parse().unwrap_or_else(|e| match e {}),
                    label,
                    settings,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BenchConfig {
            remote_url: raw.remote,
            commits,
            artifact_dir: raw
                .artifact_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR)),
            shell: Shell::new(raw.shell.as_deref().unwrap_or(DEFAULT_SHELL)),
            list_timeout: Duration::from_secs(
                raw.list_timeout_secs.unwrap_or(DEFAULT_LIST_TIMEOUT_SECS),
            ),
        })
    }
}
