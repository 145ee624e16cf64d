// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::path::PathBuf;
use std::result;

use git2::Oid;
use thiserror::Error;
use tracing::{info, info_span};

use crate::bench::{self, BenchmarkResult};
use crate::cache::{self, Fingerprint};
use crate::config::{BenchConfig, CommitSpec};
use crate::error::Error;
use crate::resolve::{Reference, Resolver};
use crate::workspace::{self, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Materializing,
    Building,
    Benchmarking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Resolving => "resolving",
            Stage::Materializing => "materializing",
            Stage::Building => "building",
            Stage::Benchmarking => "benchmarking",
        })
    }
}

/// Order in which commits are prepared and benchmarked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Schedule {
    /// Resolve, materialize and build every commit before timing any of them
    #[default]
    BuildFirst,
    /// Build and benchmark each commit before moving on to the next
    Interleaved,
}

/// The first error of a run, with the commit and stage it happened in.
#[derive(Error, Debug)]
#[error("{stage} `{label}` ({reference}) failed")]
pub struct StageFailure {
    pub label: String,
    pub reference: Reference,
    pub stage: Stage,
    #[source]
    pub source: Error,
}

/// A commit whose workspace is checked out and built.
#[derive(Debug)]
struct Prepared<'a> {
    commit: &'a CommitSpec,
    oid: Oid,
    workspace: Workspace,
}

/// Label and settings fingerprint each workspace was built for in this run.
type Claims<'c> = HashMap<Oid, (&'c str, Fingerprint)>;

pub struct Pipeline<'a> {
    config: &'a BenchConfig,
    workspace_root: PathBuf,
    schedule: Schedule,
    resolver: Resolver,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a BenchConfig, workspace_root: impl Into<PathBuf>) -> Pipeline<'a> {
        Pipeline {
            config,
            workspace_root: workspace_root.into(),
            schedule: Schedule::default(),
            resolver: Resolver::new(config.remote_url.clone(), config.list_timeout),
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Pipeline<'a> {
        self.schedule = schedule;
        self
    }

    /// Process every commit in configuration order, handing each result to
    /// `on_result` as soon as it exists. Stops at the first failure.
    pub fn run(
        &self,
        mut on_result: impl FnMut(&BenchmarkResult),
    ) -> result::Result<(), StageFailure> {
        let mut claims = Claims::new();
        match self.schedule {
            Schedule::BuildFirst => {
                let prepared = self
                    .config
                    .commits
                    .iter()
                    .map(|commit| self.prepare(commit, &mut claims))
                    .collect::<result::Result<Vec<_>, _>>()?;
                info!("all {} commits built", prepared.len());
                for p in &prepared {
                    on_result(&self.measure(p)?);
                }
            }
            Schedule::Interleaved => {
                for commit in &self.config.commits {
                    let p = self.prepare(commit, &mut claims)?;
                    on_result(&self.measure(&p)?);
                }
            }
        }
        Ok(())
    }

    fn prepare<'c>(
        &self,
        commit: &'c CommitSpec,
        claims: &mut Claims<'c>,
    ) -> result::Result<Prepared<'c>, StageFailure> {
        let _span = info_span!("commit", label = %commit.label).entered();
        let fail = |stage: Stage| {
            move |source: Error| StageFailure {
                label: commit.label.clone(),
                reference: commit.reference.clone(),
                stage,
                source,
            }
        };

        info!(stage = %Stage::Resolving, reference = %commit.reference);
        let oid = self
            .resolver
            .resolve(&commit.reference)
            .map_err(fail(Stage::Resolving))?;

        info!(stage = %Stage::Materializing, commit = %oid);
        let path = workspace::ensure_workspace(oid, &self.config.remote_url, &self.workspace_root)
            .map_err(fail(Stage::Materializing))?;
        let workspace = Workspace::new(path, &self.config.artifact_dir);

        info!(stage = %Stage::Building, commit = %oid);
        claim(claims, oid, commit).map_err(fail(Stage::Building))?;
        let rebuilt = cache::build_if_needed(&workspace, &commit.settings, &self.config.shell)
            .map_err(fail(Stage::Building))?;
        if rebuilt {
            info!("Build complete");
        } else {
            info!("settings unchanged, skipping build");
        }

        Ok(Prepared {
            commit,
            oid,
            workspace,
        })
    }

    fn measure(&self, p: &Prepared<'_>) -> result::Result<BenchmarkResult, StageFailure> {
        let _span = info_span!("commit", label = %p.commit.label).entered();
        info!(stage = %Stage::Benchmarking, commit = %p.oid);
        bench::benchmark(
            &p.workspace,
            p.oid,
            &p.commit.settings,
            &p.commit.label,
            &self.config.shell,
        )
        .map_err(|source| StageFailure {
            label: p.commit.label.clone(),
            reference: p.commit.reference.clone(),
            stage: Stage::Benchmarking,
            source,
        })
    }
}

/// Reserve the workspace of `oid` for the settings of `commit`.
///
/// A commit has a single workspace, so two entries checking it out with
/// different settings would overwrite each other's build.
fn claim<'c>(
    claims: &mut Claims<'c>,
    oid: Oid,
    commit: &'c CommitSpec,
) -> result::Result<(), Error> {
    let fingerprint = Fingerprint::of(&commit.settings)?;
    match claims.entry(oid) {
        Entry::Vacant(slot) => {
            slot.insert((commit.label.as_str(), fingerprint));
            Ok(())
        }
        Entry::Occupied(slot) => {
            let (label, claimed) = *slot.get();
            if claimed == fingerprint {
                Ok(())
            } else {
                Err(Error::Config(format!(
                    "`{}` and `{}` both check out {:.8} with different settings; \
                     list the commit once per settings",
                    label, commit.label, oid
                )))
            }
        }
    }
}
