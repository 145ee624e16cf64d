// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::time::Instant;

use git2::Oid;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, RunPhase};
use crate::settings::{RunTemplate, Settings};
use crate::shell::Shell;
use crate::stats::Summary;
use crate::workspace::Workspace;

#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub label: String,
    pub oid: Oid,
    /// Wall-clock time of every timed run in milliseconds, in run order
    pub samples: Vec<f64>,
    pub summary: Summary,
}

impl BenchmarkResult {
    pub fn mean(&self) -> f64 {
        self.summary.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.summary.std_dev
    }
}

/// Run the built command of `workspace` once untimed, then `settings.runs`
/// times under the timer.
///
/// Any failing run aborts the whole benchmark and drops the samples taken
/// so far.
pub fn benchmark(
    workspace: &Workspace,
    oid: Oid,
    settings: &Settings,
    label: &str,
    shell: &Shell,
) -> Result<BenchmarkResult> {
    for path in [workspace.path(), workspace.artifact_path()] {
        if !path.exists() {
            return Err(Error::NotBuilt {
                path: path.to_path_buf(),
            });
        }
    }

    let template = settings.run_template();
    if settings.depth != 0 && !template.has_depth() {
        warn!(
            depth = settings.depth,
            "run command has no {} slot, depth is ignored",
            RunTemplate::DEPTH
        );
    }
    let command = template.render(settings.depth);
    let run = |phase: RunPhase| {
        shell
            .run_quiet(&command, workspace.path())
            .map_err(|failure| Error::Run {
                phase,
                command: command.clone(),
                failure,
            })
    };

    debug!(%command, "warm-up run");
    run(RunPhase::WarmUp)?;

    info!("Benchmarking {:.8}... ({})", oid, label);
    let total = settings.runs;
    let mut samples = Vec::with_capacity(total);
    for i in 0..total {
        let start = Instant::now();
        run(RunPhase::Timed { run: i + 1, total })?;
        let elapsed = start.elapsed();
        // Microseconds / 1000 keeps sub-millisecond resolution.
        samples.push(elapsed.as_micros() as f64 / 1000.0);
    }

    Ok(BenchmarkResult {
        label: label.to_string(),
        oid,
        summary: Summary::of(&samples),
        samples,
    })
}
