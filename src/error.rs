// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::result;
use std::time::Duration;

use git2::Oid;
use thiserror::Error;

pub type Result<T> = result::Result<T, Error>;

/// Number of trailing stderr lines kept in a [`CommandFailure::Exit`].
const STDERR_TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum Error {
    #[error("can't resolve `{reference}`: {reason}")]
    Resolution { reference: String, reason: String },

    #[error("listing refs of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("can't materialize {oid:.8} from {url}: {reason}")]
    Materialization {
        oid: Oid,
        url: String,
        reason: String,
    },

    #[error("build command `{command}` failed")]
    Build {
        command: String,
        #[source]
        failure: CommandFailure,
    },

    #[error("no build output at {}", path.display())]
    NotBuilt { path: PathBuf },

    #[error("{phase} of `{command}` failed")]
    Run {
        phase: RunPhase,
        command: String,
        #[source]
        failure: CommandFailure,
    },

    #[error("{0}")]
    Config(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("can't serialize settings")]
    Fingerprint(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

/// Why a shell command did not succeed.
#[derive(Error, Debug)]
pub enum CommandFailure {
    #[error("can't spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{status}{}", stderr_suffix(.stderr))]
    Exit { status: ExitStatus, stderr: String },
}

impl CommandFailure {
    pub(crate) fn exit(status: ExitStatus, stderr: &[u8]) -> Self {
        let stderr = String::from_utf8_lossy(stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
        CommandFailure::Exit {
            status,
            stderr: lines[start..].join("\n"),
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}", stderr)
    }
}

/// Which execution of the run command failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    WarmUp,
    Timed { run: usize, total: usize },
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::WarmUp => f.write_str("warm-up run"),
            RunPhase::Timed { run, total } => write!(f, "run {} of {}", run, total),
        }
    }
}
