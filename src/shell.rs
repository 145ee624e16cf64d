// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::result;

use crate::error::CommandFailure;

pub const DEFAULT_SHELL: &str = "bash";

/// Interpreter that build and run commands are handed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shell {
    program: String,
}

impl Shell {
    pub fn new(program: impl Into<String>) -> Shell {
        Shell {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, script: &str, dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-c")
            .arg(script)
            .current_dir(dir)
            .stdin(Stdio::null());
        command
    }

    /// Run `script` in `dir`, capturing both output streams.
    pub fn run_captured(&self, script: &str, dir: &Path) -> result::Result<Output, CommandFailure> {
        let output = self.command(script, dir).output();
        self.check(output)
    }

    /// Run `script` in `dir` with stdout discarded. Stderr is kept for error
    /// reporting.
    pub fn run_quiet(&self, script: &str, dir: &Path) -> result::Result<(), CommandFailure> {
        let output = self.command(script, dir).stdout(Stdio::null()).output();
        self.check(output).map(|_| ())
    }

    fn check(&self, output: std::io::Result<Output>) -> result::Result<Output, CommandFailure> {
        let output = output.map_err(|source| CommandFailure::Spawn {
            program: self.program.clone(),
            source,
        })?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(CommandFailure::exit(output.status, &output.stderr))
        }
    }
}
