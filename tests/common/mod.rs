// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Oid, Repository, Signature};
use tempfile::TempDir;

/// A throwaway upstream repository next to a workspace root to clone it into.
pub struct Upstream {
    pub repo: Repository,
    pub commits: Vec<Oid>,
    pub dir: TempDir,
}

impl Upstream {
    /// Create a repository with `n` linear commits, each changing `value.txt`.
    pub fn with_commits(n: usize) -> Upstream {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path().join("upstream")).unwrap();
        let mut upstream = Upstream {
            repo,
            commits: Vec::new(),
            dir,
        };
        for i in 0..n {
            upstream.commit("value.txt", &format!("{}\n", i));
        }
        upstream
    }

    pub fn url(&self) -> String {
        self.repo.workdir().unwrap().to_string_lossy().into_owned()
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.dir.path().join("build")
    }

    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn commit(&mut self, name: &str, contents: &str) -> Oid {
        let workdir = self.repo.workdir().unwrap().to_path_buf();
        fs::write(workdir.join(name), contents).unwrap();

        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = Signature::now("bench", "bench@example.com").unwrap();
        let parent = self.commits.last().map(|oid| self.repo.find_commit(*oid).unwrap());
        let parents: Vec<_> = parent.iter().collect();
        let message = format!("commit {}", self.commits.len());
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, &message, &tree, &parents)
            .unwrap();
        self.commits.push(oid);
        oid
    }
}

pub fn line_count(path: &Path) -> usize {
    fs::read_to_string(path)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

/// Build command that records itself in `log` and produces `bin/`.
pub fn counting_build(log: &Path) -> String {
    format!(
        "mkdir -p bin && cp value.txt bin/ && echo build >> '{}'",
        log.display()
    )
}

/// Run command that records itself in `log` before sleeping 10ms.
pub fn counting_run(log: &Path) -> String {
    format!("echo %p >> '{}' && sleep 0.01", log.display())
}
