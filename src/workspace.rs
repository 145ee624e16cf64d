// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{AutotagOption, FetchOptions, Oid, Repository};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Name of the build cache marker inside a workspace.
pub const MARKER_FILE: &str = "__bench";

/// Directory, relative to the checkout, that a build is expected to create.
pub const DEFAULT_ARTIFACT_DIR: &str = "bin";

/// The checkout of one commit on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    path: PathBuf,
    artifact: PathBuf,
}

impl Workspace {
    pub fn new(path: impl Into<PathBuf>, artifact: impl AsRef<Path>) -> Workspace {
        let path = path.into();
        let artifact = path.join(artifact);
        Workspace { path, artifact }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn marker_path(&self) -> PathBuf {
        self.path.join(MARKER_FILE)
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.exists()
    }
}

/// Path of the workspace of `oid` below `root`.
pub fn workspace_path(root: &Path, oid: Oid) -> PathBuf {
    root.join(oid.to_string())
}

/// Make sure a checkout of `oid` exists below `root` and return its path.
///
/// An existing directory is trusted as-is. A new checkout is assembled in a
/// hidden staging directory next to its final path and only renamed into
/// place once the checkout succeeded, so the final path never holds a
/// partial clone.
pub fn ensure_workspace(oid: Oid, remote_url: &str, root: &Path) -> Result<PathBuf> {
    let path = workspace_path(root, oid);
    if path.is_dir() {
        debug!(path = %path.display(), "workspace already present");
        return Ok(path);
    }

    fs::create_dir_all(root)
        .map_err(|e| Error::io(format!("can't create {}", root.display()), e))?;
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{:.8}-", oid))
        .tempdir_in(root)
        .map_err(|e| {
            Error::io(
                format!("can't create staging directory in {}", root.display()),
                e,
            )
        })?;

    info!(commit = %oid, url = remote_url, "cloning into {}", path.display());
    let fail = |reason: String| Error::Materialization {
        oid,
        url: remote_url.to_string(),
        reason,
    };
    fetch_and_checkout(staging.path(), oid, remote_url)
        .map_err(|e| fail(e.message().to_string()))?;

    // The staging TempDir finds nothing left to delete after the rename.
    fs::rename(staging.path(), &path)
        .map_err(|e| fail(format!("can't move checkout to {}: {}", path.display(), e)))?;
    Ok(path)
}

fn fetch_and_checkout(
    dir: &Path,
    oid: Oid,
    remote_url: &str,
) -> std::result::Result<(), git2::Error> {
    let repo = Repository::init(dir)?;
    {
        let mut remote = repo.remote("origin", remote_url)?;
        let mut opts = FetchOptions::new();
        opts.download_tags(AutotagOption::All);
        remote.fetch(&[] as &[&str], Some(&mut opts), None)?;
    }

    let commit = repo.find_commit(oid)?;
    let mut opts = git2::build::CheckoutBuilder::new();
    opts.force();
    repo.checkout_tree(commit.as_object(), Some(&mut opts))?;
    repo.set_head_detached(oid)?;
    Ok(())
}
