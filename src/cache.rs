// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Settings fingerprints and rebuild avoidance.
//!
//! A workspace's marker file holds the fingerprint of the settings of its
//! last successful build. The marker is removed before a build starts and
//! written again only once the build command succeeded, so a workspace
//! whose build failed or was interrupted is always rebuilt.

use std::fmt;
use std::fs;
use std::io::{self, Write};

use sha2::{Digest, Sha256};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::shell::Shell;
use crate::workspace::Workspace;

/// SHA-256 of the serialized settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(settings: &Settings) -> Result<Fingerprint> {
        let serialized = serde_json::to_vec(settings)?;
        Ok(Fingerprint(Sha256::digest(&serialized).into()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Fingerprint> {
        bytes.try_into().ok().map(Fingerprint)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No marker, the workspace was never built successfully
    Fresh,
    /// The marker was written for different settings
    Stale,
    /// The marker matches but the build output is gone
    MissingArtifact,
    Hit,
}

impl CacheState {
    pub fn needs_build(self) -> bool {
        self != CacheState::Hit
    }
}

pub fn read_marker(workspace: &Workspace) -> Result<Option<Vec<u8>>> {
    let path = workspace.marker_path();
    match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(format!("can't read {}", path.display()), e)),
    }
}

/// Compare the workspace's marker against `fingerprint`.
pub fn check(workspace: &Workspace, fingerprint: &Fingerprint) -> Result<CacheState> {
    let state = match read_marker(workspace)? {
        None => CacheState::Fresh,
        Some(bytes) if Fingerprint::from_bytes(&bytes) != Some(*fingerprint) => CacheState::Stale,
        Some(_) if !workspace.has_artifact() => CacheState::MissingArtifact,
        Some(_) => CacheState::Hit,
    };
    Ok(state)
}

/// Build the workspace unless its last successful build used the same
/// settings. Returns whether the build command ran.
pub fn build_if_needed(workspace: &Workspace, settings: &Settings, shell: &Shell) -> Result<bool> {
    let fingerprint = Fingerprint::of(settings)?;
    let state = check(workspace, &fingerprint)?;
    debug!(%fingerprint, ?state, path = %workspace.path().display(), "checked build cache");
    if !state.needs_build() {
        return Ok(false);
    }
    if state == CacheState::MissingArtifact {
        warn!(
            artifact = %workspace.artifact_path().display(),
            "build output missing, rebuilding"
        );
    }

    remove_marker(workspace)?;
    info!(command = %settings.build_cmd, "building {}", workspace.path().display());
    let output = shell
        .run_captured(&settings.build_cmd, workspace.path())
        .map_err(|failure| Error::Build {
            command: settings.build_cmd.clone(),
            failure,
        })?;
    trace!(stdout = %String::from_utf8_lossy(&output.stdout), "build output");

    if !workspace.has_artifact() {
        warn!(
            artifact = %workspace.artifact_path().display(),
            "build succeeded without producing its output"
        );
    }
    write_marker(workspace, &fingerprint)?;
    Ok(true)
}

fn remove_marker(workspace: &Workspace) -> Result<()> {
    let path = workspace.marker_path();
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(format!("can't remove {}", path.display()), e)),
    }
}

fn write_marker(workspace: &Workspace, fingerprint: &Fingerprint) -> Result<()> {
    let path = workspace.marker_path();
    let context = || format!("can't write {}", path.display());
    let mut tmp = tempfile::NamedTempFile::new_in(workspace.path())
        .map_err(|e| Error::io(context(), e))?;
    tmp.write_all(fingerprint.as_bytes())
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::io(context(), e))?;
    tmp.persist(&path).map_err(|e| Error::io(context(), e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct Fixture {
        _dir: tempfile::TempDir,
        workspace: Workspace,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path().join("ws"), "bin");
        fs::create_dir_all(workspace.path()).unwrap();
        Fixture {
            _dir: dir,
            workspace,
        }
    }

    fn counting_settings(log: &Path) -> Settings {
        Settings {
            runs: 3,
            depth: 4,
            build_cmd: format!("mkdir -p bin && echo build >> '{}'", log.display()),
            run_cmd: "true".into(),
        }
    }

    fn builds(log: &Path) -> usize {
        fs::read_to_string(log)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let settings = counting_settings(Path::new("/tmp/log"));
        let first = Fingerprint::of(&settings).unwrap();
        let second = Fingerprint::of(&settings.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.to_string().len(), 64);
    }

    #[test]
    fn every_field_changes_the_fingerprint() {
        let base = counting_settings(Path::new("/tmp/log"));
        let original = Fingerprint::of(&base).unwrap();
        let variants = [
            Settings {
                runs: 4,
                ..base.clone()
            },
            Settings {
                depth: 5,
                ..base.clone()
            },
            Settings {
                build_cmd: "make".into(),
                ..base.clone()
            },
            Settings {
                run_cmd: "false".into(),
                ..base.clone()
            },
        ];
        for variant in &variants {
            assert_ne!(Fingerprint::of(variant).unwrap(), original, "{:?}", variant);
        }
    }

    #[test]
    fn unchanged_settings_build_once() {
        let f = fixture();
        let log = f.workspace.path().join("..").join("builds.log");
        let settings = counting_settings(&log);
        let shell = Shell::new("sh");

        assert!(build_if_needed(&f.workspace, &settings, &shell).unwrap());
        assert!(!build_if_needed(&f.workspace, &settings, &shell).unwrap());
        assert_eq!(builds(&log), 1);

        let marker = fs::read(f.workspace.marker_path()).unwrap();
        assert_eq!(marker, Fingerprint::of(&settings).unwrap().as_bytes());
    }

    #[test]
    fn changed_settings_rebuild() {
        let f = fixture();
        let log = f.workspace.path().join("..").join("builds.log");
        let settings = counting_settings(&log);
        let shell = Shell::new("sh");

        build_if_needed(&f.workspace, &settings, &shell).unwrap();
        let deeper = Settings {
            depth: 7,
            ..settings.clone()
        };
        assert_eq!(
            check(&f.workspace, &Fingerprint::of(&deeper).unwrap()).unwrap(),
            CacheState::Stale
        );
        assert!(build_if_needed(&f.workspace, &deeper, &shell).unwrap());
        assert!(!build_if_needed(&f.workspace, &deeper, &shell).unwrap());
        assert_eq!(builds(&log), 2);
    }

    #[test]
    fn failed_build_leaves_no_marker() {
        let f = fixture();
        let shell = Shell::new("sh");
        let broken = Settings {
            build_cmd: "mkdir -p bin && exit 1".into(),
            ..counting_settings(Path::new("/dev/null"))
        };
        let err = build_if_needed(&f.workspace, &broken, &shell).unwrap_err();
        assert!(matches!(err, Error::Build { .. }), "{}", err);
        assert!(!f.workspace.marker_path().exists());
        assert_eq!(
            check(&f.workspace, &Fingerprint::of(&broken).unwrap()).unwrap(),
            CacheState::Fresh
        );
    }

    #[test]
    fn missing_artifact_forces_rebuild() {
        let f = fixture();
        let log = f.workspace.path().join("..").join("builds.log");
        let settings = counting_settings(&log);
        let shell = Shell::new("sh");

        build_if_needed(&f.workspace, &settings, &shell).unwrap();
        fs::remove_dir_all(f.workspace.artifact_path()).unwrap();
        assert_eq!(
            check(&f.workspace, &Fingerprint::of(&settings).unwrap()).unwrap(),
            CacheState::MissingArtifact
        );
        assert!(build_if_needed(&f.workspace, &settings, &shell).unwrap());
        assert_eq!(builds(&log), 2);
    }

    #[test]
    fn truncated_marker_is_stale() {
        let f = fixture();
        fs::write(f.workspace.marker_path(), b"short").unwrap();
        let fingerprint = Fingerprint::of(&Settings::default()).unwrap();
        assert_eq!(check(&f.workspace, &fingerprint).unwrap(), CacheState::Stale);
    }
}
