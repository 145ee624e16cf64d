// Copyright (c) 2025 the JPEG XL Project Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Turning commit references into concrete commit ids.
//!
//! `HEAD` is looked up on the remote every time it is resolved, so it may
//! name a different commit on every invocation. Explicit ids are only
//! checked for shape here; whether the remote has them is found out when
//! the workspace is materialized.

use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use git2::{Direction, Oid, Remote};
use tracing::debug;

use crate::error::{Error, Result};

/// Length of a hex encoded SHA-1 commit id.
pub const COMMIT_ID_LEN: usize = 40;

const HEAD: &str = "HEAD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// The commit the remote's HEAD points at
    LatestHead,
    Explicit(String),
}

impl FromStr for Reference {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s == HEAD {
            Reference::LatestHead
        } else {
            Reference::Explicit(s.to_string())
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::LatestHead => f.write_str(HEAD),
            Reference::Explicit(id) => f.write_str(id),
        }
    }
}

/// A ref as advertised by a remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedRef {
    pub name: String,
    pub oid: Oid,
    pub symref_target: Option<String>,
}

pub struct Resolver {
    url: String,
    timeout: Duration,
}

impl Resolver {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Resolver {
        Resolver {
            url: url.into(),
            timeout,
        }
    }

    pub fn resolve(&self, reference: &Reference) -> Result<Oid> {
        match reference {
            Reference::Explicit(id) => parse_commit_id(id),
            Reference::LatestHead => {
                let refs = list_remote(&self.url, self.timeout)?;
                debug!(url = %self.url, refs = refs.len(), "listed remote refs");
                find_head(&refs)
            }
        }
    }
}

/// Parse a full-length hex commit id.
pub fn parse_commit_id(id: &str) -> Result<Oid> {
    let malformed = |reason: String| Error::Resolution {
        reference: id.to_string(),
        reason,
    };
    if id.len() != COMMIT_ID_LEN {
        return Err(malformed(format!(
            "expected {} hex characters, got {}",
            COMMIT_ID_LEN,
            id.len()
        )));
    }
    if let Some(bad) = id.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(malformed(format!("`{}` is not a hex digit", bad)));
    }
    Oid::from_str(id).map_err(|e| malformed(e.message().to_string()))
}

/// Find the commit HEAD points at, following at most one symbolic hop.
pub fn find_head(refs: &[AdvertisedRef]) -> Result<Oid> {
    let unresolvable = |reason: String| Error::Resolution {
        reference: HEAD.to_string(),
        reason,
    };
    let head = refs
        .iter()
        .find(|r| r.name == HEAD)
        .ok_or_else(|| unresolvable("remote doesn't advertise HEAD".into()))?;

    let oid = match &head.symref_target {
        None => head.oid,
        Some(target) => {
            let target_ref = refs.iter().find(|r| &r.name == target).ok_or_else(|| {
                unresolvable(format!("HEAD points at `{}`, which doesn't exist", target))
            })?;
            if let Some(next) = &target_ref.symref_target {
                return Err(unresolvable(format!(
                    "HEAD -> {} -> {} is a chain of symbolic refs",
                    target, next
                )));
            }
            target_ref.oid
        }
    };

    if oid.is_zero() {
        return Err(unresolvable("HEAD has no commit".into()));
    }
    Ok(oid)
}

fn list_remote(url: &str, timeout: Duration) -> Result<Vec<AdvertisedRef>> {
    let (tx, rx) = mpsc::channel();
    let owned_url = url.to_string();
    // The listing thread is left behind if it outlives the timeout.
    thread::Builder::new()
        .name("ls-remote".into())
        .spawn(move || {
            let _ = tx.send(ls_remote(&owned_url));
        })
        .map_err(|e| Error::io("can't spawn remote listing thread", e))?;

    let unreachable = |reason: String| Error::Resolution {
        reference: HEAD.to_string(),
        reason,
    };
    match rx.recv_timeout(timeout) {
        Ok(listing) => listing.map_err(|e| {
            unreachable(format!("can't list refs of {}: {}", url, e.message()))
        }),
        Err(RecvTimeoutError::Timeout) => Err(Error::Timeout {
            url: url.to_string(),
            timeout,
        }),
        Err(RecvTimeoutError::Disconnected) => {
            Err(unreachable(format!("listing refs of {} aborted", url)))
        }
    }
}

fn ls_remote(url: &str) -> std::result::Result<Vec<AdvertisedRef>, git2::Error> {
    let mut remote = Remote::create_detached(url)?;
    remote.connect(Direction::Fetch)?;
    let refs = remote
        .list()?
        .iter()
        .map(|head| AdvertisedRef {
            name: head.name().to_string(),
            oid: head.oid(),
            symref_target: head.symref_target().map(str::to_string),
        })
        .collect();
    Ok(refs)
}
