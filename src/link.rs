// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link state reconciliation.
//!
//! A __linker__ brings one worktree into agreement with the asset manifest of
//! its project. Every asset lives in the shared directory, and is placed into
//! the worktree according to its kind:
//!
//! - __Hard links__ are created only if nothing occupies the destination.
//! - __Soft links__ are created only if nothing occupies the destination. The
//!   link target is the absolute path of the shared source.
//! - __Copies__ are always refreshed from the shared source, overwriting any
//!   local edits.
//!
//! Cleanup is the converse. Link entries are removed from the worktree, and
//! copies are restored to their committed content through version control,
//! since copies are expected to be tracked files.
//!
//! # Passes
//!
//! Reconciliation runs three passes in a fixed order: hard links, soft links,
//! then copies. Assets are handled one at a time in declaration order. A
//! failure on one asset is recorded in its outcome, and the pass moves on.
//! Both operations finish by inspecting the whole manifest again, so the
//! caller always sees the resulting state.
//!
//! # Concurrency
//!
//! None. Each mutation is a single filesystem call, but a whole run is not
//! transactional. Two concurrent runs against one worktree end up with
//! whichever wrote last.

pub mod fsops;
pub mod inspect;

use crate::{
    context::ProjectContext,
    link::{
        fsops::{copy_recursive, ensure_parent, hard_link, remove_entry, soft_link, FsError},
        inspect::Inspector,
    },
    manifest::{Asset, AssetKind, Manifest},
    path::entry_exists,
    report::{ActionEntry, Outcome, Reconciliation, Report},
    vcs::{Git2Vcs, VersionControl, VcsError},
};

use std::{error::Error, path::Path};
use tracing::{debug, info, instrument, warn};

/// Reconcile one worktree against an asset manifest.
#[derive(Debug)]
pub struct Linker<'a, V = Git2Vcs>
where
    V: VersionControl,
{
    context: &'a ProjectContext,
    manifest: &'a Manifest,
    vcs: V,
}

impl<'a, V> Linker<'a, V>
where
    V: VersionControl,
{
    /// Construct new linker.
    pub fn new(context: &'a ProjectContext, manifest: &'a Manifest, vcs: V) -> Self {
        Self {
            context,
            manifest,
            vcs,
        }
    }

    /// Place every asset into worktree.
    ///
    /// Existing link destinations are skipped, never overwritten. Copies are
    /// always refreshed. Running this twice leaves the same state as running
    /// it once.
    #[instrument(skip(self), level = "debug")]
    pub fn link(&self) -> Reconciliation {
        info!("link assets into {:?}", self.context.worktree_dir().display());
        self.reconcile(|asset| match asset.kind() {
            AssetKind::Hardlink => self.place_link(asset, hard_link),
            AssetKind::Softlink => self.place_link(asset, soft_link),
            AssetKind::Copy => self.place_copy(asset),
        })
    }

    /// Take every asset back out of worktree.
    ///
    /// Link entries are removed without touching shared content. Copies are
    /// restored to their committed content. Absent entries are left alone.
    #[instrument(skip(self), level = "debug")]
    pub fn cleanup(&self) -> Reconciliation {
        info!(
            "clean up assets from {:?}",
            self.context.worktree_dir().display()
        );
        self.reconcile(|asset| {
            if !entry_exists(self.context.destination(asset)) {
                return Ok(Outcome::Untouched);
            }

            match asset.kind() {
                AssetKind::Hardlink | AssetKind::Softlink => {
                    remove_entry(&self.context.destination(asset))?;
                    Ok(Outcome::Removed)
                }
                AssetKind::Copy => {
                    self.vcs
                        .restore_path(self.context.worktree_dir(), asset.path())?;
                    Ok(Outcome::Restored)
                }
            }
        })
    }

    /// Inspect every asset without changing anything.
    pub fn check(&self) -> Report {
        Inspector::new(self.context).inspect(self.manifest)
    }

    fn reconcile<F>(&self, mut apply: F) -> Reconciliation
    where
        F: FnMut(&Asset) -> Result<Outcome, AssetError>,
    {
        let mut actions = Vec::new();
        for kind in AssetKind::ALL {
            for asset in self.manifest.assets_of(kind) {
                let outcome = apply(asset).unwrap_or_else(|err| {
                    let reason = error_chain(&err);
                    warn!("{kind} {:?}: {reason}", asset.path().display());
                    Outcome::Failed { reason }
                });
                debug!("{kind} {:?}: {outcome}", asset.path().display());
                actions.push(ActionEntry {
                    asset: asset.clone(),
                    outcome,
                });
            }
        }

        Reconciliation::new(actions, self.check())
    }

    fn place_link(
        &self,
        asset: &Asset,
        create: fn(&Path, &Path) -> Result<(), FsError>,
    ) -> Result<Outcome, AssetError> {
        let destination = self.context.destination(asset);
        if entry_exists(&destination) {
            return Ok(Outcome::Skipped);
        }

        ensure_parent(&destination)?;
        create(&self.context.source(asset), &destination)?;

        Ok(Outcome::Created)
    }

    fn place_copy(&self, asset: &Asset) -> Result<Outcome, AssetError> {
        let destination = self.context.destination(asset);
        ensure_parent(&destination)?;
        copy_recursive(&self.context.source(asset), &destination)?;

        Ok(Outcome::Copied)
    }
}

fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

/// Failure of a single asset.
#[derive(Debug, thiserror::Error)]
enum AssetError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Vcs(#[from] VcsError),
}
