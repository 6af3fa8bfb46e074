// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Read-only link state inspection.
//!
//! The filesystem is the only source of truth. Nothing here is cached, and
//! nothing here mutates anything, so every query can be repeated freely.
//!
//! # Hard Link Detection
//!
//! A hard link looks exactly like a fresh file. The only tell is the link
//! count of the shared inode. A destination is reported as hard linked when
//! its link count is above one. No inode comparison against the shared source
//! is made, so a file linked to something else entirely is also reported as
//! hard linked.

use crate::{
    context::ProjectContext,
    manifest::{Asset, AssetKind, Manifest},
    path::entry_exists,
    report::{LinkStatus, Report, StatusEntry},
};

use ignore::WalkBuilder;
use sha2::{digest::Output, Digest, Sha256};
use std::{
    fs::{read_link, File},
    io::{self, copy},
    path::Path,
};

/// Inspect worktree entries of assets against shared directory.
#[derive(Debug, Clone, Copy)]
pub struct Inspector<'a> {
    context: &'a ProjectContext,
}

impl<'a> Inspector<'a> {
    /// Construct new inspector for resolved project context.
    pub fn new(context: &'a ProjectContext) -> Self {
        Self { context }
    }

    /// Check if anything occupies destination of asset, broken links included.
    pub fn exists(&self, asset: &Asset) -> bool {
        entry_exists(self.context.destination(asset))
    }

    /// Check if destination of asset has a link count above one.
    pub fn is_hardlinked(&self, asset: &Asset) -> bool {
        link_count(&self.context.destination(asset)).is_ok_and(|count| count > 1)
    }

    /// Check if destination of asset is a symbolic link.
    ///
    /// Link target is not validated.
    pub fn is_softlinked(&self, asset: &Asset) -> bool {
        self.context
            .destination(asset)
            .symlink_metadata()
            .is_ok_and(|metadata| metadata.file_type().is_symlink())
    }

    /// Check if destination of asset has the same content as its source.
    ///
    /// Unreadable or missing files on either side count as a mismatch, and so
    /// does a destination that is a symbolic link.
    pub fn copy_matches(&self, asset: &Asset) -> bool {
        self.compare_copy(asset).unwrap_or(false)
    }

    /// Determine status of one asset.
    pub fn status(&self, asset: &Asset) -> StatusEntry {
        let (status, detail) = if !self.exists(asset) {
            (LinkStatus::Missing, None)
        } else {
            match asset.kind() {
                AssetKind::Hardlink => self.hardlink_status(asset),
                AssetKind::Softlink => self.softlink_status(asset),
                AssetKind::Copy => match self.compare_copy(asset) {
                    Ok(true) => (LinkStatus::CopyMatches, None),
                    Ok(false) => (LinkStatus::CopyMismatch, None),
                    Err(err) => (LinkStatus::CopyMismatch, Some(err)),
                },
            }
        };

        StatusEntry {
            asset: asset.clone(),
            status,
            detail,
        }
    }

    /// Determine status of every asset in manifest.
    ///
    /// Entries follow pass order: hard links, soft links, then copies, each in
    /// declaration order.
    pub fn inspect(&self, manifest: &Manifest) -> Report {
        let mut report = Report::new();
        for asset in manifest.assets() {
            report.push(self.status(asset));
        }

        report
    }

    fn hardlink_status(&self, asset: &Asset) -> (LinkStatus, Option<String>) {
        match link_count(&self.context.destination(asset)) {
            Ok(count) if count > 1 => (LinkStatus::Hardlinked, None),
            Ok(_) => (LinkStatus::NotHardlinked, None),
            Err(err) => (LinkStatus::NotHardlinked, Some(err.to_string())),
        }
    }

    fn softlink_status(&self, asset: &Asset) -> (LinkStatus, Option<String>) {
        let destination = self.context.destination(asset);
        if !self.is_softlinked(asset) {
            return (LinkStatus::NotSoftlinked, None);
        }

        let source = self.context.source(asset);
        let detail = match read_link(&destination) {
            Ok(_) if !destination.exists() => Some("dangling link".to_string()),
            Ok(target) if target != source => Some(format!("points to {:?}", target.display())),
            Ok(_) => None,
            Err(err) => Some(err.to_string()),
        };

        (LinkStatus::Softlinked, detail)
    }

    fn compare_copy(&self, asset: &Asset) -> Result<bool, String> {
        let is_link = self
            .context
            .destination(asset)
            .symlink_metadata()
            .is_ok_and(|metadata| metadata.file_type().is_symlink());
        if is_link {
            return Err("worktree copy is a symbolic link".into());
        }

        let source = digest(self.context.source(asset))
            .map_err(|err| format!("cannot read shared source: {err}"))?;
        let destination = digest(self.context.destination(asset))
            .map_err(|err| format!("cannot read worktree copy: {err}"))?;

        Ok(source == destination)
    }
}

/// Compute hex encoded SHA-256 digest of file or directory content.
///
/// Directories are digested as a whole: every regular file below it
/// contributes its relative path and content digest, in sorted order.
///
/// # Errors
///
/// - Return [`io::Error`] if path or anything below it cannot be read.
pub fn digest(path: impl AsRef<Path>) -> io::Result<String> {
    let path = path.as_ref();
    if !path.metadata()?.is_dir() {
        return Ok(hex::encode(file_digest(path)?));
    }

    let mut hasher = Sha256::new();
    let walker = WalkBuilder::new(path)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(path) else {
            continue;
        };
        hasher.update(relative.to_string_lossy().as_bytes());
        hasher.update(b"\0");
        hasher.update(file_digest(entry.path())?);
    }

    Ok(hex::encode(hasher.finalize()))
}

fn file_digest(path: &Path) -> io::Result<Output<Sha256>> {
    let mut hasher = Sha256::new();
    copy(&mut File::open(path)?, &mut hasher)?;

    Ok(hasher.finalize())
}

#[cfg(unix)]
fn link_count(path: &Path) -> io::Result<u64> {
    use std::os::unix::fs::MetadataExt;
    Ok(path.symlink_metadata()?.nlink())
}

#[cfg(not(unix))]
fn link_count(_path: &Path) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "link count is only available on unix",
    ))
}
