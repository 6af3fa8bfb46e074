// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Filesystem mutation primitives.
//!
//! Each primitive performs one kind of change to a worktree entry. None of
//! them ever writes through a destination into the shared directory: existing
//! destination entries are removed before being replaced, and links are never
//! followed, so a destination that is itself a link into `.SHARED` cannot
//! truncate or delete shared content.

use crate::path::entry_exists;

use ignore::WalkBuilder;
use mkdirp::mkdirp;
use std::{
    fs::{copy, hard_link as fs_hard_link, read_link, remove_dir_all, remove_file},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::debug;

/// Make sure every parent directory of path exists.
///
/// # Errors
///
/// - Return [`FsError::CreateDir`] if a parent cannot be created.
pub fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => create_dir(parent),
        _ => Ok(()),
    }
}

/// Create hard link at `to` for content of `from`.
///
/// # Errors
///
/// - Return [`FsError::SourceMissing`] if `from` does not exist.
/// - Return [`FsError::HardLink`] if link cannot be created, e.g., because
///   `from` and `to` live on different volumes.
pub fn hard_link(from: &Path, to: &Path) -> Result<()> {
    require_source(from)?;
    fs_hard_link(from, to).map_err(|err| FsError::HardLink {
        source: err,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    })
}

/// Create symbolic link at `to` whose target is `from`.
///
/// # Errors
///
/// - Return [`FsError::SourceMissing`] if `from` does not exist.
/// - Return [`FsError::SoftLink`] if link cannot be created.
pub fn soft_link(from: &Path, to: &Path) -> Result<()> {
    require_source(from)?;
    symlink(from, to).map_err(|err| FsError::SoftLink {
        source: err,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    })
}

/// Copy `from` over `to`, descending into directories.
///
/// Afterwards `to` mirrors `from`. Existing destination entries are replaced,
/// and entries below a destination directory without a counterpart in `from`
/// are removed. Symbolic links inside a copied directory are recreated with
/// the same target, not followed. Symbolic links at the destination are
/// replaced, never followed.
///
/// # Errors
///
/// - Return [`FsError::SourceMissing`] if `from` does not exist.
/// - Return [`FsError::Aliased`] if `to` resolves to `from` itself through a
///   linked parent directory.
/// - Return [`FsError::Walk`] if a directory cannot be traversed.
/// - Return [`FsError::CreateDir`], [`FsError::Remove`], [`FsError::Copy`], or
///   [`FsError::SoftLink`] if an entry cannot be written.
pub fn copy_recursive(from: &Path, to: &Path) -> Result<()> {
    require_source(from)?;
    if same_entry(from, to) {
        return Err(FsError::Aliased {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
        });
    }

    if !from.is_dir() {
        return copy_file(from, to);
    }

    prune_extras(from, to)?;

    let walker = WalkBuilder::new(from)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = if relative.as_os_str().is_empty() {
            to.to_path_buf()
        } else {
            to.join(relative)
        };

        match entry.file_type() {
            Some(kind) if kind.is_dir() => {
                if !is_real_dir(&target) {
                    clear_entry(&target)?;
                }
                create_dir(&target)?;
            }
            Some(kind) if kind.is_symlink() => {
                let link_target = read_link(entry.path()).map_err(|err| FsError::Copy {
                    source: err,
                    from: entry.path().to_path_buf(),
                    to: target.clone(),
                })?;
                clear_entry(&target)?;
                symlink(&link_target, &target).map_err(|err| FsError::SoftLink {
                    source: err,
                    from: link_target.clone(),
                    to: target.clone(),
                })?;
            }
            _ => copy_file(entry.path(), &target)?,
        }
    }

    Ok(())
}

/// Remove directory entry at path without following it.
///
/// Returns `false` if there was nothing to remove. Only files and symbolic
/// links are removed. Real directories are refused, because they hold local
/// content that was never shared.
///
/// # Errors
///
/// - Return [`FsError::RefuseDirectory`] if path is a real directory.
/// - Return [`FsError::Remove`] if entry cannot be removed.
pub fn remove_entry(path: &Path) -> Result<bool> {
    match path.symlink_metadata() {
        Ok(metadata) if metadata.is_dir() => Err(FsError::RefuseDirectory {
            path: path.to_path_buf(),
        }),
        Ok(_) => {
            debug!("remove {:?}", path.display());
            remove_file(path).map_err(|err| FsError::Remove {
                source: err,
                path: path.to_path_buf(),
            })?;
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(FsError::Remove {
            source: err,
            path: path.to_path_buf(),
        }),
    }
}

fn require_source(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }

    Err(FsError::SourceMissing {
        path: path.to_path_buf(),
    })
}

fn create_dir(path: &Path) -> Result<()> {
    mkdirp(path).map_err(|err| FsError::CreateDir {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<()> {
    clear_entry(to)?;
    copy(from, to).map_err(|err| FsError::Copy {
        source: err,
        from: from.to_path_buf(),
        to: to.to_path_buf(),
    })?;

    Ok(())
}

// INVARIANT: Never write through an existing link, replace the entry itself.
fn clear_entry(path: &Path) -> Result<()> {
    let Ok(metadata) = path.symlink_metadata() else {
        return Ok(());
    };

    let removed = if metadata.is_dir() {
        remove_dir_all(path)
    } else {
        remove_file(path)
    };
    removed.map_err(|err| FsError::Remove {
        source: err,
        path: path.to_path_buf(),
    })
}

fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|metadata| metadata.is_dir())
}

fn prune_extras(from: &Path, to: &Path) -> Result<()> {
    if !is_real_dir(to) {
        return Ok(());
    }

    let walker = WalkBuilder::new(to)
        .standard_filters(false)
        .follow_links(false)
        .build();

    let mut extras = Vec::new();
    for entry in walker {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(to) else {
            continue;
        };
        if !relative.as_os_str().is_empty() && !entry_exists(from.join(relative)) {
            extras.push(entry.into_path());
        }
    }

    for path in extras {
        if entry_exists(&path) {
            debug!("prune {:?}", path.display());
            clear_entry(&path)?;
        }
    }

    Ok(())
}

fn same_entry(a: &Path, b: &Path) -> bool {
    let resolve = |path: &Path| -> Option<PathBuf> {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    };

    matches!((resolve(a), resolve(b)), (Some(a), Some(b)) if a == b)
}

#[cfg(unix)]
fn symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(from, to)
}

#[cfg(windows)]
fn symlink(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_dir() {
        std::os::windows::fs::symlink_dir(from, to)
    } else {
        std::os::windows::fs::symlink_file(from, to)
    }
}

/// Filesystem mutation error types.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// Asset is not in shared directory.
    #[error("source missing in shared directory: {:?}", path.display())]
    SourceMissing { path: PathBuf },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Hard link cannot be created.
    #[error("failed to hard link {:?} to {:?}", from.display(), to.display())]
    HardLink {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Symbolic link cannot be created.
    #[error("failed to soft link {:?} to {:?}", from.display(), to.display())]
    SoftLink {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// File cannot be copied.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    Copy {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },

    /// Destination resolves to the source entry itself.
    #[error("refusing to copy {:?} onto itself through {:?}", from.display(), to.display())]
    Aliased { from: PathBuf, to: PathBuf },

    /// Directory cannot be traversed.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Entry cannot be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Entry is a real directory.
    #[error("refusing to remove directory {:?}, it is not a link", path.display())]
    RefuseDirectory { path: PathBuf },
}

/// Friendly result alias :3
pub type Result<T, E = FsError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{
        env::current_dir,
        fs::{create_dir_all, read_to_string, write},
        os::unix::fs::MetadataExt,
    };

    #[sealed_test]
    fn hard_link_shares_inode() -> anyhow::Result<()> {
        let root = current_dir()?;
        write(root.join("source"), "SECRET=1\n")?;
        ensure_parent(&root.join("deep/er/dest"))?;
        hard_link(&root.join("source"), &root.join("deep/er/dest"))?;

        let source = root.join("source").metadata()?;
        let dest = root.join("deep/er/dest").metadata()?;
        assert_eq!(source.ino(), dest.ino());
        assert_eq!(dest.nlink(), 2);

        Ok(())
    }

    #[sealed_test]
    fn link_without_source_fails() -> anyhow::Result<()> {
        let root = current_dir()?;
        assert!(matches!(
            hard_link(&root.join("nope"), &root.join("dest")),
            Err(FsError::SourceMissing { .. })
        ));
        assert!(matches!(
            soft_link(&root.join("nope"), &root.join("dest")),
            Err(FsError::SourceMissing { .. })
        ));
        assert!(!root.join("dest").exists());

        Ok(())
    }

    #[sealed_test]
    fn soft_link_points_at_absolute_source() -> anyhow::Result<()> {
        let root = current_dir()?;
        create_dir_all(root.join("commands"))?;
        soft_link(&root.join("commands"), &root.join("link"))?;

        assert!(root.join("link").symlink_metadata()?.file_type().is_symlink());
        assert_eq!(read_link(root.join("link"))?, root.join("commands"));

        Ok(())
    }

    #[sealed_test]
    fn copy_never_writes_through_links() -> anyhow::Result<()> {
        let root = current_dir()?;
        write(root.join("shared"), "shared\n")?;
        hard_link(&root.join("shared"), &root.join("hard"))?;
        soft_link(&root.join("shared"), &root.join("soft"))?;
        write(root.join("other"), "other\n")?;

        copy_recursive(&root.join("other"), &root.join("hard"))?;
        copy_recursive(&root.join("other"), &root.join("soft"))?;

        assert_eq!(read_to_string(root.join("shared"))?, "shared\n");
        assert_eq!(read_to_string(root.join("hard"))?, "other\n");
        assert!(!root.join("soft").symlink_metadata()?.file_type().is_symlink());
        assert_eq!(root.join("shared").metadata()?.nlink(), 1);

        Ok(())
    }

    #[sealed_test]
    fn copy_directory_tree() -> anyhow::Result<()> {
        let root = current_dir()?;
        create_dir_all(root.join("src/nested"))?;
        write(root.join("src/top.txt"), "top\n")?;
        write(root.join("src/nested/.hidden"), "hidden\n")?;
        create_dir_all(root.join("dest"))?;
        write(root.join("dest/top.txt"), "stale\n")?;
        write(root.join("dest/local.txt"), "local\n")?;

        copy_recursive(&root.join("src"), &root.join("dest"))?;

        assert_eq!(read_to_string(root.join("dest/top.txt"))?, "top\n");
        assert_eq!(read_to_string(root.join("dest/nested/.hidden"))?, "hidden\n");
        assert!(!entry_exists(root.join("dest/local.txt")));

        Ok(())
    }

    #[sealed_test]
    fn copy_replaces_entries_of_other_kind() -> anyhow::Result<()> {
        let root = current_dir()?;
        create_dir_all(root.join("src/conf"))?;
        write(root.join("src/conf/a.yaml"), "a\n")?;
        write(root.join("src/notes"), "notes\n")?;
        create_dir_all(root.join("dest/notes/old"))?;
        write(root.join("dest/notes/old/file"), "old\n")?;
        write(root.join("dest/conf"), "was a file\n")?;

        copy_recursive(&root.join("src"), &root.join("dest"))?;

        assert_eq!(read_to_string(root.join("dest/notes"))?, "notes\n");
        assert_eq!(read_to_string(root.join("dest/conf/a.yaml"))?, "a\n");

        Ok(())
    }

    #[sealed_test]
    fn copy_replaces_linked_directories() -> anyhow::Result<()> {
        let root = current_dir()?;
        create_dir_all(root.join("shared/cfg/sub"))?;
        write(root.join("shared/cfg/a.txt"), "a\n")?;
        write(root.join("shared/cfg/sub/b.txt"), "b\n")?;
        create_dir_all(root.join("wt/outer"))?;
        soft_link(&root.join("shared/cfg"), &root.join("wt/cfg"))?;
        soft_link(&root.join("shared/cfg/sub"), &root.join("wt/outer/sub"))?;
        create_dir_all(root.join("outer"))?;
        soft_link(&root.join("shared/cfg/sub"), &root.join("outer/sub"))?;

        copy_recursive(&root.join("shared/cfg"), &root.join("wt/cfg"))?;
        assert!(is_real_dir(&root.join("wt/cfg")));
        assert_eq!(read_to_string(root.join("wt/cfg/a.txt"))?, "a\n");
        assert_eq!(read_to_string(root.join("wt/cfg/sub/b.txt"))?, "b\n");

        copy_recursive(&root.join("outer"), &root.join("wt/outer"))?;
        assert!(root.join("wt/outer/sub").symlink_metadata()?.file_type().is_symlink());

        // Shared content survives.
        assert_eq!(read_to_string(root.join("shared/cfg/a.txt"))?, "a\n");
        assert_eq!(read_to_string(root.join("shared/cfg/sub/b.txt"))?, "b\n");

        Ok(())
    }

    #[sealed_test]
    fn copy_refuses_to_overwrite_its_own_source() -> anyhow::Result<()> {
        let root = current_dir()?;
        create_dir_all(root.join("shared/cfg"))?;
        write(root.join("shared/cfg/a.txt"), "a\n")?;
        create_dir_all(root.join("wt"))?;
        soft_link(&root.join("shared/cfg"), &root.join("wt/cfg"))?;

        assert!(matches!(
            copy_recursive(&root.join("shared/cfg/a.txt"), &root.join("wt/cfg/a.txt")),
            Err(FsError::Aliased { .. })
        ));
        assert_eq!(read_to_string(root.join("shared/cfg/a.txt"))?, "a\n");

        Ok(())
    }

    #[sealed_test]
    fn remove_entry_only_touches_links_and_files() -> anyhow::Result<()> {
        let root = current_dir()?;
        create_dir_all(root.join("shared"))?;
        write(root.join("shared/file"), "keep\n")?;
        soft_link(&root.join("shared"), &root.join("link"))?;
        create_dir_all(root.join("real"))?;

        assert!(remove_entry(&root.join("link"))?);
        assert!(!remove_entry(&root.join("link"))?);
        assert_eq!(read_to_string(root.join("shared/file"))?, "keep\n");
        assert!(matches!(
            remove_entry(&root.join("real")),
            Err(FsError::RefuseDirectory { .. })
        ));

        Ok(())
    }
}
