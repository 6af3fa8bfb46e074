// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for the fixed layout of a wrktr
//! project. A project directory always looks like this:
//!
//! ```text
//! project-dir/
//! ├── .bare/        bare repository backing every worktree
//! ├── .git          pointer file containing "gitdir: ./.bare"
//! ├── .SHARED/      shared asset tree
//! ├── wrktr.conf    asset manifest
//! └── <worktree>/   one directory per worktree
//! ```

use std::path::{Component, Path, PathBuf};

/// Name of shared asset directory at top-level of project.
pub const SHARED_DIR_NAME: &str = ".SHARED";

/// Name of bare repository directory at top-level of project.
pub const BARE_DIR_NAME: &str = ".bare";

/// Name of version control linkage marker.
///
/// This is a directory in a normal repository, or a pointer file in a linked
/// worktree. Either representation counts.
pub const GIT_MARKER_NAME: &str = ".git";

/// Name of asset manifest file at top-level of project.
pub const MANIFEST_FILE_NAME: &str = "wrktr.conf";

/// Name of the first worktree created by `init`.
pub const DEFAULT_WORKTREE_NAME: &str = "main";

/// Absolute path to shared asset directory of project root.
pub fn shared_dir(project_root: impl AsRef<Path>) -> PathBuf {
    project_root.as_ref().join(SHARED_DIR_NAME)
}

/// Absolute path to bare repository of project root.
pub fn bare_dir(project_root: impl AsRef<Path>) -> PathBuf {
    project_root.as_ref().join(BARE_DIR_NAME)
}

/// Absolute path to asset manifest of project root.
pub fn manifest_path(project_root: impl AsRef<Path>) -> PathBuf {
    project_root.as_ref().join(MANIFEST_FILE_NAME)
}

/// Check that path is a plain relative path.
///
/// A plain relative path only contains normal components, i.e., no root,
/// no prefix, no `.` and no `..`. Empty paths are not plain.
pub fn is_plain_relative(path: impl AsRef<Path>) -> bool {
    let mut components = path.as_ref().components().peekable();
    if components.peek().is_none() {
        return false;
    }

    components.all(|component| matches!(component, Component::Normal(_)))
}

/// Check that something occupies the path without following symlinks.
///
/// Reports true for broken symlinks, because the directory entry itself is
/// still there.
pub fn entry_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().symlink_metadata().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case(".env", true; "dotfile")]
    #[test_case(".claude/settings.local.json", true; "nested file")]
    #[test_case("", false; "empty")]
    #[test_case("/etc/passwd", false; "absolute")]
    #[test_case("../escape", false; "parent dir")]
    #[test_case("a/../b", false; "inner parent dir")]
    #[test_case("./a", false; "current dir")]
    #[test]
    fn plain_relative_paths(path: &str, expect: bool) {
        assert_eq!(is_plain_relative(path), expect);
    }
}
