// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project context resolution.
//!
//! Every worktree-scoped command first figures out where it was invoked from.
//! The caller is either at the top-level of a project (the project root), or
//! inside one of its worktrees. Everything else is refused before any file is
//! touched.
//!
//! # Classification Rules
//!
//! 1. A directory containing `.SHARED` is a project root.
//! 2. A directory containing a `.git` marker (file or directory) whose parent
//!    contains `.SHARED` is a worktree.
//! 3. Anything else is unclassified.
//!
//! Rule 1 is checked before rule 2. The project root of an initialized project
//! also carries a `.git` pointer file, so it would otherwise look like a
//! worktree of its own parent.

use crate::{
    manifest::{Asset, Manifest, ManifestError},
    path::{entry_exists, manifest_path, shared_dir, GIT_MARKER_NAME},
};

use std::{
    fs::read_to_string,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, instrument};

/// Where a directory sits in relation to a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Directory is the project root itself.
    ProjectRoot { project_root: PathBuf },

    /// Directory is a worktree of a project.
    Worktree {
        project_root: PathBuf,
        worktree_dir: PathBuf,
    },

    /// Directory has nothing to do with any project.
    Unclassified,
}

/// Classify a directory according to project layout.
pub fn classify(dir: impl AsRef<Path>) -> Location {
    let dir = dir.as_ref();
    if shared_dir(dir).is_dir() {
        return Location::ProjectRoot {
            project_root: dir.to_path_buf(),
        };
    }

    if entry_exists(dir.join(GIT_MARKER_NAME)) {
        if let Some(parent) = dir.parent().filter(|parent| shared_dir(parent).is_dir()) {
            return Location::Worktree {
                project_root: parent.to_path_buf(),
                worktree_dir: dir.to_path_buf(),
            };
        }
    }

    Location::Unclassified
}

/// Resolved paths for one invocation.
///
/// # Invariant
///
/// - Shared directory exists and is a directory.
/// - Worktree directory exists and is a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    project_root: PathBuf,
    shared_dir: PathBuf,
    worktree_dir: PathBuf,
}

impl ProjectContext {
    /// Resolve project context from current working directory.
    ///
    /// At the project root the worktree must be named explicitly. Inside a
    /// worktree the name is ignored, and the current directory is used.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::NotInProject`] if `cwd` is unclassified.
    /// - Return [`ContextError::WorktreeNameRequired`] if `cwd` is the project
    ///   root, but no worktree was named.
    /// - Return [`ContextError::InvalidWorktreeName`] if name is not a single
    ///   plain path component.
    /// - Return any error of [`ProjectContext::ensure_worktree`].
    #[instrument(skip(cwd), level = "debug")]
    pub fn resolve(cwd: impl AsRef<Path>, worktree_name: Option<&str>) -> Result<Self> {
        let cwd = cwd.as_ref();
        let (project_root, worktree_dir) = match classify(cwd) {
            Location::ProjectRoot { project_root } => {
                let name = worktree_name.ok_or_else(|| ContextError::WorktreeNameRequired {
                    project_root: project_root.clone(),
                })?;
                if !is_single_component(name) {
                    return Err(ContextError::InvalidWorktreeName { name: name.into() });
                }
                let worktree_dir = project_root.join(name);
                (project_root, worktree_dir)
            }
            Location::Worktree {
                project_root,
                worktree_dir,
            } => {
                if let Some(name) = worktree_name {
                    debug!("inside worktree, ignoring worktree name {name:?}");
                }
                (project_root, worktree_dir)
            }
            Location::Unclassified => {
                return Err(ContextError::NotInProject {
                    path: cwd.to_path_buf(),
                })
            }
        };

        let context = Self {
            shared_dir: shared_dir(&project_root),
            project_root,
            worktree_dir,
        };
        context.ensure_worktree()?;
        debug!("resolved context {context:?}");

        Ok(context)
    }

    /// Verify that shared directory and target worktree are still there.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::SharedDirMissing`] if shared directory is gone.
    /// - Return [`ContextError::WorktreeNotFound`] if worktree directory does
    ///   not exist, or is not a directory.
    pub fn ensure_worktree(&self) -> Result<()> {
        if !self.shared_dir.is_dir() {
            return Err(ContextError::SharedDirMissing {
                path: self.shared_dir.clone(),
            });
        }

        if !self.worktree_dir.is_dir() {
            return Err(ContextError::WorktreeNotFound {
                path: self.worktree_dir.clone(),
            });
        }

        Ok(())
    }

    /// Load asset manifest of project.
    ///
    /// Manifest warnings are logged, not returned.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::ManifestMissing`] if `wrktr.conf` does not
    ///   exist.
    /// - Return [`ContextError::ReadManifest`] if `wrktr.conf` cannot be read.
    /// - Return [`ContextError::Manifest`] if `wrktr.conf` is invalid.
    pub fn load_manifest(&self) -> Result<Manifest> {
        let path = manifest_path(&self.project_root);
        let data = read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ContextError::ManifestMissing { path: path.clone() },
            _ => ContextError::ReadManifest {
                source: err,
                path: path.clone(),
            },
        })?;

        data.parse::<Manifest>()
            .map_err(|err| ContextError::Manifest { source: err, path })
    }

    /// Absolute path to project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Absolute path to shared asset directory.
    pub fn shared_dir(&self) -> &Path {
        &self.shared_dir
    }

    /// Absolute path to target worktree.
    pub fn worktree_dir(&self) -> &Path {
        &self.worktree_dir
    }

    /// Where asset content lives in the shared directory.
    pub fn source(&self, asset: &Asset) -> PathBuf {
        self.shared_dir.join(asset.path())
    }

    /// Where asset is placed in the target worktree.
    pub fn destination(&self, asset: &Asset) -> PathBuf {
        self.worktree_dir.join(asset.path())
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Context resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Not inside a project root or one of its worktrees.
    #[error(
        "{:?} is neither a project root (no .SHARED directory) nor a worktree of one",
        path.display()
    )]
    NotInProject { path: PathBuf },

    /// Invoked at project root without naming a worktree.
    #[error("at project root {:?}, name a target worktree", project_root.display())]
    WorktreeNameRequired { project_root: PathBuf },

    /// Worktree name would leave the project root.
    #[error("invalid worktree name {name:?}")]
    InvalidWorktreeName { name: String },

    /// Shared directory disappeared.
    #[error("shared directory {:?} not found", path.display())]
    SharedDirMissing { path: PathBuf },

    /// Target worktree is not there.
    #[error("target worktree {:?} not found", path.display())]
    WorktreeNotFound { path: PathBuf },

    /// Asset manifest is not there.
    #[error("asset manifest {:?} not found", path.display())]
    ManifestMissing { path: PathBuf },

    /// Asset manifest cannot be read.
    #[error("failed to read asset manifest {:?}", path.display())]
    ReadManifest {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Asset manifest is invalid.
    #[error("invalid asset manifest {:?}", path.display())]
    Manifest {
        #[source]
        source: ManifestError,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = ContextError> = std::result::Result<T, E>;
