// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Project initialization.
//!
//! Lays out a fresh project directory around a bare clone. Git work is left
//! to the [`VersionControl`] collaborator; this module only owns the parts
//! that are not Git: the shared directory and the initial manifest.

use crate::{
    manifest::INITIAL_MANIFEST,
    path::{bare_dir, manifest_path, shared_dir},
    vcs::{VcsError, VersionControl},
};

use mkdirp::mkdirp;
use std::{
    fs::write,
    path::{Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Initialize new project at `project_dir` from remote `url`.
///
/// Refuses to touch a directory that already holds a bare repository. An
/// existing manifest is kept as is.
///
/// # Errors
///
/// - Return [`ProjectError::AlreadyInitialized`] if `.bare` already exists.
/// - Return [`ProjectError::CreateDir`] if project or shared directory cannot
///   be created.
/// - Return [`ProjectError::Vcs`] if version control setup fails.
/// - Return [`ProjectError::WriteManifest`] if manifest cannot be written.
#[instrument(skip(vcs, project_dir), level = "debug")]
pub fn init_project(
    vcs: &impl VersionControl,
    url: &str,
    project_dir: impl AsRef<Path>,
) -> Result<()> {
    let project_dir = project_dir.as_ref();
    let bare = bare_dir(project_dir);
    if bare.exists() {
        return Err(ProjectError::AlreadyInitialized { path: bare });
    }

    create_dir(project_dir)?;
    vcs.bootstrap(url, project_dir)?;
    create_dir(&shared_dir(project_dir))?;

    let manifest = manifest_path(project_dir);
    if manifest.exists() {
        warn!("keep existing manifest {:?}", manifest.display());
    } else {
        write(&manifest, INITIAL_MANIFEST).map_err(|err| ProjectError::WriteManifest {
            source: err,
            path: manifest.clone(),
        })?;
    }

    info!("initialized project at {:?}", project_dir.display());

    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    mkdirp(path).map_err(|err| ProjectError::CreateDir {
        source: err,
        path: path.to_path_buf(),
    })?;

    Ok(())
}

/// Project initialization error types.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    /// Project directory already has a bare repository.
    #[error("project already initialized, {:?} exists", path.display())]
    AlreadyInitialized { path: PathBuf },

    /// Directory cannot be created.
    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Manifest cannot be written.
    #[error("failed to write manifest {:?}", path.display())]
    WriteManifest {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Version control setup fails.
    #[error(transparent)]
    Vcs(#[from] VcsError),
}

/// Friendly result alias :3
type Result<T, E = ProjectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::{classify, Location},
        manifest::Manifest,
        vcs::Result as VcsResult,
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::RefCell, env::current_dir, fs::read_to_string};

    /// Lays out what a bare clone would, without any network.
    #[derive(Debug, Default)]
    struct FakeVcs {
        urls: RefCell<Vec<String>>,
    }

    impl VersionControl for FakeVcs {
        fn bootstrap(&self, url: &str, project_dir: &Path) -> VcsResult<()> {
            self.urls.borrow_mut().push(url.into());
            for dir in [".bare", "main/.git"] {
                std::fs::create_dir_all(project_dir.join(dir))
                    .map_err(|err| VcsError::Git2(git2::Error::from_str(&err.to_string())))?;
            }
            write(project_dir.join(".git"), "gitdir: ./.bare\n")
                .map_err(|err| VcsError::Git2(git2::Error::from_str(&err.to_string())))
        }

        fn restore_path(&self, _worktree_dir: &Path, _path: &Path) -> VcsResult<()> {
            Ok(())
        }
    }

    #[sealed_test]
    fn init_lays_out_project() -> anyhow::Result<()> {
        let root = current_dir()?.join("project");
        let vcs = FakeVcs::default();
        init_project(&vcs, "https://example.com/repo.git", &root)?;

        assert_eq!(*vcs.urls.borrow(), vec!["https://example.com/repo.git"]);
        assert!(root.join(".SHARED").is_dir());
        assert_eq!(read_to_string(root.join("wrktr.conf"))?, INITIAL_MANIFEST);
        assert!(read_to_string(root.join("wrktr.conf"))?
            .parse::<Manifest>()?
            .is_empty());
        assert_eq!(
            classify(&root),
            Location::ProjectRoot {
                project_root: root.clone()
            }
        );
        assert_eq!(
            classify(root.join("main")),
            Location::Worktree {
                project_root: root.clone(),
                worktree_dir: root.join("main"),
            }
        );

        Ok(())
    }

    #[sealed_test]
    fn init_refuses_existing_project() -> anyhow::Result<()> {
        let root = current_dir()?.join("project");
        std::fs::create_dir_all(root.join(".bare"))?;
        let vcs = FakeVcs::default();

        assert!(matches!(
            init_project(&vcs, "https://example.com/repo.git", &root),
            Err(ProjectError::AlreadyInitialized { .. })
        ));
        assert!(vcs.urls.borrow().is_empty());

        Ok(())
    }

    #[sealed_test]
    fn init_keeps_existing_manifest() -> anyhow::Result<()> {
        let root = current_dir()?.join("project");
        std::fs::create_dir_all(&root)?;
        write(root.join("wrktr.conf"), "hardlink_assets=(.env)\n")?;

        init_project(&FakeVcs::default(), "https://example.com/repo.git", &root)?;
        assert_eq!(
            read_to_string(root.join("wrktr.conf"))?,
            "hardlink_assets=(.env)\n"
        );

        Ok(())
    }
}
