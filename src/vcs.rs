// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control collaborator.
//!
//! Everything that needs Git goes through [`VersionControl`]. The link engine
//! itself only ever asks for one thing: restore a tracked path of a worktree
//! to its committed content. Project initialization asks for the rest.
//!
//! # Bare Repository Layout
//!
//! A project keeps its Git directory in `.bare` at the project root, with a
//! `.git` pointer file next to it containing `gitdir: ./.bare`. This way Git
//! commands work from the project root, while every branch is checked out as
//! its own worktree directory beside `.bare`.

use crate::path::{bare_dir, DEFAULT_WORKTREE_NAME, GIT_MARKER_NAME};

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    BranchType, Config, FetchOptions, RemoteCallbacks, Repository, WorktreeAddOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    fs::write,
    path::{Path, PathBuf},
    time,
};
use tracing::{debug, info, instrument, warn};

/// Refspec that makes a bare clone track every remote branch.
pub const FETCH_REFSPEC: &str = "+refs/heads/*:refs/remotes/origin/*";

/// Layer of indirection for version control access.
pub trait VersionControl {
    /// Set up bare repository and first worktree inside project directory.
    fn bootstrap(&self, url: &str, project_dir: &Path) -> Result<()>;

    /// Restore tracked path of worktree to its content at HEAD.
    fn restore_path(&self, worktree_dir: &Path, path: &Path) -> Result<()>;
}

/// Version control through libgit2.
#[derive(Debug, Default, Clone)]
pub struct Git2Vcs;

impl Git2Vcs {
    /// Construct new libgit2 collaborator.
    pub fn new() -> Self {
        Self
    }
}

impl VersionControl for Git2Vcs {
    /// Set up bare repository and first worktree inside project directory.
    ///
    /// 1. Bare clone `url` into `.bare`, showing progress.
    /// 2. Write `.git` pointer file.
    /// 3. Configure fetch refspec for all remote branches, and fetch.
    /// 4. Prune local branches that are neither HEAD nor ahead of remote.
    /// 5. Add worktree `main` on default branch, tracking `origin`.
    ///
    /// If credentials are required, the user is prompted for them. The
    /// progress bar is suspended for user input.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Git2`] if libgit2 operations fail.
    /// - Return [`VcsError::WritePointer`] if `.git` cannot be written.
    /// - Return [`VcsError::NoDefaultBranch`] if HEAD is not a branch.
    #[instrument(skip(self), level = "debug")]
    fn bootstrap(&self, url: &str, project_dir: &Path) -> Result<()> {
        info!("clone {url} into {:?}", bare_dir(project_dir).display());
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(url.to_string());
        bar.enable_steady_tick(time::Duration::from_millis(100));

        let prompter = IndicatifPrompter::new(bar.clone());
        let authenticator = GitAuthenticator::default().set_prompter(prompter);
        let config = Config::open_default()?;

        let repository = RepoBuilder::new()
            .bare(true)
            .fetch_options(fetch_options(&authenticator, &config, &bar))
            .clone(url, &bare_dir(project_dir))?;

        let pointer = project_dir.join(GIT_MARKER_NAME);
        write(&pointer, "gitdir: ./.bare\n").map_err(|err| VcsError::WritePointer {
            source: err,
            path: pointer.clone(),
        })?;

        repository
            .config()?
            .set_str("remote.origin.fetch", FETCH_REFSPEC)?;
        repository.find_remote("origin")?.fetch(
            &[] as &[&str],
            Some(&mut fetch_options(&authenticator, &config, &bar)),
            None,
        )?;
        bar.finish_and_clear();

        let default_branch = repository
            .head()?
            .shorthand()
            .map(str::to_owned)
            .ok_or(VcsError::NoDefaultBranch)?;
        prune_local_branches(&repository)?;

        let worktree_dir = project_dir.join(DEFAULT_WORKTREE_NAME);
        info!(
            "add worktree {:?} on branch {default_branch}",
            worktree_dir.display()
        );
        let reference = repository
            .find_branch(&default_branch, BranchType::Local)?
            .into_reference();
        let mut options = WorktreeAddOptions::new();
        options.reference(Some(&reference));
        repository.worktree(DEFAULT_WORKTREE_NAME, &worktree_dir, Some(&options))?;

        repository
            .find_branch(&default_branch, BranchType::Local)?
            .set_upstream(Some(&format!("origin/{default_branch}")))?;

        Ok(())
    }

    /// Restore tracked path of worktree to its content at HEAD.
    ///
    /// # Errors
    ///
    /// - Return [`VcsError::Untracked`] if path is not part of HEAD.
    /// - Return [`VcsError::Git2`] if libgit2 operations fail.
    #[instrument(skip(self), level = "debug")]
    fn restore_path(&self, worktree_dir: &Path, path: &Path) -> Result<()> {
        let repository = Repository::open(worktree_dir)?;
        let tree = repository.head()?.peel_to_tree()?;
        if tree.get_path(path).is_err() {
            return Err(VcsError::Untracked {
                path: path.to_path_buf(),
            });
        }

        debug!("checkout {:?} from HEAD", path.display());
        let mut checkout = CheckoutBuilder::new();
        checkout
            .force()
            .recreate_missing(true)
            .disable_pathspec_match(true)
            .path(path);
        repository.checkout_head(Some(&mut checkout))?;

        Ok(())
    }
}

fn fetch_options<'a>(
    authenticator: &'a GitAuthenticator,
    config: &'a Config,
    bar: &ProgressBar,
) -> FetchOptions<'a> {
    let bar = bar.clone();
    let mut throttle = time::Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(config));
    rc.transfer_progress(move |progress| {
        let stats = progress.to_owned();
        let bar_size = stats.total_objects() as u64;
        let bar_pos = stats.received_objects() as u64;
        if throttle.elapsed() > time::Duration::from_millis(10) {
            throttle = time::Instant::now();
            bar.set_length(bar_size);
            bar.set_position(bar_pos);
        }
        true
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    fo
}

// INVARIANT: Keep HEAD, local-only branches, and anything with unpushed commits.
fn prune_local_branches(repository: &Repository) -> Result<()> {
    let mut stale = Vec::new();
    for branch in repository.branches(Some(BranchType::Local))? {
        let (branch, _) = branch?;
        if branch.is_head() {
            continue;
        }

        let Some(name) = branch.name()?.map(str::to_owned) else {
            continue;
        };
        let Some(local) = branch.get().target() else {
            continue;
        };
        let Ok(remote) = repository.find_branch(&format!("origin/{name}"), BranchType::Remote)
        else {
            debug!("keep local-only branch {name}");
            continue;
        };
        let Some(remote) = remote.get().target() else {
            continue;
        };

        let (ahead, _) = repository.graph_ahead_behind(local, remote)?;
        if ahead > 0 {
            debug!("keep branch {name}, {ahead} commit(s) ahead of origin");
            continue;
        }

        stale.push(name);
    }

    for name in stale {
        debug!("prune local branch {name}");
        if let Err(err) = repository
            .find_branch(&name, BranchType::Local)
            .and_then(|mut branch| branch.delete())
        {
            warn!("failed to prune local branch {name}: {err}");
        }
    }

    Ok(())
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
struct IndicatifPrompter {
    bar: ProgressBar,
}

impl IndicatifPrompter {
    fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| -> Option<(String, String)> {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar.suspend(|| -> Option<String> {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.bar.suspend(|| -> Option<String> {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Path is not part of HEAD, so there is nothing to restore.
    #[error("{:?} is not tracked at HEAD, nothing to restore", path.display())]
    Untracked { path: PathBuf },

    /// HEAD of fresh clone does not name a branch.
    #[error("cannot determine default branch of cloned repository")]
    NoDefaultBranch,

    /// Gitdir pointer file cannot be written.
    #[error("failed to write gitdir pointer {:?}", path.display())]
    WritePointer {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;
