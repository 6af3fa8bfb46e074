// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shared asset management for Git worktrees.
//!
//! Every worktree of a project usually wants its own copy of gitignored files
//! like environment files, editor settings, or local agent configuration.
//! Keeping those in sync by hand drifts fast. Wrktr keeps them once, in the
//! `.SHARED` directory at the project root, and links or copies them into each
//! worktree according to the project's asset manifest.
//!
//! # Project Layout
//!
//! See [`path`] for the fixed layout of a project directory.
//!
//! # See Also
//!
//! 1. [`manifest`] for the manifest format.
//! 2. [`context`] for how the target worktree is found.
//! 3. [`link`] for reconciliation rules.

pub mod context;
pub mod link;
pub mod manifest;
pub mod path;
pub mod project;
pub mod report;
pub mod vcs;

pub use context::{ContextError, ProjectContext};
pub use link::Linker;
pub use manifest::{Asset, AssetKind, Manifest};
pub use project::init_project;
pub use report::{LinkStatus, Outcome, Reconciliation, Report};
pub use vcs::{Git2Vcs, VersionControl};
