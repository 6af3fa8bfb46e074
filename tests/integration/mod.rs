// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::RepoFixture;

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{
    env::current_dir,
    fs::{create_dir_all, read_link, read_to_string, write},
    path::Path,
};
use wrktr::{
    context::{classify, Location},
    init_project, Git2Vcs, LinkStatus, Linker, Manifest, Outcome, ProjectContext, Report,
};

fn statuses(report: &Report) -> Vec<LinkStatus> {
    report.entries().iter().map(|entry| entry.status).collect()
}

fn shared_assets(root: &Path) -> Result<()> {
    create_dir_all(root.join(".SHARED/.claude/commands"))?;
    write(root.join(".SHARED/.env"), "TOKEN=abc\n")?;
    write(root.join(".SHARED/.claude/commands/review.md"), "review\n")?;
    write(root.join(".SHARED/config.yaml"), "port: 8080\n")?;
    write(
        root.join("wrktr.conf"),
        indoc! {r#"
            # shared assets
            hardlink_assets=(
                .env
            )
            softlink_assets=(".claude/commands")
            copy_assets=(config.yaml)
        "#},
    )?;

    Ok(())
}

#[sealed_test]
fn link_check_cleanup_round_trip() -> Result<()> {
    let root = current_dir()?.join("project");
    let worktree = RepoFixture::new(root.join("main"))?;
    worktree.stage_and_commit("config.yaml", "port: 80\n")?;
    shared_assets(&root)?;

    let context = ProjectContext::resolve(root.join("main"), None)?;
    let manifest = context.load_manifest()?;
    let linker = Linker::new(&context, &manifest, Git2Vcs::new());

    let linked = linker.link();
    assert_eq!(linked.failures().count(), 0);
    assert_eq!(
        statuses(linked.report()),
        vec![
            LinkStatus::Hardlinked,
            LinkStatus::Softlinked,
            LinkStatus::CopyMatches
        ]
    );
    assert_eq!(
        read_link(root.join("main/.claude/commands"))?,
        root.join(".SHARED/.claude/commands")
    );
    assert_eq!(
        read_to_string(root.join("main/config.yaml"))?,
        "port: 8080\n"
    );
    assert!(linked.report().is_healthy());

    // Check reports exactly what link ended with.
    assert_eq!(linker.check(), *linked.report());

    let cleaned = linker.cleanup();
    assert_eq!(cleaned.failures().count(), 0);
    assert_eq!(cleaned.outcome_of(".env"), Some(&Outcome::Removed));
    assert_eq!(
        cleaned.outcome_of(".claude/commands"),
        Some(&Outcome::Removed)
    );
    assert_eq!(cleaned.outcome_of("config.yaml"), Some(&Outcome::Restored));
    assert_eq!(
        statuses(cleaned.report()),
        vec![
            LinkStatus::Missing,
            LinkStatus::Missing,
            LinkStatus::CopyMismatch
        ]
    );
    assert_eq!(read_to_string(root.join("main/config.yaml"))?, "port: 80\n");
    assert_eq!(read_to_string(root.join(".SHARED/.env"))?, "TOKEN=abc\n");
    assert_eq!(
        read_to_string(root.join(".SHARED/.claude/commands/review.md"))?,
        "review\n"
    );

    Ok(())
}

#[sealed_test]
fn link_from_project_root_targets_named_worktree() -> Result<()> {
    let root = current_dir()?.join("project");
    let main = RepoFixture::new(root.join("main"))?;
    main.stage_and_commit("config.yaml", "port: 80\n")?;
    let feature = RepoFixture::new(root.join("feature"))?;
    feature.stage_and_commit("config.yaml", "port: 80\n")?;
    shared_assets(&root)?;

    let context = ProjectContext::resolve(&root, Some("feature"))?;
    let manifest = context.load_manifest()?;
    let result = Linker::new(&context, &manifest, Git2Vcs::new()).link();

    assert!(result.report().is_healthy());
    assert!(root.join("feature/.env").exists());
    assert!(!root.join("main/.env").exists());

    Ok(())
}

#[sealed_test]
fn cleanup_of_untracked_copy_fails_only_that_asset() -> Result<()> {
    let root = current_dir()?.join("project");
    let worktree = RepoFixture::new(root.join("main"))?;
    worktree.stage_and_commit("README.md", "hello\n")?;
    create_dir_all(root.join(".SHARED"))?;
    write(root.join(".SHARED/.env"), "TOKEN=abc\n")?;
    write(root.join(".SHARED/local.yaml"), "debug: true\n")?;

    let context = ProjectContext::resolve(root.join("main"), None)?;
    let manifest = Manifest::try_new(vec![".env".into()], vec![], vec!["local.yaml".into()])?;
    let linker = Linker::new(&context, &manifest, Git2Vcs::new());
    linker.link();

    let result = linker.cleanup();
    assert_eq!(result.outcome_of(".env"), Some(&Outcome::Removed));
    assert!(matches!(
        result.outcome_of("local.yaml"),
        Some(Outcome::Failed { .. })
    ));
    assert_eq!(result.failures().count(), 1);
    assert_eq!(
        read_to_string(root.join("main/local.yaml"))?,
        "debug: true\n"
    );

    Ok(())
}

#[sealed_test]
fn init_lays_out_project_from_local_remote() -> Result<()> {
    let upstream = RepoFixture::new(current_dir()?.join("upstream"))?;
    upstream.stage_and_commit("README.md", "hello\n")?;
    let root = current_dir()?.join("project");

    let url = upstream.path().to_string_lossy().into_owned();
    init_project(&Git2Vcs::new(), &url, &root)?;

    assert!(root.join(".bare").is_dir());
    assert!(root.join(".SHARED").is_dir());
    assert_eq!(read_to_string(root.join(".git"))?, "gitdir: ./.bare\n");
    assert_eq!(read_to_string(root.join("main/README.md"))?, "hello\n");
    assert!(read_to_string(root.join("wrktr.conf"))?
        .parse::<Manifest>()?
        .is_empty());
    assert_eq!(
        classify(root.join("main")),
        Location::Worktree {
            project_root: root.clone(),
            worktree_dir: root.join("main"),
        }
    );

    // Fresh worktree is ready for linking right away.
    let context = ProjectContext::resolve(root.join("main"), None)?;
    let report = Linker::new(&context, &context.load_manifest()?, Git2Vcs::new()).check();
    assert!(report.entries().is_empty());

    Ok(())
}
