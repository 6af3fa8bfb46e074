// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use wrktr::{init_project, Git2Vcs, Linker, Manifest, ProjectContext, Reconciliation};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use std::{env::current_dir, fmt::Display, io, path::PathBuf, process::exit};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  wrktr <command> [options]",
    subcommand_help_heading = "Commands",
    disable_help_subcommand = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command {
            Some(Command::Init(opts)) => run_init(opts),
            Some(Command::Link(opts)) => run_link(opts),
            Some(Command::Check(opts)) => run_check(opts),
            Some(Command::Cleanup(opts)) => run_cleanup(opts),
            Some(Command::Help) | None => run_help(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Bare clone repository into new project with worktree "main".
    #[command(override_usage = "wrktr init <repo_url> <project_dir>")]
    Init(InitOptions),

    /// Link shared assets into worktree.
    #[command(override_usage = "wrktr link [options] [worktree_name]")]
    Link(TargetOptions),

    /// Report link state of shared assets in worktree.
    #[command(override_usage = "wrktr check [options] [worktree_name]")]
    Check(TargetOptions),

    /// Remove linked assets from worktree, and restore copied ones.
    #[command(override_usage = "wrktr cleanup [options] [worktree_name]")]
    Cleanup(TargetOptions),

    /// Show this help.
    #[command(alias = "commands")]
    Help,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// URL of remote repository to clone.
    #[arg(required = true, value_name = "repo_url")]
    pub url: String,

    /// Directory to lay out project in.
    #[arg(required = true, value_name = "project_dir")]
    pub project_dir: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct TargetOptions {
    /// Target worktree, required at project root, ignored inside a worktree.
    #[arg(value_name = "worktree_name")]
    pub worktree: Option<String>,

    /// Print report as JSON.
    #[arg(short, long)]
    pub json: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time()
        .with_writer(io::stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_init(opts: InitOptions) -> Result<()> {
    init_project(&Git2Vcs::new(), &opts.url, &opts.project_dir)?;
    Ok(())
}

fn run_link(opts: TargetOptions) -> Result<()> {
    let (context, manifest) = load_target(&opts)?;
    let result = Linker::new(&context, &manifest, Git2Vcs::new()).link();
    warn_failures(&result);
    emit(&result, opts.json)
}

fn run_check(opts: TargetOptions) -> Result<()> {
    let (context, manifest) = load_target(&opts)?;
    let report = Linker::new(&context, &manifest, Git2Vcs::new()).check();
    if !report.is_healthy() {
        warn!(
            "worktree {:?} is out of sync with manifest",
            context.worktree_dir().display()
        );
    }
    emit(&report, opts.json)
}

fn run_cleanup(opts: TargetOptions) -> Result<()> {
    let (context, manifest) = load_target(&opts)?;
    let result = Linker::new(&context, &manifest, Git2Vcs::new()).cleanup();
    warn_failures(&result);
    emit(&result, opts.json)
}

fn load_target(opts: &TargetOptions) -> Result<(ProjectContext, Manifest)> {
    let context = ProjectContext::resolve(current_dir()?, opts.worktree.as_deref())?;
    let manifest = context.load_manifest()?;
    if manifest.is_empty() {
        warn!("manifest declares no assets, nothing to do");
    }

    Ok((context, manifest))
}

fn warn_failures(result: &Reconciliation) {
    let failed = result.failures().count();
    if failed > 0 {
        warn!("{failed} asset(s) could not be reconciled");
    }
}

fn run_help() -> Result<()> {
    Cli::command().print_help()?;
    Ok(())
}

fn emit(output: &(impl Display + Serialize), json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(output)?);
    } else {
        print!("{output}");
    }

    Ok(())
}
