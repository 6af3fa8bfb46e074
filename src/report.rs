// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-asset status reporting.
//!
//! Inspection and reconciliation never fail as a whole because of a single
//! asset. Instead, every asset gets an entry in a report, and the report is
//! handed back to the caller for rendering. Plain text rendering goes through
//! [`Display`], and machine readable output through [`Serialize`].

use crate::manifest::{Asset, AssetKind};

use serde::Serialize;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

/// Current relationship between a worktree entry and its shared source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Nothing at destination.
    Missing,

    /// Destination has a link count above one.
    Hardlinked,

    /// Destination exists, but is the only reference to its content.
    NotHardlinked,

    /// Destination is a symbolic link.
    Softlinked,

    /// Destination exists, but is not a symbolic link.
    NotSoftlinked,

    /// Destination has the same content as shared source.
    CopyMatches,

    /// Destination content differs from shared source, or cannot be read.
    CopyMismatch,
}

impl LinkStatus {
    /// Check if status is the desired state for its asset kind.
    pub fn is_linked(self) -> bool {
        matches!(self, Self::Hardlinked | Self::Softlinked | Self::CopyMatches)
    }
}

impl Display for LinkStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Missing => "missing",
            Self::Hardlinked => "hardlinked",
            Self::NotHardlinked => "not hardlinked",
            Self::Softlinked => "softlinked",
            Self::NotSoftlinked => "not softlinked",
            Self::CopyMatches => "copy matches",
            Self::CopyMismatch => "copy differs",
        };
        fmt.write_str(label)
    }
}

/// Inspection result of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Inspected asset.
    pub asset: Asset,

    /// Observed status.
    pub status: LinkStatus,

    /// Why inspection came out negative, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Ordered inspection results for a whole manifest.
///
/// Entries keep manifest declaration order within each kind group.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    entries: Vec<StatusEntry>,
}

impl Report {
    /// Construct new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record status of an asset.
    pub fn push(&mut self, entry: StatusEntry) {
        self.entries.push(entry);
    }

    /// All recorded entries.
    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    /// Look up status of asset by relative path.
    pub fn status_of(&self, path: impl AsRef<Path>) -> Option<LinkStatus> {
        self.entries
            .iter()
            .find(|entry| entry.asset.path() == path.as_ref())
            .map(|entry| entry.status)
    }

    /// Check if every asset is in its desired state.
    pub fn is_healthy(&self) -> bool {
        self.entries.iter().all(|entry| entry.status.is_linked())
    }
}

impl Display for Report {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.entries.is_empty() {
            return writeln!(fmt, "no assets declared in manifest");
        }

        for kind in AssetKind::ALL {
            let mut entries = self
                .entries
                .iter()
                .filter(|entry| entry.asset.kind() == kind)
                .peekable();
            if entries.peek().is_none() {
                continue;
            }

            writeln!(fmt, "{kind} assets:")?;
            for entry in entries {
                let mark = if entry.status.is_linked() { '✓' } else { '✗' };
                write!(
                    fmt,
                    "  {mark} {}: {}",
                    entry.asset.path().display(),
                    entry.status
                )?;
                match &entry.detail {
                    Some(detail) => writeln!(fmt, " ({detail})")?,
                    None => writeln!(fmt)?,
                }
            }
        }

        Ok(())
    }
}

/// What reconciliation did to one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Link entry was created.
    Created,

    /// Destination already occupied, left alone.
    Skipped,

    /// Shared source was copied over destination.
    Copied,

    /// Link entry was removed.
    Removed,

    /// Copy was restored to committed content.
    Restored,

    /// Nothing at destination, nothing to do.
    Untouched,

    /// Mutation failed for this asset only.
    Failed { reason: String },
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Created => fmt.write_str("created"),
            Self::Skipped => fmt.write_str("skipped, already present"),
            Self::Copied => fmt.write_str("copied"),
            Self::Removed => fmt.write_str("removed"),
            Self::Restored => fmt.write_str("restored"),
            Self::Untouched => fmt.write_str("already absent"),
            Self::Failed { reason } => write!(fmt, "failed: {reason}"),
        }
    }
}

/// Reconciliation result of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionEntry {
    /// Reconciled asset.
    pub asset: Asset,

    /// What happened to it.
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Full result of `link` or `cleanup`.
///
/// Holds every mutation outcome, followed by a fresh inspection report of the
/// resulting worktree state.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    actions: Vec<ActionEntry>,
    report: Report,
}

impl Reconciliation {
    /// Construct new reconciliation result.
    pub fn new(actions: Vec<ActionEntry>, report: Report) -> Self {
        Self { actions, report }
    }

    /// Mutation outcomes in pass order.
    pub fn actions(&self) -> &[ActionEntry] {
        &self.actions
    }

    /// Look up outcome of asset by relative path.
    pub fn outcome_of(&self, path: impl AsRef<Path>) -> Option<&Outcome> {
        self.actions
            .iter()
            .find(|entry| entry.asset.path() == path.as_ref())
            .map(|entry| &entry.outcome)
    }

    /// Assets whose mutation failed.
    pub fn failures(&self) -> impl Iterator<Item = &ActionEntry> {
        self.actions
            .iter()
            .filter(|entry| matches!(entry.outcome, Outcome::Failed { .. }))
    }

    /// Inspection report taken after all mutations.
    pub fn report(&self) -> &Report {
        &self.report
    }
}

impl Display for Reconciliation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        for entry in &self.actions {
            writeln!(
                fmt,
                "{} {}: {}",
                entry.asset.kind(),
                entry.asset.path().display(),
                entry.outcome
            )?;
        }

        if !self.actions.is_empty() {
            writeln!(fmt)?;
        }

        write!(fmt, "{}", self.report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn sample() -> anyhow::Result<Report> {
        let manifest = Manifest::try_new(
            vec![".env".into()],
            vec![".claude/commands".into()],
            vec!["config.yaml".into()],
        )?;
        let statuses = [
            (LinkStatus::Hardlinked, None),
            (LinkStatus::Missing, None),
            (
                LinkStatus::CopyMismatch,
                Some("shared source missing".to_string()),
            ),
        ];

        let mut report = Report::new();
        for (asset, (status, detail)) in manifest.assets().zip(statuses) {
            report.push(StatusEntry {
                asset: asset.clone(),
                status,
                detail,
            });
        }

        Ok(report)
    }

    #[test]
    fn render_report_grouped_by_kind() -> anyhow::Result<()> {
        let result = sample()?.to_string();
        let expect = indoc! {r#"
            hardlink assets:
              ✓ .env: hardlinked
            softlink assets:
              ✗ .claude/commands: missing
            copy assets:
              ✗ config.yaml: copy differs (shared source missing)
        "#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn report_lookup_and_health() -> anyhow::Result<()> {
        let report = sample()?;
        assert_eq!(report.status_of(".env"), Some(LinkStatus::Hardlinked));
        assert_eq!(report.status_of("nope"), None);
        assert!(!report.is_healthy());
        assert!(Report::new().is_healthy());

        Ok(())
    }

    #[test]
    fn serialize_reconciliation() -> anyhow::Result<()> {
        let report = sample()?;
        let asset = report.entries()[0].asset.clone();
        let result = serde_json::to_value(Reconciliation::new(
            vec![ActionEntry {
                asset,
                outcome: Outcome::Failed {
                    reason: "cross-device link".into(),
                },
            }],
            Report::new(),
        ))?;
        let expect = serde_json::json!({
            "actions": [{
                "asset": { "path": ".env", "kind": "hardlink" },
                "outcome": "failed",
                "reason": "cross-device link",
            }],
            "report": { "entries": [] },
        });
        assert_eq!(result, expect);

        Ok(())
    }
}
