// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Asset manifest layout.
//!
//! Every project comes with an __asset manifest__ stored in `wrktr.conf` at
//! the top-level of the project directory. The manifest declares which paths
//! in the shared directory should be hard linked, soft linked, or copied into
//! each worktree.
//!
//! # Manifest Syntax
//!
//! The manifest reads like a set of shell array declarations:
//!
//! ```text
//! # Comments start with a hash.
//! hardlink_assets=(
//!     ".env"
//!     ".claude/settings.local.json"
//! )
//! softlink_assets=(".claude/commands")
//! copy_assets=()
//! ```
//!
//! It is never evaluated as shell code. Instead, the file is parsed by
//! hand into a validated [`Manifest`]. Items can be bare words, single quoted
//! (taken literally), or double quoted (where `\"` and `\\` escape). Unknown
//! names are ignored with a warning. A missing asset list is treated as empty,
//! also with a warning.

use crate::path::is_plain_relative;

use serde::Serialize;
use std::{
    collections::HashSet,
    fmt::{Display, Formatter, Result as FmtResult},
    iter::Peekable,
    path::{Path, PathBuf},
    str::{Chars, FromStr},
};
use tracing::warn;

/// Initial manifest written by `wrktr init`.
pub const INITIAL_MANIFEST: &str = r#"# wrktr asset manifest.
#
# Every path below is relative to both the shared directory (.SHARED) and the
# top-level of each worktree.
#
# hardlink_assets  Hard linked into each worktree. Edits show up everywhere.
#                  Shared directory and worktrees must be on the same volume.
# softlink_assets  Symbolic links pointing into the shared directory. Works
#                  for directories too.
# copy_assets      Copied into each worktree on every `wrktr link`. Local
#                  edits are overwritten. `wrktr cleanup` restores them to
#                  their committed content.

hardlink_assets=(
)

softlink_assets=(
)

copy_assets=(
)
"#;

/// How an asset is placed into a worktree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Second directory entry for the same inode as the shared source.
    Hardlink,

    /// Symbolic link whose target is the shared source.
    Softlink,

    /// Independent copy of the shared source.
    Copy,
}

impl AssetKind {
    /// All asset kinds in pass order.
    pub const ALL: [AssetKind; 3] = [AssetKind::Hardlink, AssetKind::Softlink, AssetKind::Copy];

    /// Name of list in manifest that declares this kind.
    pub fn list_name(self) -> &'static str {
        match self {
            Self::Hardlink => "hardlink_assets",
            Self::Softlink => "softlink_assets",
            Self::Copy => "copy_assets",
        }
    }

    fn from_list_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.list_name() == name)
    }
}

impl Display for AssetKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Hardlink => fmt.write_str("hardlink"),
            Self::Softlink => fmt.write_str("softlink"),
            Self::Copy => fmt.write_str("copy"),
        }
    }
}

/// Single declared asset.
///
/// # Invariant
///
/// - Path is plain relative, i.e., resolves under both the shared directory
///   and the worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    path: PathBuf,
    kind: AssetKind,
}

impl Asset {
    /// Relative path of asset.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Kind of asset.
    pub fn kind(&self) -> AssetKind {
        self.kind
    }
}

/// Validated asset manifest.
///
/// Holds three ordered asset lists, one per [`AssetKind`]. Order only matters
/// for deterministic reporting.
///
/// # Invariant
///
/// - A path appears at most once across all three lists.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Manifest {
    hardlink: Vec<Asset>,
    softlink: Vec<Asset>,
    copy: Vec<Asset>,
}

impl Manifest {
    /// Construct new manifest from raw asset lists.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::InvalidPath`] if an asset path is not plain
    ///   relative.
    /// - Return [`ManifestError::DuplicateAsset`] if a path is declared more
    ///   than once.
    pub fn try_new(hardlink: Vec<String>, softlink: Vec<String>, copy: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut build = |kind: AssetKind, paths: Vec<String>| -> Result<Vec<Asset>> {
            paths
                .into_iter()
                .map(|path| {
                    if !is_plain_relative(&path) {
                        return Err(ManifestError::InvalidPath { kind, path });
                    }

                    let path = PathBuf::from(path);
                    if !seen.insert(path.clone()) {
                        return Err(ManifestError::DuplicateAsset { path });
                    }

                    Ok(Asset { path, kind })
                })
                .collect()
        };

        Ok(Self {
            hardlink: build(AssetKind::Hardlink, hardlink)?,
            softlink: build(AssetKind::Softlink, softlink)?,
            copy: build(AssetKind::Copy, copy)?,
        })
    }

    /// Parse manifest text, returning any warnings alongside it.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Syntax`] if text cannot be tokenized or does
    ///   not follow `name=(...)` structure.
    /// - Return [`ManifestError::NotAnArray`] if an asset list is assigned a
    ///   scalar.
    /// - Return [`ManifestError::DuplicateList`] if an asset list is defined
    ///   twice.
    /// - Return any error of [`Manifest::try_new`].
    pub fn parse(data: &str) -> Result<(Self, Vec<ManifestWarning>)> {
        let mut warnings = Vec::new();
        let mut lists: [Option<Vec<String>>; 3] = [None, None, None];

        for statement in Parser::new(tokenize(data)?).statements()? {
            let Some(kind) = AssetKind::from_list_name(&statement.name) else {
                warnings.push(ManifestWarning::UnknownName {
                    name: statement.name,
                    line: statement.line,
                });
                continue;
            };

            let Value::Array(items) = statement.value else {
                return Err(ManifestError::NotAnArray {
                    name: statement.name,
                    line: statement.line,
                });
            };

            let slot = &mut lists[kind as usize];
            if slot.is_some() {
                return Err(ManifestError::DuplicateList {
                    name: statement.name,
                    line: statement.line,
                });
            }
            *slot = Some(items);
        }

        let [hardlink, softlink, copy] = lists;
        let mut take = |kind: AssetKind, list: Option<Vec<String>>| {
            list.unwrap_or_else(|| {
                warnings.push(ManifestWarning::MissingList(kind));
                Vec::new()
            })
        };
        let hardlink = take(AssetKind::Hardlink, hardlink);
        let softlink = take(AssetKind::Softlink, softlink);
        let copy = take(AssetKind::Copy, copy);

        Ok((Self::try_new(hardlink, softlink, copy)?, warnings))
    }

    /// Assets of a given kind in declaration order.
    pub fn assets_of(&self, kind: AssetKind) -> &[Asset] {
        match kind {
            AssetKind::Hardlink => &self.hardlink,
            AssetKind::Softlink => &self.softlink,
            AssetKind::Copy => &self.copy,
        }
    }

    /// All assets grouped by kind in pass order.
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.hardlink
            .iter()
            .chain(self.softlink.iter())
            .chain(self.copy.iter())
    }

    /// Check if manifest declares no assets at all.
    pub fn is_empty(&self) -> bool {
        self.hardlink.is_empty() && self.softlink.is_empty() && self.copy.is_empty()
    }
}

impl FromStr for Manifest {
    type Err = ManifestError;

    /// Parse manifest text, logging warnings through [`tracing`].
    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let (manifest, warnings) = Self::parse(data)?;
        for warning in warnings {
            warn!("{warning}");
        }

        Ok(manifest)
    }
}

/// Non-fatal manifest problems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestWarning {
    /// One of the three asset lists was never defined.
    MissingList(AssetKind),

    /// Definition with a name wrktr does not know about.
    UnknownName { name: String, line: usize },
}

impl Display for ManifestWarning {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::MissingList(kind) => write!(
                fmt,
                "{} not defined in manifest, treating it as empty",
                kind.list_name()
            ),
            Self::UnknownName { name, line } => {
                write!(fmt, "line {line}: ignoring unknown manifest entry {name:?}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Assign,
    Open,
    Close,
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Spanned {
    token: Token,
    line: usize,
}

fn tokenize(data: &str) -> Result<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut chars = data.chars().peekable();
    let mut line = 1;

    while let Some(&ch) = chars.peek() {
        let token = match ch {
            '\n' => {
                chars.next();
                tokens.push(Spanned {
                    token: Token::Newline,
                    line,
                });
                line += 1;
                continue;
            }
            ch if ch.is_whitespace() => {
                chars.next();
                continue;
            }
            '#' => {
                while chars.next_if(|ch| *ch != '\n').is_some() {}
                continue;
            }
            '=' => {
                chars.next();
                Token::Assign
            }
            '(' => {
                chars.next();
                Token::Open
            }
            ')' => {
                chars.next();
                Token::Close
            }
            _ => {
                let start = line;
                let word = lex_word(&mut chars, &mut line)?;
                tokens.push(Spanned {
                    token: Token::Word(word),
                    line: start,
                });
                continue;
            }
        };

        tokens.push(Spanned { token, line });
    }

    Ok(tokens)
}

fn lex_word(chars: &mut Peekable<Chars<'_>>, line: &mut usize) -> Result<String> {
    let start = *line;
    let unterminated = |what: &str| ManifestError::Syntax {
        line: start,
        message: format!("unterminated {what}"),
    };
    let mut word = String::new();

    while let Some(&ch) = chars.peek() {
        match ch {
            ch if ch.is_whitespace() || matches!(ch, '=' | '(' | ')') => break,
            '\'' => {
                chars.next();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(ch) => {
                            if ch == '\n' {
                                *line += 1;
                            }
                            word.push(ch);
                        }
                        None => return Err(unterminated("single quote")),
                    }
                }
            }
            '"' => {
                chars.next();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\' | '$' | '`')) => word.push(escaped),
                            Some('\n') => *line += 1,
                            Some(other) => {
                                word.push('\\');
                                word.push(other);
                            }
                            None => return Err(unterminated("double quote")),
                        },
                        Some(ch) => {
                            if ch == '\n' {
                                *line += 1;
                            }
                            word.push(ch);
                        }
                        None => return Err(unterminated("double quote")),
                    }
                }
            }
            '\\' => {
                chars.next();
                match chars.next() {
                    Some('\n') => *line += 1,
                    Some(escaped) => word.push(escaped),
                    None => return Err(unterminated("escape sequence")),
                }
            }
            ch => {
                chars.next();
                word.push(ch);
            }
        }
    }

    Ok(word)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Scalar(String),
    Array(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Statement {
    name: String,
    value: Value,
    line: usize,
}

struct Parser {
    tokens: std::vec::IntoIter<Spanned>,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens: tokens.into_iter(),
        }
    }

    fn statements(mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        while let Some(Spanned { token, line }) = self.tokens.next() {
            match token {
                Token::Newline => continue,
                Token::Word(name) => statements.push(self.statement(name, line)?),
                other => {
                    return Err(ManifestError::Syntax {
                        line,
                        message: format!("expected a name, found {}", describe(&other)),
                    })
                }
            }
        }

        Ok(statements)
    }

    fn statement(&mut self, name: String, line: usize) -> Result<Statement> {
        match self.tokens.next() {
            Some(Spanned {
                token: Token::Assign,
                ..
            }) => {}
            next => {
                return Err(ManifestError::Syntax {
                    line,
                    message: format!(
                        "expected '=' after {name:?}, found {}",
                        next.map_or("end of file", |next| describe(&next.token))
                    ),
                })
            }
        }

        let value = match self.tokens.next() {
            Some(Spanned {
                token: Token::Open, ..
            }) => Value::Array(self.array(&name, line)?),
            Some(Spanned {
                token: Token::Word(word),
                ..
            }) => Value::Scalar(word),
            Some(Spanned {
                token: Token::Newline,
                ..
            })
            | None => Value::Scalar(String::new()),
            Some(Spanned { token, line }) => {
                return Err(ManifestError::Syntax {
                    line,
                    message: format!("unexpected {} in value of {name:?}", describe(&token)),
                })
            }
        };

        Ok(Statement { name, value, line })
    }

    fn array(&mut self, name: &str, start: usize) -> Result<Vec<String>> {
        let mut items = Vec::new();
        loop {
            match self.tokens.next() {
                Some(Spanned {
                    token: Token::Close,
                    ..
                }) => return Ok(items),
                Some(Spanned {
                    token: Token::Word(item),
                    ..
                }) => items.push(item),
                Some(Spanned {
                    token: Token::Newline,
                    ..
                }) => continue,
                Some(Spanned { token, line }) => {
                    return Err(ManifestError::Syntax {
                        line,
                        message: format!("unexpected {} inside {name:?}", describe(&token)),
                    })
                }
                None => {
                    return Err(ManifestError::Syntax {
                        line: start,
                        message: format!("unterminated array {name:?}"),
                    })
                }
            }
        }
    }
}

fn describe(token: &Token) -> &'static str {
    match token {
        Token::Word(_) => "a word",
        Token::Assign => "'='",
        Token::Open => "'('",
        Token::Close => "')'",
        Token::Newline => "end of line",
    }
}

/// Manifest error types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    /// Manifest text is malformed.
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// Asset list assigned a scalar value.
    #[error("line {line}: {name} must be an array, e.g., {name}=( ... )")]
    NotAnArray { name: String, line: usize },

    /// Asset list defined twice.
    #[error("line {line}: {name} is defined more than once")]
    DuplicateList { name: String, line: usize },

    /// Asset path does not stay inside shared directory and worktree.
    #[error("invalid {kind} asset path {path:?}, must be relative without '.' or '..'")]
    InvalidPath { kind: AssetKind, path: String },

    /// Same path declared more than once.
    #[error("asset {:?} is declared more than once", path.display())]
    DuplicateAsset { path: PathBuf },
}

/// Friendly result alias :3
type Result<T, E = ManifestError> = std::result::Result<T, E>;
