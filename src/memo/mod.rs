//! Status records ("memos").
//!
//! Workers announce finished work by dropping a markdown file into the
//! agent-sync directory. The file name follows `<date>_<role>_<topic>.md`
//! and the body carries field lines:
//!
//! ```text
//! - **Date**: 2026-01-10
//! - **Audience**: `@integrator`
//! - **Status**: `ready-to-consume`
//! - **Branch**: `feat/product_analyst/US-E01-010`
//! - **SHA**: `a3f4c2b`
//! - **Work Item**: US-E01-010
//! - **Token Usage**: 1200/5000
//! - **Deliverables**:
//!   - `work_items/E01/US-E01-010.md`
//! ```
//!
//! The scanner is read-only; the only write is [`rewrite_status`].

mod parse;
mod rewrite;
mod scan;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

pub(crate) use parse::{read_field, read_list, replace_field_value};
pub use rewrite::rewrite_status;
pub use scan::{scan, scan_by_status, MemoScanner};

/// Lifecycle of a status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoStatus {
    Draft,
    ReadyToConsume,
    ReadyToMerge,
    Blocked,
}

impl MemoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::ReadyToConsume => "ready-to-consume",
            Self::ReadyToMerge => "ready-to-merge",
            Self::Blocked => "blocked",
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            Self::Draft => Some(0),
            Self::ReadyToConsume => Some(1),
            Self::ReadyToMerge => Some(2),
            Self::Blocked => None,
        }
    }

    /// Forward-only, except that anything may enter or leave `blocked`.
    pub fn can_transition_to(&self, next: MemoStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to >= from,
            _ => true,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::ReadyToConsume | Self::ReadyToMerge)
    }
}

impl FromStr for MemoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "draft" => Ok(Self::Draft),
            "ready-to-consume" => Ok(Self::ReadyToConsume),
            "ready-to-merge" => Ok(Self::ReadyToMerge),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

impl fmt::Display for MemoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported token consumption, `used[/budget]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub used: u64,
    pub budget: Option<u64>,
}

/// One parsed status record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    pub path: PathBuf,
    pub filename: String,
    pub date: Option<NaiveDate>,
    pub role: Option<String>,
    pub audience: Vec<String>,
    /// Unreadable files and unknown status values read as `draft`.
    pub status: MemoStatus,
    /// Status text as written, when present.
    pub status_text: Option<String>,
    pub branch: Option<String>,
    pub sha: Option<String>,
    pub work_item: Option<String>,
    pub deliverables: Vec<String>,
    pub token_usage: Option<TokenUsage>,
}

impl StatusRecord {
    pub fn is_ready(&self) -> bool {
        self.status.is_ready()
    }

    pub fn has_reference(&self) -> bool {
        self.branch.is_some() || self.sha.is_some()
    }

    /// Short label for logs: the work item, else the file name.
    pub fn label(&self) -> &str {
        self.work_item.as_deref().unwrap_or(&self.filename)
    }

    /// Problems with this record; empty means well formed.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        match self.status_text.as_deref() {
            None => problems.push("missing status line".to_string()),
            Some(text) if text.parse::<MemoStatus>().is_err() => {
                problems.push(format!("unknown status '{}'", text))
            }
            Some(_) => {}
        }
        if self.is_ready() && !self.has_reference() {
            problems.push(format!("status {} requires a branch or sha", self.status));
        }
        if self.role.is_none() {
            problems.push("file name does not follow <date>_<role>_<topic>".to_string());
        }
        problems
    }
}

#[derive(Debug, Error)]
pub enum MemoError {
    #[error("status record not found: {}", .0.display())]
    RecordNotFound(PathBuf),
    #[error("no status line in {}", .0.display())]
    StatusLineMissing(PathBuf),
    #[error("invalid status transition {from} -> {to} in {}", .path.display())]
    InvalidTransition {
        path: PathBuf,
        from: MemoStatus,
        to: MemoStatus,
    },
    #[error("{}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl MemoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RecordNotFound(_) => ErrorKind::RecordNotFound,
            Self::StatusLineMissing(_) => ErrorKind::MissingField,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
