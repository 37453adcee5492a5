//! Apply-ready integration.
//!
//! Collects every `ready-to-consume` status record and brings the change it
//! references into a target branch, one record at a time:
//! - records carrying a SHA are cherry-picked
//! - records carrying only a branch are merged with `--no-ff`
//! - changes already reachable from the target are skipped
//! - a conflicting record is aborted and reported; the rest still run
//!
//! Afterwards gates are run and applied records are rewritten to
//! `ready-to-merge`.

mod engine;
mod gate;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::memo::{MemoError, StatusRecord};

pub use engine::IntegrationEngine;
pub use gate::{gates_from_config, CommandGate, DeliverablesGate, Gate, GateContext, GateOutcome};

/// How a record's change was brought in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMethod {
    Merged,
    CherryPicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoReference,
    AlreadyApplied,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoReference => "no_reference",
            Self::AlreadyApplied => "already_applied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedEntry {
    /// Memo file name.
    pub record: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item: Option<String>,
    /// The SHA or branch that was applied.
    pub reference: String,
    pub method: ApplyMethod,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deliverables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub record: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedEntry {
    pub record: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub kind: ErrorKind,
    pub error: String,
    /// Conflicting paths, for merge conflicts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl FailedEntry {
    fn new(record: &StatusRecord, reference: Option<&str>, kind: ErrorKind, error: String) -> Self {
        Self {
            record: record.filename.clone(),
            work_item: record.work_item.clone(),
            reference: reference.map(|r| r.to_string()),
            kind,
            error,
            files: Vec::new(),
        }
    }
}

/// Outcome of one apply-ready run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationResult {
    pub target_branch: String,
    pub dry_run: bool,
    /// Target tip after the run; the simulated tip for dry runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
    pub applied: Vec<AppliedEntry>,
    pub skipped: Vec<SkippedEntry>,
    pub failed: Vec<FailedEntry>,
    pub gates: Vec<GateOutcome>,
}

impl IntegrationResult {
    pub fn new(target_branch: &str, dry_run: bool) -> Self {
        Self {
            target_branch: target_branch.to_string(),
            dry_run,
            head: None,
            applied: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            gates: Vec::new(),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn gates_passed(&self) -> bool {
        self.gates.iter().all(|g| g.passed)
    }

    pub fn failed_gates(&self) -> Vec<&GateOutcome> {
        self.gates.iter().filter(|g| !g.passed).collect()
    }

    /// No failed records and no failed gates.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.gates_passed()
    }

    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}{}: {} applied, {} skipped, {} failed",
            if self.dry_run { "[dry run] " } else { "" },
            self.target_branch,
            self.applied_count(),
            self.skipped_count(),
            self.failed_count()
        );
        let failed_gates = self.failed_gates();
        if !failed_gates.is_empty() {
            let names: Vec<&str> = failed_gates.iter().map(|g| g.name.as_str()).collect();
            line.push_str(&format!(", gates failed: {}", names.join(", ")));
        }
        line
    }
}

/// Errors that stop a run before any record is attempted.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("failed to scan status records: {0}")]
    Scan(#[from] MemoError),
    #[error("target branch '{branch}': {message}")]
    TargetBranch { branch: String, message: String },
    #[error("integration worktree {} has uncommitted changes ({} file(s))", .path.display(), .files.len())]
    DirtyWorktree { path: PathBuf, files: Vec<String> },
    #[error("{0}")]
    Vcs(String),
}

impl IntegrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Scan(e) => e.kind(),
            Self::TargetBranch { .. } | Self::Vcs(_) => ErrorKind::VcsError,
            Self::DirtyWorktree { .. } => ErrorKind::DirtyWorkspace,
        }
    }
}
