//! Per-task workspaces.
//!
//! Every (role, task) pair gets:
//! - A branch: `<prefix>/<role>/<task_id>` (prefix defaults to `feat`)
//! - A worktree directory: `<workspace_root>/<role>/<task_id>`
//!
//! Git's own worktree registry is the source of truth; nothing is cached.

mod create;
mod list;
mod remove;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceState {
    Active,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub role: String,
    pub task_id: String,
    pub branch: String,
    pub path: PathBuf,
    pub state: WorkspaceState,
    /// Commit checked out in the worktree, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error("invalid identifier '{0}' (allowed: letters, digits, '.', '_', '-')")]
    InvalidIdentifier(String),
    #[error("workspace {role}/{task_id} already exists: {reason}")]
    WorkspaceExists {
        role: String,
        task_id: String,
        reason: String,
    },
    #[error("no active workspace for {role}/{task_id}")]
    NotFound { role: String, task_id: String },
    #[error("workspace {role}/{task_id} has uncommitted changes ({} file(s))", .files.len())]
    DirtyWorkspace {
        role: String,
        task_id: String,
        files: Vec<String>,
    },
    #[error("{0}")]
    Vcs(String),
}

impl WorkspaceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
            Self::WorkspaceExists { .. } => ErrorKind::WorkspaceExists,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DirtyWorkspace { .. } => ErrorKind::DirtyWorkspace,
            Self::Vcs(_) => ErrorKind::VcsError,
        }
    }
}

/// Creates, lists and removes workspaces for one repository.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    repo_root: PathBuf,
    root: PathBuf,
    branch_prefix: String,
}

impl WorkspaceManager {
    /// A relative `root` is taken relative to `repo_root`.
    pub fn new(repo_root: &Path, root: &Path, branch_prefix: &str) -> Self {
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            repo_root.join(root)
        };
        Self {
            repo_root: repo_root.to_path_buf(),
            root,
            branch_prefix: branch_prefix.trim_matches('/').to_string(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn branch_name(&self, role: &str, task_id: &str) -> String {
        format!("{}/{}/{}", self.branch_prefix, role, task_id)
    }

    pub fn workspace_path(&self, role: &str, task_id: &str) -> PathBuf {
        self.root.join(role).join(task_id)
    }

    /// Split `<prefix>/<role>/<task>` back into (role, task).
    pub fn parse_branch<'a>(&self, branch: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = branch.strip_prefix(&self.branch_prefix)?.strip_prefix('/')?;
        let (role, task) = rest.split_once('/')?;
        if validate_identifier(role).is_err() || validate_identifier(task).is_err() {
            return None;
        }
        Some((role, task))
    }
}

/// Role and task ids end up in branch names and paths, so they must be
/// valid as a single ref component and a single path component.
pub fn validate_identifier(id: &str) -> Result<(), WorkspaceError> {
    let valid = !id.is_empty()
        && !id.starts_with('-')
        && !id.starts_with('.')
        && !id.ends_with('.')
        && !id.contains("..")
        && !id.ends_with(".lock")
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(WorkspaceError::InvalidIdentifier(id.to_string()))
    }
}
