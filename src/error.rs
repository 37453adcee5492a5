//! Machine-distinguishable error kinds shared by every component.
//!
//! Each module keeps its own error enum; `kind()` on those enums maps onto
//! [`ErrorKind`] so a [`crate::command::CommandResult`] can carry a stable
//! classification regardless of which engine produced the failure.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error classification surfaced through command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedCommand,
    UnknownRole,
    UnknownCommand,
    ArgCountMismatch,
    DuplicateHandler,
    MissingField,
    InvalidCapacity,
    DuplicateTarget,
    WorkspaceExists,
    NotFound,
    DirtyWorkspace,
    InvalidIdentifier,
    VcsError,
    AlreadyApplied,
    MergeConflict,
    RecordNotFound,
    GateFailure,
    InvalidTransition,
    InvalidArgument,
    Config,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedCommand => "malformed_command",
            Self::UnknownRole => "unknown_role",
            Self::UnknownCommand => "unknown_command",
            Self::ArgCountMismatch => "arg_count_mismatch",
            Self::DuplicateHandler => "duplicate_handler",
            Self::MissingField => "missing_field",
            Self::InvalidCapacity => "invalid_capacity",
            Self::DuplicateTarget => "duplicate_target",
            Self::WorkspaceExists => "workspace_exists",
            Self::NotFound => "not_found",
            Self::DirtyWorkspace => "dirty_workspace",
            Self::InvalidIdentifier => "invalid_identifier",
            Self::VcsError => "vcs_error",
            Self::AlreadyApplied => "already_applied",
            Self::MergeConflict => "merge_conflict",
            Self::RecordNotFound => "record_not_found",
            Self::GateFailure => "gate_failure",
            Self::InvalidTransition => "invalid_transition",
            Self::InvalidArgument => "invalid_argument",
            Self::Config => "config",
            Self::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ArgCountMismatch).unwrap();
        assert_eq!(json, "\"arg_count_mismatch\"");
        assert_eq!(ErrorKind::ArgCountMismatch.to_string(), "arg_count_mismatch");
    }

    #[test]
    fn test_error_kind_roundtrips_through_json() {
        let kind: ErrorKind = serde_json::from_str("\"merge_conflict\"").unwrap();
        assert_eq!(kind, ErrorKind::MergeConflict);
    }
}
