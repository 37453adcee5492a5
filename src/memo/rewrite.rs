use std::fs;
use std::io;

use tracing::info;

use super::parse::{parse_fields, status_value_range};
use super::{MemoError, MemoStatus, StatusRecord};

/// Replace the status token of `record` on disk with `new_status`.
///
/// Only the status value changes; every other byte of the file is kept.
/// The transition is checked against the status currently in the file, not
/// the possibly stale one in `record`.
pub fn rewrite_status(record: &StatusRecord, new_status: MemoStatus) -> Result<(), MemoError> {
    let path = &record.path;
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => MemoError::RecordNotFound(path.clone()),
        _ => MemoError::Io {
            path: path.clone(),
            message: e.to_string(),
        },
    })?;

    let range =
        status_value_range(&content).ok_or_else(|| MemoError::StatusLineMissing(path.clone()))?;

    if let Some(current) = parse_fields(&content).status {
        if !current.can_transition_to(new_status) {
            return Err(MemoError::InvalidTransition {
                path: path.clone(),
                from: current,
                to: new_status,
            });
        }
    }

    let mut updated = String::with_capacity(content.len() + 8);
    updated.push_str(&content[..range.start]);
    updated.push_str(new_status.as_str());
    updated.push_str(&content[range.end..]);

    fs::write(path, updated).map_err(|e| MemoError::Io {
        path: path.clone(),
        message: e.to_string(),
    })?;
    info!(file = %record.filename, status = %new_status, "status rewritten");
    Ok(())
}
