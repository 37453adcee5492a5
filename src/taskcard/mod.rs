//! Task cards generated from allocations.
//!
//! One card per (role, target). Cards are persisted as markdown field files
//! named `<id>.md`, next to a JSON index per iteration:
//! `<date>_<iteration>_INDEX.json`.

mod generate;
mod store;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

pub use generate::{card_id, generate, generate_after};
pub use store::{
    archive_cards, index_path, latest_index, load_card, load_cards, set_card_status, write_cards,
};

/// Archived iterations live under `<tasks_dir>/_archive/<iteration>/<stamp>/`.
pub const ARCHIVE_DIR: &str = "_archive";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    ReadyToStart,
    InProgress,
    ReadyToConsume,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadyToStart => "ready-to-start",
            Self::InProgress => "in-progress",
            Self::ReadyToConsume => "ready-to-consume",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            Self::ReadyToStart => Some(0),
            Self::InProgress => Some(1),
            Self::ReadyToConsume => Some(2),
            Self::Completed => Some(3),
            Self::Blocked => None,
        }
    }

    /// Forward-only, except that anything may enter or leave `blocked`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to >= from,
            _ => true,
        }
    }

    pub fn all() -> [TaskStatus; 5] {
        [
            Self::ReadyToStart,
            Self::InProgress,
            Self::ReadyToConsume,
            Self::Completed,
            Self::Blocked,
        ]
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "ready-to-start" => Ok(Self::ReadyToStart),
            "in-progress" => Ok(Self::InProgress),
            "ready-to-consume" => Ok(Self::ReadyToConsume),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("unknown task status '{}'", other)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCard {
    /// `<date>-<ROLE>-<NN>`.
    pub id: String,
    pub role: String,
    pub status: TaskStatus,
    pub iteration: String,
    /// Target id this card covers.
    pub work_item_ref: String,
    /// Allocation group (worker instance) the target landed in.
    pub instance: usize,
    /// Card ids this card waits on, sorted.
    pub dependencies: Vec<String>,
    pub deliverables: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub role: String,
    pub status: TaskStatus,
    pub work_item_ref: String,
}

/// Summary of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskIndex {
    pub iteration: String,
    pub date: NaiveDate,
    /// Sorted by role, then sequence.
    pub entries: Vec<IndexEntry>,
}

impl TaskIndex {
    pub fn ids_for_role(&self, role: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.role == role)
            .map(|e| e.id.as_str())
            .collect()
    }
}

/// Outcome of archiving one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveSummary {
    pub iteration: String,
    pub archive_dir: PathBuf,
    /// Index file that drove the archive.
    pub index: PathBuf,
    /// (source, destination) pairs, index first.
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Cards the index lists that were not on disk.
    pub skipped: Vec<PathBuf>,
    pub dry_run: bool,
}

#[derive(Debug, Error)]
pub enum TaskCardError {
    #[error("task card not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("no task index for iteration '{iteration}' in {}", .dir.display())]
    NoIndex { dir: PathBuf, iteration: String },
    #[error("task card {} is missing field '{field}'", .path.display())]
    MissingField { path: PathBuf, field: &'static str },
    #[error("task card {} has invalid status '{value}'", .path.display())]
    InvalidStatus { path: PathBuf, value: String },
    #[error("task card {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    #[error("{}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl TaskCardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::NoIndex { .. } => ErrorKind::NotFound,
            Self::MissingField { .. } | Self::InvalidStatus { .. } => ErrorKind::MissingField,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
