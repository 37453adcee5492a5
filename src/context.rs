//! Execution context handed to every command handler.

use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::config::{resolve, Config};

/// Repository location, resolved configuration and the date used for
/// date-stamped names (integration branches, task card ids).
#[derive(Debug, Clone)]
pub struct Context {
    pub repo_root: PathBuf,
    pub config: Config,
    pub today: NaiveDate,
}

impl Context {
    pub fn new(repo_root: &Path, config: Config) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            config,
            today: Local::now().date_naive(),
        }
    }

    /// Pin the date, mainly for tests and replays.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Today's date as `YYYY-MM-DD`.
    pub fn date_stamp(&self) -> String {
        self.today.format("%Y-%m-%d").to_string()
    }

    pub fn memo_dir(&self) -> PathBuf {
        resolve(&self.repo_root, &self.config.agent_sync_dir)
    }

    pub fn tasks_dir(&self) -> PathBuf {
        resolve(&self.repo_root, &self.config.tasks_dir)
    }

    pub fn targets_file(&self) -> PathBuf {
        resolve(&self.repo_root, &self.config.targets_file)
    }

    pub fn journal_path(&self) -> Option<PathBuf> {
        self.config
            .journal_file
            .as_ref()
            .map(|p| resolve(&self.repo_root, p))
    }

    pub fn workspace_root(&self) -> PathBuf {
        self.config.workspace_root_for(&self.repo_root)
    }

    /// Default integration target for today.
    pub fn integration_target(&self) -> String {
        self.config.integration_target(&self.date_stamp())
    }
}
