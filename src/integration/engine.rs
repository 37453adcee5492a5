use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{
    AppliedEntry, ApplyMethod, FailedEntry, Gate, GateContext, IntegrationError,
    IntegrationResult, SkipReason, SkippedEntry,
};
use crate::config::Config;
use crate::error::ErrorKind;
use crate::git::{self, ApplyOutcome};
use crate::memo::{rewrite_status, scan_by_status, MemoStatus, StatusRecord};

/// Worktree the records are applied in.
struct IntegrationWorktree {
    path: PathBuf,
    /// Created by this run and removed at the end.
    owned: bool,
}

/// Applies ready status records to target branches of one repository.
///
/// Callers must not move the target branch while a run is in progress.
#[derive(Debug, Clone)]
pub struct IntegrationEngine {
    repo_root: PathBuf,
    trunk: String,
    workspace_root: PathBuf,
}

impl IntegrationEngine {
    pub fn new(repo_root: &Path, trunk: &str) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            trunk: trunk.to_string(),
            workspace_root: Config::default().workspace_root_for(repo_root),
        }
    }

    /// Integration worktrees live under `<root>/.integration/`.
    pub fn with_workspace_root(mut self, root: &Path) -> Self {
        self.workspace_root = root.to_path_buf();
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn trunk(&self) -> &str {
        &self.trunk
    }

    /// Scan `dir` for `ready-to-consume` records and apply them to
    /// `target_branch`.
    pub fn apply_ready(
        &self,
        dir: &Path,
        target_branch: &str,
        gates: &[Box<dyn Gate>],
        dry_run: bool,
    ) -> Result<IntegrationResult, IntegrationError> {
        let records = scan_by_status(dir, MemoStatus::ReadyToConsume)?;
        self.apply_records(&records, target_branch, gates, dry_run)
    }

    /// Apply already-scanned records, in the order given.
    pub fn apply_records(
        &self,
        records: &[StatusRecord],
        target_branch: &str,
        gates: &[Box<dyn Gate>],
        dry_run: bool,
    ) -> Result<IntegrationResult, IntegrationError> {
        let repo = self.repo_root.as_path();
        git::ensure_head(repo).map_err(IntegrationError::Vcs)?;

        let target_exists = git::branch_exists(repo, target_branch).map_err(IntegrationError::Vcs)?;
        let start = if target_exists {
            target_branch
        } else {
            self.trunk.as_str()
        };
        if git::resolve_commit(repo, start)
            .map_err(IntegrationError::Vcs)?
            .is_none()
        {
            return Err(IntegrationError::TargetBranch {
                branch: target_branch.to_string(),
                message: format!("trunk branch '{}' not found", self.trunk),
            });
        }
        if !target_exists && !dry_run {
            git::create_branch(repo, target_branch, &self.trunk).map_err(|message| {
                IntegrationError::TargetBranch {
                    branch: target_branch.to_string(),
                    message,
                }
            })?;
            info!(target = target_branch, trunk = %self.trunk, "created target branch");
        }

        let worktree = self.open_worktree(target_branch, start, dry_run)?;
        debug!(path = %worktree.path.display(), dry_run, "integration worktree ready");

        let mut result = IntegrationResult::new(target_branch, dry_run);
        for record in records {
            self.apply_one(&worktree.path, record, &mut result);
        }
        result.head = git::resolve_commit(&worktree.path, "HEAD").unwrap_or(None);

        let ctx = GateContext {
            worktree: &worktree.path,
            target_branch,
            applied: &result.applied,
        };
        let mut outcomes = Vec::with_capacity(gates.len());
        for gate in gates {
            let outcome = gate.run(&ctx);
            if !outcome.passed {
                warn!(gate = %outcome.name, detail = %outcome.detail, "gate failed");
            }
            outcomes.push(outcome);
        }
        result.gates = outcomes;

        self.close_worktree(worktree);

        if !dry_run {
            mark_applied(records, &mut result);
        }

        info!("{}", result.summary());
        Ok(result)
    }

    fn apply_one(&self, worktree: &Path, record: &StatusRecord, result: &mut IntegrationResult) {
        let pre = match git::resolve_commit(worktree, "HEAD") {
            Ok(Some(sha)) => sha,
            Ok(None) => {
                result.failed.push(FailedEntry::new(
                    record,
                    None,
                    ErrorKind::VcsError,
                    "integration worktree has no HEAD".to_string(),
                ));
                return;
            }
            Err(e) => {
                result
                    .failed
                    .push(FailedEntry::new(record, None, ErrorKind::VcsError, e));
                return;
            }
        };

        let (reference, method) = match (record.sha.as_deref(), record.branch.as_deref()) {
            (Some(sha), _) => (sha, ApplyMethod::CherryPicked),
            (None, Some(branch)) => (branch, ApplyMethod::Merged),
            (None, None) => {
                result.skipped.push(SkippedEntry {
                    record: record.filename.clone(),
                    work_item: record.work_item.clone(),
                    reference: None,
                    reason: SkipReason::NoReference,
                });
                return;
            }
        };

        let commit = match git::resolve_commit(worktree, reference) {
            Ok(Some(commit)) => commit,
            Ok(None) => {
                let what = match method {
                    ApplyMethod::CherryPicked => "commit",
                    ApplyMethod::Merged => "branch",
                };
                result.failed.push(FailedEntry::new(
                    record,
                    Some(reference),
                    ErrorKind::VcsError,
                    format!("{} '{}' not found", what, reference),
                ));
                return;
            }
            Err(e) => {
                result
                    .failed
                    .push(FailedEntry::new(record, Some(reference), ErrorKind::VcsError, e));
                return;
            }
        };

        match git::is_ancestor(worktree, &commit, "HEAD") {
            Ok(true) => {
                debug!(record = %record.filename, %reference, "already applied");
                result.skipped.push(already_applied(record, reference));
                return;
            }
            Ok(false) => {}
            Err(e) => {
                result
                    .failed
                    .push(FailedEntry::new(record, Some(reference), ErrorKind::VcsError, e));
                return;
            }
        }

        let outcome = match method {
            ApplyMethod::CherryPicked => git::cherry_pick(worktree, &commit),
            ApplyMethod::Merged => {
                let message = format!("feat: integrate {}", record.label());
                git::merge_no_ff(worktree, reference, &message)
            }
        };

        match outcome {
            ApplyOutcome::Applied => {
                info!(record = %record.filename, %reference, ?method, "applied");
                result.applied.push(AppliedEntry {
                    record: record.filename.clone(),
                    work_item: record.work_item.clone(),
                    reference: reference.to_string(),
                    method,
                    deliverables: record.deliverables.clone(),
                });
            }
            ApplyOutcome::Empty => {
                restore(worktree, &pre);
                result.skipped.push(already_applied(record, reference));
            }
            ApplyOutcome::Conflict(files) => {
                restore(worktree, &pre);
                warn!(record = %record.filename, %reference, ?files, "conflict");
                let mut entry = FailedEntry::new(
                    record,
                    Some(reference),
                    ErrorKind::MergeConflict,
                    format!("conflict in {}", files.join(", ")),
                );
                entry.files = files;
                result.failed.push(entry);
            }
            ApplyOutcome::Failed(message) => {
                restore(worktree, &pre);
                warn!(record = %record.filename, %reference, "apply failed: {}", message);
                result.failed.push(FailedEntry::new(
                    record,
                    Some(reference),
                    ErrorKind::VcsError,
                    message,
                ));
            }
        }
    }

    /// The worktree with the target checked out, else a fresh one under
    /// the workspace root. Dry runs always get a detached scratch worktree.
    fn open_worktree(
        &self,
        target_branch: &str,
        start: &str,
        dry_run: bool,
    ) -> Result<IntegrationWorktree, IntegrationError> {
        let repo = self.repo_root.as_path();
        let integration_root = self.workspace_root.join(".integration");

        if dry_run {
            let path = integration_root.join(".dry-run").join(target_branch);
            self.clear_stale(&path);
            create_parent(&path)?;
            git::add_worktree_detached(repo, &path, start).map_err(IntegrationError::Vcs)?;
            return Ok(IntegrationWorktree { path, owned: true });
        }

        let existing = git::find_worktrees_with_branch(repo, target_branch)
            .map_err(IntegrationError::Vcs)?;
        if let Some(path) = existing.into_iter().next() {
            let files = git::tracked_changes(&path).map_err(IntegrationError::Vcs)?;
            if !files.is_empty() {
                return Err(IntegrationError::DirtyWorktree { path, files });
            }
            return Ok(IntegrationWorktree { path, owned: false });
        }

        let path = integration_root.join(target_branch);
        self.clear_stale(&path);
        create_parent(&path)?;
        git::add_worktree(repo, &path, target_branch).map_err(IntegrationError::Vcs)?;
        Ok(IntegrationWorktree { path, owned: true })
    }

    fn close_worktree(&self, worktree: IntegrationWorktree) {
        if !worktree.owned {
            return;
        }
        if let Err(e) = git::remove_worktree(&self.repo_root, &worktree.path, true) {
            warn!(path = %worktree.path.display(), "failed to remove integration worktree: {}", e);
        }
        if worktree.path.exists() {
            let _ = fs::remove_dir_all(&worktree.path);
        }
        let _ = git::prune_worktrees(&self.repo_root);
    }

    /// Left over from an interrupted run.
    fn clear_stale(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        warn!(path = %path.display(), "removing stale integration worktree");
        let _ = git::remove_worktree(&self.repo_root, path, true);
        if path.exists() {
            let _ = fs::remove_dir_all(path);
        }
        let _ = git::prune_worktrees(&self.repo_root);
    }
}

fn already_applied(record: &StatusRecord, reference: &str) -> SkippedEntry {
    SkippedEntry {
        record: record.filename.clone(),
        work_item: record.work_item.clone(),
        reference: Some(reference.to_string()),
        reason: SkipReason::AlreadyApplied,
    }
}

fn restore(worktree: &Path, pre: &str) {
    if let Err(e) = git::reset_hard(worktree, pre) {
        warn!(path = %worktree.display(), "failed to restore integration worktree: {}", e);
    }
}

fn create_parent(path: &Path) -> Result<(), IntegrationError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            IntegrationError::Vcs(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }
    Ok(())
}

/// Rewrite applied records to `ready-to-merge`. A record whose file can no
/// longer be rewritten moves from `applied` to `failed`.
fn mark_applied(records: &[StatusRecord], result: &mut IntegrationResult) {
    let applied = std::mem::take(&mut result.applied);
    for entry in applied {
        let Some(record) = records.iter().find(|r| r.filename == entry.record) else {
            result.applied.push(entry);
            continue;
        };
        match rewrite_status(record, MemoStatus::ReadyToMerge) {
            Ok(()) => result.applied.push(entry),
            Err(e) => {
                warn!(record = %entry.record, "status rewrite failed: {}", e);
                result.failed.push(FailedEntry {
                    record: entry.record,
                    work_item: entry.work_item,
                    reference: Some(entry.reference),
                    kind: e.kind(),
                    error: format!("applied but status not updated: {}", e),
                    files: Vec::new(),
                });
            }
        }
    }
}
