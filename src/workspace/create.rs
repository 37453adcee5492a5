use std::fs;

use tracing::{info, warn};

use super::{validate_identifier, Workspace, WorkspaceError, WorkspaceManager, WorkspaceState};
use crate::git;

impl WorkspaceManager {
    /// Create the branch and worktree for (role, task) from `base_branch`.
    ///
    /// Fails with `WorkspaceExists` if either the branch or the directory is
    /// already there. A failed `git worktree add` leaves nothing behind.
    pub fn create(
        &self,
        role: &str,
        task_id: &str,
        base_branch: &str,
    ) -> Result<Workspace, WorkspaceError> {
        validate_identifier(role)?;
        validate_identifier(task_id)?;

        let repo_root = self.repo_root();
        git::ensure_head(repo_root).map_err(WorkspaceError::Vcs)?;

        let branch = self.branch_name(role, task_id);
        let path = self.workspace_path(role, task_id);

        if git::branch_exists(repo_root, &branch).map_err(WorkspaceError::Vcs)? {
            return Err(WorkspaceError::WorkspaceExists {
                role: role.to_string(),
                task_id: task_id.to_string(),
                reason: format!("branch '{}' exists", branch),
            });
        }
        if path.exists() {
            return Err(WorkspaceError::WorkspaceExists {
                role: role.to_string(),
                task_id: task_id.to_string(),
                reason: format!("path '{}' exists", path.display()),
            });
        }
        if git::resolve_commit(repo_root, base_branch)
            .map_err(WorkspaceError::Vcs)?
            .is_none()
        {
            return Err(WorkspaceError::Vcs(format!(
                "base branch '{}' not found",
                base_branch
            )));
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                WorkspaceError::Vcs(format!(
                    "failed to create workspace dir {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        if let Err(e) = git::add_worktree_new_branch(repo_root, &path, &branch, base_branch) {
            self.rollback_create(&branch, &path);
            return Err(WorkspaceError::Vcs(e));
        }

        let head = git::resolve_commit(&path, "HEAD").unwrap_or(None);
        info!(%branch, path = %path.display(), base = base_branch, "workspace created");

        Ok(Workspace {
            role: role.to_string(),
            task_id: task_id.to_string(),
            branch,
            path,
            state: WorkspaceState::Active,
            head,
        })
    }

    /// Undo whatever a failed `worktree add` left behind. The branch did not
    /// exist before the call, so any branch found now is ours.
    fn rollback_create(&self, branch: &str, path: &std::path::Path) {
        let repo_root = self.repo_root();
        if path.exists() {
            if let Err(e) = fs::remove_dir_all(path) {
                warn!(path = %path.display(), "failed to remove partial workspace: {}", e);
            }
        }
        if let Err(e) = git::prune_worktrees(repo_root) {
            warn!("worktree prune failed: {}", e);
        }
        if let Ok(true) = git::branch_exists(repo_root, branch) {
            if let Err(e) = git::delete_branch(repo_root, branch) {
                warn!(%branch, "failed to delete partial branch: {}", e);
            }
        }
    }
}
