use tracing::info;

use super::{validate_identifier, Workspace, WorkspaceError, WorkspaceManager, WorkspaceState};
use crate::git;

impl WorkspaceManager {
    /// Remove the worktree for (role, task). The branch is kept.
    ///
    /// Refuses a dirty worktree unless `force` is set.
    pub fn remove(
        &self,
        role: &str,
        task_id: &str,
        force: bool,
    ) -> Result<Workspace, WorkspaceError> {
        validate_identifier(role)?;
        validate_identifier(task_id)?;

        let mut workspace = self
            .find(role, task_id)?
            .ok_or_else(|| WorkspaceError::NotFound {
                role: role.to_string(),
                task_id: task_id.to_string(),
            })?;

        let repo_root = self.repo_root();
        if !workspace.path.exists() {
            // Directory deleted by hand; only the registration is left.
            git::prune_worktrees(repo_root).map_err(WorkspaceError::Vcs)?;
        } else {
            if !force {
                let dirty = git::status_porcelain(&workspace.path).map_err(WorkspaceError::Vcs)?;
                if !dirty.is_empty() {
                    return Err(WorkspaceError::DirtyWorkspace {
                        role: role.to_string(),
                        task_id: task_id.to_string(),
                        files: dirty,
                    });
                }
            }
            git::remove_worktree(repo_root, &workspace.path, force)
                .map_err(WorkspaceError::Vcs)?;
        }

        info!(branch = %workspace.branch, forced = force, "workspace removed");
        workspace.state = WorkspaceState::Removed;
        Ok(workspace)
    }
}
