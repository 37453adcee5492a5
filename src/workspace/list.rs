use super::{Workspace, WorkspaceError, WorkspaceManager, WorkspaceState};
use crate::git;

impl WorkspaceManager {
    /// Active workspaces, from git's worktree registry.
    ///
    /// Worktrees whose branch does not follow `<prefix>/<role>/<task>` are
    /// ignored. Sorted by role then task.
    pub fn list(&self) -> Result<Vec<Workspace>, WorkspaceError> {
        let entries = git::list_worktrees(self.repo_root()).map_err(WorkspaceError::Vcs)?;

        let mut workspaces: Vec<Workspace> = entries
            .into_iter()
            .filter_map(|entry| {
                let branch = entry.branch?;
                let (role, task) = self.parse_branch(&branch)?;
                Some(Workspace {
                    role: role.to_string(),
                    task_id: task.to_string(),
                    path: entry.path,
                    state: WorkspaceState::Active,
                    head: entry.head,
                    branch: branch.clone(),
                })
            })
            .collect();

        workspaces.sort_by(|a, b| (&a.role, &a.task_id).cmp(&(&b.role, &b.task_id)));
        Ok(workspaces)
    }

    /// The active workspace for (role, task), if any.
    pub fn find(&self, role: &str, task_id: &str) -> Result<Option<Workspace>, WorkspaceError> {
        let branch = self.branch_name(role, task_id);
        Ok(self.list()?.into_iter().find(|w| w.branch == branch))
    }

    /// Active workspaces for one role.
    pub fn list_for_role(&self, role: &str) -> Result<Vec<Workspace>, WorkspaceError> {
        Ok(self.list()?.into_iter().filter(|w| w.role == role).collect())
    }
}
