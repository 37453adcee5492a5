//! Thin blocking wrappers over the `git` CLI.
//!
//! Every call runs `git -C <dir> ...` and turns a non-zero exit into an
//! error string carrying git's trimmed stderr. Callers map those strings
//! into their own error types.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

/// Identity used for commits convoy creates itself (merge commits).
pub const COMMITTER_NAME: &str = "convoy";
pub const COMMITTER_EMAIL: &str = "convoy@localhost";

fn git_output(dir: &Path, args: &[&str]) -> Result<Output, String> {
    debug!(dir = %dir.display(), ?args, "git");
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| format!("failed to run git {}: {}", args.first().unwrap_or(&""), e))
}

/// Run git and return stdout, failing on non-zero exit.
fn git(dir: &Path, args: &[&str]) -> Result<String, String> {
    let output = git_output(dir, args)?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        ))
    }
}

/// Exit code 0 → true, 1 → false, anything else is an error.
fn git_predicate(dir: &Path, args: &[&str]) -> Result<bool, String> {
    let output = git_output(dir, args)?;
    if output.status.success() {
        return Ok(true);
    }
    match output.status.code() {
        Some(1) => Ok(false),
        _ => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            ))
        }
    }
}

pub fn ensure_head(repo_root: &Path) -> Result<(), String> {
    let output = git_output(repo_root, &["rev-parse", "--verify", "HEAD"])?;
    if output.status.success() {
        Ok(())
    } else {
        Err("git repo has no commits; create an initial commit before creating worktrees"
            .to_string())
    }
}

pub fn branch_exists(repo_root: &Path, branch: &str) -> Result<bool, String> {
    let ref_name = format!("refs/heads/{}", branch);
    git_predicate(repo_root, &["show-ref", "--verify", "--quiet", &ref_name])
}

/// Branch checked out in `dir`, `None` when HEAD is detached.
pub fn current_branch(dir: &Path) -> Result<Option<String>, String> {
    let output = git_output(dir, &["symbolic-ref", "--quiet", "--short", "HEAD"])?;
    if output.status.success() {
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        return Ok(if branch.is_empty() { None } else { Some(branch) });
    }
    match output.status.code() {
        Some(1) => Ok(None),
        _ => Err(format!(
            "git symbolic-ref failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )),
    }
}

/// Create `branch` at `start_point`.
pub fn create_branch(repo_root: &Path, branch: &str, start_point: &str) -> Result<(), String> {
    git(repo_root, &["branch", branch, start_point]).map(|_| ())
}

pub fn delete_branch(repo_root: &Path, branch: &str) -> Result<(), String> {
    git(repo_root, &["branch", "-D", branch]).map(|_| ())
}

/// Resolve `rev` to a commit sha, `None` if it does not name a commit.
pub fn resolve_commit(dir: &Path, rev: &str) -> Result<Option<String>, String> {
    let spec = format!("{}^{{commit}}", rev);
    let output = git_output(dir, &["rev-parse", "--verify", "--quiet", &spec])?;
    if output.status.success() {
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(if sha.is_empty() { None } else { Some(sha) })
    } else {
        Ok(None)
    }
}

/// True when `commit` is reachable from `of`.
pub fn is_ancestor(dir: &Path, commit: &str, of: &str) -> Result<bool, String> {
    git_predicate(dir, &["merge-base", "--is-ancestor", commit, of])
}

/// True when `<rev>:<path>` exists.
pub fn object_exists(dir: &Path, rev: &str, path: &str) -> Result<bool, String> {
    let spec = format!("{}:{}", rev, path);
    let output = git_output(dir, &["cat-file", "-e", &spec])?;
    Ok(output.status.success())
}

/// `git status --porcelain` lines, empty when clean.
pub fn status_porcelain(dir: &Path) -> Result<Vec<String>, String> {
    let stdout = git(dir, &["status", "--porcelain"])?;
    Ok(stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.to_string())
        .collect())
}

/// Like [`status_porcelain`] but ignoring untracked files.
pub fn tracked_changes(dir: &Path) -> Result<Vec<String>, String> {
    let stdout = git(dir, &["status", "--porcelain", "--untracked-files=no"])?;
    Ok(stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.to_string())
        .collect())
}

/// One entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub head: Option<String>,
    /// Short branch name, without `refs/heads/`.
    pub branch: Option<String>,
    pub detached: bool,
}

/// Parse porcelain output. Entries are separated by blank lines:
///
/// ```text
/// worktree /path/to/worktree
/// HEAD <sha>
/// branch refs/heads/<branch>
/// ```
pub fn parse_worktree_porcelain(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeEntry {
                path: PathBuf::from(path.trim()),
                ..Default::default()
            });
        } else if let Some(entry) = current.as_mut() {
            if let Some(head) = line.strip_prefix("HEAD ") {
                entry.head = Some(head.trim().to_string());
            } else if let Some(branch) = line.strip_prefix("branch ") {
                let branch = branch.trim();
                entry.branch = Some(branch.strip_prefix("refs/heads/").unwrap_or(branch).to_string());
            } else if line.trim() == "detached" {
                entry.detached = true;
            } else if line.is_empty() {
                entries.push(entry.clone());
                current = None;
            }
        }
    }
    if let Some(entry) = current {
        entries.push(entry);
    }
    entries
}

pub fn list_worktrees(repo_root: &Path) -> Result<Vec<WorktreeEntry>, String> {
    let stdout = git(repo_root, &["worktree", "list", "--porcelain"])?;
    Ok(parse_worktree_porcelain(&stdout))
}

/// Worktree paths that have `branch` checked out.
pub fn find_worktrees_with_branch(repo_root: &Path, branch: &str) -> Result<Vec<PathBuf>, String> {
    Ok(list_worktrees(repo_root)?
        .into_iter()
        .filter(|e| e.branch.as_deref() == Some(branch))
        .map(|e| e.path)
        .collect())
}

/// `git worktree add -b <branch> <path> <base>`.
pub fn add_worktree_new_branch(
    repo_root: &Path,
    path: &Path,
    branch: &str,
    base: &str,
) -> Result<(), String> {
    let path_str = path.to_string_lossy();
    git(repo_root, &["worktree", "add", "-b", branch, &path_str, base]).map(|_| ())
}

/// Check out an existing branch in a new worktree.
pub fn add_worktree(repo_root: &Path, path: &Path, branch: &str) -> Result<(), String> {
    let path_str = path.to_string_lossy();
    git(repo_root, &["worktree", "add", &path_str, branch]).map(|_| ())
}

/// Detached worktree at `rev`.
pub fn add_worktree_detached(repo_root: &Path, path: &Path, rev: &str) -> Result<(), String> {
    let path_str = path.to_string_lossy();
    git(repo_root, &["worktree", "add", "--detach", &path_str, rev]).map(|_| ())
}

pub fn remove_worktree(repo_root: &Path, path: &Path, force: bool) -> Result<(), String> {
    let path_str = path.to_string_lossy();
    let mut args = vec!["worktree", "remove"];
    if force {
        args.push("--force");
    }
    args.push(&path_str);
    git(repo_root, &args).map(|_| ())
}

pub fn prune_worktrees(repo_root: &Path) -> Result<(), String> {
    git(repo_root, &["worktree", "prune"]).map(|_| ())
}

pub fn reset_hard(dir: &Path, rev: &str) -> Result<(), String> {
    git(dir, &["reset", "--hard", "--quiet", rev]).map(|_| ())
}

/// Files with unresolved conflicts.
pub fn conflicted_files(dir: &Path) -> Vec<String> {
    match git(dir, &["diff", "--name-only", "--diff-filter=U"]) {
        Ok(stdout) => stdout
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Outcome of bringing one change into the integration worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Nothing left to apply; the change is already present.
    Empty,
    Conflict(Vec<String>),
    Failed(String),
}

fn with_identity(cmd: &mut Command, author_too: bool) -> &mut Command {
    if author_too {
        cmd.env("GIT_AUTHOR_NAME", COMMITTER_NAME)
            .env("GIT_AUTHOR_EMAIL", COMMITTER_EMAIL);
    }
    cmd.env("GIT_COMMITTER_NAME", COMMITTER_NAME)
        .env("GIT_COMMITTER_EMAIL", COMMITTER_EMAIL)
}

/// `git merge --no-ff -m <message> <branch>`; aborts on conflict.
pub fn merge_no_ff(dir: &Path, branch: &str, message: &str) -> ApplyOutcome {
    let mut cmd = Command::new("git");
    cmd.arg("-C")
        .arg(dir)
        .args(["merge", "--no-ff", "-m", message, branch]);
    let output = with_identity(&mut cmd, true).output();

    match output {
        Err(e) => ApplyOutcome::Failed(format!("failed to run git merge: {}", e)),
        Ok(o) if o.status.success() => ApplyOutcome::Applied,
        Ok(o) => {
            let conflicts = conflicted_files(dir);
            let _ = git_output(dir, &["merge", "--abort"]);
            if !conflicts.is_empty() {
                ApplyOutcome::Conflict(conflicts)
            } else {
                let stderr = String::from_utf8_lossy(&o.stderr);
                ApplyOutcome::Failed(format!("git merge failed: {}", stderr.trim()))
            }
        }
    }
}

/// `git cherry-pick <sha>`, keeping the original author.
pub fn cherry_pick(dir: &Path, sha: &str) -> ApplyOutcome {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(dir).args(["cherry-pick", sha]);
    let output = with_identity(&mut cmd, false).output();

    match output {
        Err(e) => ApplyOutcome::Failed(format!("failed to run git cherry-pick: {}", e)),
        Ok(o) if o.status.success() => ApplyOutcome::Applied,
        Ok(o) => {
            let conflicts = conflicted_files(dir);
            let _ = git_output(dir, &["cherry-pick", "--abort"]);
            let stderr = String::from_utf8_lossy(&o.stderr).to_string();
            let stdout = String::from_utf8_lossy(&o.stdout).to_string();
            if !conflicts.is_empty() {
                ApplyOutcome::Conflict(conflicts)
            } else if stderr.contains("empty") || stdout.contains("nothing to commit") {
                ApplyOutcome::Empty
            } else {
                ApplyOutcome::Failed(format!("git cherry-pick failed: {}", stderr.trim()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::testutil::{commit_file, commit_on_branch, init_repo, rev_parse};

    #[test]
    fn test_parse_worktree_porcelain() {
        let porcelain = "\
worktree /repo
HEAD abc123
branch refs/heads/main

worktree /repo.worktrees/backend/US-1
HEAD def456
branch refs/heads/feat/backend/US-1

worktree /tmp/scratch
HEAD 789abc
detached
";
        let entries = parse_worktree_porcelain(porcelain);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert_eq!(entries[1].path, PathBuf::from("/repo.worktrees/backend/US-1"));
        assert_eq!(entries[1].branch.as_deref(), Some("feat/backend/US-1"));
        assert_eq!(entries[1].head.as_deref(), Some("def456"));
        assert!(entries[2].detached);
        assert_eq!(entries[2].branch, None);
    }

    #[test]
    fn test_parse_worktree_porcelain_empty() {
        assert!(parse_worktree_porcelain("").is_empty());
    }

    #[test]
    fn test_branch_exists_and_create() {
        let temp = TempDir::new().expect("temp dir");
        let repo = temp.path();
        init_repo(repo);

        assert!(branch_exists(repo, "main").unwrap());
        assert!(!branch_exists(repo, "integration/x").unwrap());
        create_branch(repo, "integration/x", "main").unwrap();
        assert!(branch_exists(repo, "integration/x").unwrap());
        delete_branch(repo, "integration/x").unwrap();
        assert!(!branch_exists(repo, "integration/x").unwrap());
    }

    #[test]
    fn test_resolve_commit_and_ancestry() {
        let temp = TempDir::new().expect("temp dir");
        let repo = temp.path();
        init_repo(repo);
        let base = rev_parse(repo, "HEAD");
        let tip = commit_on_branch(repo, "feat/a/b", "main", "a.txt", "a");

        assert_eq!(resolve_commit(repo, "feat/a/b").unwrap(), Some(tip.clone()));
        assert_eq!(resolve_commit(repo, "deadbeef").unwrap(), None);
        assert!(is_ancestor(repo, &base, &tip).unwrap());
        assert!(!is_ancestor(repo, &tip, &base).unwrap());
        assert!(object_exists(repo, "feat/a/b", "a.txt").unwrap());
        assert!(!object_exists(repo, "main", "a.txt").unwrap());
    }

    #[test]
    fn test_merge_no_ff_conflict_aborts() {
        let temp = TempDir::new().expect("temp dir");
        let repo = temp.path();
        init_repo(repo);
        commit_on_branch(repo, "feat/a/b", "main", "shared.txt", "branch side");
        commit_file(repo, "shared.txt", "main side", "main change");
        let before = rev_parse(repo, "HEAD");

        match merge_no_ff(repo, "feat/a/b", "feat: integrate x") {
            ApplyOutcome::Conflict(files) => assert_eq!(files, vec!["shared.txt"]),
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(rev_parse(repo, "HEAD"), before);
        assert!(status_porcelain(repo).unwrap().is_empty());
    }

    #[test]
    fn test_cherry_pick_applies_and_reports_empty() {
        let temp = TempDir::new().expect("temp dir");
        let repo = temp.path();
        init_repo(repo);
        let sha = commit_on_branch(repo, "feat/a/b", "main", "a.txt", "a");

        assert_eq!(cherry_pick(repo, &sha), ApplyOutcome::Applied);
        assert_eq!(fs::read_to_string(repo.join("a.txt")).unwrap(), "a");
        // Same change again has nothing left to apply.
        assert_eq!(cherry_pick(repo, &sha), ApplyOutcome::Empty);
        assert!(status_porcelain(repo).unwrap().is_empty());
    }
}
