//! Test utilities for convoy.
//!
//! Git fixture helpers shared by the unit tests of every module that
//! touches a repository. Each helper panics on failure so a broken fixture
//! shows up at the line that built it.

#![cfg(test)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

/// Run git in `repo`, asserting success.
pub fn run_git(repo: &Path, args: &[&str]) -> Output {
    let output = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .expect("failed to run git command");
    assert!(
        output.status.success(),
        "git {:?} failed\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

/// Initialise a repository on `main` with one commit.
pub fn init_repo(repo: &Path) {
    run_git(repo, &["init"]);
    run_git(repo, &["config", "user.name", "Convoy Test"]);
    run_git(repo, &["config", "user.email", "convoy-test@example.com"]);
    fs::write(repo.join("README.md"), "init").expect("write README");
    run_git(repo, &["add", "."]);
    run_git(repo, &["commit", "-m", "init"]);
    run_git(repo, &["branch", "-M", "main"]);
}

/// Write `content` to `filename` and commit it on the current branch.
pub fn commit_file(repo: &Path, filename: &str, content: &str, message: &str) {
    let path = repo.join(filename);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(&path, content).expect("write file");
    run_git(repo, &["add", "."]);
    run_git(repo, &["commit", "-m", message]);
}

pub fn rev_parse(repo: &Path, rev: &str) -> String {
    let output = run_git(repo, &["rev-parse", rev]);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub fn branch_exists(repo: &Path, branch: &str) -> bool {
    let ref_name = format!("refs/heads/{}", branch);
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["show-ref", "--verify", "--quiet", &ref_name])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Create `branch` from `base` with one commit touching `filename`, then
/// return to `main`. Returns the new commit sha.
pub fn commit_on_branch(repo: &Path, branch: &str, base: &str, filename: &str, content: &str) -> String {
    run_git(repo, &["checkout", "-q", "-b", branch, base]);
    commit_file(repo, filename, content, &format!("work on {}", branch));
    let sha = rev_parse(repo, "HEAD");
    run_git(repo, &["checkout", "-q", "main"]);
    sha
}

/// Write a status record into `dir`.
pub fn write_memo(
    dir: &Path,
    filename: &str,
    status: &str,
    branch: Option<&str>,
    sha: Option<&str>,
    work_item: &str,
) {
    fs::create_dir_all(dir).expect("create memo dir");
    let mut body = String::from("# Handoff\n\n- **Date**: 2026-01-10\n- **Audience**: `@integrator`\n");
    body.push_str(&format!("- **Status**: `{}`\n", status));
    if let Some(branch) = branch {
        body.push_str(&format!("- **Branch**: `{}`\n", branch));
    }
    if let Some(sha) = sha {
        body.push_str(&format!("- **SHA**: `{}`\n", sha));
    }
    body.push_str(&format!("- **Work Item**: {}\n\nNotes follow.\n", work_item));
    fs::write(dir.join(filename), body).expect("write memo");
}
