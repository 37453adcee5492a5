use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use chrono::NaiveDate;
use serde_json::Value;
use tempfile::TempDir;

use convoy::config::{CliArgs, Config};
use convoy::context::Context;
use convoy::error::ErrorKind;
use convoy::handlers::build_dispatcher;
use convoy::journal;

const CONFIG: &str = r#"
[project]
trunk_branch = "main"

[[roles]]
id = "product_analyst"
token_budget = 5000
complexity_threshold = 4

[[roles]]
id = "backend"
token_budget = 8000
complexity_threshold = 6
depends_on = ["product_analyst"]
"#;

fn run_success(cmd: &mut Command) -> Output {
    let output = cmd.output().expect("failed to run command");
    assert!(
        output.status.success(),
        "command failed\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn git(repo: &Path, args: &[&str]) -> String {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(repo).args(args);
    let output = run_success(&mut cmd);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn init_git_repo(path: &Path) {
    fs::create_dir_all(path).expect("create repo dir");
    git(path, &["init", "-b", "main"]);
    git(path, &["config", "user.name", "Convoy Test"]);
    git(path, &["config", "user.email", "convoy-test@example.com"]);
    fs::write(path.join("README.md"), "# fixture\n").expect("write README");
    git(path, &["add", "."]);
    git(path, &["commit", "-m", "init"]);
}

fn commit_on_branch(repo: &Path, branch: &str, file: &str, content: &str) -> String {
    git(repo, &["checkout", "-b", branch, "main"]);
    fs::write(repo.join(file), content).expect("write file");
    git(repo, &["add", file]);
    git(repo, &["commit", "-m", &format!("work on {}", file)]);
    let sha = git(repo, &["rev-parse", "HEAD"]);
    git(repo, &["checkout", "main"]);
    sha
}

fn write_memo(repo: &Path, name: &str, fields: &[(&str, &str)]) -> PathBuf {
    let dir = repo.join(".orchestration/runtime/agent-sync");
    fs::create_dir_all(&dir).expect("create memo dir");
    let mut body = String::from("# Handoff\n\n");
    for (label, value) in fields {
        body.push_str(&format!("- **{}**: `{}`\n", label, value));
    }
    let path = dir.join(name);
    fs::write(&path, body).expect("write memo");
    path
}

/// Repo under `temp/repo`, so default workspaces land in `temp/repo.worktrees`.
fn fixture() -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("temp dir");
    let repo = temp.path().join("repo");
    init_git_repo(&repo);
    fs::write(repo.join("convoy.toml"), CONFIG).expect("write config");
    (temp, repo)
}

fn convoy(repo: &Path, args: &[&str]) -> Output {
    let convoy_bin = env!("CARGO_BIN_EXE_convoy");
    Command::new(convoy_bin)
        .arg("--repo")
        .arg(repo)
        .args(args)
        .env_remove("CONVOY_LOG")
        .output()
        .expect("failed to run convoy")
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| {
        panic!("stdout is not JSON ({}):\n{}", e, stdout);
    })
}

fn context(repo: &Path) -> Context {
    let config = Config::load(&CliArgs::default(), repo).expect("load config");
    Context::new(repo, config).with_today(NaiveDate::from_ymd_opt(2026, 1, 10).unwrap())
}

#[test]
fn test_list_shows_builtin_and_role_commands() {
    let (_temp, repo) = fixture();
    let output = convoy(&repo, &["list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in [
        "/integrator::apply_ready",
        "/orchestrator::archive_tasks",
        "/orchestrator::create_workspace",
        "/backend::start_next",
        "/product_analyst::report_token_usage",
    ] {
        assert!(stdout.contains(line), "missing {}\n{}", line, stdout);
    }

    let output = convoy(&repo, &["list", "--role", "backend", "--json"]);
    let rows = stdout_json(&output);
    let commands: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["command"].as_str().unwrap())
        .collect();
    assert_eq!(commands, vec!["report_token_usage", "start_next", "start_task"]);
}

#[test]
fn test_rejected_commands_exit_nonzero() {
    let (_temp, repo) = fixture();

    let cases = [
        ("not a command", "malformed_command"),
        ("/designer::start_next", "unknown_role"),
        ("/backend::deploy", "unknown_command"),
        ("/orchestrator::create_workspace(backend)", "arg_count_mismatch"),
    ];
    for (line, kind) in cases {
        let output = convoy(&repo, &["--json", "execute", line]);
        assert!(!output.status.success(), "{} should fail", line);
        let result = stdout_json(&output);
        assert_eq!(result["success"], false);
        assert_eq!(result["error"], kind, "{}", line);
    }

    let output = convoy(&repo, &["validate", "/orchestrator::list_workspaces(extra)"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("arg_count_mismatch:"));

    let output = convoy(&repo, &["validate", "/integrator::apply_ready(dry-run)"]);
    assert!(output.status.success());
}

#[test]
fn test_apply_ready_converges_and_is_idempotent() {
    let (_temp, repo) = fixture();
    // Already on main: applying it again must be a no-op.
    let shipped = git(&repo, &["rev-parse", "HEAD"]);
    commit_on_branch(&repo, "feat/x/y", "feature.txt", "feature\n");

    let shipped_memo = write_memo(
        &repo,
        "2026-01-09_backend_shipped.md",
        &[
            ("Status", "ready-to-consume"),
            ("SHA", &shipped[..7]),
            ("Work Item", "US-1"),
        ],
    );
    let feature_memo = write_memo(
        &repo,
        "2026-01-10_backend_feature.md",
        &[
            ("Status", "ready-to-consume"),
            ("Branch", "feat/x/y"),
            ("Work Item", "US-2"),
        ],
    );
    write_memo(&repo, "2026-01-10_backend_wip.md", &[("Status", "draft")]);

    let ctx = context(&repo);
    let dispatcher = build_dispatcher(&ctx.config).expect("dispatcher");

    let result = dispatcher.dispatch("/orchestrator::apply_ready_to(integration/test)", &ctx);
    assert!(result.success, "{}", result.message);
    assert_eq!(result.data["applied"], 1);
    assert_eq!(result.data["skipped"], 1);
    assert_eq!(result.data["failed"], 0);
    let skipped = &result.data["integration"]["skipped"][0];
    assert_eq!(skipped["reason"], "already_applied");

    let head = git(&repo, &["rev-parse", "integration/test"]);
    let merged = git(&repo, &["merge-base", "--is-ancestor", "feat/x/y", &head]);
    assert_eq!(merged, "");
    assert!(fs::read_to_string(&feature_memo).unwrap().contains("`ready-to-merge`"));
    // Skipped records keep their status.
    assert!(fs::read_to_string(&shipped_memo).unwrap().contains("`ready-to-consume`"));

    // Only the shipped record is still ready, and it is skipped again.
    let again = dispatcher.dispatch("/orchestrator::apply_ready_to(integration/test)", &ctx);
    assert!(again.success, "{}", again.message);
    assert_eq!(again.data["applied"], 0);
    assert_eq!(again.data["skipped"], 1);
    assert_eq!(git(&repo, &["rev-parse", "integration/test"]), head);

    // The journal records both runs.
    let entries = journal::read_from_actor(ctx.journal_path().unwrap(), "orchestrator").unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].contains("apply_ready_to(integration/test) -> ok"));
}

#[test]
fn test_apply_ready_conflict_isolated_and_reported() {
    let (_temp, repo) = fixture();
    commit_on_branch(&repo, "feat/a/1", "a.txt", "a\n");
    commit_on_branch(&repo, "feat/b/1", "README.md", "# b\n");
    commit_on_branch(&repo, "feat/c/1", "README.md", "# c\n");
    commit_on_branch(&repo, "feat/d/1", "d.txt", "d\n");
    for (name, branch) in [
        ("2026-01-10_backend_a.md", "feat/a/1"),
        ("2026-01-10_backend_b.md", "feat/b/1"),
        ("2026-01-10_backend_c.md", "feat/c/1"),
        ("2026-01-10_backend_d.md", "feat/d/1"),
    ] {
        write_memo(&repo, name, &[("Status", "ready-to-consume"), ("Branch", branch)]);
    }

    let output = convoy(
        &repo,
        &["--json", "execute", "/integrator::apply_ready(integration/conflict)"],
    );
    assert!(!output.status.success());
    let result = stdout_json(&output);
    assert_eq!(result["error"], "merge_conflict");
    assert_eq!(result["data"]["applied"], 3);
    let failed = &result["data"]["integration"]["failed"][0];
    assert_eq!(failed["record"], "2026-01-10_backend_c.md");
    assert_eq!(failed["files"][0], "README.md");

    let memo = repo.join(".orchestration/runtime/agent-sync/2026-01-10_backend_c.md");
    assert!(fs::read_to_string(memo).unwrap().contains("`ready-to-consume`"));
    let files = git(&repo, &["ls-tree", "--name-only", "integration/conflict"]);
    assert!(files.contains("a.txt") && files.contains("d.txt"));
}

#[test]
fn test_distribute_tasks_cli_allocates_in_order() {
    let (_temp, repo) = fixture();
    let targets = repo.join(".orchestration/runtime/targets.toml");
    fs::create_dir_all(targets.parent().unwrap()).unwrap();
    let mut content = String::from("complexity_per_item = 2\n");
    for i in 1..=5 {
        content.push_str(&format!("\n[[target]]\nid = \"US-{}\"\n", i));
    }
    fs::write(&targets, content).unwrap();

    let output = convoy(
        &repo,
        &["--json", "execute", "/integrator::distribute_tasks(iter-1, product_analyst)"],
    );
    assert!(output.status.success());
    let result = stdout_json(&output);
    let groups: Vec<Vec<String>> = result["data"]["allocations"][0]["groups"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| {
            g["targets"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t["id"].as_str().unwrap().to_string())
                .collect()
        })
        .collect();
    assert_eq!(
        groups,
        vec![
            vec!["US-1".to_string(), "US-2".to_string()],
            vec!["US-3".to_string(), "US-4".to_string()],
            vec!["US-5".to_string()],
        ]
    );

    let index_file = PathBuf::from(result["data"]["index_file"].as_str().unwrap());
    assert!(index_file.exists());
    assert_eq!(result["data"]["cards"].as_array().unwrap().len(), 5);

    let output = convoy(&repo, &["--json", "execute", "/product_analyst::start_next"]);
    assert!(output.status.success());
    let started = stdout_json(&output);
    assert_eq!(started["data"]["card"]["work_item_ref"], "US-1");
    assert_eq!(started["data"]["card"]["status"], "in-progress");
}

#[test]
fn test_workspace_lifecycle_through_cli() {
    let (temp, repo) = fixture();

    let output = convoy(&repo, &["execute", "/orchestrator::create_workspace(backend, US-7)"]);
    assert!(output.status.success());
    let path = temp.path().join("repo.worktrees/backend/US-7");
    assert!(path.join("README.md").exists());
    assert_eq!(git(&path, &["rev-parse", "--abbrev-ref", "HEAD"]), "feat/backend/US-7");

    let output = convoy(&repo, &["execute", "/orchestrator::create_workspace(backend, US-7)"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("workspace_exists:"));

    let output = convoy(&repo, &["--json", "execute", "/orchestrator::list_workspaces"]);
    let listed = stdout_json(&output);
    assert_eq!(listed["data"]["workspaces"][0]["task_id"], "US-7");

    fs::write(path.join("README.md"), "changed\n").unwrap();
    let output = convoy(&repo, &["execute", "/orchestrator::remove_workspace(backend, US-7)"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("dirty_workspace:"));

    let output = convoy(
        &repo,
        &["execute", "/orchestrator::remove_workspace(backend, US-7, force)"],
    );
    assert!(output.status.success());
    assert!(!path.exists());
    assert_eq!(git(&repo, &["branch", "--list", "feat/backend/US-7"]), "feat/backend/US-7");
}

#[test]
fn test_interactive_session_survives_errors() {
    use std::io::Write;
    use std::process::Stdio;

    let (_temp, repo) = fixture();
    let convoy_bin = env!("CARGO_BIN_EXE_convoy");
    let mut child = Command::new(convoy_bin)
        .arg("--repo")
        .arg(&repo)
        .arg("interactive")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn convoy");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"/bogus\n/orchestrator::list_workspaces\nquit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();

    // One failed command makes the session exit non-zero, but later lines still ran.
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("malformed_command:"));
    assert!(stdout.contains("0 active workspace(s)"));
}

#[test]
fn test_init_and_journal_commands() {
    let temp = TempDir::new().expect("temp dir");
    let repo = temp.path().join("repo");
    init_git_repo(&repo);

    let output = convoy(&repo, &["init"]);
    assert!(output.status.success());
    let written = fs::read_to_string(repo.join("convoy.toml")).unwrap();
    assert_eq!(Config::parse_toml(&written).unwrap().roles.len(), 0);

    let output = convoy(&repo, &["init"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("already exists"));

    convoy(&repo, &["execute", "/orchestrator::scan_memos"]);
    let output = convoy(&repo, &["journal", "--actor", "orchestrator"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    assert!(stdout.contains("| orchestrator | /orchestrator::scan_memos -> ok"));

    convoy(&repo, &["--no-journal", "execute", "/orchestrator::scan_memos"]);
    let output = convoy(&repo, &["journal"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 1);
}

#[test]
fn test_build_dispatcher_reports_config_errors() {
    let mut config = Config::parse_toml(CONFIG).unwrap();
    config.roles.push(config.roles[0].clone());
    let err = build_dispatcher(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateHandler);
}
