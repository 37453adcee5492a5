//! Built-in command set.
//!
//! Orchestrator and integrator commands are always registered. Every role
//! in the role table additionally gets `start_task`, `start_next` and
//! `report_token_usage`.

mod integration;
mod status;
mod tasks;
mod workspaces;

use crate::command::{Command, CommandResult, CommandSchema, Dispatcher, RegisterError};
use crate::config::Config;
use crate::context::Context;
use crate::error::ErrorKind;
use crate::memo::MemoScanner;
use crate::workspace::WorkspaceManager;

/// Dispatcher with every built-in command for `config`'s role table.
pub fn build_dispatcher(config: &Config) -> Result<Dispatcher, RegisterError> {
    let mut dispatcher = Dispatcher::default();

    dispatcher.register(
        CommandSchema::new("integrator", "apply_ready", 0, Some(2))
            .with_usage("[target][, dry-run]  apply ready status records"),
        integration::apply_ready,
    )?;
    dispatcher.register(
        CommandSchema::new("orchestrator", "apply_ready_to", 1, Some(2))
            .with_usage("target[, dry-run]  apply ready status records to target"),
        integration::apply_ready_to,
    )?;
    dispatcher.register(
        CommandSchema::new("integrator", "distribute_tasks", 2, Some(4))
            .with_usage("iteration, role|all[, strategy][, max_per_agent]  allocate targets into task cards"),
        tasks::distribute_tasks,
    )?;
    dispatcher.register(
        CommandSchema::new("orchestrator", "archive_tasks", 1, Some(2))
            .with_usage("iteration[, dry-run]  move an iteration's index and cards to _archive/"),
        tasks::archive_tasks,
    )?;
    dispatcher.register(
        CommandSchema::new("orchestrator", "create_workspace", 2, Some(3))
            .with_usage("role, task_id[, base]  create branch and worktree"),
        workspaces::create_workspace,
    )?;
    dispatcher.register(
        CommandSchema::new("orchestrator", "list_workspaces", 0, Some(0))
            .with_usage("list active workspaces"),
        workspaces::list_workspaces,
    )?;
    dispatcher.register(
        CommandSchema::new("orchestrator", "remove_workspace", 2, Some(3))
            .with_usage("role, task_id[, force]  remove worktree, keep branch"),
        workspaces::remove_workspace,
    )?;
    dispatcher.register(
        CommandSchema::new("orchestrator", "scan_memos", 0, Some(1))
            .with_usage("[status]  summarize status records"),
        status::scan_memos,
    )?;
    dispatcher.register(
        CommandSchema::new("orchestrator", "monitor_progress", 0, Some(1))
            .with_usage("[iteration]  task card and status record counts"),
        status::monitor_progress,
    )?;

    for role in &config.roles {
        let id = role.role_id.as_str();
        dispatcher.register(
            CommandSchema::new(id, "start_task", 1, Some(1))
                .with_usage("card_id  move one of this role's cards to in-progress"),
            tasks::start_task,
        )?;
        dispatcher.register(
            CommandSchema::new(id, "start_next", 0, Some(0))
                .with_usage("start the first ready card whose dependencies are done"),
            tasks::start_next,
        )?;
        dispatcher.register(
            CommandSchema::new(id, "report_token_usage", 0, Some(0))
                .with_usage("token usage from status records against the role budget"),
            status::report_token_usage,
        )?;
    }

    Ok(dispatcher)
}

/// `Some(true)` for the flag itself or a truthy word, `Some(false)` for a
/// falsy word, `None` for anything else.
fn parse_flag(arg: &str, flag: &str) -> Option<bool> {
    let lower = arg.trim().to_lowercase();
    let lower = lower.trim_start_matches("--").replace('_', "-");
    if lower == flag {
        return Some(true);
    }
    match lower.as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Optional trailing `flag` argument at `index`; absent means false.
fn flag_arg(cmd: &Command, index: usize, flag: &str) -> Result<bool, CommandResult> {
    match cmd.arg(index) {
        None => Ok(false),
        Some(arg) => parse_flag(arg, flag)
            .ok_or_else(|| invalid(format!("expected '{}', got '{}'", flag, arg))),
    }
}

fn invalid(message: String) -> CommandResult {
    CommandResult::failure(ErrorKind::InvalidArgument, message)
}

fn scanner(ctx: &Context) -> MemoScanner {
    MemoScanner::new(&ctx.memo_dir()).with_roles(ctx.config.roles.iter().map(|r| r.role_id.clone()))
}

fn workspace_manager(ctx: &Context) -> WorkspaceManager {
    WorkspaceManager::new(&ctx.repo_root, &ctx.workspace_root(), &ctx.config.branch_prefix)
}
