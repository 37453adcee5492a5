use super::{flag_arg, invalid, parse_flag, scanner};
use crate::command::{Command, CommandResult};
use crate::context::Context;
use crate::error::ErrorKind;
use crate::integration::{gates_from_config, IntegrationEngine, IntegrationResult};
use crate::memo::MemoStatus;

pub(super) fn apply_ready(cmd: &Command, ctx: &Context) -> CommandResult {
    let mut target = None;
    let mut dry_run = false;
    for arg in &cmd.args {
        match (parse_flag(arg, "dry-run"), target.is_none()) {
            (Some(flag), _) => dry_run = flag,
            (None, true) => target = Some(arg.clone()),
            (None, false) => return invalid(format!("expected 'dry-run', got '{}'", arg)),
        }
    }
    let target = target.unwrap_or_else(|| ctx.integration_target());
    run_apply(ctx, &target, dry_run)
}

pub(super) fn apply_ready_to(cmd: &Command, ctx: &Context) -> CommandResult {
    let target = cmd.arg(0).unwrap_or_default();
    if parse_flag(target, "dry-run").is_some() {
        return invalid(format!("'{}' is not a branch name", target));
    }
    let dry_run = match flag_arg(cmd, 1, "dry-run") {
        Ok(flag) => flag,
        Err(result) => return result,
    };
    run_apply(ctx, target, dry_run)
}

fn run_apply(ctx: &Context, target: &str, dry_run: bool) -> CommandResult {
    let records = match scanner(ctx).scan_by_status(MemoStatus::ReadyToConsume) {
        Ok(records) => records,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };
    let engine = IntegrationEngine::new(&ctx.repo_root, ctx.config.trunk())
        .with_workspace_root(&ctx.workspace_root());
    let gates = gates_from_config(&ctx.config.gates);

    match engine.apply_records(&records, target, &gates, dry_run) {
        Ok(result) => integration_result(result),
        Err(e) => CommandResult::failure(e.kind(), e.to_string()),
    }
}

/// Failed records take precedence over failed gates when picking the kind.
fn integration_result(result: IntegrationResult) -> CommandResult {
    let message = result.summary();
    let base = if let Some(first) = result.failed.first() {
        CommandResult::failure(first.kind, message)
    } else if !result.gates_passed() {
        CommandResult::failure(ErrorKind::GateFailure, message)
    } else {
        CommandResult::ok(message)
    };
    base.with("applied", result.applied_count())
        .with("skipped", result.skipped_count())
        .with("failed", result.failed_count())
        .with_serialized("integration", &result)
}
