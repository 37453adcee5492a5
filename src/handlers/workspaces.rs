use super::{flag_arg, workspace_manager};
use crate::command::{Command, CommandResult};
use crate::context::Context;
use crate::error::ErrorKind;

pub(super) fn create_workspace(cmd: &Command, ctx: &Context) -> CommandResult {
    let role = cmd.arg(0).unwrap_or_default();
    let task_id = cmd.arg(1).unwrap_or_default();
    if !ctx.config.roles.is_empty() && ctx.config.role(role).is_none() {
        return CommandResult::failure(
            ErrorKind::UnknownRole,
            format!("role '{}' is not configured", role),
        );
    }
    let base = cmd.arg(2).unwrap_or_else(|| ctx.config.trunk());

    match workspace_manager(ctx).create(role, task_id, base) {
        Ok(ws) => CommandResult::ok(format!(
            "created {} at {}",
            ws.branch,
            ws.path.display()
        ))
        .with_serialized("workspace", &ws),
        Err(e) => CommandResult::failure(e.kind(), e.to_string()),
    }
}

pub(super) fn list_workspaces(_cmd: &Command, ctx: &Context) -> CommandResult {
    match workspace_manager(ctx).list() {
        Ok(list) => CommandResult::ok(format!("{} active workspace(s)", list.len()))
            .with_serialized("workspaces", &list),
        Err(e) => CommandResult::failure(e.kind(), e.to_string()),
    }
}

pub(super) fn remove_workspace(cmd: &Command, ctx: &Context) -> CommandResult {
    let role = cmd.arg(0).unwrap_or_default();
    let task_id = cmd.arg(1).unwrap_or_default();
    let force = match flag_arg(cmd, 2, "force") {
        Ok(flag) => flag,
        Err(result) => return result,
    };

    match workspace_manager(ctx).remove(role, task_id, force) {
        Ok(ws) => CommandResult::ok(format!("removed {} (branch kept)", ws.path.display()))
            .with_serialized("workspace", &ws),
        Err(e) => CommandResult::failure(e.kind(), e.to_string()),
    }
}
