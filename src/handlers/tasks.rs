use chrono::Local;
use serde_json::json;
use tracing::warn;

use super::{flag_arg, invalid};
use crate::allocation::{allocate, load_target_set, Allocation, Strategy};
use crate::command::{Command, CommandResult};
use crate::config::Role;
use crate::context::Context;
use crate::error::ErrorKind;
use crate::taskcard::{self, TaskCard, TaskStatus};
use crate::workspace::validate_identifier;

pub(super) fn distribute_tasks(cmd: &Command, ctx: &Context) -> CommandResult {
    let iteration = cmd.arg(0).unwrap_or_default();
    if let Err(e) = validate_identifier(iteration) {
        return CommandResult::failure(e.kind(), e.to_string());
    }

    let role_arg = cmd.arg(1).unwrap_or_default();
    let roles: Vec<&Role> = if role_arg == "all" {
        ctx.config.roles.iter().collect()
    } else {
        match ctx.config.role(role_arg) {
            Some(role) => vec![role],
            None => {
                return CommandResult::failure(
                    ErrorKind::UnknownRole,
                    format!("role '{}' is not configured", role_arg),
                )
            }
        }
    };
    if roles.is_empty() {
        return CommandResult::failure(ErrorKind::Config, "no roles configured");
    }

    let strategy = match cmd.arg(2) {
        None => Strategy::RoundRobin,
        Some(raw) => match raw.parse::<Strategy>() {
            Ok(strategy) => strategy,
            Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
        },
    };
    let max_per_agent = match cmd.arg(3) {
        None => None,
        Some(raw) => match raw.parse::<usize>() {
            Ok(max) => Some(max),
            Err(_) => return invalid(format!("max_per_agent must be a number, got '{}'", raw)),
        },
    };

    let set = match load_target_set(&ctx.targets_file()) {
        Ok(set) => set,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };

    let mut allocations: Vec<(Role, Allocation)> = Vec::with_capacity(roles.len());
    let mut warnings = Vec::new();
    for role in roles {
        let allocation = match allocate(
            &set.targets,
            role,
            &strategy,
            max_per_agent,
            set.complexity_per_item,
        ) {
            Ok(allocation) => allocation,
            Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
        };
        if allocation.max_group_complexity(set.complexity_per_item)
            > role.complexity_threshold as u64
        {
            warnings.push(format!(
                "role '{}': a group exceeds complexity threshold {}",
                role.role_id, role.complexity_threshold
            ));
        }
        allocations.push((role.clone(), allocation));
    }

    let tasks_dir = ctx.tasks_dir();
    let existing = match taskcard::load_cards(&tasks_dir) {
        Ok(cards) => cards,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };
    let (cards, index) = taskcard::generate_after(iteration, ctx.today, &allocations, &existing);
    let written = match taskcard::write_cards(&tasks_dir, &cards, &index) {
        Ok(paths) => paths,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };
    for warning in &warnings {
        warn!("{}", warning);
    }

    let groups: usize = allocations.iter().map(|(_, a)| a.group_count()).sum();
    let allocated: Vec<&Allocation> = allocations.iter().map(|(_, a)| a).collect();
    let ids: Vec<&str> = cards.iter().map(|c| c.id.as_str()).collect();
    let mut result = CommandResult::ok(format!(
        "{} card(s) in {} group(s) for iteration {}",
        cards.len(),
        groups,
        iteration
    ))
    .with_serialized("allocations", &allocated)
    .with("cards", json!(ids))
    .with_serialized("index", &index);
    if let Some(index_file) = written.last() {
        result = result.with("index_file", index_file.display().to_string());
    }
    if !warnings.is_empty() {
        result = result.with("warnings", json!(warnings));
    }
    result
}

pub(super) fn archive_tasks(cmd: &Command, ctx: &Context) -> CommandResult {
    let iteration = cmd.arg(0).unwrap_or_default();
    if let Err(e) = validate_identifier(iteration) {
        return CommandResult::failure(e.kind(), e.to_string());
    }
    let dry_run = match flag_arg(cmd, 1, "dry-run") {
        Ok(flag) => flag,
        Err(result) => return result,
    };
    let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();

    match taskcard::archive_cards(&ctx.tasks_dir(), iteration, &stamp, dry_run) {
        Ok(summary) => CommandResult::ok(format!(
            "archived {} file(s) for iteration {}{}",
            summary.moved.len(),
            iteration,
            if dry_run { " (dry-run)" } else { "" }
        ))
        .with("moved", summary.moved.len())
        .with("skipped", summary.skipped.len())
        .with("archive_dir", summary.archive_dir.display().to_string())
        .with_serialized("archive", &summary),
        Err(e) => CommandResult::failure(e.kind(), e.to_string()),
    }
}

/// Ids among `card.dependencies` whose cards exist and are not yet done.
fn open_dependencies<'a>(card: &'a TaskCard, all: &[TaskCard]) -> Vec<&'a str> {
    card.dependencies
        .iter()
        .filter(|dep| {
            all.iter().any(|c| {
                &c.id == *dep
                    && !matches!(c.status, TaskStatus::ReadyToConsume | TaskStatus::Completed)
            })
        })
        .map(|dep| dep.as_str())
        .collect()
}

pub(super) fn start_task(cmd: &Command, ctx: &Context) -> CommandResult {
    let card_id = cmd.arg(0).unwrap_or_default();
    if let Err(e) = validate_identifier(card_id) {
        return CommandResult::failure(e.kind(), e.to_string());
    }
    let tasks_dir = ctx.tasks_dir();
    let path = tasks_dir.join(format!("{}.md", card_id));

    let card = match taskcard::load_card(&path) {
        Ok(card) => card,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };
    if card.role != cmd.role {
        return invalid(format!(
            "card {} belongs to role '{}', not '{}'",
            card.id, card.role, cmd.role
        ));
    }

    let all = taskcard::load_cards(&tasks_dir).unwrap_or_default();
    let waiting: Vec<String> = open_dependencies(&card, &all)
        .into_iter()
        .map(String::from)
        .collect();

    match taskcard::set_card_status(&path, TaskStatus::InProgress) {
        Ok(card) => {
            let mut result = CommandResult::ok(format!("{} is in progress", card.id))
                .with_serialized("card", &card);
            if !waiting.is_empty() {
                warn!(card = %card.id, ?waiting, "started before dependencies finished");
                result = result.with("waiting_on", json!(waiting));
            }
            result
        }
        Err(e) => CommandResult::failure(e.kind(), e.to_string()),
    }
}

pub(super) fn start_next(cmd: &Command, ctx: &Context) -> CommandResult {
    let tasks_dir = ctx.tasks_dir();
    let all = match taskcard::load_cards(&tasks_dir) {
        Ok(cards) => cards,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };

    let ready: Vec<&TaskCard> = all
        .iter()
        .filter(|c| c.role == cmd.role && c.status == TaskStatus::ReadyToStart)
        .collect();
    let Some(next) = ready
        .iter()
        .find(|c| open_dependencies(c, &all).is_empty())
    else {
        let message = if ready.is_empty() {
            format!("no ready-to-start card for role '{}'", cmd.role)
        } else {
            format!(
                "{} card(s) ready for role '{}' but waiting on dependencies",
                ready.len(),
                cmd.role
            )
        };
        return CommandResult::failure(ErrorKind::NotFound, message);
    };

    let path = tasks_dir.join(format!("{}.md", next.id));
    match taskcard::set_card_status(&path, TaskStatus::InProgress) {
        Ok(card) => CommandResult::ok(format!("{} is in progress", card.id))
            .with_serialized("card", &card),
        Err(e) => CommandResult::failure(e.kind(), e.to_string()),
    }
}
