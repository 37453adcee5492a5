use std::collections::BTreeMap;

use serde_json::json;

use super::{invalid, scanner};
use crate::command::{Command, CommandResult};
use crate::context::Context;
use crate::memo::{MemoStatus, StatusRecord};
use crate::taskcard::{self, TaskCard, TaskStatus};

fn status_counts<'a, I>(statuses: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = BTreeMap::new();
    for status in statuses {
        *counts.entry(status.to_string()).or_insert(0) += 1;
    }
    counts
}

pub(super) fn scan_memos(cmd: &Command, ctx: &Context) -> CommandResult {
    let scanner = scanner(ctx);
    let scanned = match cmd.arg(0) {
        None => scanner.scan(),
        Some(raw) => match raw.parse::<MemoStatus>() {
            Ok(status) => scanner.scan_by_status(status),
            Err(e) => return invalid(e),
        },
    };
    let records = match scanned {
        Ok(records) => records,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };

    let counts = status_counts(records.iter().map(|r| r.status.as_str()));
    let problems: BTreeMap<&str, Vec<String>> = records
        .iter()
        .map(|r| (r.filename.as_str(), r.validate()))
        .filter(|(_, p)| !p.is_empty())
        .collect();

    let breakdown: Vec<String> = counts.iter().map(|(s, n)| format!("{} {}", n, s)).collect();
    let mut message = format!("{} status record(s)", records.len());
    if !breakdown.is_empty() {
        message.push_str(&format!(": {}", breakdown.join(", ")));
    }
    CommandResult::ok(message)
        .with("counts", json!(counts))
        .with("problems", json!(problems))
        .with_serialized("records", &records)
}

pub(super) fn monitor_progress(cmd: &Command, ctx: &Context) -> CommandResult {
    let iteration = cmd.arg(0);
    let cards = match taskcard::load_cards(&ctx.tasks_dir()) {
        Ok(cards) => cards,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };
    let cards: Vec<TaskCard> = cards
        .into_iter()
        .filter(|c| iteration.map(|it| c.iteration == it).unwrap_or(true))
        .collect();
    let records = match scanner(ctx).scan() {
        Ok(records) => records,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };

    let mut card_counts: BTreeMap<String, usize> = TaskStatus::all()
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
    for card in &cards {
        *card_counts.entry(card.status.as_str().to_string()).or_insert(0) += 1;
    }
    let mut by_role: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
    for card in &cards {
        *by_role
            .entry(card.role.as_str())
            .or_default()
            .entry(card.status.as_str())
            .or_insert(0) += 1;
    }
    let memo_counts = status_counts(records.iter().map(|r| r.status.as_str()));

    let done = cards
        .iter()
        .filter(|c| matches!(c.status, TaskStatus::ReadyToConsume | TaskStatus::Completed))
        .count();
    let scope = iteration
        .map(|it| format!("iteration {}", it))
        .unwrap_or_else(|| "all iterations".to_string());
    CommandResult::ok(format!(
        "{}: {}/{} card(s) done, {} status record(s)",
        scope,
        done,
        cards.len(),
        records.len()
    ))
    .with("cards", json!(card_counts))
    .with("by_role", json!(by_role))
    .with("memos", json!(memo_counts))
}

pub(super) fn report_token_usage(cmd: &Command, ctx: &Context) -> CommandResult {
    let records = match scanner(ctx).scan() {
        Ok(records) => records,
        Err(e) => return CommandResult::failure(e.kind(), e.to_string()),
    };
    let own: Vec<&StatusRecord> = records
        .iter()
        .filter(|r| r.role.as_deref() == Some(cmd.role.as_str()))
        .collect();
    let used: u64 = own
        .iter()
        .filter_map(|r| r.token_usage.map(|u| u.used))
        .sum();
    let budget = ctx
        .config
        .role(&cmd.role)
        .map(|r| r.token_budget)
        .unwrap_or(0);
    let over = used > budget;

    CommandResult::ok(format!(
        "{}: {} of {} tokens used across {} record(s){}",
        cmd.role,
        used,
        budget,
        own.len(),
        if over { " (over budget)" } else { "" }
    ))
    .with("used", used)
    .with("budget", budget)
    .with("remaining", budget.saturating_sub(used))
    .with("records", own.len())
    .with("over_budget", over)
}
