use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use super::{IndexEntry, TaskCard, TaskIndex, TaskStatus};
use crate::allocation::Allocation;
use crate::config::Role;

fn id_prefix(date: NaiveDate, role: &str) -> String {
    format!(
        "{}-{}-",
        date.format("%Y-%m-%d"),
        role.to_uppercase().replace('_', "-")
    )
}

/// `<date>-<ROLE>-<NN>`, e.g. `2026-01-10-BACKEND-DEVELOPER-03`.
pub fn card_id(date: NaiveDate, role: &str, sequence: usize) -> String {
    format!("{}{:02}", id_prefix(date, role), sequence)
}

/// Cards for every (role, target) in `allocations`, numbered from 01 per
/// role.
pub fn generate(
    iteration: &str,
    date: NaiveDate,
    allocations: &[(Role, Allocation)],
) -> (Vec<TaskCard>, TaskIndex) {
    generate_after(iteration, date, allocations, &[])
}

/// Like [`generate`], but numbering continues after the highest sequence
/// among `existing` cards with the same date and role.
pub fn generate_after(
    iteration: &str,
    date: NaiveDate,
    allocations: &[(Role, Allocation)],
    existing: &[TaskCard],
) -> (Vec<TaskCard>, TaskIndex) {
    let mut counters: HashMap<&str, usize> = HashMap::new();
    let mut cards = Vec::new();
    let mut sequences = Vec::new();

    for (role, allocation) in allocations {
        let counter = counters.entry(role.role_id.as_str()).or_insert_with(|| {
            let prefix = id_prefix(date, &role.role_id);
            existing
                .iter()
                .filter_map(|c| c.id.strip_prefix(&prefix)?.parse::<usize>().ok())
                .max()
                .unwrap_or(0)
        });

        for group in &allocation.groups {
            for target in &group.targets {
                *counter += 1;
                sequences.push(*counter);
                cards.push(TaskCard {
                    id: card_id(date, &role.role_id, *counter),
                    role: role.role_id.clone(),
                    status: TaskStatus::ReadyToStart,
                    iteration: iteration.to_string(),
                    work_item_ref: target.id.clone(),
                    instance: group.index,
                    dependencies: Vec::new(),
                    deliverables: role.deliverables.clone(),
                });
            }
        }
    }

    let mut ids_by_role: HashMap<String, Vec<String>> = HashMap::new();
    for card in &cards {
        ids_by_role
            .entry(card.role.clone())
            .or_default()
            .push(card.id.clone());
    }
    let depends_on: HashMap<&str, &[String]> = allocations
        .iter()
        .map(|(role, _)| (role.role_id.as_str(), role.depends_on.as_slice()))
        .collect();

    for card in &mut cards {
        let upstream = depends_on.get(card.role.as_str()).copied().unwrap_or(&[]);
        let deps: BTreeSet<String> = upstream
            .iter()
            .filter_map(|role| ids_by_role.get(role))
            .flatten()
            .filter(|id| **id != card.id)
            .cloned()
            .collect();
        card.dependencies = deps.into_iter().collect();
    }

    let mut order: Vec<usize> = (0..cards.len()).collect();
    order.sort_by(|&a, &b| (&cards[a].role, sequences[a]).cmp(&(&cards[b].role, sequences[b])));
    let entries = order
        .into_iter()
        .map(|i| IndexEntry {
            id: cards[i].id.clone(),
            role: cards[i].role.clone(),
            status: cards[i].status,
            work_item_ref: cards[i].work_item_ref.clone(),
        })
        .collect();

    let index = TaskIndex {
        iteration: iteration.to_string(),
        date,
        entries,
    };
    (cards, index)
}
