use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{ArchiveSummary, TaskCard, TaskCardError, TaskIndex, TaskStatus, ARCHIVE_DIR};
use crate::memo::{read_field, read_list, replace_field_value};

fn io_error(path: &Path, e: io::Error) -> TaskCardError {
    TaskCardError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn render_list(out: &mut String, label: &str, items: &[String]) {
    out.push_str(&format!("- **{}**:\n", label));
    for item in items {
        out.push_str(&format!("  - `{}`\n", item));
    }
}

fn render_card(card: &TaskCard) -> String {
    let mut out = format!("# Task card {}\n\n", card.id);
    out.push_str(&format!("- **ID**: `{}`\n", card.id));
    out.push_str(&format!("- **Role**: `{}`\n", card.role));
    out.push_str(&format!("- **Status**: `{}`\n", card.status));
    out.push_str(&format!("- **Iteration**: `{}`\n", card.iteration));
    out.push_str(&format!("- **Work Item**: `{}`\n", card.work_item_ref));
    out.push_str(&format!("- **Instance**: {}\n", card.instance));
    render_list(&mut out, "Dependencies", &card.dependencies);
    render_list(&mut out, "Deliverables", &card.deliverables);
    out
}

fn parse_card(path: &Path, content: &str) -> Result<TaskCard, TaskCardError> {
    let field = |label: &'static str, name: &'static str| {
        read_field(content, label).ok_or_else(|| TaskCardError::MissingField {
            path: path.to_path_buf(),
            field: name,
        })
    };

    let status_text = field("Status", "status")?;
    let status = status_text
        .parse::<TaskStatus>()
        .map_err(|_| TaskCardError::InvalidStatus {
            path: path.to_path_buf(),
            value: status_text.clone(),
        })?;

    Ok(TaskCard {
        id: field("ID", "id")?,
        role: field("Role", "role")?,
        status,
        iteration: read_field(content, "Iteration").unwrap_or_default(),
        work_item_ref: field("Work Item", "work_item")?,
        instance: read_field(content, "Instance")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        dependencies: read_list(content, "Dependencies"),
        deliverables: read_list(content, "Deliverables"),
    })
}

/// `<dir>/<date>_<iteration>_INDEX.json`.
pub fn index_path(dir: &Path, index: &TaskIndex) -> PathBuf {
    dir.join(format!(
        "{}_{}_INDEX.json",
        index.date.format("%Y-%m-%d"),
        index.iteration
    ))
}

/// Write every card as `<id>.md` plus the iteration index.
///
/// Existing card files are never overwritten; an existing index for the
/// same date and iteration is extended. Returns the paths written, index
/// last.
pub fn write_cards(
    dir: &Path,
    cards: &[TaskCard],
    index: &TaskIndex,
) -> Result<Vec<PathBuf>, TaskCardError> {
    fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;

    let mut written = Vec::with_capacity(cards.len() + 1);
    for card in cards {
        let path = dir.join(format!("{}.md", card.id));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| io_error(&path, e))?;
        file.write_all(render_card(card).as_bytes())
            .map_err(|e| io_error(&path, e))?;
        debug!(card = %card.id, "task card written");
        written.push(path);
    }

    let path = index_path(dir, index);
    let merged = merge_index(&path, index)?;
    let json = serde_json::to_string_pretty(&merged).map_err(|e| TaskCardError::Io {
        path: path.clone(),
        message: e.to_string(),
    })?;
    fs::write(&path, json + "\n").map_err(|e| io_error(&path, e))?;
    info!(
        iteration = %index.iteration,
        cards = cards.len(),
        dir = %dir.display(),
        "task cards written"
    );
    written.push(path);
    Ok(written)
}

/// Entries already recorded for the same date and iteration are kept.
fn merge_index(path: &Path, index: &TaskIndex) -> Result<TaskIndex, TaskCardError> {
    if !path.exists() {
        return Ok(index.clone());
    }
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    let mut merged: TaskIndex = serde_json::from_str(&content).map_err(|e| TaskCardError::Io {
        path: path.to_path_buf(),
        message: format!("invalid index: {}", e),
    })?;
    for entry in &index.entries {
        if !merged.entries.iter().any(|e| e.id == entry.id) {
            merged.entries.push(entry.clone());
        }
    }
    merged
        .entries
        .sort_by(|a, b| (&a.role, sequence(&a.id)).cmp(&(&b.role, sequence(&b.id))));
    Ok(merged)
}

/// Trailing `-<NN>` of a card id.
fn sequence(id: &str) -> usize {
    id.rsplit('-')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub fn load_card(path: &Path) -> Result<TaskCard, TaskCardError> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TaskCardError::NotFound(path.to_path_buf()),
        _ => io_error(path, e),
    })?;
    parse_card(path, &content)
}

/// Every card in `dir`, sorted by role then id. Markdown files that are not
/// cards are skipped; a missing directory holds no cards.
pub fn load_cards(dir: &Path) -> Result<Vec<TaskCard>, TaskCardError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| io_error(dir, e))?;

    let mut cards = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| io_error(dir, e))?.path();
        let is_markdown = path.extension().map(|e| e == "md").unwrap_or(false);
        if !path.is_file() || !is_markdown {
            continue;
        }
        match load_card(&path) {
            Ok(card) => cards.push(card),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    cards.sort_by(|a, b| (&a.role, &a.id).cmp(&(&b.role, &b.id)));
    Ok(cards)
}

/// Move the card at `path` to `status`, rewriting only the status value.
pub fn set_card_status(path: &Path, status: TaskStatus) -> Result<TaskCard, TaskCardError> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => TaskCardError::NotFound(path.to_path_buf()),
        _ => io_error(path, e),
    })?;
    let mut card = parse_card(path, &content)?;

    if !card.status.can_transition_to(status) {
        return Err(TaskCardError::InvalidTransition {
            id: card.id,
            from: card.status,
            to: status,
        });
    }

    let updated = replace_field_value(&content, "Status", status.as_str()).ok_or_else(|| {
        TaskCardError::MissingField {
            path: path.to_path_buf(),
            field: "status",
        }
    })?;
    fs::write(path, updated).map_err(|e| io_error(path, e))?;

    info!(card = %card.id, from = %card.status, to = %status, "task card status changed");
    card.status = status;
    Ok(card)
}

/// Latest `<date>_<iteration>_INDEX.json` in `dir`, by name.
pub fn latest_index(dir: &Path, iteration: &str) -> Result<Option<PathBuf>, TaskCardError> {
    if !dir.exists() {
        return Ok(None);
    }
    let suffix = format!("_{}_INDEX.json", iteration);
    let entries = fs::read_dir(dir).map_err(|e| io_error(dir, e))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| io_error(dir, e))?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(&suffix))
            .unwrap_or(false);
        if matches && path.is_file() {
            found.push(path);
        }
    }
    found.sort();
    Ok(found.pop())
}

/// `<stem>.<n><ext>` for the first `n` not already taken.
fn free_destination(dir: &Path, name: &str) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }
    let (stem, ext) = match name.rfind('.') {
        Some(i) => (&name[..i], &name[i..]),
        None => (name, ""),
    };
    (1..)
        .map(|n| dir.join(format!("{}.{}{}", stem, n, ext)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Move the latest index for `iteration` and every card it lists into
/// `<dir>/_archive/<iteration>/<stamp>/`.
///
/// Nothing is overwritten: a name already present in the archive gets a
/// numeric suffix. Cards listed in the index but absent from `dir` are
/// reported as skipped. A dry run reports the same plan and touches nothing.
pub fn archive_cards(
    dir: &Path,
    iteration: &str,
    stamp: &str,
    dry_run: bool,
) -> Result<ArchiveSummary, TaskCardError> {
    let index_file = latest_index(dir, iteration)?.ok_or_else(|| TaskCardError::NoIndex {
        dir: dir.to_path_buf(),
        iteration: iteration.to_string(),
    })?;
    let content = fs::read_to_string(&index_file).map_err(|e| io_error(&index_file, e))?;
    let index: TaskIndex = serde_json::from_str(&content).map_err(|e| TaskCardError::Io {
        path: index_file.clone(),
        message: format!("invalid index: {}", e),
    })?;

    let archive_dir = dir.join(ARCHIVE_DIR).join(iteration).join(stamp);
    let mut summary = ArchiveSummary {
        iteration: iteration.to_string(),
        archive_dir: archive_dir.clone(),
        index: index_file.clone(),
        moved: Vec::new(),
        skipped: Vec::new(),
        dry_run,
    };

    let mut sources = vec![index_file];
    for entry in &index.entries {
        let card = dir.join(format!("{}.md", entry.id));
        if card.is_file() {
            if !sources.contains(&card) {
                sources.push(card);
            }
        } else {
            summary.skipped.push(card);
        }
    }

    if !dry_run {
        fs::create_dir_all(&archive_dir).map_err(|e| io_error(&archive_dir, e))?;
    }
    for src in sources {
        let name = src
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let dst = free_destination(&archive_dir, &name);
        if dry_run {
            summary.moved.push((src, dst));
            continue;
        }
        fs::rename(&src, &dst).map_err(|e| io_error(&src, e))?;
        debug!(from = %src.display(), to = %dst.display(), "archived");
        summary.moved.push((src, dst));
    }

    info!(
        iteration,
        moved = summary.moved.len(),
        skipped = summary.skipped.len(),
        dry_run,
        archive = %archive_dir.display(),
        "task cards archived"
    );
    Ok(summary)
}
