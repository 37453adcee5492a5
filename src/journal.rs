//! Command journal writer and reader.
//!
//! Every dispatched command is appended with the format:
//! `YYYY-MM-DD HH:MM:SS | <actor> | <message>`

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::command::{Command, CommandResult};

/// Format a journal entry.
///
/// # Examples
/// ```
/// use convoy::journal::format_entry;
/// let entry = format_entry("integrator", "applied 2 record(s)");
/// assert!(entry.contains("| integrator | applied 2 record(s)"));
/// ```
pub fn format_entry(actor: &str, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format_entry_with_timestamp(&timestamp.to_string(), actor, message)
}

/// Format an entry with a caller-supplied timestamp.
pub fn format_entry_with_timestamp(timestamp: &str, actor: &str, message: &str) -> String {
    // Entries are single-line; flatten anything a handler message smuggles in.
    let message = message.replace('\n', " ");
    format!("{} | {} | {}", timestamp, actor, message)
}

/// Append an entry, creating the file and its parent directory if needed.
pub fn write_entry<P: AsRef<Path>>(path: P, actor: &str, message: &str) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", format_entry(actor, message))
}

/// Record a dispatched command and its outcome.
pub fn record_dispatch<P: AsRef<Path>>(
    path: P,
    cmd: &Command,
    result: &CommandResult,
) -> io::Result<()> {
    let outcome = match (result.success, result.error) {
        (true, _) => "ok".to_string(),
        (false, Some(kind)) => format!("failed ({})", kind),
        (false, None) => "failed".to_string(),
    };
    let message = format!("{} -> {}: {}", cmd, outcome, result.message);
    write_entry(path, &cmd.role, &message)
}

/// Read the last `count` lines.
pub fn read_recent<P: AsRef<Path>>(path: P, count: usize) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

    if lines.len() <= count {
        Ok(lines)
    } else {
        Ok(lines[lines.len() - count..].to_vec())
    }
}

/// Read all entries written by one actor.
pub fn read_from_actor<P: AsRef<Path>>(path: P, actor: &str) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let lines = reader
        .lines()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|line| parse_line(line).map_or(false, |(_, a, _)| a == actor))
        .collect();
    Ok(lines)
}

/// Parse a journal line into (timestamp, actor, message).
pub fn parse_line(line: &str) -> Option<(&str, &str, &str)> {
    let parts: Vec<&str> = line.splitn(3, " | ").collect();
    if parts.len() != 3 {
        return None;
    }
    Some((parts[0], parts[1], parts[2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_format_entry_with_timestamp() {
        let entry = format_entry_with_timestamp("2026-01-10 09:00:00", "integrator", "hello");
        assert_eq!(entry, "2026-01-10 09:00:00 | integrator | hello");
    }

    #[test]
    fn test_format_entry_flattens_newlines() {
        let entry = format_entry_with_timestamp("t", "a", "line one\nline two");
        assert_eq!(entry, "t | a | line one line two");
    }

    #[test]
    fn test_write_entry_creates_parent_dir() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("runtime").join("journal.log");

        write_entry(&path, "orchestrator", "first").unwrap();
        write_entry(&path, "orchestrator", "second").unwrap();

        let lines = read_recent(&path, 10).unwrap();
        assert_eq!(lines.len(), 2);
        let (_, actor, message) = parse_line(&lines[1]).unwrap();
        assert_eq!(actor, "orchestrator");
        assert_eq!(message, "second");
    }

    #[test]
    fn test_read_recent_returns_tail() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("journal.log");
        for i in 0..5 {
            write_entry(&path, "a", &format!("entry {}", i)).unwrap();
        }
        let lines = read_recent(&path, 2).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("entry 3"));
        assert!(lines[1].ends_with("entry 4"));
    }

    #[test]
    fn test_read_from_actor_filters() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("journal.log");
        write_entry(&path, "integrator", "one").unwrap();
        write_entry(&path, "orchestrator", "two").unwrap();
        write_entry(&path, "integrator", "three").unwrap();

        let lines = read_from_actor(&path, "integrator").unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("three"));
    }

    #[test]
    fn test_record_dispatch_outcomes() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("journal.log");
        let cmd = parse("/integrator::apply_ready(dry-run)").unwrap();

        record_dispatch(&path, &cmd, &CommandResult::ok("nothing to do")).unwrap();
        record_dispatch(
            &path,
            &cmd,
            &CommandResult::failure(ErrorKind::VcsError, "git exploded"),
        )
        .unwrap();

        let lines = read_recent(&path, 10).unwrap();
        let (_, actor, first) = parse_line(&lines[0]).unwrap();
        assert_eq!(actor, "integrator");
        assert_eq!(first, "/integrator::apply_ready(dry-run) -> ok: nothing to do");
        let (_, _, second) = parse_line(&lines[1]).unwrap();
        assert!(second.contains("failed (vcs_error)"), "got: {}", second);
    }

    #[test]
    fn test_parse_line_invalid() {
        assert!(parse_line("no separators here").is_none());
        assert!(parse_line("only | one").is_none());
    }
}
