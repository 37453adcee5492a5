//! Post-integration gates.
//!
//! Gates run after every record has been processed, against the state of
//! the integration worktree. They are advisory: a failing gate is reported
//! and nothing is reverted.

use std::path::Path;
use std::process::Command;

use serde::Serialize;
use tracing::debug;

use super::AppliedEntry;
use crate::config::GateConfig;
use crate::git;

/// Verdict of one gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateOutcome {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// What a gate gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    /// Worktree holding the integrated state.
    pub worktree: &'a Path,
    pub target_branch: &'a str,
    /// Records applied in this run.
    pub applied: &'a [AppliedEntry],
}

pub trait Gate {
    fn name(&self) -> &str;
    fn run(&self, ctx: &GateContext<'_>) -> GateOutcome;
}

/// Runs `sh -c <command>` in the integration worktree; passes on exit 0.
#[derive(Debug, Clone)]
pub struct CommandGate {
    name: String,
    command: String,
}

impl CommandGate {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
        }
    }
}

impl From<&GateConfig> for CommandGate {
    fn from(config: &GateConfig) -> Self {
        Self::new(&config.name, &config.command)
    }
}

impl Gate for CommandGate {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &GateContext<'_>) -> GateOutcome {
        debug!(gate = %self.name, command = %self.command, "running gate");
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(ctx.worktree)
            .env("CONVOY_TARGET_BRANCH", ctx.target_branch)
            .output();

        let (passed, detail) = match output {
            Err(e) => (false, format!("failed to run '{}': {}", self.command, e)),
            Ok(o) if o.status.success() => (true, "exit 0".to_string()),
            Ok(o) => {
                let code = o
                    .status
                    .code()
                    .map(|c| format!("exit {}", c))
                    .unwrap_or_else(|| "terminated by signal".to_string());
                let stderr = String::from_utf8_lossy(&o.stderr);
                match stderr.lines().rev().find(|l| !l.trim().is_empty()) {
                    Some(last) => (false, format!("{}: {}", code, last.trim())),
                    None => (false, code),
                }
            }
        };

        GateOutcome {
            name: self.name.clone(),
            passed,
            detail,
        }
    }
}

/// Every deliverable declared by an applied record must exist in the
/// integrated tree.
#[derive(Debug, Clone, Default)]
pub struct DeliverablesGate;

impl Gate for DeliverablesGate {
    fn name(&self) -> &str {
        "deliverables"
    }

    fn run(&self, ctx: &GateContext<'_>) -> GateOutcome {
        let mut checked = 0;
        let mut missing = Vec::new();
        for entry in ctx.applied {
            for path in &entry.deliverables {
                checked += 1;
                match git::object_exists(ctx.worktree, "HEAD", path) {
                    Ok(true) => {}
                    Ok(false) => missing.push(path.clone()),
                    Err(e) => missing.push(format!("{} ({})", path, e)),
                }
            }
        }

        let (passed, detail) = if !missing.is_empty() {
            (false, format!("missing: {}", missing.join(", ")))
        } else if checked == 0 {
            (true, "no deliverables declared".to_string())
        } else {
            (true, format!("{} deliverable(s) present", checked))
        };

        GateOutcome {
            name: self.name().to_string(),
            passed,
            detail,
        }
    }
}

/// Configured command gates in declaration order, then the deliverables
/// check.
pub fn gates_from_config(configs: &[GateConfig]) -> Vec<Box<dyn Gate>> {
    let mut gates: Vec<Box<dyn Gate>> = configs
        .iter()
        .map(|c| Box::new(CommandGate::from(c)) as Box<dyn Gate>)
        .collect();
    gates.push(Box::new(DeliverablesGate));
    gates
}
