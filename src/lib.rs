//! Convoy: command dispatch and convergence for role-based worker fleets.
//!
//! Workers are addressed with `/<role>::<command>(<args>)` lines. Around
//! that protocol sit the engines the commands drive:
//! - `allocation` - partition targets across worker instances of a role
//! - `workspace` - one branch + git worktree per (role, task)
//! - `memo` - status records workers leave in the agent-sync directory
//! - `integration` - apply ready records to a target branch, then run gates
//! - `taskcard` - task cards and iteration indexes generated from allocations
//!
//! Runtime artifacts live under `.orchestration/runtime/` by default:
//! - `agent-sync/` - status records
//! - `agent-sync/tasks/` - task cards and `<date>_<iteration>_INDEX.json`
//! - `targets.toml` - allocatable targets
//! - `journal.log` - one line per dispatched command

pub mod allocation;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod handlers;
pub mod integration;
pub mod journal;
pub mod memo;
pub mod taskcard;
#[doc(hidden)]
pub mod testutil;
pub mod workspace;
