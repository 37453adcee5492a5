use std::env;

use super::types::Config;

pub(super) fn apply_env(config: &mut Config) {
    if let Ok(val) = env::var("CONVOY_TRUNK_BRANCH") {
        config.trunk_branch = Some(val);
    }
    if let Ok(val) = env::var("CONVOY_AGENT_SYNC_DIR") {
        config.agent_sync_dir = val;
    }
    if let Ok(val) = env::var("CONVOY_TASKS_DIR") {
        config.tasks_dir = val;
    }
    if let Ok(val) = env::var("CONVOY_TARGETS_FILE") {
        config.targets_file = val;
    }
    if let Ok(val) = env::var("CONVOY_JOURNAL") {
        config.journal_file = if val.trim().is_empty() { None } else { Some(val) };
    }
    if let Ok(val) = env::var("CONVOY_WORKSPACE_ROOT") {
        config.workspace_root = Some(val);
    }
    if let Ok(val) = env::var("CONVOY_BRANCH_PREFIX") {
        config.branch_prefix = val;
    }
    if let Ok(val) = env::var("CONVOY_TARGET_BRANCH_PATTERN") {
        config.target_branch_pattern = val;
    }
}
