use clap::Args;

/// Configuration overrides taken from the command line.
#[derive(Debug, Default, Clone, Args)]
pub struct CliArgs {
    /// Path to config file (defaults to convoy.toml at the repo root).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Trunk branch integration targets are created from.
    #[arg(long, global = true)]
    pub trunk: Option<String>,
    /// Directory holding status records.
    #[arg(long, global = true)]
    pub agent_sync_dir: Option<String>,
    /// Directory holding task cards.
    #[arg(long, global = true)]
    pub tasks_dir: Option<String>,
    /// TOML file listing allocatable targets.
    #[arg(long, global = true)]
    pub targets_file: Option<String>,
    /// Root directory for workspaces.
    #[arg(long, global = true)]
    pub workspace_root: Option<String>,
    /// Do not append to the command journal.
    #[arg(long, global = true)]
    pub no_journal: bool,
}
