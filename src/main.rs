use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use convoy::command::{CommandResult, Dispatcher};
use convoy::config::{CliArgs, Config, DEFAULT_CONFIG_FILE};
use convoy::context::Context;
use convoy::handlers::build_dispatcher;
use convoy::journal;

/// Command dispatch and convergence engine for role-based worker fleets.
#[derive(Debug, Parser)]
#[command(name = "convoy", version)]
struct Cli {
    #[command(flatten)]
    config: CliArgs,

    /// Repository root (defaults to the current directory).
    #[arg(long, global = true)]
    repo: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Parse, validate and run one command line.
    Execute { line: String },
    /// Parse and validate one command line without running it.
    Validate { line: String },
    /// List registered commands.
    List {
        #[arg(long)]
        role: Option<String>,
    },
    /// Read command lines from stdin until EOF or `quit`.
    Interactive,
    /// Write a default convoy.toml at the repository root.
    Init,
    /// Show recent journal entries.
    Journal {
        #[arg(long, default_value_t = 20)]
        lines: usize,
        #[arg(long)]
        actor: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CONVOY_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let repo_root = match cli.repo.clone() {
        Some(path) => path,
        None => match env::current_dir() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("error: cannot read current directory: {}", e);
                process::exit(1);
            }
        },
    };

    let ok = match run(&cli, &repo_root) {
        Ok(ok) => ok,
        Err(e) => {
            eprintln!("error: {}", e);
            false
        }
    };
    if !ok {
        process::exit(1);
    }
}

/// Ok(false) means a command ran and reported failure.
fn run(cli: &Cli, repo_root: &Path) -> Result<bool, String> {
    if let CliCommand::Init = cli.command {
        return cmd_init(repo_root);
    }

    let config = Config::load(&cli.config, repo_root).map_err(|e| e.to_string())?;
    let ctx = Context::new(repo_root, config);
    let dispatcher = build_dispatcher(&ctx.config).map_err(|e| e.to_string())?;

    match &cli.command {
        CliCommand::Execute { line } => {
            let result = dispatcher.dispatch(line, &ctx);
            print_result(&result, cli.json);
            Ok(result.success)
        }
        CliCommand::Validate { line } => match dispatcher.check(line) {
            Ok(cmd) => {
                let result = CommandResult::ok(format!("{} is valid", cmd))
                    .with("role", cmd.role.as_str())
                    .with("command", cmd.command.as_str())
                    .with("args", cmd.args.clone());
                print_result(&result, cli.json);
                Ok(true)
            }
            Err(result) => {
                print_result(&result, cli.json);
                Ok(false)
            }
        },
        CliCommand::List { role } => {
            cmd_list(&dispatcher, role.as_deref(), cli.json);
            Ok(true)
        }
        CliCommand::Interactive => cmd_interactive(&dispatcher, &ctx, cli.json),
        CliCommand::Journal { lines, actor } => cmd_journal(&ctx, *lines, actor.as_deref()),
        CliCommand::Init => cmd_init(repo_root),
    }
}

fn print_result(result: &CommandResult, json: bool) {
    if json {
        match serde_json::to_string(result) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("error: cannot serialize result: {}", e),
        }
        return;
    }
    if result.success {
        println!("{}", result.message);
    } else {
        let kind = result.error.map(|k| k.as_str()).unwrap_or("error");
        println!("{}: {}", kind, result.message);
    }
}

fn cmd_list(dispatcher: &Dispatcher, role: Option<&str>, json: bool) {
    let schemas = dispatcher.schemas().schemas(role);
    if json {
        let rows: Vec<serde_json::Value> = schemas
            .iter()
            .map(|s| {
                serde_json::json!({
                    "role": s.role,
                    "command": s.command,
                    "min_args": s.min_args,
                    "max_args": s.max_args,
                    "usage": s.usage,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(rows));
        return;
    }
    for schema in schemas {
        println!("{:<48} {}", format!("/{}::{}", schema.role, schema.command), schema.usage);
    }
}

fn cmd_interactive(dispatcher: &Dispatcher, ctx: &Context, json: bool) -> Result<bool, String> {
    let stdin = io::stdin();
    let mut all_ok = true;
    loop {
        print!("convoy> ");
        io::stdout().flush().map_err(|e| e.to_string())?;

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(|e| e.to_string())?;
        if read == 0 {
            println!();
            break;
        }
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" | "list" => {
                cmd_list(dispatcher, None, json);
                continue;
            }
            _ => {}
        }

        let result = dispatcher.dispatch(line, ctx);
        all_ok &= result.success;
        print_result(&result, json);
    }
    Ok(all_ok)
}

fn cmd_init(repo_root: &Path) -> Result<bool, String> {
    let path = repo_root.join(DEFAULT_CONFIG_FILE);
    if path.exists() {
        println!("Config already exists: {}", path.display());
        return Ok(true);
    }
    fs::write(&path, Config::default_toml())
        .map_err(|e| format!("failed to create {}: {}", path.display(), e))?;
    println!("Created {}", path.display());
    Ok(true)
}

fn cmd_journal(ctx: &Context, lines: usize, actor: Option<&str>) -> Result<bool, String> {
    let Some(path) = ctx.journal_path() else {
        println!("journal disabled");
        return Ok(true);
    };
    if !path.exists() {
        println!("no journal at {}", path.display());
        return Ok(true);
    }
    let entries: Vec<String> = match actor {
        Some(actor) => {
            let all = journal::read_from_actor(&path, actor).map_err(|e| e.to_string())?;
            let skip = all.len().saturating_sub(lines);
            all.into_iter().skip(skip).collect()
        }
        None => journal::read_recent(&path, lines).map_err(|e| e.to_string())?,
    };
    for entry in entries {
        println!("{}", entry);
    }
    Ok(true)
}
