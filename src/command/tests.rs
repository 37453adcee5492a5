use std::path::Path;

use tempfile::TempDir;

use super::*;
use crate::config::Config;
use crate::context::Context;
use crate::error::ErrorKind;
use crate::journal;

fn quiet_context() -> Context {
    let config = Config {
        journal_file: None,
        ..Config::default()
    };
    Context::new(Path::new("/nonexistent"), config)
}

fn sample_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry
        .register(CommandSchema::new("orchestrator", "start_workflow", 3, Some(3)))
        .unwrap();
    registry
        .register(CommandSchema::new("orchestrator", "launch_agents", 1, Some(6)))
        .unwrap();
    registry
        .register(CommandSchema::new("integrator", "apply_ready", 0, Some(2)))
        .unwrap();
    registry
        .register(CommandSchema::new("integrator", "notify", 1, None))
        .unwrap();
    registry
        .register(CommandSchema::new("backend_developer", "start_next", 0, Some(0)))
        .unwrap();
    registry
}

#[test]
fn test_parse_with_args() {
    let cmd = parse("/orchestrator::start_workflow(user-story-refinement, phase-1, iter-1)").unwrap();
    assert_eq!(cmd.role, "orchestrator");
    assert_eq!(cmd.command, "start_workflow");
    assert_eq!(cmd.args, vec!["user-story-refinement", "phase-1", "iter-1"]);
    assert_eq!(
        cmd.raw,
        "/orchestrator::start_workflow(user-story-refinement, phase-1, iter-1)"
    );
}

#[test]
fn test_parse_without_parens() {
    let cmd = parse("  /integrator::apply_ready  ").unwrap();
    assert_eq!(cmd.role, "integrator");
    assert_eq!(cmd.command, "apply_ready");
    assert!(cmd.args.is_empty());
    assert_eq!(cmd.raw, "/integrator::apply_ready");
}

#[test]
fn test_parse_empty_and_blank_args() {
    assert!(parse("/integrator::apply_ready()").unwrap().args.is_empty());
    assert!(parse("/integrator::apply_ready( , )").unwrap().args.is_empty());
    assert_eq!(
        parse("/integrator::apply_ready(a,,b,)").unwrap().args,
        vec!["a", "b"]
    );
}

#[test]
fn test_parse_strips_quotes() {
    let cmd = parse(r#"/integrator::apply_ready("integration/x", 'dry-run')"#).unwrap();
    assert_eq!(cmd.args, vec!["integration/x", "dry-run"]);
}

#[test]
fn test_parse_rejects_malformed() {
    let inputs = [
        "",
        "not a command",
        "orchestrator::start",
        "/orchestrator:start",
        "/orchestrator::",
        "/::start",
        "/orch estrator::start",
        "/orchestrator::start(a",
        "/orchestrator::start(a)(b)",
        "/orchestrator::start(a) trailing",
        "/orchestrator::start(f(x))",
        "/rôle::start",
    ];
    for input in inputs {
        let err = parse(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedCommand, "input: {:?}", input);
        assert!(!is_command(input));
    }
}

#[test]
fn test_parse_error_names_input() {
    let err = parse("  hello world ").unwrap_err();
    assert_eq!(
        err,
        ParseError::MalformedCommand {
            input: "hello world".to_string()
        }
    );
    assert!(err.to_string().contains("'hello world'"));
}

#[test]
fn test_display_roundtrip() {
    let inputs = [
        "/integrator::apply_ready",
        "/integrator::apply_ready()",
        "/integrator::apply_ready(dry-run)",
        "/orchestrator::start_workflow( a ,b,  c )",
        "/qa-engineer::start_task(\"US-E01-010\")",
        "/backend_developer::start_next",
    ];
    for input in inputs {
        let cmd = parse(input).unwrap();
        let reparsed = parse(&cmd.to_string()).unwrap();
        assert_eq!(reparsed.role, cmd.role);
        assert_eq!(reparsed.command, cmd.command);
        assert_eq!(reparsed.args, cmd.args, "input: {}", input);
    }
    assert_eq!(
        parse("/a::b( x , y )").unwrap().to_string(),
        "/a::b(x, y)"
    );
    assert_eq!(parse("/a::b()").unwrap().to_string(), "/a::b");
}

#[test]
fn test_command_flag_helpers() {
    let cmd = parse("/integrator::apply_ready(dry-run, integration/x)").unwrap();
    assert!(cmd.has_flag("dry-run"));
    assert_eq!(cmd.args_without("dry-run"), vec!["integration/x"]);
    assert_eq!(cmd.arg(1), Some("integration/x"));
    assert_eq!(cmd.arg(2), None);
}

#[test]
fn test_validate_accepts_in_range() {
    let registry = sample_registry();
    let cmd = parse("/orchestrator::start_workflow(a, b, c)").unwrap();
    let schema = registry.validate(&cmd).unwrap();
    assert_eq!(schema.command, "start_workflow");
    assert!(registry.validate(&parse("/integrator::notify(a, b, c, d, e)").unwrap()).is_ok());
}

#[test]
fn test_validate_unknown_role_and_command() {
    let registry = sample_registry();
    let err = registry.validate(&parse("/invalid::command").unwrap()).unwrap_err();
    assert_eq!(
        err,
        ValidationError::UnknownRole {
            role: "invalid".to_string()
        }
    );
    assert_eq!(err.kind(), ErrorKind::UnknownRole);

    let err = registry
        .validate(&parse("/integrator::explode").unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownCommand);
    assert!(err.to_string().contains("explode"));
}

#[test]
fn test_validate_arg_count_mismatch_message() {
    let registry = sample_registry();
    let err = registry
        .validate(&parse("/orchestrator::start_workflow(a)").unwrap())
        .unwrap_err();
    assert_eq!(
        err,
        ValidationError::ArgCountMismatch {
            role: "orchestrator".to_string(),
            command: "start_workflow".to_string(),
            expected: "exactly 3".to_string(),
            got: 1,
        }
    );
    assert_eq!(
        err.to_string(),
        "/orchestrator::start_workflow takes exactly 3 args, got 1"
    );
}

#[test]
fn test_validate_rejects_every_out_of_range_count() {
    let registry = sample_registry();
    for schema in registry.schemas(None) {
        let upper = schema.max_args.unwrap_or(schema.min_args + 3) + 2;
        for count in 0..=upper {
            let args: Vec<String> = (0..count).map(|i| format!("a{}", i)).collect();
            let text = if args.is_empty() {
                format!("/{}::{}", schema.role, schema.command)
            } else {
                format!("/{}::{}({})", schema.role, schema.command, args.join(", "))
            };
            let cmd = parse(&text).unwrap();
            let in_range =
                count >= schema.min_args && schema.max_args.map_or(true, |max| count <= max);
            match registry.validate(&cmd) {
                Ok(_) => assert!(in_range, "{} accepted {} args", schema.command, count),
                Err(err) => {
                    assert!(!in_range, "{} rejected {} args", schema.command, count);
                    assert_eq!(err.kind(), ErrorKind::ArgCountMismatch);
                }
            }
        }
    }
}

#[test]
fn test_schema_duplicate_rejected() {
    let mut registry = sample_registry();
    let err = registry
        .register(CommandSchema::new("integrator", "apply_ready", 0, Some(1)))
        .unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateSchema { .. }));
}

#[test]
fn test_schema_expected_and_synopsis() {
    assert_eq!(CommandSchema::new("r", "c", 1, Some(1)).expected(), "exactly 1");
    assert_eq!(CommandSchema::new("r", "c", 0, Some(2)).expected(), "0-2");
    assert_eq!(CommandSchema::new("r", "c", 1, None).expected(), "at least 1");
    assert_eq!(
        CommandSchema::new("r", "c", 0, Some(2))
            .with_usage("[target][, dry-run]")
            .synopsis(),
        "/r::c([target][, dry-run])"
    );
}

#[test]
fn test_router_routes_to_handler() {
    let mut router = CommandRouter::new();
    router
        .register("integrator", "apply_ready", |cmd, _ctx| {
            CommandResult::ok(format!("{} args", cmd.args.len())).with("echo", cmd.args.clone())
        })
        .unwrap();

    let ctx = quiet_context();
    let result = router.route(&parse("/integrator::apply_ready(x, y)").unwrap(), &ctx);
    assert!(result.success);
    assert_eq!(result.message, "2 args");
    assert_eq!(result.data["echo"], serde_json::json!(["x", "y"]));
    assert!(result.error.is_none());
}

#[test]
fn test_router_missing_handler_is_failed_result() {
    let router = CommandRouter::new();
    let ctx = quiet_context();
    let result = router.route(&parse("/integrator::apply_ready").unwrap(), &ctx);
    assert!(!result.success);
    assert_eq!(result.error, Some(ErrorKind::UnknownCommand));
    assert!(result.message.contains("No handler registered"));
}

#[test]
fn test_router_duplicate_handler() {
    let mut router = CommandRouter::new();
    router
        .register("integrator", "apply_ready", |_, _| CommandResult::ok("first"))
        .unwrap();
    let err = router
        .register("integrator", "apply_ready", |_, _| CommandResult::ok("second"))
        .unwrap_err();
    assert_eq!(
        err,
        RouterError::DuplicateHandler {
            role: "integrator".to_string(),
            command: "apply_ready".to_string()
        }
    );

    let ctx = quiet_context();
    let result = router.route(&parse("/integrator::apply_ready").unwrap(), &ctx);
    assert_eq!(result.message, "first");
}

#[test]
fn test_router_list_commands_sorted() {
    let mut router = CommandRouter::new();
    for (role, command) in [
        ("orchestrator", "scan_memos"),
        ("integrator", "distribute_tasks"),
        ("integrator", "apply_ready"),
        ("backend_developer", "start_next"),
    ] {
        router
            .register(role, command, |_, _| CommandResult::ok(""))
            .unwrap();
    }

    let all = router.list_commands(None);
    let expected: Vec<(String, String)> = [
        ("backend_developer", "start_next"),
        ("integrator", "apply_ready"),
        ("integrator", "distribute_tasks"),
        ("orchestrator", "scan_memos"),
    ]
    .iter()
    .map(|(r, c)| (r.to_string(), c.to_string()))
    .collect();
    assert_eq!(all, expected);

    let integrator = router.list_commands(Some("integrator"));
    assert_eq!(integrator.len(), 2);
    assert!(router.list_commands(Some("nobody")).is_empty());
}

#[test]
fn test_dispatcher_reports_each_failure_kind() {
    let mut dispatcher = Dispatcher::default();
    dispatcher
        .register(
            CommandSchema::new("integrator", "apply_ready", 0, Some(2)),
            |_, _| CommandResult::ok("applied"),
        )
        .unwrap();
    let ctx = quiet_context();

    let result = dispatcher.dispatch("garbage", &ctx);
    assert_eq!(result.error, Some(ErrorKind::MalformedCommand));

    let result = dispatcher.dispatch("/ghost::apply_ready", &ctx);
    assert_eq!(result.error, Some(ErrorKind::UnknownRole));

    let result = dispatcher.dispatch("/integrator::explode", &ctx);
    assert_eq!(result.error, Some(ErrorKind::UnknownCommand));

    let result = dispatcher.dispatch("/integrator::apply_ready(a, b, c)", &ctx);
    assert_eq!(result.error, Some(ErrorKind::ArgCountMismatch));

    let result = dispatcher.dispatch("/integrator::apply_ready", &ctx);
    assert!(result.success);
    assert_eq!(result.message, "applied");
}

#[test]
fn test_dispatcher_rejects_duplicate_registration() {
    let mut dispatcher = Dispatcher::default();
    let schema = CommandSchema::new("integrator", "apply_ready", 0, Some(2));
    dispatcher
        .register(schema.clone(), |_, _| CommandResult::ok(""))
        .unwrap();
    let err = dispatcher
        .register(schema, |_, _| CommandResult::ok(""))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateHandler);
}

#[test]
fn test_dispatcher_writes_journal() {
    let temp = TempDir::new().expect("temp dir");
    let config = Config {
        journal_file: Some("journal.log".to_string()),
        ..Config::default()
    };
    let ctx = Context::new(temp.path(), config);

    let mut dispatcher = Dispatcher::default();
    dispatcher
        .register(CommandSchema::new("orchestrator", "ping", 0, Some(0)), |_, _| {
            CommandResult::ok("pong")
        })
        .unwrap();

    dispatcher.dispatch("/orchestrator::ping", &ctx);
    // Rejected commands never reach the journal.
    dispatcher.dispatch("/orchestrator::ping(extra)", &ctx);

    let lines = journal::read_recent(temp.path().join("journal.log"), 10).unwrap();
    assert_eq!(lines.len(), 1);
    let (_, actor, message) = journal::parse_line(&lines[0]).unwrap();
    assert_eq!(actor, "orchestrator");
    assert_eq!(message, "/orchestrator::ping -> ok: pong");
}
