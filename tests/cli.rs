// tests/cli.rs

mod common;
use crate::common::{TestResult, init_tracing};

use clap::Parser;
use dataflow_verify::cli::{CliArgs, Command};
use dataflow_verify::run;

#[test]
fn exit_codes_parse_as_label_pairs() -> TestResult {
    let args = CliArgs::try_parse_from([
        "dataflow-verify",
        "expect",
        "a: A 'FAILED'->b: B && c: C",
        "--exit",
        "a=1",
        "--exit",
        " c = 0 ",
    ])?;

    match args.command {
        Command::Expect { definition, exits } => {
            assert_eq!(definition, "a: A 'FAILED'->b: B && c: C");
            assert_eq!(exits, vec![("a".to_string(), 1), ("c".to_string(), 0)]);
        }
        other => panic!("expected the expect command, got {other:?}"),
    }
    assert_eq!(args.config, "DataflowVerify.toml");
    Ok(())
}

#[test]
fn malformed_exit_codes_are_usage_errors() {
    for bad in ["a", "a=x", "=1x"] {
        assert!(
            CliArgs::try_parse_from(["dataflow-verify", "expect", "a: A", "--exit", bad]).is_err(),
            "'{bad}' should be rejected"
        );
    }
}

#[test]
fn await_commands_have_defaults() -> TestResult {
    let args = CliArgs::try_parse_from(["dataflow-verify", "await-stream", "ticktock"])?;
    assert!(matches!(
        args.command,
        Command::AwaitStream { ref name, ref state } if name == "ticktock" && state == "deployed"
    ));

    let args = CliArgs::try_parse_from(["dataflow-verify", "await-task", "timestamp"])?;
    assert!(matches!(args.command, Command::AwaitTask { count: 1, .. }));
    Ok(())
}

#[tokio::test]
async fn offline_commands_run_without_a_server() -> TestResult {
    init_tracing();
    let graph = CliArgs::try_parse_from(["dataflow-verify", "graph", "a: A && <b: B || c: C>"])?;
    run(graph).await?;

    let expect = CliArgs::try_parse_from([
        "dataflow-verify",
        "expect",
        "a: A 'FAILED'->b: B && c: C",
        "--exit",
        "a=1",
    ])?;
    run(expect).await?;

    let unknown = CliArgs::try_parse_from([
        "dataflow-verify",
        "expect",
        "a: A && c: C",
        "--exit",
        "zzz=1",
    ])?;
    let err = run(unknown).await.expect_err("unknown label");
    assert!(err.to_string().contains("zzz"));

    let invalid = CliArgs::try_parse_from(["dataflow-verify", "graph", "a: A &&"])?;
    assert!(run(invalid).await.is_err());
    Ok(())
}
