// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `dataflow-verify`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dataflow-verify",
    version,
    about = "Verify stream and task lifecycles on a Data Flow server.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `DataflowVerify.toml` in the current working directory. A
    /// missing default file means built-in defaults plus environment
    /// overrides.
    #[arg(long, value_name = "PATH", default_value = "DataflowVerify.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DATAFLOW_VERIFY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Parse a composed task definition and print its graph.
    Graph {
        definition: String,
    },

    /// Print which children of a composed task are expected to run.
    Expect {
        definition: String,

        /// Observed exit code of a child, as `label=code`. Repeatable;
        /// children not listed are assumed to complete.
        #[arg(long = "exit", value_name = "LABEL=CODE", value_parser = parse_exit)]
        exits: Vec<(String, i32)>,
    },

    /// Load, validate and print the effective configuration.
    CheckConfig,

    /// Wait for a stream to reach a lifecycle state.
    AwaitStream {
        name: String,

        #[arg(long, default_value = "deployed")]
        state: String,
    },

    /// Wait for a task to have a number of finished executions.
    AwaitTask {
        name: String,

        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_exit(s: &str) -> Result<(String, i32), String> {
    let (label, code) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=CODE, got '{s}'"))?;
    let code = code
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid exit code in '{s}': {e}"))?;
    Ok((label.trim().to_string(), code))
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
