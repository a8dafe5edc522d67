//! bzrun - distributed test-run launcher.
//!
//! Launches one master worker and any number of helper workers as docker
//! containers, each pointed at a uniquely parameterized URL on the remote
//! test orchestration service. Helpers come online first to provide
//! execution capacity; the master runs the named test and dispatches work
//! to them. The process exit code mirrors the run outcome.
//!
//! ## Commands
//!
//! - `run`: plan and launch the workers, waiting for each in turn
//! - `plan`: print the ordered worker plan and URLs without launching

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;

use bzrun_core::config::WORKER_IMAGE;
use bzrun_core::{
    init_tracing, DockerLauncher, LaunchContext, RunConfig, RunPipeline, RunPlan, StdoutSink,
};

#[derive(Parser)]
#[command(name = "bzrun")]
#[command(author = "Boozang Engineering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Distributed Boozang test-run launcher", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the planned workers and run the test suite
    Run {
        #[command(flatten)]
        params: RunParams,

        /// Working directory mounted into every worker container
        #[arg(long, default_value = ".")]
        workdir: PathBuf,

        /// Worker container image
        #[arg(long, default_value = WORKER_IMAGE)]
        image: String,
    },

    /// Print the worker plan and generated URLs without launching anything
    Plan {
        #[command(flatten)]
        params: RunParams,
    },
}

/// Run parameters shared by `run` and `plan`.
///
/// Only the token and project are required; everything else falls back to
/// the documented defaults during normalization.
#[derive(Args)]
struct RunParams {
    /// Base URL of the remote test orchestration service
    #[arg(long, default_value = "")]
    base_url: String,

    /// Authentication token
    #[arg(long, env = "BOOZANG_TOKEN", default_value = "")]
    token: String,

    /// Project ID
    #[arg(long, env = "BOOZANG_PROJECT", default_value = "")]
    project: String,

    /// Project branch to run against
    #[arg(long, default_value = "")]
    branch: String,

    /// Name of the test the master executes
    #[arg(long, default_value = "")]
    test: String,

    /// Total worker count including the master (0 = default)
    #[arg(long, default_value_t = 0)]
    workers: u32,

    /// Worker group (0 = default)
    #[arg(long, default_value_t = 0)]
    group: u32,

    /// Test filter applied by the master
    #[arg(long, default_value = "")]
    filter: String,

    /// Environment selector
    #[arg(long, default_value_t = 0)]
    env: u32,

    /// Run the workers in self mode
    #[arg(long = "self")]
    self_mode: bool,

    /// Scope restriction
    #[arg(long, default_value = "")]
    scope: String,

    /// Free-form parameter forwarded to the service
    #[arg(long, default_value = "")]
    parameter: String,
}

impl RunParams {
    fn into_config(self) -> RunConfig {
        RunConfig {
            base_url: self.base_url,
            token: self.token,
            project: self.project,
            branch: self.branch,
            test: self.test,
            workers: self.workers,
            group: self.group,
            filter: self.filter,
            env: self.env,
            self_mode: self.self_mode,
            scope: self.scope,
            parameter: self.parameter,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            params,
            workdir,
            image,
        } => cmd_run(params.into_config(), workdir, image).await,
        Commands::Plan { params } => cmd_plan(params.into_config()),
    }
}

/// Launch the planned workers and wait for each in turn.
async fn cmd_run(config: RunConfig, workdir: PathBuf, image: String) -> Result<()> {
    let workdir = workdir
        .canonicalize()
        .with_context(|| format!("Failed to resolve working directory {workdir:?}"))?;

    let ctx = LaunchContext::with_current_env(workdir, Arc::new(StdoutSink));

    // Ctrl-C terminates the in-flight worker and stops the sequence.
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let launcher = DockerLauncher::new(image);
    let report = RunPipeline::run(&config, &launcher, &ctx).await?;

    println!();
    println!("Run ID: {}", report.run_id);
    println!("Plan:   {}", &report.plan_digest[..12]);
    for outcome in &report.workers {
        println!(
            "  ✓ {} {} ({}ms, exit code: {})",
            outcome.role.as_str(),
            outcome.key,
            outcome.duration_ms,
            outcome.exit_code
        );
    }
    println!(
        "Status: ✓ PASSED ({} workers, {}ms)",
        report.workers.len(),
        report.duration_ms
    );

    Ok(())
}

/// Print the worker plan without launching anything.
fn cmd_plan(config: RunConfig) -> Result<()> {
    let effective = config.normalize()?;
    let plan = RunPlan::build(&effective);

    println!("Plan {} ({} workers):", &plan.digest()[..12], plan.len());
    for spec in plan.iter() {
        println!("  [{}] {} -> {}", spec.key, spec.role.as_str(), spec.url);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run_with_flags() {
        let cli = Cli::try_parse_from([
            "bzrun", "run", "--token", "t1", "--project", "p1", "--workers", "3", "--self",
        ])
        .expect("parse failed");

        match cli.command {
            Commands::Run { params, image, .. } => {
                assert_eq!(params.token, "t1");
                assert_eq!(params.project, "p1");
                assert_eq!(params.workers, 3);
                assert!(params.self_mode);
                assert_eq!(image, WORKER_IMAGE);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn test_cli_parses_plan_with_defaults() {
        let cli =
            Cli::try_parse_from(["bzrun", "plan", "--token", "t1", "--project", "p1"])
                .expect("parse failed");

        match cli.command {
            Commands::Plan { params } => {
                let config = params.into_config();
                let effective = config.normalize().expect("normalize failed");
                assert_eq!(effective.workers, 2);
                assert_eq!(effective.branch, "main");
            }
            _ => panic!("expected plan command"),
        }
    }

    #[test]
    fn test_run_params_map_into_config() {
        let cli = Cli::try_parse_from([
            "bzrun",
            "run",
            "--token",
            "t1",
            "--project",
            "p1",
            "--branch",
            "release",
            "--filter",
            "tag:smoke",
            "--env",
            "2",
        ])
        .expect("parse failed");

        let Commands::Run { params, .. } = cli.command else {
            panic!("expected run command");
        };
        let config = params.into_config();
        assert_eq!(config.branch, "release");
        assert_eq!(config.filter, "tag:smoke");
        assert_eq!(config.env, 2);
        assert!(!config.self_mode);
    }
}
