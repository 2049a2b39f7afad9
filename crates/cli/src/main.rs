//! Propcheck CLI - Main Entry Point
//!
//! Runs declarative browser scenarios against the property portal UI and
//! reports the outcome, writing screenshots and a JSON results file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use propcheck_harness::artifact::ArtifactConfig;
use propcheck_harness::browser::{Browser, BrowserConfig};
use propcheck_harness::runner::{Runner, RunnerConfig, ScenarioResult, SuiteResult};
use propcheck_harness::scenario::{Scenario, Viewport};
use propcheck_harness::target::{SpawnSpec, TargetConfig};

mod output;

use output::{print_error, print_success, OutputFormat, TableDisplay};

/// Propcheck - browser-driven UI verification
#[derive(Parser)]
#[command(name = "propcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run verification scenarios
    Run(RunArgs),

    /// List available scenarios
    List(ListArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Path to the scenarios directory
    #[arg(short, long, default_value = "scenarios")]
    scenarios: PathBuf,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    name: Option<String>,

    /// Run only scenarios matching this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Base URL of the application under test
    #[arg(long, default_value = "http://127.0.0.1:5173", env = "PROPCHECK_BASE_URL")]
    base_url: String,

    /// Spawn the application instead of attaching (e.g. --spawn "npm run dev")
    #[arg(long)]
    spawn: Option<String>,

    /// Environment variable used to hand the port to a spawned application
    #[arg(long)]
    port_env: Option<String>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long, default_value = "chromium")]
    browser: String,

    /// Run with a visible browser window
    #[arg(long)]
    headed: bool,

    /// Default viewport width when a scenario does not override it
    #[arg(long, default_value = "1280")]
    viewport_width: u32,

    /// Default viewport height when a scenario does not override it
    #[arg(long, default_value = "720")]
    viewport_height: u32,

    /// Promote current screenshots to visual baselines after the run
    #[arg(long)]
    update_baselines: bool,

    /// Output directory for screenshots, diffs, and results
    #[arg(short, long, default_value = "verification")]
    output: PathBuf,
}

#[derive(Args)]
struct ListArgs {
    /// Path to the scenarios directory
    #[arg(short, long, default_value = "scenarios")]
    scenarios: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run(args) => run(args, cli.format).await,
        Commands::List(args) => list(args, cli.format),
    }
}

async fn run(args: RunArgs, format: OutputFormat) -> anyhow::Result<()> {
    let spawn = args.spawn.as_ref().map(|command| {
        let mut parts = command.split_whitespace();
        SpawnSpec {
            program: parts.next().unwrap_or_default().to_string(),
            args: parts.map(String::from).collect(),
            port_env: args.port_env.clone(),
        }
    });

    let config = RunnerConfig {
        target: TargetConfig {
            base_url: args.base_url.clone(),
            spawn,
            ..Default::default()
        },
        browser: BrowserConfig {
            base_url: args.base_url,
            screenshot_dir: args.output.join("screenshots"),
            viewport: Viewport {
                width: args.viewport_width,
                height: args.viewport_height,
            },
            browser: Browser::parse(&args.browser),
            headless: !args.headed,
        },
        artifacts: ArtifactConfig {
            screenshot_dir: args.output.join("screenshots"),
            baseline_dir: args.output.join("baselines"),
            diff_dir: args.output.join("diffs"),
            ..Default::default()
        },
        scenarios_dir: args.scenarios,
        output_dir: args.output,
    };

    tracing::debug!("Runner config: {:?}", config);

    let mut runner = Runner::with_config(config);

    let suite = match run_suite(&mut runner, &args.name, &args.tag).await {
        Ok(suite) => suite,
        Err(e) => {
            // process::exit skips Drop, so release the target explicitly
            let _ = runner.release_target();
            print_error(&e.to_string());
            std::process::exit(2);
        }
    };

    if args.update_baselines {
        runner.update_baselines()?;
    }

    runner.write_results(&suite)?;

    output::print_list(&suite.results, format);

    if suite.failed == 0 {
        print_success(&format!(
            "{} scenario(s) passed in {} ms",
            suite.passed, suite.duration_ms
        ));
        Ok(())
    } else {
        print_error(&format!(
            "{} of {} scenario(s) failed",
            suite.failed, suite.total
        ));
        let _ = runner.release_target();
        std::process::exit(1);
    }
}

async fn run_suite(
    runner: &mut Runner,
    name: &Option<String>,
    tag: &Option<String>,
) -> propcheck_harness::HarnessResult<SuiteResult> {
    match (name, tag) {
        (Some(name), _) => {
            let result = runner.run_named(name).await?;
            let duration_ms = result.duration_ms;
            Ok(SuiteResult::summarize(vec![result], duration_ms))
        }
        (None, Some(tag)) => runner.run_tagged(tag).await,
        (None, None) => runner.run_all().await,
    }
}

fn list(args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let scenarios = Scenario::load_all(&args.scenarios)?;

    let rows: Vec<ScenarioRow> = scenarios
        .iter()
        .map(|s| ScenarioRow {
            name: s.name.clone(),
            tags: s.tags.join(", "),
            steps: s.steps.len(),
            description: s.description.trim().to_string(),
        })
        .collect();

    output::print_list(&rows, format);
    Ok(())
}

#[derive(Serialize)]
struct ScenarioRow {
    name: String,
    tags: String,
    steps: usize,
    description: String,
}

impl TableDisplay for ScenarioRow {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Tags", "Steps", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tags.clone(),
            self.steps.to_string(),
            self.description.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_viewport_flags() {
        let cli = Cli::try_parse_from([
            "propcheck",
            "run",
            "--viewport-width",
            "1920",
            "--viewport-height",
            "1080",
        ])
        .unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.viewport_width, 1920);
                assert_eq!(args.viewport_height, 1080);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_run_viewport_defaults() {
        let cli = Cli::try_parse_from(["propcheck", "run"]).unwrap();

        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.viewport_width, 1280);
                assert_eq!(args.viewport_height, 720);
            }
            _ => panic!("expected run subcommand"),
        }
    }
}

impl TableDisplay for ScenarioResult {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Status", "Duration (ms)", "Artifacts", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            if self.success { "passed".to_string() } else { "failed".to_string() },
            self.duration_ms.to_string(),
            self.artifacts
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.error.clone().unwrap_or_default(),
        ]
    }
}
