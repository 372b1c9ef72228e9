//! Casekit CLI - Main Entry Point
//!
//! Loads YAML case specs, wires a remote driver bridge and the backend
//! seeding API into a `TestRunner`, and exits with the run's verdict:
//! 0 when every assertion passed, 1 on any failure, 2 on a harness error.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

mod output;

use casekit_common::config::{AssertionMode, RunConfig};
use casekit_common::selector::SelectorPolicy;
use casekit_runner::remote::RemoteDriver;
use casekit_runner::{CaseSpec, HttpStateBackend, TestRunner};

use output::{OutputFormat, TableDisplay};

/// Casekit - orchestrator for end-to-end browser test suites
#[derive(Parser)]
#[command(name = "casekit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(long, default_value = "casekit.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run case specs against a driver bridge
    Run(RunArgs),

    /// Parse case specs and report them without running anything
    Validate {
        /// Directory of YAML case specs
        spec_dir: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Directory of YAML case specs
    spec_dir: PathBuf,

    /// Driver bridge address
    #[arg(long, default_value = "http://127.0.0.1:9515")]
    driver_url: String,

    /// Backend API address for state seeding; defaults to the base URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Base URL joined against relative visit paths
    #[arg(long)]
    base_url: Option<String>,

    /// Assertion mode (soft|hard)
    #[arg(long)]
    mode: Option<AssertionMode>,

    /// Selector policy (strict|lenient)
    #[arg(long)]
    selector_policy: Option<SelectorPolicy>,

    /// Retry budget in milliseconds for resolution and waits
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Number of isolated workers
    #[arg(long)]
    workers: Option<usize>,

    /// Only run cases carrying this tag
    #[arg(long)]
    tag: Option<String>,

    /// Write the full JSON report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

impl TableDisplay for CaseSpec {
    fn headers() -> Vec<&'static str> {
        vec!["Case", "Steps", "Tags", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.steps.len().to_string(),
            self.tags.join(", "),
            self.description.clone(),
        ]
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{e:#}"));
            2
        }
    };
    std::process::exit(code);
}

async fn execute(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Run(args) => run(args, &cli.config, cli.format).await,
        Commands::Validate { spec_dir } => {
            let specs = CaseSpec::load_all(&spec_dir)?;
            output::print_list(&specs, cli.format);
            println!("{} case spec(s) parsed.", specs.len());
            Ok(0)
        }
        Commands::Version => {
            println!("casekit v{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

async fn run(args: RunArgs, config_path: &PathBuf, format: OutputFormat) -> anyhow::Result<i32> {
    let config = assemble_config(&args, config_path)?;

    let driver = Arc::new(RemoteDriver::new(&args.driver_url)?);
    let backend_url = args.backend_url.clone().unwrap_or_else(|| config.base_url.clone());
    let backend = Arc::new(HttpStateBackend::new(backend_url)?);

    let specs = CaseSpec::load_all(&args.spec_dir)?;
    if specs.is_empty() {
        anyhow::bail!("no case specs found under {}", args.spec_dir.display());
    }
    info!("Loaded {} case spec(s) from {}", specs.len(), args.spec_dir.display());
    let mut suite = CaseSpec::into_suite(specs);
    if let Some(tag) = &args.tag {
        suite = suite.filter_tag(tag);
    }

    let runner = TestRunner::new(config, driver.clone()).with_backend(backend);

    // Feed intercepted requests from the bridge into the alias registry
    // for the duration of the run.
    let pump = tokio::spawn(driver.pump_events(runner.aliases()));
    let report = runner.run(suite).await?;
    pump.abort();

    output::print_report(&report, format);
    if let Some(path) = &args.report {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
    }
    Ok(report.exit_code())
}

/// Defaults < TOML file < `CASEKIT_*` environment < CLI flags.
fn assemble_config(args: &RunArgs, config_path: &PathBuf) -> anyhow::Result<RunConfig> {
    let mut config = RunConfig::load(config_path)?;
    config.apply_env()?;

    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(policy) = args.selector_policy {
        config.selector_policy = policy;
    }
    if let Some(timeout) = args.timeout_ms {
        config.timeout_ms = timeout;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}
