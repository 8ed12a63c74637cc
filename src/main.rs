//! CLI entry point for the reconnaissance pipeline.
//!
//! Five independent subcommands mirror the five pipeline stages (`model`,
//! `infer`, `generate`, `replay`, `analyze`), plus a `run` subcommand that
//! chains all five against a working directory, writing every intermediate
//! artifact so a stage can be re-run in isolation against them later.

mod analyzer;
mod config;
mod diff;
mod errors;
mod generator;
mod id_inference;
mod io;
mod model;
mod modeler;
mod replay;
mod session;
mod telemetry;
mod vocab;

use errors::{ErrorCode, StructuredError};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};

use config::Config;
use model::{CapturedRequest, Endpoint, Finding, TestCase, TestResult};
use telemetry::LogConfig;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "surfacerecon")]
#[command(about = "Automated web API reconnaissance and authorization probing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Silent mode: only critical errors on stderr.
    #[arg(long, short = 's', global = true, default_value = "false")]
    silent: bool,

    /// Verbose mode: debug-level logs.
    #[arg(long, short = 'v', global = true, default_value = "false")]
    verbose: bool,
}

#[derive(clap::Args, Clone, Default)]
struct TunableFlags {
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    allow_destructive: bool,
    #[arg(long)]
    concurrency: Option<usize>,
    #[arg(long)]
    rate: Option<f64>,
}

impl TunableFlags {
    fn apply(&self, config: &mut Config) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.allow_destructive {
            config.allow_destructive = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(rate) = self.rate {
            config.rate_per_sec = rate;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Stage 1: build endpoints.json from a capture log.
    Model {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Stage 2: annotate endpoints with inferred IDPools.
    Infer {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Stage 3: synthesize adversarial test cases.
    Generate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        tunables: TunableFlags,
    },
    /// Stage 4: replay test cases against the live target.
    Replay {
        #[arg(long)]
        tests: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        cookies: Option<PathBuf>,
        #[arg(long)]
        headers: Option<PathBuf>,
        #[command(flatten)]
        tunables: TunableFlags,
    },
    /// Stage 5: diff results against the capture log and emit findings.
    Analyze {
        #[arg(long)]
        captured: PathBuf,
        #[arg(long)]
        tests: PathBuf,
        #[arg(long)]
        results: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Runs all five stages back to back against a working directory.
    Run {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
        #[arg(long)]
        cookies: Option<PathBuf>,
        #[arg(long)]
        headers: Option<PathBuf>,
        #[command(flatten)]
        tunables: TunableFlags,
    },
}

fn log_level(silent: bool, verbose: bool) -> Level {
    if silent {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

fn stage_model(input: &PathBuf, output: &PathBuf) -> Result<()> {
    let requests: Vec<CapturedRequest> = io::read_json(input, ErrorCode::MALFORMED_CAPTURE_LOG)?;
    if requests.is_empty() {
        return Err(StructuredError::new(
            ErrorCode::EMPTY_CAPTURE_LOG,
            format!("{} contains no requests", input.display()),
        )
        .into());
    }
    let endpoints = modeler::model_endpoints(&requests);
    info!(endpoints = endpoints.len(), "modeled endpoints");
    io::write_json_atomic(output, &endpoints)
}

fn stage_infer(input: &PathBuf, output: &PathBuf) -> Result<()> {
    let mut endpoints: Vec<Endpoint> = io::read_json(input, ErrorCode::MALFORMED_ENDPOINT_SET)?;
    id_inference::infer_ids(&mut endpoints);
    let pools: usize = endpoints.iter().map(|e| e.id_pools.len()).sum();
    info!(pools, "inferred id pools");
    io::write_json_atomic(output, &endpoints)
}

fn stage_generate(input: &PathBuf, output: &PathBuf, tunables: &TunableFlags) -> Result<()> {
    let endpoints: Vec<Endpoint> = io::read_json(input, ErrorCode::MALFORMED_ENDPOINT_SET)?;
    let mut config = Config::from_env();
    tunables.apply(&mut config);
    let tests = generator::generate_tests(&endpoints, &config);
    info!(tests = tests.len(), "generated test cases");
    io::write_json_atomic(output, &tests)
}

async fn stage_replay(
    tests_path: &PathBuf,
    output: &PathBuf,
    cookies: Option<&PathBuf>,
    headers: Option<&PathBuf>,
    tunables: &TunableFlags,
) -> Result<()> {
    let tests: Vec<TestCase> = io::read_json(tests_path, ErrorCode::MALFORMED_TEST_SET)?;
    let mut config = Config::from_env();
    tunables.apply(&mut config);
    let session = session::load_session(
        cookies.map(|p| p.as_path()),
        headers.map(|p| p.as_path()),
    )
    .context("loading session material")?;
    let cancel = Arc::new(AtomicBool::new(false));
    let watcher_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received interrupt, cancelling remaining replay tasks");
            watcher_cancel.store(true, Ordering::Relaxed);
        }
    });
    let results = replay::replay_tests(tests, config, session, cancel).await;
    info!(results = results.len(), "replay complete");
    io::write_json_atomic(output, &results)
}

fn stage_analyze(
    captured_path: &PathBuf,
    tests_path: &PathBuf,
    results_path: &PathBuf,
    output: &PathBuf,
) -> Result<()> {
    let captured: Vec<CapturedRequest> = io::read_json(captured_path, ErrorCode::MALFORMED_CAPTURE_LOG)?;
    let tests: Vec<TestCase> = io::read_json(tests_path, ErrorCode::MALFORMED_TEST_SET)?;
    let results: Vec<TestResult> = io::read_json(results_path, ErrorCode::MALFORMED_RESULT_SET)?;
    let config = Config::from_env();
    let findings: Vec<Finding> = analyzer::analyze(&captured, &tests, &results, &config);
    info!(findings = findings.len(), "analysis complete");
    io::write_json_atomic(output, &findings)
}

async fn stage_run(
    input: &PathBuf,
    out_dir: &PathBuf,
    cookies: Option<&PathBuf>,
    headers: Option<&PathBuf>,
    tunables: &TunableFlags,
) -> Result<()> {
    let run_id = Uuid::new_v4();
    info!(run_id = %run_id, input = %input.display(), "starting run");

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    let endpoints_path = out_dir.join("endpoints.json");
    let tests_path = out_dir.join("tests.json");
    let results_path = out_dir.join("test_results.json");
    let findings_path = out_dir.join("findings.json");

    stage_model(input, &endpoints_path)?;
    stage_infer(&endpoints_path, &endpoints_path)?;
    stage_generate(&endpoints_path, &tests_path, tunables)?;
    stage_replay(&tests_path, &results_path, cookies, headers, tunables).await?;
    stage_analyze(input, &tests_path, &results_path, &findings_path)?;

    info!(out_dir = %out_dir.display(), "run complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_logging(LogConfig {
        level: log_level(cli.silent, cli.verbose),
    });

    match &cli.command {
        Commands::Model { input, output } => stage_model(input, output),
        Commands::Infer { input, output } => stage_infer(input, output),
        Commands::Generate { input, output, tunables } => stage_generate(input, output, tunables),
        Commands::Replay { tests, output, cookies, headers, tunables } => {
            stage_replay(tests, output, cookies.as_ref(), headers.as_ref(), tunables).await
        }
        Commands::Analyze { captured, tests, results, output } => {
            stage_analyze(captured, tests, results, output)
        }
        Commands::Run { input, out_dir, cookies, headers, tunables } => {
            stage_run(input, out_dir, cookies.as_ref(), headers.as_ref(), tunables).await
        }
    }
}
