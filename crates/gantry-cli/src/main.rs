use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use gantry_core::{LaunchOptions, Launcher, consts};
use gantry_exec::HostEnv;
use gantry_model::BackendConfig;
use gantry_observe::{LoggerConfig, LoggerFormat, logger_init};
use gantry_tracking::{CredentialProfiles, InMemoryTracking};

mod resolver;

/// Tracking URI used when the ambient environment declares none.
const DEFAULT_TRACKING_URI: &str = "file:./gruns";

#[derive(Parser)]
#[command(name = "gantry", version, about = "Run projects on configurable execution backends")]
struct Cli {
    /// Log level filter (tracing env-filter syntax)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format: text|json|journald
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Run(RunArgs),
}

#[derive(Parser)]
struct RunArgs {
    /// Project directory containing a gantry.json descriptor
    #[arg(value_name = "URI")]
    uri: String,

    /// Entry point to run
    #[arg(short = 'e', long, default_value = "main")]
    entry_point: String,

    /// Entry-point parameter (repeatable)
    #[arg(short = 'P', long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,

    /// Execution backend; built-in backends are `local` and `kubernetes`
    #[arg(long)]
    backend: Option<String>,

    /// Backend options: an inline JSON object or a path to a .json file
    #[arg(long, value_name = "JSON|PATH")]
    backend_config: Option<String>,

    /// Project revision, for version-controlled project sources
    #[arg(long = "version", value_name = "REV")]
    version: Option<String>,

    /// Experiment to create the run under, by name (created on first use)
    #[arg(long, conflicts_with = "experiment_id")]
    experiment_name: Option<String>,

    /// Experiment to create the run under, by id
    #[arg(long)]
    experiment_id: Option<String>,

    /// Run against the current environment instead of provisioning an
    /// isolated one
    #[arg(long)]
    no_isolated_env: bool,

    /// Return immediately instead of waiting for the run to finish
    #[arg(long = "async")]
    run_async: bool,

    /// Base directory for downloads of path-typed parameters
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Extra `docker run` flag for containerized local runs (repeatable)
    #[arg(long = "docker-args", value_name = "KEY=VALUE")]
    docker_args: Vec<String>,

    /// Reuse an existing run id instead of creating a new run
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format: LoggerFormat = cli.log_format.parse()?;
    logger_init(&LoggerConfig {
        format,
        level: cli.log_level.clone(),
        ..LoggerConfig::default()
    })?;

    match cli.command {
        Commands::Run(args) => run_project(args).await,
    }
}

async fn run_project(args: RunArgs) -> anyhow::Result<()> {
    let host_env = HostEnv::capture();
    let tracking_uri = host_env
        .get(consts::TRACKING_URI_ENV_VAR)
        .unwrap_or(DEFAULT_TRACKING_URI)
        .to_string();
    // Demo-grade store: records live for the duration of the invocation.
    let tracking = Arc::new(InMemoryTracking::new(&tracking_uri, &tracking_uri));

    let launcher = Launcher::new(tracking, Arc::new(resolver::LocalDirResolver))
        .with_profiles(CredentialProfiles::from_vars(host_env.iter()))
        .with_host_env(host_env);

    let mut opts = LaunchOptions::new(args.uri, args.entry_point);
    opts.params = parse_params(&args.params)?;
    opts.docker_args = parse_docker_args(&args.docker_args)?;
    opts.backend = args.backend;
    opts.backend_config = parse_backend_config(args.backend_config.as_deref())?;
    opts.version = args.version;
    opts.experiment_name = args.experiment_name;
    opts.experiment_id = args.experiment_id;
    opts.use_isolated_env = !args.no_isolated_env;
    opts.storage_dir = args.storage_dir;
    opts.synchronous = !args.run_async;
    opts.run_id = args.run_id;
    let synchronous = opts.synchronous;

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let submitted = launcher.run(opts, &cancel).await?;
    if synchronous {
        info!(target: "gantry.cli", run_id = %submitted.run_id(), "run finished");
    } else {
        info!(target: "gantry.cli", run_id = %submitted.run_id(), "run launched");
        // The child owns its process group; forget the handle so dropping
        // it does not tear the detached run down.
        std::mem::forget(submitted);
    }
    Ok(())
}

fn parse_params(pairs: &[String]) -> anyhow::Result<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    for pair in pairs {
        let (name, value) = split_pair(pair).context("invalid -P parameter")?;
        params.insert(name, value);
    }
    Ok(params)
}

fn parse_docker_args(pairs: &[String]) -> anyhow::Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| split_pair(pair).context("invalid --docker-args flag"))
        .collect()
}

fn split_pair(pair: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = pair
        .split_once('=')
        .with_context(|| format!("'{pair}' is not of the form NAME=VALUE"))?;
    Ok((name.to_string(), value.to_string()))
}

/// Backend config from the command line: inline JSON, or the contents of a
/// named `.json` file.
fn parse_backend_config(raw: Option<&str>) -> anyhow::Result<BackendConfig> {
    let Some(raw) = raw else {
        return Ok(BackendConfig::new());
    };
    if raw.ends_with(".json") {
        let contents = std::fs::read_to_string(raw)
            .with_context(|| format!("could not read backend config file '{raw}'"))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("backend config file '{raw}' is not a JSON object"))
    } else {
        serde_json::from_str(raw)
            .with_context(|| format!("backend config '{raw}' is not a JSON object"))
    }
}
