use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use instance_ranker::aggregator::Aggregator;
use instance_ranker::candidates::CandidateFinder;
use instance_ranker::config::{
    RankerConfig, WIDE_CONCURRENCY, load_ignore_hosts, load_instances, read_table,
};
use instance_ranker::fetch::FetchClient;
use instance_ranker::lint::lint_instances;
use instance_ranker::version::registry::RegistryBuilder;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

#[derive(Parser)]
#[command(name = "instance-ranker")]
#[command(version, about = "Polls federated instances and ranks them by release and activity")]
struct Cli {
    /// Emit logs as newline-delimited JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Also append logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate every listed instance and write the report
    Run {
        #[arg(long)]
        instances: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Report destination (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Profile::Default)]
        profile: Profile,
    },
    /// Check the instance list for duplicates and malformed entries
    Lint {
        #[arg(long)]
        instances: PathBuf,
    },
    /// List responding hosts from the federation directory that are not listed yet
    Candidates {
        #[arg(long)]
        instances: PathBuf,
        #[arg(long)]
        ignore: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Profile {
    /// Configured concurrency
    Default,
    /// Raised concurrency for large lists
    Wide,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_json, cli.log_file.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Run {
            instances,
            config,
            output,
            profile,
        } => runtime.block_on(run(&instances, config.as_deref(), output.as_deref(), profile)),
        Command::Lint { instances } => lint(&instances),
        Command::Candidates {
            instances,
            ignore,
            config,
        } => runtime.block_on(candidates(&instances, &ignore, config.as_deref())),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<RankerConfig> {
    match path {
        Some(path) => RankerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RankerConfig::default()),
    }
}

async fn run(
    instances: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    profile: Profile,
) -> anyhow::Result<ExitCode> {
    let mut config = load_config(config)?;
    if profile == Profile::Wide {
        config.concurrency = WIDE_CONCURRENCY;
    }
    let instances = load_instances(instances).context("Failed to load instance list")?;

    let builder =
        RegistryBuilder::from_config(&config).context("Failed to build release sources")?;
    let aggregator = Aggregator::new(config, builder).context("Failed to build HTTP client")?;
    let report = aggregator.run(instances).await;

    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(ExitCode::SUCCESS)
}

fn lint(instances: &Path) -> anyhow::Result<ExitCode> {
    let table = read_table(instances).context("Failed to read instance list")?;
    let report = lint_instances(&table);

    if report.duplicated.is_empty() {
        println!("Duplicated:\n  There is no duplicated server!\n");
    } else {
        println!("Duplicated:\n  {}\n", report.duplicated.join(",\n  "));
    }
    if !report.invalid_langs.is_empty() {
        println!("Invalid:\n  {}\n", report.invalid_langs.join(",\n  "));
    }

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn candidates(
    instances: &Path,
    ignore: &Path,
    config: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let config = load_config(config)?;
    let instances = load_instances(instances).context("Failed to load instance list")?;
    let ignore = load_ignore_hosts(ignore).context("Failed to load ignore list")?;

    let fetch = FetchClient::new(&config.http).context("Failed to build HTTP client")?;
    let hosts = CandidateFinder::new(fetch, config.candidates)
        .find_candidates(&instances, &ignore)
        .await?;

    for host in hosts {
        println!("{}", host);
    }
    Ok(ExitCode::SUCCESS)
}

/// Installs the global subscriber. The returned guard flushes the log file on drop.
fn init_tracing(json: bool, log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if json {
        layers.push(fmt::layer().with_writer(std::io::stderr).json().boxed());
    } else {
        layers.push(fmt::layer().with_writer(std::io::stderr).boxed());
    }

    let guard = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
