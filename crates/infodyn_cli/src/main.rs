mod config;
mod output;

use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use infodyn_core::complexity::{self, ComplexityState};
use infodyn_core::measures::{self, DynamicsSelection};
use infodyn_core::report::{COMPLEXITY_HEADER, ROW_HEADER};
use infodyn_core::{ComplexityConfig, ComplexityRow, Ensemble, EnsembleReader, EstimatorConfig, Row};
use tracing::{error, info, warn};

use crate::config::FileConfig;
use crate::output::{Emitter, Format};

#[derive(Parser)]
#[command(name = "infodyn")]
#[command(about = "Information dynamics of evolved neural controllers, read from an ensemble stream on stdin")]
struct Cli {
    /// TOML settings file (default: ~/.infodyn/config.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for statistic rows
    #[arg(long, value_enum, global = true, default_value_t = Format::Text)]
    format: Format,

    /// Diagnostic verbosity on stderr
    #[arg(long, value_enum, global = true, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    /// Emit diagnostics as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Active information storage, apparent transfer and separable information
    Dynamics {
        #[command(flatten)]
        estimator: EstimatorConfig,
        /// Restrict printed statistics (repeatable; default all)
        #[arg(long, value_enum)]
        metric: Vec<MetricFilter>,
        /// Also print one row per neuron
        #[arg(long)]
        detail: bool,
        /// Time series embedding length
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        embedding: u32,
    },
    /// Collective transfer into every processing neuron
    Collective {
        #[command(flatten)]
        estimator: EstimatorConfig,
        #[arg(long)]
        detail: bool,
        /// Time series embedding length
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        embedding: u32,
    },
    /// Complete transfer along each synapse
    Complete {
        #[command(flatten)]
        estimator: EstimatorConfig,
        #[arg(long)]
        detail: bool,
        /// Time series embedding length
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        embedding: u32,
        /// Maximum synapses evaluated per agent
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        synapses: Option<u32>,
    },
    /// Gaussian integration and TSE complexity of processing neurons
    Complexity {
        #[command(flatten)]
        complexity: ComplexityConfig,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MetricFilter {
    Ais,
    Ate,
    Si,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn selection(filters: &[MetricFilter]) -> DynamicsSelection {
    if filters.is_empty() {
        return DynamicsSelection::default();
    }
    DynamicsSelection {
        storage: filters.contains(&MetricFilter::Ais),
        transfer: filters.contains(&MetricFilter::Ate),
        separable: filters.contains(&MetricFilter::Si),
    }
}

fn init_tracing(level: LogLevel, json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(tracing::Level::from(level));
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
    .context("setting default subscriber failed")
}

fn emit_estimator<W: Write>(out: &mut Emitter<W>, config: &EstimatorConfig) -> io::Result<()> {
    if config.use_gpu {
        warn!("No accelerated estimator backend is compiled in; using the CPU estimator");
    }
    for (key, value) in config.properties() {
        out.property(key, value)?;
    }
    Ok(())
}

/// Reads agents until the stream ends, emitting each agent's rows only
/// once all of them were computed.
fn for_each_agent<R, W, F>(
    reader: &mut EnsembleReader<R>,
    out: &mut Emitter<W>,
    mut rows_for: F,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(&Ensemble) -> Result<Vec<Row>>,
{
    let mut agents = 0usize;
    while let Some(ensemble) = reader
        .read_ensemble()
        .with_context(|| format!("reading agent after line {}", reader.line_number()))?
    {
        let agent = ensemble.agent_id();
        let rows = rows_for(&ensemble).with_context(|| format!("agent {}", agent))?;
        for row in &rows {
            out.row(row)?;
        }
        out.flush()?;
        agents += 1;
    }
    info!(agents, "Stream complete");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let file = FileConfig::load(cli.config.as_deref())?;

    let stdin = io::stdin();
    let mut reader = EnsembleReader::new(stdin.lock());
    let stdout = io::stdout();
    let mut out = Emitter::new(BufWriter::new(stdout.lock()), cli.format);
    reader
        .echo_arguments(out.writer())
        .context("reading ARGUMENTS block")?;

    match cli.command {
        Commands::Dynamics {
            estimator,
            metric,
            detail,
            embedding,
        } => {
            let estimator = file.estimator_or(estimator);
            let selection = selection(&metric);
            let k = embedding as usize;
            out.property("EMBEDDING", k)?;
            emit_estimator(&mut out, &estimator)?;
            out.header(ROW_HEADER)?;
            for_each_agent(&mut reader, &mut out, |ensemble| {
                Ok(measures::dynamics(ensemble, &estimator, k, selection, detail)?)
            })
        }
        Commands::Collective {
            estimator,
            detail,
            embedding,
        } => {
            let estimator = file.estimator_or(estimator);
            let k = embedding as usize;
            out.property("EMBEDDING", k)?;
            emit_estimator(&mut out, &estimator)?;
            out.header(ROW_HEADER)?;
            for_each_agent(&mut reader, &mut out, |ensemble| {
                Ok(measures::collective(ensemble, &estimator, k, detail)?)
            })
        }
        Commands::Complete {
            estimator,
            detail,
            embedding,
            synapses,
        } => {
            let estimator = file.estimator_or(estimator);
            let k = embedding as usize;
            let cap = synapses.map(|cap| cap as usize);
            out.property("EMBEDDING", k)?;
            if let Some(cap) = cap {
                out.property("SYNAPSES", cap)?;
            }
            emit_estimator(&mut out, &estimator)?;
            out.header(ROW_HEADER)?;
            for_each_agent(&mut reader, &mut out, |ensemble| {
                Ok(measures::complete(ensemble, &estimator, k, cap, detail)?)
            })
        }
        Commands::Complexity { complexity } => {
            let config = file.complexity_or(complexity);
            run_complexity(&mut reader, &mut out, &config)
        }
    }
}

fn run_complexity<R: BufRead, W: Write>(
    reader: &mut EnsembleReader<R>,
    out: &mut Emitter<W>,
    config: &ComplexityConfig,
) -> Result<()> {
    config.validate().context("complexity settings")?;
    for (key, value) in config.properties() {
        out.property(key, value)?;
    }
    out.header(COMPLEXITY_HEADER)?;

    let (mut succeeded, mut skipped) = (0usize, 0usize);
    while let Some(ensemble) = reader
        .read_ensemble()
        .with_context(|| format!("reading agent after line {}", reader.line_number()))?
    {
        let agent = ensemble.agent_id();
        match complexity::estimate(&ensemble, config).with_context(|| format!("agent {}", agent))? {
            ComplexityState::Succeeded(estimate) => {
                if estimate.retries > 0 {
                    info!(agent, retries = estimate.retries, noise = estimate.noise, "Recovered after noise escalation");
                }
                out.row(&ComplexityRow {
                    agent,
                    count: estimate.count,
                    integration: estimate.integration,
                    complexity: estimate.complexity,
                })?;
                out.flush()?;
                succeeded += 1;
            }
            ComplexityState::Exhausted {
                retries,
                noise,
                reason,
            } => {
                warn!(agent, retries, noise, %reason, "Covariance stayed ill-conditioned; agent skipped");
                skipped += 1;
            }
            other => {
                error!(agent, state = ?other, "Complexity loop stopped in a non-terminal state");
                skipped += 1;
            }
        }
    }
    info!(succeeded, skipped, "Stream complete");
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_level, cli.log_json) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli) {
        let message = format!("{:#}", e);
        error!(error = %message, "Fatal Error");
        std::process::exit(1);
    }
}
