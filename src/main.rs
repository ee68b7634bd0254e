//! callscope CLI - call graph resolution and graph analytics
//!
//! Reads one or more JSON payloads (function inventory, raw calls, imports,
//! pre-built edges) and runs the pipeline:
//!
//! 1. Normalize: accept canonical, wrapped, graph-dump and array shapes
//! 2. Validate: structural checks, fatal only under --strict
//! 3. Resolve: rank candidate targets for every raw call
//! 4. Build: two-layer graph with virtual nodes for unresolved targets
//! 5. Analyze: degree, betweenness, PageRank, Louvain, k-core, cliques
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use callscope::config::Config;
use callscope::pipeline::{Pipeline, PipelineConfig};

/// Confidence-ranked call graphs and graph analytics for code inventories
///
/// callscope resolves raw call expressions to their most likely definitions,
/// builds a call + similarity graph, and reports which functions carry the
/// structure: central nodes, communities, dense cores.
///
/// Examples:
///   callscope analyze inventory.json                 # Summary to stdout
///   callscope analyze a.json b.json --graph-out g.json
///   cat payload.json | callscope validate - --strict
///   callscope resolve inventory.json --pretty
#[derive(Parser, Debug)]
#[command(name = "callscope")]
#[command(version)]
#[command(about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub global: GlobalArgs,
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Config file
    ///
    /// Without this flag, callscope.toml in the working directory is used,
    /// then [tool.callscope] in the nearest pyproject.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Treat structural payload errors as fatal
    #[arg(long, global = true)]
    pub strict: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose logging (-v info, -vv debug)
    ///
    /// RUST_LOG, when set, takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve calls, build the graph and run all analyzers
    Analyze {
        /// Payload files; `-` reads stdin
        #[arg(required = true, value_name = "PAYLOAD")]
        payloads: Vec<String>,

        /// Write the graph (nodes + both edge layers) to this file
        #[arg(long, value_name = "PATH")]
        graph_out: Option<PathBuf>,

        /// Write the summary to this file instead of stdout
        #[arg(long, value_name = "PATH")]
        summary_out: Option<PathBuf>,
    },

    /// Check payloads and print every issue found
    Validate {
        #[arg(required = true, value_name = "PAYLOAD")]
        payloads: Vec<String>,
    },

    /// Print per-call resolutions without building a graph
    Resolve {
        #[arg(required = true, value_name = "PAYLOAD")]
        payloads: Vec<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.log_json);

    match execute(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: u8, json: bool) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn execute(cli: &Cli) -> Result<ExitCode> {
    let config = load_config(&cli.global)?;
    let pipeline = Pipeline::new(config.pipeline_config());

    match &cli.command {
        Command::Analyze {
            payloads,
            graph_out,
            summary_out,
        } => {
            let documents = read_payloads(payloads)?;
            let output = pipeline.run_documents(documents)?;

            if let Some(path) = graph_out {
                write_json(Some(path.as_path()), &output.graph.export(), cli.global.pretty)?;
                info!(path = %path.display(), "graph written");
            }
            write_json(summary_out.as_deref(), &output.summary, cli.global.pretty)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Validate { payloads } => {
            let documents = read_payloads(payloads)?;
            // Issues are printed whatever the mode; strictness only decides
            // the exit code.
            let lenient = Pipeline::new(PipelineConfig {
                strict: false,
                ..pipeline.config().clone()
            });
            let loaded = lenient.load(documents)?;

            let mut stdout = io::stdout().lock();
            for issue in &loaded.issues {
                writeln!(stdout, "{issue}")?;
            }
            let errors = loaded.error_count();
            let warnings = loaded.issues.len() - errors;
            writeln!(stdout, "{errors} error(s), {warnings} warning(s)")?;

            if pipeline.config().strict && errors > 0 {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }

        Command::Resolve { payloads } => {
            let documents = read_payloads(payloads)?;
            let loaded = pipeline.load(documents)?;
            let (resolutions, stats) = pipeline.resolve(&loaded);
            info!(
                total = stats.total,
                rate = stats.resolution_rate(),
                "calls resolved"
            );
            write_json(None, &resolutions, cli.global.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(global: &GlobalArgs) -> Result<Config> {
    let mut config = match &global.config {
        Some(path) => Config::load_file(path)?,
        None => {
            let cwd = std::env::current_dir().context("failed to resolve working directory")?;
            Config::load(&cwd)?
        }
    };
    config.strict |= global.strict;
    if global.verbose > 0 {
        eprintln!("{}", config.display_summary());
    }
    Ok(config)
}

fn read_payloads(inputs: &[String]) -> Result<Vec<Value>> {
    inputs
        .iter()
        .map(|input| {
            let text = if input == "-" {
                let mut buf = String::new();
                io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read payload from stdin")?;
                buf
            } else {
                fs::read_to_string(input)
                    .with_context(|| format!("failed to read payload {input}"))?
            };
            debug!(input = %input, bytes = text.len(), "payload read");
            serde_json::from_str(&text).with_context(|| format!("payload {input} is not valid JSON"))
        })
        .collect()
}

fn write_json<T: Serialize>(path: Option<&Path>, value: &T, pretty: bool) -> Result<()> {
    let mut text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    text.push('\n');

    match path {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
        }
        None => {
            io::stdout().lock().write_all(text.as_bytes())?;
            Ok(())
        }
    }
}
