use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pipegraph_core::{Config, Diagnostic, GraphStats, IdStrategy, Report, Severity};
use pipegraph_engine::{to_elements, LineageGraph, NodeKind, NormalizeError, Normalized, Normalizer};
use pipegraph_model::{GraphData, Label, StepFilter};

/// pipegraph - flatten data-pipeline graphs for rendering
#[derive(Parser)]
#[command(name = "pipegraph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: pipegraph.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Step selection flags shared by every command
#[derive(clap::Args, Debug, Default)]
struct FilterArgs {
    /// Keep only transforms whose name starts with this prefix
    #[arg(long)]
    prefix: Option<String>,

    /// Keep only transforms carrying this label (repeatable)
    #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_label)]
    labels: Vec<Label>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Renderer element list
    Elements,

    /// Node map and edge list
    Graph,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a graph description into nodes and edges
    Normalize {
        /// Graph JSON (as served by the catalog backend)
        graph: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output shape
        #[arg(long, value_enum, default_value_t = OutputFormat::Elements)]
        format: OutputFormat,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Validate a graph description and write a report
    Check {
        /// Graph JSON
        graph: PathBuf,

        /// Output file for report.json
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Show upstream or downstream lineage of a node
    Impact {
        /// Graph JSON
        graph: PathBuf,

        /// Node id to analyze
        node: String,

        /// Walk towards sources instead of consumers
        #[arg(long)]
        upstream: bool,
    },

    /// Print node and edge counts
    Stats {
        /// Graph JSON
        graph: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env is optional
    let _ = dotenvy::dotenv();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(
        id_strategy = %config.id_strategy,
        strict = config.strict,
        "configuration loaded"
    );

    match cli.command {
        Commands::Normalize { graph, output, format, filter } => {
            normalize_command(&config, &graph, output.as_deref(), format, &filter)
        }
        Commands::Check { graph, output, filter } => {
            check_command(&config, &graph, &output, &filter, cli.verbose)
        }
        Commands::Impact { graph, node, upstream } => {
            impact_command(&config, &graph, &node, upstream)
        }
        Commands::Stats { graph, filter } => stats_command(&config, &graph, &filter),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = if let Some(config_path) = path {
        Config::from_file(config_path)?
    } else if Path::new("pipegraph.toml").exists() {
        Config::from_file(Path::new("pipegraph.toml"))?
    } else {
        tracing::debug!("no config file found, using defaults");
        Config::default()
    };

    config.apply_env()?;
    Ok(config)
}

fn parse_label(s: &str) -> Result<Label, String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Config `[filter]` section, extended by command-line flags
fn step_filter(config: &Config, args: &FilterArgs) -> StepFilter {
    let mut filter = StepFilter::from_config(&config.filter);

    if let Some(prefix) = &args.prefix {
        filter = filter.with_prefix(prefix.clone());
    }
    for (key, value) in &args.labels {
        filter = filter.with_label(key.clone(), value.clone());
    }

    filter
}

/// Load, filter, normalize and validate
///
/// `strict` is passed separately so `check` can always produce a report.
fn load_and_run(config: &Config, path: &Path, filter: &StepFilter, strict: bool) -> Result<Normalized> {
    tracing::debug!(path = %path.display(), "loading graph");
    let graph = GraphData::from_file(path)?;

    let graph = if filter.is_empty() {
        graph
    } else {
        let filtered = filter.apply(&graph);
        tracing::debug!(
            before = graph.scoped_steps().len(),
            after = filtered.scoped_steps().len(),
            "applied step filter"
        );
        filtered
    };

    match Normalizer::from_config(config).strict(strict).run(&graph) {
        Ok(result) => Ok(result),
        Err(NormalizeError::Invalid { errors, diagnostics }) => {
            print_diagnostics(&diagnostics);
            Err(anyhow::anyhow!(
                "{} failed strict validation with {} error(s)",
                path.display(),
                errors
            ))
        }
    }
}

/// Normalize command - write the flattened graph
fn normalize_command(
    config: &Config,
    graph_path: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    filter: &FilterArgs,
) -> Result<()> {
    let result = load_and_run(config, graph_path, &step_filter(config, filter), config.strict)?;

    for diag in &result.diagnostics {
        if diag.severity >= Severity::Warn {
            tracing::warn!(code = %diag.code, "{}", diag.message);
        }
    }

    let json = match format {
        OutputFormat::Elements => serde_json::to_string_pretty(&to_elements(&result.graph))?,
        OutputFormat::Graph => serde_json::to_string_pretty(&result.graph)?,
    };

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            eprintln!("{} {}", "Wrote".green(), path.display());
        }
        None => println!("{}", json),
    }

    Ok(())
}

/// Check command - validate and save report.json
fn check_command(
    config: &Config,
    graph_path: &Path,
    output: &Path,
    filter: &FilterArgs,
    verbose: bool,
) -> Result<()> {
    let result = load_and_run(config, graph_path, &step_filter(config, filter), false)?;

    let report = Report::from_diagnostics(result.diagnostics, result.graph.stats()).with_metadata(
        serde_json::json!({
            "graph": graph_path.display().to_string(),
            "id_strategy": config.id_strategy.to_string(),
        }),
    );

    report.save_to_file(output)?;
    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), output.display());
    }

    print_diagnostics(&report.diagnostics);
    print_stats(&report.summary.graph);

    println!();
    println!(
        "{} errors, {} warnings, {} info",
        report.summary.errors.to_string().red(),
        report.summary.warnings.to_string().yellow(),
        report.summary.info.to_string().cyan()
    );

    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Impact command - show upstream/downstream lineage
fn impact_command(config: &Config, graph_path: &Path, node: &str, upstream: bool) -> Result<()> {
    let result = load_and_run(config, graph_path, &StepFilter::new(), config.strict)?;
    let lineage = LineageGraph::from_normalized(&result.graph);

    if !lineage.contains(node) {
        return Err(anyhow::anyhow!(
            "Node '{}' not found in {}. Node ids are table and step names{}",
            node,
            graph_path.display(),
            if config.id_strategy == IdStrategy::Namespaced {
                " prefixed by kind (e.g. 'table:events')"
            } else {
                ""
            }
        ));
    }

    let (title, affected) = if upstream {
        ("Upstream Lineage", lineage.upstream(node))
    } else {
        ("Downstream Impact", lineage.downstream(node))
    };

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
    println!("{} {}", "Node:".bold(), node.green());
    println!("{} {}", "Reached nodes:".bold(), affected.len());
    println!();

    if affected.is_empty() {
        println!("{}", "✓ Nothing reached".green());
    } else {
        for (i, id) in affected.iter().enumerate() {
            let kind = result
                .graph
                .node(id)
                .map(|n| n.kind.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  {}. {} ({})", i + 1, id.yellow(), kind);
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

/// Stats command - print graph shape
fn stats_command(config: &Config, graph_path: &Path, filter: &FilterArgs) -> Result<()> {
    let result = load_and_run(config, graph_path, &step_filter(config, filter), config.strict)?;
    print_stats(&result.graph.stats());

    let groups: Vec<&str> = result
        .graph
        .nodes
        .iter()
        .filter(|(_, n)| n.kind == NodeKind::Group)
        .map(|(id, _)| id.as_str())
        .collect();

    for group in groups {
        println!(
            "  {} {} ({} children)",
            "group".cyan(),
            group,
            result.graph.children_of(group).len()
        );
    }

    Ok(())
}

fn print_stats(stats: &GraphStats) {
    println!("{}", "Graph".bold());
    println!("  nodes:      {}", stats.nodes);
    println!("  edges:      {}", stats.edges);
    println!("  tables:     {}", stats.tables);
    println!("  transforms: {}", stats.transforms);
    println!("  groups:     {}", stats.groups);
    println!("  max depth:  {}", stats.max_depth);
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        let severity = match diag.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warn => "warn".yellow().bold(),
            Severity::Info => "info".cyan(),
        };

        let node = diag
            .node
            .as_deref()
            .map(|n| format!(" [{}]", n))
            .unwrap_or_default();

        eprintln!("{} {}{}: {}", severity, diag.code.as_str().dimmed(), node, diag.message);
    }
}
