//! setflow CLI: run INTERSECT / EXCEPT queries over CSV relations.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use setflow_core::config::EngineConfig;
use setflow_core::types::RowBatch;
use setflow_exec::{load_relations, run_set_plan_with, RunOptions, RunStats};
use setflow_io::{CsvWriter, JsonlWriter};
use setflow_planner::{parse_yaml_query, ParsedQuery, QueryConfig};

#[derive(Parser)]
#[command(name = "setflow")]
#[command(about = "Streaming INTERSECT / EXCEPT over CSV relations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a query document
    Run {
        /// Path to the query YAML file
        #[arg(short, long)]
        query: PathBuf,

        /// Memory cap in bytes (overrides env and document)
        #[arg(long)]
        mem_cap: Option<usize>,

        /// Rows per input batch (overrides env and document)
        #[arg(long)]
        batch_rows: Option<usize>,

        /// Write results here (.jsonl/.ndjson for NDJSON, CSV otherwise);
        /// stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop after this many result rows
        #[arg(long)]
        limit: Option<usize>,

        /// Print run statistics as JSON to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Parse and plan a query document without reading data
    Validate {
        #[arg(short, long)]
        query: PathBuf,
    },

    /// Show the operator chain of a query document
    Explain {
        #[arg(short, long)]
        query: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            query,
            mem_cap,
            batch_rows,
            output,
            limit,
            stats,
        } => run_query(&query, mem_cap, batch_rows, output.as_deref(), limit, stats),
        Commands::Validate { query } => validate_query(&query).map(|_| {
            println!("✓ Query is valid");
        }),
        Commands::Explain { query } => explain_query(&query),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn load_query(path: &Path) -> CliResult<ParsedQuery> {
    let yaml = fs::read_to_string(path)?;
    Ok(parse_yaml_query(&yaml)?)
}

/// Layer configuration: `base` (defaults + env), then the document, then
/// command-line flags.
fn resolve_config(
    base: EngineConfig,
    doc: &QueryConfig,
    mem_cap: Option<usize>,
    batch_rows: Option<usize>,
) -> CliResult<EngineConfig> {
    let mut config = base;
    doc.apply_to(&mut config);
    if let Some(cap) = mem_cap {
        config.mem_cap_bytes = cap;
    }
    if let Some(rows) = batch_rows {
        config.batch_rows = rows;
    }
    config.validate()?;
    Ok(config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Csv,
    Jsonl,
}

fn output_format(path: Option<&Path>) -> OutputFormat {
    match path.and_then(Path::extension).and_then(|e| e.to_str()) {
        Some("jsonl") | Some("ndjson") => OutputFormat::Jsonl,
        _ => OutputFormat::Csv,
    }
}

fn write_results<W: Write>(
    writer: W,
    format: OutputFormat,
    parsed: &ParsedQuery,
    batches: &[RowBatch],
) -> CliResult<u64> {
    match format {
        OutputFormat::Csv => {
            let mut w = CsvWriter::to_writer(writer);
            w.write_header(&parsed.plan.header)?;
            for batch in batches {
                w.write_batch(batch)?;
            }
            let rows = w.rows_written();
            w.finish()?;
            Ok(rows)
        }
        OutputFormat::Jsonl => {
            let mut w = JsonlWriter::to_writer(writer);
            for batch in batches {
                w.write_batch(batch)?;
            }
            let rows = w.rows_written();
            w.finish()?;
            Ok(rows)
        }
    }
}

fn run_query(
    query_path: &Path,
    mem_cap: Option<usize>,
    batch_rows: Option<usize>,
    output: Option<&Path>,
    limit: Option<usize>,
    print_stats: bool,
) -> CliResult<()> {
    let parsed = load_query(query_path)?;
    let config = resolve_config(EngineConfig::from_env(), &parsed.config, mem_cap, batch_rows)?;
    info!(query = %parsed.expr, ?config, "running query");

    let inputs = load_relations(&parsed.relations, query_path.parent(), config.batch_rows)?;
    let out = run_set_plan_with(&parsed.plan, &inputs, &config, RunOptions { limit })?;

    let format = output_format(output);
    let rows = match output {
        Some(path) => write_results(fs::File::create(path)?, format, &parsed, &out.batches)?,
        None => write_results(std::io::stdout().lock(), format, &parsed, &out.batches)?,
    };

    if print_stats {
        eprintln!("{}", stats_json(&out.stats)?);
    }
    if let Some(path) = output {
        eprintln!("✓ {} rows written to {}", rows, path.display());
    }
    Ok(())
}

fn stats_json(stats: &RunStats) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(stats)?)
}

fn validate_query(query_path: &Path) -> CliResult<ParsedQuery> {
    load_query(query_path)
}

fn explain_query(query_path: &Path) -> CliResult<()> {
    let parsed = load_query(query_path)?;
    let config = resolve_config(EngineConfig::from_env(), &parsed.config, None, None)?;

    println!("Set Query Plan");
    println!("==============");
    println!();
    println!("Query: {}", parsed.expr);
    println!(
        "Memory Cap: {} bytes ({:.2} MB)",
        config.mem_cap_bytes,
        config.mem_cap_bytes as f64 / 1_048_576.0
    );
    println!("Batch Rows: {}", config.batch_rows);
    println!();
    println!("Relations:");
    for rel in &parsed.relations {
        println!("  {} <- {} ({} columns)", rel.name, rel.source, rel.header.len());
    }
    println!();
    println!("Output Columns:");
    for f in &parsed.plan.header.fields {
        let mut flags = Vec::new();
        if f.nullable {
            flags.push("nullable");
        }
        if f.constant {
            flags.push("constant");
        }
        println!("  {}: {:?} {}", f.name, f.data_type, flags.join(" "));
    }
    println!();
    println!("Operators:");
    print!("{}", parsed.plan.explain());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_overrides_base_config() {
        let doc = QueryConfig {
            mem_cap_bytes: Some(1 << 20),
            ..Default::default()
        };
        let cfg = resolve_config(EngineConfig::default(), &doc, None, None).unwrap();
        assert_eq!(cfg.mem_cap_bytes, 1 << 20);
        assert_eq!(cfg.batch_rows, EngineConfig::default().batch_rows);
    }

    #[test]
    fn cli_overrides_higher_priority_than_document() {
        let doc = QueryConfig {
            mem_cap_bytes: Some(1 << 20),
            batch_rows: Some(10),
            ..Default::default()
        };
        let cfg = resolve_config(EngineConfig::default(), &doc, Some(4096), Some(3)).unwrap();
        assert_eq!(cfg.mem_cap_bytes, 4096);
        assert_eq!(cfg.batch_rows, 3);
    }

    #[test]
    fn zero_batch_rows_is_rejected() {
        assert!(resolve_config(EngineConfig::default(), &QueryConfig::default(), None, Some(0)).is_err());
    }

    #[test]
    fn output_format_follows_extension() {
        assert_eq!(output_format(None), OutputFormat::Csv);
        assert_eq!(output_format(Some(Path::new("out.csv"))), OutputFormat::Csv);
        assert_eq!(output_format(Some(Path::new("out.jsonl"))), OutputFormat::Jsonl);
        assert_eq!(output_format(Some(Path::new("out.ndjson"))), OutputFormat::Jsonl);
    }
}
