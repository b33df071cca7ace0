//! Relgraph CLI: config-driven front-end for the relgraph pipeline
//!
//! Every command reads a pipeline YAML document, loads it into an
//! in-memory graph and reports on the result.

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use relgraph::source::{columnar, delimited};
use relgraph::{
    project, read_batches, GraphStore, MemoryGraph, Params, Pipeline, PipelineConfig, QueryResult, RunReport,
    TabularSource, Value,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relgraph", version, about = "Relational-to-graph pipeline CLI")]
struct Cli {
    /// Pipeline configuration file
    #[arg(long, short, default_value = "pipeline.yaml", global = true, env = "RELGRAPH_CONFIG")]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every source, run the configured queries and enrichments
    Run,
    /// Print the schema as CREATE TABLE statements
    Ddl,
    /// Load the configured sources, then run one pattern query
    Query {
        /// The Cypher query string
        cypher: String,

        /// Query parameter as name=value (value parsed as JSON, else text)
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,
    },
    /// Apply one configured projection and print (or write) the batch
    Project {
        /// Projection name
        name: String,

        /// Write to this file instead of printing (`.csv` or `.parquet`)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Load the configured sources and start an interactive query shell
    Shell,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match PipelineConfig::from_file(&cli.config) {
        Ok(config) => match cli.command {
            Commands::Run => run_pipeline(&config, &cli.format).await,
            Commands::Ddl => run_ddl(&config),
            Commands::Query { cypher, params } => run_query(&config, &cypher, &params, &cli.format).await,
            Commands::Project { name, output } => run_project(&config, &name, output, &cli.format),
            Commands::Shell => run_shell(&config, &cli.format).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load the config's sources and projections only
async fn load(config: &PipelineConfig) -> CliResult<(Arc<MemoryGraph>, RunReport)> {
    let mut load_only = config.clone();
    load_only.queries.clear();
    load_only.enrichments.clear();
    let store = Arc::new(MemoryGraph::new());
    let report = Pipeline::run(&load_only, store.clone(), Vec::new()).await?;
    Ok((store, report))
}

async fn run_pipeline(config: &PipelineConfig, format: &OutputFormat) -> CliResult<()> {
    let store = Arc::new(MemoryGraph::new());
    let report = Pipeline::run(config, store, Vec::new()).await?;

    println!(
        "Schema: {} created, {} existing",
        report.schema.created.len(),
        report.schema.existing.len()
    );
    let mut loaded = Table::new();
    loaded.set_header(vec!["table", "rows"]);
    for (table, rows) in &report.loaded {
        loaded.add_row(vec![table.clone(), rows.to_string()]);
    }
    println!("{}", loaded);

    for (name, result) in &report.queries {
        println!("\nQuery {}:", name);
        print_result(result, format)?;
    }

    for (name, outcome) in &report.enrichments {
        println!("\nEnrichment {} ({} scores):", name, outcome.result.len());
        for target in &outcome.targets {
            match &target.outcome {
                Ok(written) => println!(
                    "  {}: {} written, {} orphaned",
                    target.target, written.written, written.orphaned
                ),
                Err(e) => println!("  {}: failed: {}", target.target, e),
            }
        }
    }
    Ok(())
}

fn run_ddl(config: &PipelineConfig) -> CliResult<()> {
    for statement in config.registry()?.ddl() {
        println!("{};", statement);
    }
    Ok(())
}

async fn run_query(config: &PipelineConfig, cypher: &str, params: &[String], format: &OutputFormat) -> CliResult<()> {
    let params = parse_params(params)?;
    let (store, _) = load(config).await?;
    let result = store.query(cypher, &params).await?;
    print_result(&result, format)
}

fn run_project(
    config: &PipelineConfig,
    name: &str,
    output: Option<PathBuf>,
    format: &OutputFormat,
) -> CliResult<()> {
    let projection = config
        .projections
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| format!("no projection named {}", name))?;
    let registry = config.registry()?;
    let rule = projection.rule(&registry)?;
    let layout = projection.source_layout(&registry)?;
    let options = config.options_for(&projection.options);
    let input = read_batches(&config.source(&projection.source), &layout, options)?.read_all()?;
    let batch = project(&rule, &input)?;

    match output {
        Some(path) => {
            let written = match TabularSource::from_path(&path) {
                TabularSource::Parquet(_) => columnar::write_parquet(&path, &batch)?,
                _ => delimited::write_csv(&path, &batch, options)?,
            };
            println!("{} of {} rows written to {}", written, input.len(), path.display());
        }
        None => {
            let result = QueryResult {
                columns: batch.column_names().into_iter().map(String::from).collect(),
                rows: batch.rows().to_vec(),
                ..Default::default()
            };
            print_result(&result, format)?;
        }
    }
    Ok(())
}

async fn run_shell(config: &PipelineConfig, format: &OutputFormat) -> CliResult<()> {
    let (store, report) = load(config).await?;
    println!("Relgraph Interactive Shell");
    println!(
        "Loaded {} rows into {} tables.",
        report.loaded.values().sum::<usize>(),
        report.loaded.len()
    );
    println!("Type Cypher queries, or :help for commands. :quit to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        eprint!("relgraph> ");

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            ":quit" | ":exit" | ":q" => break,
            ":help" | ":h" => {
                println!("Commands:");
                println!("  :tables   Show tables and row counts");
                println!("  :quit     Exit shell");
                println!("  <cypher>  Execute a pattern query");
            }
            ":tables" => {
                for table in store.tables().await? {
                    let rows = store.count(table.name()).await?;
                    println!("  {} {} ({} rows)", table.kind(), table.name(), rows);
                }
            }
            cypher => match store.query(cypher, &Params::new()).await {
                Ok(result) => print_result(&result, format)?,
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }

    println!("Bye!");
    Ok(())
}

fn parse_params(raw: &[String]) -> CliResult<Params> {
    let mut params = Params::new();
    for item in raw {
        let (name, text) = item
            .split_once('=')
            .ok_or_else(|| format!("parameter {} is not name=value", item))?;
        let value = match serde_json::from_str::<serde_json::Value>(text) {
            Ok(json) => relgraph::source::coerce::json_to_value(&json).unwrap_or_else(|| Value::from(text)),
            Err(_) => Value::from(text),
        };
        params.insert(name.to_string(), value);
    }
    Ok(params)
}

fn print_result(result: &QueryResult, format: &OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = result
                .rows
                .iter()
                .map(|row| {
                    result
                        .columns
                        .iter()
                        .zip(row)
                        .map(|(column, value)| (column.clone(), value.to_json()))
                        .collect::<serde_json::Map<_, _>>()
                        .into()
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Csv => {
            if !result.columns.is_empty() {
                println!("{}", result.columns.join(","));
                for row in &result.rows {
                    let cells: Vec<String> = row.iter().map(format_csv_value).collect();
                    println!("{}", cells.join(","));
                }
            }
        }
        OutputFormat::Table => {
            if result.columns.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&result.columns);

            for row in &result.rows {
                let cells: Vec<String> = row.iter().map(format_table_value).collect();
                table.add_row(cells);
            }

            println!("{}", table);
            println!("{} row(s)", result.rows.len());
        }
    }

    Ok(())
}

fn format_table_value(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        other => other.to_text(),
    }
}

fn format_csv_value(v: &Value) -> String {
    let text = v.to_text();
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}
