//! CLI entry point for the congestion-pricing data tool.
//!
//! Provides subcommands for fetching Open Data datasets into CSV, listing
//! the configured dataset catalog, and comparing metrics before and after
//! the congestion-pricing start date.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use congestion_data::{
    analysis::{self, Comparison, DEFAULT_ALPHA, DEFAULT_CUTOFF},
    config::{DatasetCatalog, app_token_from_env},
    fetch::{DatasetRequest, client_with_token, fetch_dataset, log_failure, try_fetch_dataset},
    output::{append_record, print_json, print_pretty, save_comparisons, write_table_csv},
    parser::parse_table,
    stats::{FetchRecord, TableStats},
    table::Table,
};
use std::ffi::OsStr;
use std::num::NonZeroUsize;
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "congestion_data")]
#[command(about = "Fetch and analyze NYC Open Data for the congestion pricing study", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where a table comes from: a catalog name, a URL, or a local JSON file.
#[derive(Args)]
struct SourceArgs {
    /// Dataset URL or path to a local JSON file
    #[arg(value_name = "URL_OR_FILE", required_unless_present = "dataset")]
    source: Option<String>,

    /// Name of a dataset in the catalog (see `list-datasets`)
    #[arg(short, long, conflicts_with = "source")]
    dataset: Option<String>,

    /// Maximum number of rows to request
    #[arg(short, long)]
    limit: Option<NonZeroUsize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a dataset and optionally export it to CSV
    Fetch {
        #[command(flatten)]
        source: SourceArgs,

        /// CSV file to write the table to
        #[arg(short, long)]
        output: Option<String>,

        /// Gzip compress the CSV output
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Log the table statistics as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// CSV file to append a fetch-run record to
        #[arg(long)]
        log: Option<String>,
    },
    /// List the datasets configured in the catalog
    ListDatasets,
    /// Compare metrics before and after the cutoff date
    Compare {
        #[command(flatten)]
        source: SourceArgs,

        /// Field holding each row's date
        #[arg(long)]
        date_field: String,

        /// Numeric fields to compare (repeatable)
        #[arg(long = "value-field", required = true)]
        value_fields: Vec<String>,

        /// First day of the "after" period (YYYY-MM-DD)
        #[arg(long, default_value_t = DEFAULT_CUTOFF)]
        cutoff: NaiveDate,

        /// Significance level for the t-test
        #[arg(long, default_value_t = DEFAULT_ALPHA)]
        alpha: f64,

        /// CSV file to save the comparison results to
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// A resolved table source.
enum Origin {
    Remote { name: String, req: DatasetRequest },
    File(String),
}

impl Origin {
    fn resolve(args: &SourceArgs) -> Result<Self> {
        if let Some(name) = &args.dataset {
            let catalog = DatasetCatalog::from_env()?;
            let req = catalog.request(name, args.limit)?;
            return Ok(Origin::Remote {
                name: name.clone(),
                req,
            });
        }

        let Some(source) = &args.source else {
            bail!("Either a source or --dataset is required");
        };

        if DatasetRequest::is_http_url(source) {
            let mut req = DatasetRequest::new(source)?;
            if let Some(limit) = args.limit {
                req = req.with_limit(limit);
            }
            Ok(Origin::Remote {
                name: source.clone(),
                req,
            })
        } else {
            Ok(Origin::File(source.clone()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let _file_guard = init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch {
            source,
            output,
            gzip,
            json,
            log,
        } => {
            let origin = Origin::resolve(&source)?;
            run_fetch(origin, output, gzip, json, log).await?;
        }
        Commands::ListDatasets => {
            let catalog = DatasetCatalog::from_env()?;
            info!(total = catalog.len(), "Dataset catalog loaded");

            for (name, entry) in catalog.iter() {
                info!(
                    dataset = name,
                    endpoint = %entry.endpoint,
                    limit = entry.limit.map(NonZeroUsize::get),
                    description = entry.description.as_deref().unwrap_or(""),
                    "Dataset"
                );
            }
        }
        Commands::Compare {
            source,
            date_field,
            value_fields,
            cutoff,
            alpha,
            output,
        } => {
            let origin = Origin::resolve(&source)?;
            let Some(table) = load_table(&origin).await? else {
                return Ok(());
            };

            let comparisons = compare_fields(&table, &date_field, &value_fields, cutoff, alpha);
            let summary = analysis::summarize(&comparisons);
            analysis::log_summary(&comparisons, &summary);

            if let Some(path) = output {
                save_comparisons(&path, &comparisons)?;
            }
        }
    }

    Ok(())
}

/// Logging setup: colored stderr + JSON rolling log file.
fn init_logging() -> Result<WorkerGuard> {
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/congestion_data.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("congestion_data.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive(LevelFilter::INFO.into()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive(LevelFilter::DEBUG.into()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(file_guard)
}

/// Fetches one table and reports it. A failed remote fetch is logged and
/// recorded but does not fail the command.
#[tracing::instrument(skip_all)]
async fn run_fetch(
    origin: Origin,
    output: Option<String>,
    gzip: bool,
    json: bool,
    log: Option<String>,
) -> Result<()> {
    let (table, record) = match &origin {
        Origin::File(path) => {
            let table = read_local(path)?;
            let record = FetchRecord::from_table(&table, 0).with_dataset(path, path);
            (table, record)
        }
        Origin::Remote { name, req } => {
            let client = client_with_token(app_token_from_env().as_deref())?;
            let limit = req.limit().get();
            let endpoint = req.endpoint().as_str();

            match try_fetch_dataset(&client, req).await {
                Ok(table) => {
                    let record = FetchRecord::from_table(&table, limit).with_dataset(name, endpoint);
                    (table, record)
                }
                Err(e) => {
                    log_failure(req, &e);
                    if let Some(log) = &log {
                        let record = FetchRecord::from_error(limit, e.kind(), &e.to_string())
                            .with_dataset(name, endpoint);
                        append_record(log, &record)?;
                    }
                    return Ok(());
                }
            }
        }
    };

    if record.hit_limit() {
        warn!(rows = record.rows, "Row limit reached, the dataset may have more rows");
    }

    let stats = TableStats::from_table(&table);
    info!(
        rows = stats.total_rows,
        columns = stats.total_columns,
        sparse_columns = stats.sparse_columns().count(),
        "Dataset loaded"
    );
    if json {
        print_json(&stats)?;
    } else {
        print_pretty(&stats);
    }

    if let Some(path) = output {
        write_table_csv(&path, &table, gzip)?;
        info!(path = %path, gzip, "Table written");
    }
    if let Some(log) = &log {
        append_record(log, &record)?;
    }

    Ok(())
}

/// Loads a table for analysis. Remote failures yield `None` after the
/// fetcher has logged them; local file errors are returned.
async fn load_table(origin: &Origin) -> Result<Option<Table>> {
    match origin {
        Origin::File(path) => Ok(Some(read_local(path)?)),
        Origin::Remote { req, .. } => {
            let client = client_with_token(app_token_from_env().as_deref())?;
            Ok(fetch_dataset(&client, req).await)
        }
    }
}

fn read_local(path: &str) -> Result<Table> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read '{path}'"))?;
    parse_table(&bytes).with_context(|| format!("Failed to parse '{path}'"))
}

fn compare_fields(
    table: &Table,
    date_field: &str,
    value_fields: &[String],
    cutoff: NaiveDate,
    alpha: f64,
) -> Vec<Comparison> {
    value_fields
        .iter()
        .filter_map(
            |field| match analysis::compare_column(table, date_field, field, cutoff, alpha) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!(metric = %field, error = %e, "Skipping metric");
                    None
                }
            },
        )
        .collect()
}
