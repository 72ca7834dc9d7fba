//! Command-line interface: `fetch` and `summarize`

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::downloader::config::{
    DEFAULT_BASE_URL, DEFAULT_CATEGORY_ID, DEFAULT_CONCURRENCY, DEFAULT_LOCALE, DEFAULT_PER_PAGE,
    DEFAULT_PROGRESS_INTERVAL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT,
    DEFAULT_SORT, MAX_CONCURRENCY,
};
use crate::downloader::{CatalogExecutor, CatalogQuery, DownloadError, FetchConfig, RunSummary};
use crate::fetcher::http::CatalogHttpClient;
use crate::output::csv::CsvProductsWriter;
use crate::report::{summarize_csv, CatalogSummary};
use crate::shutdown::SharedShutdown;

use super::CliError;

/// Default output file.
pub const DEFAULT_OUTPUT: &str = "data/clothes.csv";

/// Parse and validate concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Parse a non-negative number of seconds, fractions allowed.
fn parse_seconds(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs)
        .map(|_| secs)
        .map_err(|e| format!("invalid duration '{s}': {e}"))
}

/// Catalog harvester CLI
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(about = "Fetch a paginated marketplace catalog into CSV", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true, env = "CATALOG_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every catalog page and write products to CSV
    Fetch(FetchArgs),

    /// Summarize a previously written product CSV
    Summarize(SummarizeArgs),
}

/// Arguments for `fetch`
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Products endpoint
    #[arg(long, env = "CATALOG_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Category to fetch
    #[arg(long, env = "CATALOG_CATEGORY_ID", default_value_t = DEFAULT_CATEGORY_ID)]
    pub category_id: u64,

    /// Items per page
    #[arg(long, env = "CATALOG_PER_PAGE", default_value_t = DEFAULT_PER_PAGE,
          value_parser = clap::value_parser!(u32).range(1..=500))]
    pub per_page: u32,

    /// Sort key
    #[arg(long, env = "CATALOG_SORT", default_value = DEFAULT_SORT)]
    pub sort: String,

    /// Simultaneous requests (max 64)
    #[arg(long, env = "CATALOG_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY,
          value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Attempts per page, including the first
    #[arg(long, env = "CATALOG_RETRY_LIMIT", default_value_t = DEFAULT_RETRY_LIMIT,
          value_parser = clap::value_parser!(u32).range(1..=20))]
    pub retry_limit: u32,

    /// Seconds to wait between attempts of a page
    #[arg(long, env = "CATALOG_RETRY_DELAY_SECS",
          default_value_t = DEFAULT_RETRY_DELAY.as_secs_f64(), value_parser = parse_seconds)]
    pub retry_delay_secs: f64,

    /// Per-request timeout in seconds
    #[arg(long, env = "CATALOG_TIMEOUT_SECS",
          default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs_f64(), value_parser = parse_seconds)]
    pub timeout_secs: f64,

    /// Log a progress line every N completed pages
    #[arg(long, default_value_t = DEFAULT_PROGRESS_INTERVAL, value_parser = clap::value_parser!(u32).range(1..))]
    pub progress_interval: u32,

    /// Value of the language headers
    #[arg(long, default_value = DEFAULT_LOCALE)]
    pub locale: String,

    /// Accept invalid TLS certificates
    #[arg(long, default_value_t = false)]
    pub insecure: bool,

    /// Hide the progress bar
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,

    /// Output CSV file
    #[arg(long, short, env = "CATALOG_OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,
}

/// Arguments for `summarize`
#[derive(Parser, Debug)]
pub struct SummarizeArgs {
    /// Product CSV to read
    #[arg(long, short, default_value = DEFAULT_OUTPUT)]
    pub input: PathBuf,

    /// Number of sellers to list
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl FetchArgs {
    /// Fetch configuration described by these arguments.
    pub fn to_config(&self) -> FetchConfig {
        FetchConfig {
            base_url: self.base_url.clone(),
            query: CatalogQuery::new(self.category_id, self.per_page, self.sort.clone()),
            concurrency: self.concurrency,
            retry_limit: self.retry_limit,
            retry_delay: Duration::from_secs_f64(self.retry_delay_secs),
            request_timeout: Duration::from_secs_f64(self.timeout_secs),
            progress_interval: self.progress_interval,
            locale: self.locale.clone(),
            insecure: self.insecure,
            ..FetchConfig::default()
        }
    }

    /// Run a full fetch.
    ///
    /// Rows go to a `.part` file next to the output, renamed into place only
    /// after the sink closes, so a failed or cancelled run leaves any previous
    /// output untouched.
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let config = self.to_config();
        config.validate()?;
        if config.insecure {
            warn!("TLS certificate verification is disabled");
        }

        let source = CatalogHttpClient::from_config(&config).map_err(DownloadError::Client)?;
        let partial = partial_path(&self.output);
        let writer = CsvProductsWriter::new(&partial)?;

        let mut executor = CatalogExecutor::new(config).with_shutdown(shutdown);
        let progress = (!self.no_progress && cli.output_format == OutputFormat::Human)
            .then(create_progress_bar);
        if let Some(bar) = &progress {
            executor = executor.with_progress_bar(bar.clone());
        }

        let result = executor.execute(source, writer).await;
        if let Some(bar) = progress {
            bar.finish_and_clear();
        }

        let result = match result {
            Ok(summary) => std::fs::rename(&partial, &self.output)
                .map(|_| summary)
                .map_err(CliError::from),
            Err(e) => {
                if let Err(remove_err) = std::fs::remove_file(&partial) {
                    warn!(path = %partial.display(), error = %remove_err, "Could not remove partial output");
                }
                Err(CliError::from(e))
            }
        };

        match cli.output_format {
            OutputFormat::Json => print_fetch_json(&self.output, &result),
            OutputFormat::Human => print_fetch_human(&self.output, &result),
        }
        result.map(|_| ())
    }
}

impl SummarizeArgs {
    /// Summarize the input CSV and print the report.
    pub async fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let summary = summarize_csv(&self.input, self.top)?;
        info!(products = summary.total_products, "Summary ready");

        match cli.output_format {
            OutputFormat::Json => print_json(&summary_json(&self.input, &summary)),
            OutputFormat::Human => println!("{}", summary.format_human()),
        }
        Ok(())
    }
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    output.with_file_name(name)
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string(value) {
        Ok(text) => println!("{text}"),
        Err(e) => warn!(error = %e, "Failed to serialize output"),
    }
}

fn print_fetch_json(output: &Path, result: &Result<RunSummary, CliError>) {
    let value = match result {
        Ok(summary) => serde_json::json!({
            "success": true,
            "output_path": output.display().to_string(),
            "summary": summary,
            "error": null,
        }),
        Err(e) => serde_json::json!({
            "success": false,
            "output_path": output.display().to_string(),
            "summary": null,
            "error": e.to_string(),
        }),
    };
    print_json(&value);
}

fn print_fetch_human(output: &Path, result: &Result<RunSummary, CliError>) {
    match result {
        Ok(summary) => {
            println!("{}", summary.format_human());
            println!("Saved to {}", output.display());
        }
        Err(e) => eprintln!("Fetch failed: {e}"),
    }
}

fn summary_json(input: &Path, summary: &CatalogSummary) -> serde_json::Value {
    serde_json::json!({
        "input_path": input.display().to_string(),
        "summary": summary,
    })
}

/// Progress bar advanced once per completed page.
fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message("Fetching catalog");
    pb
}
