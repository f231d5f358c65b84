//! Command-line interface for the harvester.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use console::style;
use counter_ingest::{write_records_csv, CounterVersion};
use indicatif::{ProgressBar, ProgressStyle};

use crate::catalogue::ReportRequest;
use crate::client::{SushiClient, SushiResponse};
use crate::config::{parse_month, ClientConfig, Credentials};
use crate::error::{HarvesterError, Result};

/// COUNTER Harvester - Download COUNTER 5 and 5.1 usage reports over SUSHI.
#[derive(Parser, Debug)]
#[command(name = "counter-harvester")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log requests and parsing decisions
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a report and write it to stdout.
    #[command(disable_version_flag = true)]
    Download(DownloadArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Base URL of the SUSHI API (e.g., https://sushi.example.com/counter/r5)
    pub url: Option<String>,

    /// Report type or standard view (e.g., tr, pr_p1, ir_m1)
    #[arg(short = 't', long, default_value = "tr")]
    pub report_type: String,

    #[arg(long)]
    pub requestor_id: Option<String>,

    #[arg(long)]
    pub customer_id: Option<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    /// First month in YYYY-MM format
    #[arg(short, long)]
    pub begin_date: String,

    /// Last month in YYYY-MM format
    #[arg(short, long)]
    pub end_date: String,

    /// COUNTER release (5 or 5.1)
    #[arg(long = "version", value_name = "RELEASE", default_value = "5")]
    pub release: String,

    /// YAML file with url, customer_id, requestor_id, api_key and extra_params
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write normalized records as CSV instead of the raw response
    #[arg(long)]
    pub records: bool,
}

/// Run the CLI.
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Download(args) => download_command(&args),
    }
}

/// Client settings and request overrides resolved from flags and credentials file.
struct Resolved {
    config: ClientConfig,
    overrides: Vec<(String, String)>,
}

/// Merge the credentials file with the flags; flags win.
fn resolve(args: &DownloadArgs, credentials: Credentials) -> Result<Resolved> {
    let url = args
        .url
        .clone()
        .or(credentials.url)
        .ok_or_else(|| HarvesterError::Config("No SUSHI URL given".to_string()))?;
    let customer_id = args.customer_id.clone().or(credentials.customer_id);
    let requestor_id = args.requestor_id.clone().or(credentials.requestor_id);
    if customer_id.is_none() && requestor_id.is_none() {
        return Err(HarvesterError::Config(
            "Either --customer-id or --requestor-id is required".to_string(),
        ));
    }

    let mut config = ClientConfig::new(url, customer_id.unwrap_or_default());
    if let Some(requestor_id) = requestor_id {
        config = config.with_requestor_id(requestor_id);
    }
    for (name, value) in credentials.extra_params {
        config = config.with_extra_param(name, value);
    }

    let overrides = args
        .api_key
        .clone()
        .or(credentials.api_key)
        .map(|api_key| vec![("api_key".to_string(), api_key)])
        .unwrap_or_default();

    Ok(Resolved {
        config: config.apply_env(),
        overrides,
    })
}

/// Execute the download command.
fn download_command(args: &DownloadArgs) -> Result<()> {
    // Validate inputs before making HTTP requests
    let report = ReportRequest::parse(&args.report_type)?;
    let version: CounterVersion = args.release.parse()?;
    let begin = parse_month(&args.begin_date)?;
    let end = parse_month(&args.end_date)?;
    if begin > end {
        return Err(HarvesterError::InvalidDate(format!(
            "{} is after {}",
            args.begin_date, args.end_date
        )));
    }

    let credentials = match &args.config {
        Some(path) => load_credentials(path)?,
        None => Credentials::default(),
    };
    let Resolved { config, overrides } = resolve(args, credentials)?;
    let client = SushiClient::new(config, version)?;

    eprintln!(
        "{} {} (COUNTER {}) for {} to {}",
        style("Downloading").bold(),
        style(&report).cyan(),
        version,
        style(&args.begin_date).green(),
        style(&args.end_date).green()
    );

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message("Waiting for the SUSHI server...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let response = match client.get_report_data(&report, begin, end, &overrides) {
        Ok(response) => response,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    print_summary(&response);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.records {
        response.validate()?;
        let written = write_records_csv(&mut out, response.into_records())?;
        eprintln!("  Records: {written}");
    } else {
        io::copy(&mut response.body()?, &mut out)?;
        out.flush()?;
        response.validate()?;
    }

    Ok(())
}

fn load_credentials(path: &Path) -> Result<Credentials> {
    if !path.is_file() {
        return Err(HarvesterError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Config file does not exist: {}", path.display()),
        )));
    }
    Credentials::load(path)
}

fn print_summary(response: &SushiResponse) {
    let report = &response.report;
    eprintln!("  HTTP status: {}", response.http_status);
    if report.queued() {
        eprintln!("  {}", style("Report is queued, try again later").yellow());
    }
    if !report.errors().is_empty() {
        eprintln!("  Errors: {}", style(report.errors().len()).red().bold());
    }
    if !report.warnings().is_empty() {
        eprintln!("  Warnings: {}", style(report.warnings().len()).yellow().bold());
    }
    let months = report.months();
    if let (Some(first), Some(last)) = (months.first(), months.last()) {
        eprintln!("  Months: {} to {}", first.format("%Y-%m"), last.format("%Y-%m"));
    }
}
