//! CLI entry point for the score trend tool.
//!
//! Provides subcommands for per-student reports, the per-exam class table,
//! and listing the students of an uploaded score sheet.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use score_trends::analyzers::{aggregate_by_exam, exam_median_volatility};
use score_trends::analyzers::types::Volatility;
use score_trends::cache::DatasetCache;
use score_trends::config::Config;
use score_trends::fetch::{BasicClient, BearerToken, load_source};
use score_trends::output::{write_aggregates_csv, write_json, write_markdown, write_series_csv};
use score_trends::report::{StudentReport, render_markdown, students};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "score_trends")]
#[command(about = "Exam score trends, class comparison and volatility reports", long_about = None)]
struct Cli {
    /// Config file (defaults to ./score_trends.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build JSON, CSV and Markdown reports for one or more students
    Analyze {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Student to report on (repeatable)
        #[arg(short, long = "student", required = true)]
        students: Vec<String>,

        /// Output directory (overrides the config file)
        #[arg(short = 'd', long)]
        out_dir: Option<PathBuf>,
    },
    /// Write the per-exam class aggregate table
    Exams {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// CSV file to write
        #[arg(short, long, default_value = "exams.csv")]
        output: PathBuf,
    },
    /// List the students found in a score sheet
    Students {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/score_trends.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("score_trends.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(cli.config.as_deref())?;
    let mut cache = DatasetCache::new();

    match cli.command {
        Commands::Analyze {
            source,
            students: requested,
            out_dir,
        } => {
            let out_dir = out_dir.unwrap_or_else(|| PathBuf::from(&config.output.dir));
            let bytes = fetcher(&source).await?;

            let mut failures = 0usize;
            for student_id in &requested {
                // Same bytes every time: validation runs once, the rest per student.
                let dataset = cache.get_or_load(&bytes, &config.columns)?;
                match StudentReport::build(&dataset, student_id) {
                    Ok(report) => write_student_report(&out_dir, &report)?,
                    Err(e) => {
                        error!(student_id = %student_id, error = %e, "Report skipped");
                        failures += 1;
                    }
                }
            }

            info!(
                written = requested.len() - failures,
                failed = failures,
                out_dir = %out_dir.display(),
                "Analysis finished"
            );
            if failures == requested.len() {
                anyhow::bail!("no reports could be built");
            }
        }
        Commands::Exams { source, output } => {
            let bytes = fetcher(&source).await?;
            let dataset = cache.get_or_load(&bytes, &config.columns)?;
            let aggregates = aggregate_by_exam(&dataset);

            write_aggregates_csv(&output, &aggregates)?;

            match exam_median_volatility(&aggregates) {
                Volatility::Computed {
                    points,
                    mean,
                    std_dev,
                } => info!(points, mean, std_dev, "Exam median volatility"),
                Volatility::InsufficientData { points } => {
                    warn!(points, "Exam median volatility not computable")
                }
            }
        }
        Commands::Students { source } => {
            let bytes = fetcher(&source).await?;
            let dataset = cache.get_or_load(&bytes, &config.columns)?;
            let ids = students(&dataset);

            info!(
                total = ids.len(),
                records = dataset.len(),
                dropped = dataset.dropped(),
                "Student list"
            );
            for id in &ids {
                info!(student_id = %id, "Student");
            }
        }
    }

    Ok(())
}

/// Loads the score sheet, sending `SCORES_TOKEN` as a bearer token when set.
async fn fetcher(source: &str) -> Result<Vec<u8>> {
    match std::env::var("SCORES_TOKEN") {
        Ok(token) if !token.is_empty() => {
            let client = BearerToken::new(BasicClient::new(), &token)
                .context("SCORES_TOKEN is not a valid header value")?;
            load_source(&client, source).await
        }
        _ => load_source(&BasicClient::new(), source).await,
    }
}

/// Writes `<student>.json`, `<student>.csv` and `<student>.md` into `out_dir`.
fn write_student_report(out_dir: &Path, report: &StudentReport) -> Result<()> {
    let stem = file_stem(&report.series.student_id);

    write_json(&out_dir.join(format!("{stem}.json")), report)?;
    write_series_csv(&out_dir.join(format!("{stem}.csv")), &report.series)?;
    write_markdown(&out_dir.join(format!("{stem}.md")), &render_markdown(report))?;

    info!(student_id = %report.series.student_id, out_dir = %out_dir.display(), "Report written");
    Ok(())
}

/// Student ids become file names; path separators and the like are replaced.
fn file_stem(student_id: &str) -> String {
    student_id
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
