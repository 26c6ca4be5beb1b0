//! Export of pipeline results.
//!
//! Tables go out as CSV, full reports as pretty JSON or Markdown. Existing files are
//! overwritten and missing parent directories are created.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::WriterBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::types::{ExamAggregate, StudentSeries};

const SERIES_COLUMNS: &[&str] = &[
    "exam_date",
    "total_score",
    "median_total",
    "diff_from_median",
    "explanation",
    "score_change",
    "rank",
    "class_count",
    "percentile",
    "class_std",
];

/// One line of the per-exam aggregate table.
#[derive(Debug, Serialize)]
struct ExamRow<'a> {
    exam_date: NaiveDate,
    count: usize,
    median_total: f64,
    std_total: Option<f64>,
    top_student: &'a str,
    top_score: f64,
}

fn create(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("Failed to create {}", path.display()))
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Writes one row per exam date. `std_total` is left empty when it is not
/// computable.
pub fn write_aggregates_csv(
    path: &Path,
    aggregates: &BTreeMap<NaiveDate, ExamAggregate>,
) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(create(path)?);

    for agg in aggregates.values() {
        // every aggregate has at least one ranked student
        let Some(top) = agg.ranking.first() else {
            continue;
        };
        writer.serialize(ExamRow {
            exam_date: agg.exam_date,
            count: agg.count,
            median_total: agg.median_total,
            std_total: agg.std_total,
            top_student: &top.student_id,
            top_score: top.total_score,
        })?;
    }
    writer.flush()?;

    info!(path = %path.display(), exams = aggregates.len(), "Exam table written");
    Ok(())
}

/// Writes one row per exam in the student's series, followed by one column
/// per component subject in dataset order.
pub fn write_series_csv(path: &Path, series: &StudentSeries) -> Result<()> {
    let components = &series.components;

    let mut writer = WriterBuilder::new().from_writer(create(path)?);

    let mut header: Vec<&str> = SERIES_COLUMNS.to_vec();
    header.extend(components.iter().map(|c| c.as_str()));
    writer.write_record(&header)?;

    for p in &series.points {
        let mut record = vec![
            p.exam_date.to_string(),
            p.total_score.to_string(),
            p.median_total.to_string(),
            p.diff_from_median.to_string(),
            p.explanation.to_string(),
            opt(p.score_change),
            p.rank.to_string(),
            p.class_count.to_string(),
            p.percentile.to_string(),
            opt(p.class_std),
        ];
        record.extend(
            components
                .iter()
                .map(|c| opt(p.component_scores.get(c).copied())),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), points = series.points.len(), "Series table written");
    Ok(())
}

/// Serializes any value as pretty JSON.
pub fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    debug!(path = %path.display(), "JSON written");
    Ok(())
}

/// Writes an already rendered Markdown document.
pub fn write_markdown(path: &Path, content: &str) -> Result<()> {
    let mut file = create(path)?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), bytes = content.len(), "Markdown written");
    Ok(())
}
