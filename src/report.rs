use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use crate::analyzers::types::{ClassSpreadRow, Dataset, ExamAggregate, StudentSeries, Volatility};
use crate::analyzers::{
    aggregate_by_exam, build_student_series, class_spread, exam_median_volatility,
    student_volatility,
};
use crate::error::Result;

/// Shape of the uploaded data, for the report header.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub students: usize,
    pub exams: usize,
    pub dropped_rows: usize,
    pub components: Vec<String>,
}

impl DatasetSummary {
    pub fn of(dataset: &Dataset) -> Self {
        Self {
            records: dataset.len(),
            students: students(dataset).len(),
            exams: dataset
                .records()
                .iter()
                .map(|r| r.exam_date)
                .collect::<HashSet<NaiveDate>>()
                .len(),
            dropped_rows: dataset.dropped(),
            components: dataset.components().to_vec(),
        }
    }
}

/// Everything the export layer needs for one student.
#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub generated_at: DateTime<Utc>,
    pub dataset: DatasetSummary,
    pub series: StudentSeries,
    pub student_volatility: Volatility,
    pub exam_median_volatility: Volatility,
    pub class_spread: Vec<ClassSpreadRow>,
    pub exams: BTreeMap<NaiveDate, ExamAggregate>,
}

impl StudentReport {
    /// Runs the whole pipeline over `dataset` for one student.
    #[tracing::instrument(skip(dataset))]
    pub fn build(dataset: &Dataset, student_id: &str) -> Result<Self> {
        let exams = aggregate_by_exam(dataset);
        let series = build_student_series(dataset, &exams, student_id)?;

        let report = StudentReport {
            generated_at: Utc::now(),
            dataset: DatasetSummary::of(dataset),
            student_volatility: student_volatility(&series),
            exam_median_volatility: exam_median_volatility(&exams),
            class_spread: class_spread(&series),
            series,
            exams,
        };

        info!(points = report.series.points.len(), "Student report built");
        Ok(report)
    }
}

/// Student ids in order of first appearance.
pub fn students(dataset: &Dataset) -> Vec<String> {
    let mut seen = HashSet::new();
    dataset
        .records()
        .iter()
        .filter(|r| seen.insert(r.student_id.as_str()))
        .map(|r| r.student_id.clone())
        .collect()
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn fmt_volatility(v: &Volatility) -> String {
    match v {
        Volatility::Computed {
            points,
            mean,
            std_dev,
        } => format!("mean {mean:.2}, std dev {std_dev:.2} over {points} exams"),
        Volatility::InsufficientData { points } => {
            format!("not computable ({points} exam(s), need at least 2)")
        }
    }
}

/// Renders a Markdown summary of a [`StudentReport`].
pub fn render_markdown(report: &StudentReport) -> String {
    let mut output = String::new();
    let series = &report.series;

    let _ = writeln!(output, "# Score Report: {}", series.student_id);
    let _ = writeln!(
        output,
        "Generated {} from {} records ({} students, {} exams, {} rows dropped)",
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        report.dataset.records,
        report.dataset.students,
        report.dataset.exams,
        report.dataset.dropped_rows
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Volatility");
    let _ = writeln!(
        output,
        "- Student: {}",
        fmt_volatility(&report.student_volatility)
    );
    let _ = writeln!(
        output,
        "- Exam medians: {}",
        fmt_volatility(&report.exam_median_volatility)
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Exams");
    let _ = writeln!(
        output,
        "| Date | Total | Median | Diff | vs median | Change | Rank | Percentile | Class std |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");
    for p in &series.points {
        let _ = writeln!(
            output,
            "| {} | {:.2} | {:.2} | {:+.2} | {} | {} | {}/{} | {:.2} | {} |",
            p.exam_date,
            p.total_score,
            p.median_total,
            p.diff_from_median,
            p.explanation,
            p.score_change
                .map_or_else(|| "-".to_string(), |c| format!("{c:+.2}")),
            p.rank,
            p.class_count,
            p.percentile,
            fmt_opt(p.class_std)
        );
    }

    let flagged: Vec<_> = report
        .class_spread
        .iter()
        .filter(|row| row.student_exceeds_class == Some(true))
        .map(|row| row.exam_date.to_string())
        .collect();
    let _ = writeln!(output);
    let _ = writeln!(output, "## Spread vs Class");
    if flagged.is_empty() {
        let _ = writeln!(
            output,
            "Student spread does not exceed the class spread on any comparable exam."
        );
    } else {
        let _ = writeln!(
            output,
            "Student spread ({}) exceeds the class spread on: {}",
            fmt_opt(report.student_volatility.std_dev()),
            flagged.join(", ")
        );
    }

    output
}
