//! Row validation: turns a [`RawTable`] into a [`Dataset`].

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use crate::analyzers::types::{Dataset, ScoreRecord};
use crate::config::ColumnConfig;
use crate::error::{Result, SchemaError};
use crate::ingest::RawTable;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%dT%H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
];

/// Why a row was rejected. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Rejection {
    MissingStudent,
    BadDate,
    BadTotal,
    BadComponent,
}

/// Resolved column positions for one table.
struct Layout {
    student_id: usize,
    exam_date: usize,
    total_score: usize,
    components: Vec<(String, usize)>,
}

impl Layout {
    /// Checks the header before any row is looked at.
    fn resolve(table: &RawTable, columns: &ColumnConfig) -> std::result::Result<Self, SchemaError> {
        let student_id = table.column_index(&columns.student_id);
        let total_score = table.column_index(&columns.total_score);
        let exam_date = table.column_index(&columns.exam_date);

        let mut missing = Vec::new();
        if student_id.is_none() {
            missing.push("student_id".to_string());
        }
        if total_score.is_none() {
            missing.push("total_score".to_string());
        }
        if exam_date.is_none() {
            missing.push("exam_date".to_string());
        }

        match (student_id, exam_date, total_score) {
            (Some(student_id), Some(exam_date), Some(total_score)) => {
                let components = columns
                    .components
                    .iter()
                    .filter_map(|name| {
                        table
                            .column_index(std::slice::from_ref(name))
                            .map(|idx| (name.trim().to_string(), idx))
                    })
                    .collect();
                Ok(Layout {
                    student_id,
                    exam_date,
                    total_score,
                    components,
                })
            }
            _ => Err(SchemaError::MissingColumns(missing)),
        }
    }
}

/// Parses an exam date, accepting the common spreadsheet export formats.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parses a score; anything non-numeric or non-finite is rejected.
pub fn parse_score(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Validates every row of `table` against `columns`.
///
/// Rows with a blank student, an unparseable date, or a non-numeric total or
/// component score are dropped, and count alongside rows the decoder already
/// skipped as undecodable. A repeated `(student, date)` pair keeps its
/// first occurrence. The surviving records are ordered by date, stably.
///
/// # Errors
///
/// [`SchemaError::MissingColumns`] when a required column has no header,
/// checked before any row; [`SchemaError::NoValidRows`] when nothing survives.
#[tracing::instrument(skip_all, fields(rows = table.rows.len()))]
pub fn validate(table: &RawTable, columns: &ColumnConfig) -> Result<Dataset> {
    let layout = Layout::resolve(table, columns)?;

    let mut records = Vec::with_capacity(table.rows.len());
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();
    let mut dropped = table.undecodable;

    for row in 0..table.rows.len() {
        match parse_row(table, row, &layout) {
            Ok(record) => {
                if !seen.insert((record.student_id.clone(), record.exam_date)) {
                    warn!(
                        row,
                        student_id = %record.student_id,
                        exam_date = %record.exam_date,
                        "Duplicate exam result dropped"
                    );
                    dropped += 1;
                    continue;
                }
                records.push(record);
            }
            Err(reason) => {
                debug!(row, ?reason, "Row dropped");
                dropped += 1;
            }
        }
    }

    if records.is_empty() {
        return Err(SchemaError::NoValidRows { dropped }.into());
    }

    records.sort_by_key(|r| r.exam_date);

    info!(kept = records.len(), dropped, "Validation complete");
    Ok(Dataset {
        components: layout.components.into_iter().map(|(name, _)| name).collect(),
        records,
        dropped,
    })
}

fn parse_row(
    table: &RawTable,
    row: usize,
    layout: &Layout,
) -> std::result::Result<ScoreRecord, Rejection> {
    let student_id = table.cell(row, layout.student_id).trim();
    if student_id.is_empty() {
        return Err(Rejection::MissingStudent);
    }

    let exam_date = parse_date(table.cell(row, layout.exam_date)).ok_or(Rejection::BadDate)?;
    let total_score = parse_score(table.cell(row, layout.total_score)).ok_or(Rejection::BadTotal)?;

    let mut component_scores = BTreeMap::new();
    for (name, idx) in &layout.components {
        let score = parse_score(table.cell(row, *idx)).ok_or(Rejection::BadComponent)?;
        component_scores.insert(name.clone(), score);
    }

    Ok(ScoreRecord {
        student_id: student_id.to_string(),
        exam_date,
        total_score,
        component_scores,
    })
}
