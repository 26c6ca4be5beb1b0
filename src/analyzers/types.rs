//! Data types used by the score pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One validated exam result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub student_id: String,
    pub exam_date: NaiveDate,
    pub total_score: f64,
    /// Keys always match [`Dataset::components`].
    pub component_scores: BTreeMap<String, f64>,
}

/// Validated records, ordered by exam date. Records sharing a date keep the
/// order they had in the upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub(crate) components: Vec<String>,
    pub(crate) records: Vec<ScoreRecord>,
    pub(crate) dropped: usize,
}

impl Dataset {
    pub fn records(&self) -> &[ScoreRecord] {
        &self.records
    }

    /// Component subjects present in this dataset, in configuration order.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Number of uploaded rows rejected during validation.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One line of an exam's ranking table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankEntry {
    pub student_id: String,
    pub total_score: f64,
    pub rank: usize,
    pub percentile: f64,
}

/// Class-wide statistics for a single exam date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamAggregate {
    pub exam_date: NaiveDate,
    pub median_total: f64,
    /// `None` when fewer than two students sat the exam.
    pub std_total: Option<f64>,
    pub count: usize,
    /// Best first.
    pub ranking: Vec<RankEntry>,
    pub component_medians: BTreeMap<String, f64>,
}

impl ExamAggregate {
    pub fn rank_of(&self, student_id: &str) -> Option<&RankEntry> {
        self.ranking.iter().find(|e| e.student_id == student_id)
    }
}

/// How a score compares to the exam median.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Explanation {
    Above,
    Below,
    Equal,
}

impl Explanation {
    /// Exact sign test on the difference; no tolerance.
    pub fn from_diff(diff: f64) -> Self {
        if diff > 0.0 {
            Explanation::Above
        } else if diff < 0.0 {
            Explanation::Below
        } else {
            Explanation::Equal
        }
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Explanation::Above => "above",
            Explanation::Below => "below",
            Explanation::Equal => "equal",
        };
        f.write_str(s)
    }
}

/// One exam in a student's series, joined with that exam's aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub exam_date: NaiveDate,
    pub total_score: f64,
    pub component_scores: BTreeMap<String, f64>,
    pub median_total: f64,
    pub class_std: Option<f64>,
    pub class_count: usize,
    pub diff_from_median: f64,
    pub explanation: Explanation,
    /// Absent on the first exam.
    pub score_change: Option<f64>,
    pub rank: usize,
    pub percentile: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSeries {
    pub student_id: String,
    /// Component subjects in dataset order.
    pub components: Vec<String>,
    pub points: Vec<SeriesPoint>,
}

impl StudentSeries {
    pub fn totals(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.total_score).collect()
    }
}

/// Mean and spread of a score series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Volatility {
    Computed {
        points: usize,
        mean: f64,
        std_dev: f64,
    },
    /// Fewer than two points; spread is not computable.
    InsufficientData { points: usize },
}

impl Volatility {
    pub fn std_dev(&self) -> Option<f64> {
        match self {
            Volatility::Computed { std_dev, .. } => Some(*std_dev),
            Volatility::InsufficientData { .. } => None,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        match self {
            Volatility::Computed { mean, .. } => Some(*mean),
            Volatility::InsufficientData { .. } => None,
        }
    }
}

/// Class spread on one exam next to the student's own spread.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSpreadRow {
    pub exam_date: NaiveDate,
    pub total_score: f64,
    pub class_std: Option<f64>,
    /// `None` when either standard deviation is not computable.
    pub student_exceeds_class: Option<bool>,
}
