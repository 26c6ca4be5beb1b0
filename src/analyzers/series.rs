use crate::analyzers::types::{Dataset, ExamAggregate, Explanation, SeriesPoint, StudentSeries};
use crate::error::{Result, ScoreError};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Builds one student's exam history, joined with the class aggregate of
/// each exam.
///
/// `aggregates` must come from [`super::aggregate::aggregate_by_exam`] over the
/// same `dataset`; a point without a matching aggregate is reported as
/// [`ScoreError::AggregateMismatch`].
#[tracing::instrument(skip(dataset, aggregates))]
pub fn build_student_series(
    dataset: &Dataset,
    aggregates: &BTreeMap<NaiveDate, ExamAggregate>,
    student_id: &str,
) -> Result<StudentSeries> {
    // dataset records are already in date order
    let records: Vec<_> = dataset
        .records()
        .iter()
        .filter(|r| r.student_id == student_id)
        .collect();

    if records.is_empty() {
        return Err(ScoreError::StudentNotFound {
            student_id: student_id.to_string(),
        });
    }

    let mut points: Vec<SeriesPoint> = Vec::with_capacity(records.len());
    for record in records {
        let mismatch = || ScoreError::AggregateMismatch {
            exam_date: record.exam_date,
            student_id: student_id.to_string(),
        };
        let aggregate = aggregates.get(&record.exam_date).ok_or_else(mismatch)?;
        let entry = aggregate.rank_of(student_id).ok_or_else(mismatch)?;

        let diff_from_median = record.total_score - aggregate.median_total;
        let score_change = points.last().map(|prev| record.total_score - prev.total_score);

        points.push(SeriesPoint {
            exam_date: record.exam_date,
            total_score: record.total_score,
            component_scores: record.component_scores.clone(),
            median_total: aggregate.median_total,
            class_std: aggregate.std_total,
            class_count: aggregate.count,
            diff_from_median,
            explanation: Explanation::from_diff(diff_from_median),
            score_change,
            rank: entry.rank,
            percentile: entry.percentile,
        });
    }

    debug!(points = points.len(), "Student series built");
    Ok(StudentSeries {
        student_id: student_id.to_string(),
        components: dataset.components().to_vec(),
        points,
    })
}
