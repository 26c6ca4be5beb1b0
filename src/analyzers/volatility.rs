//! Spread of score series.
//!
//! Two baselines are offered because both are used when reading a report:
//! the spread of a student's own totals, and the spread of the class medians
//! across exams. [`class_spread`] puts the per-exam class deviation next to
//! the student's.

use crate::analyzers::types::{ClassSpreadRow, ExamAggregate, StudentSeries, Volatility};
use crate::analyzers::utility::{mean, sample_stddev};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Sample mean and sample standard deviation of `values`, or
/// [`Volatility::InsufficientData`] with fewer than two values.
pub fn volatility(values: &[f64]) -> Volatility {
    match (mean(values), sample_stddev(values)) {
        (Some(mean), Some(std_dev)) => Volatility::Computed {
            points: values.len(),
            mean,
            std_dev,
        },
        _ => Volatility::InsufficientData {
            points: values.len(),
        },
    }
}

/// Volatility of one student's totals.
pub fn student_volatility(series: &StudentSeries) -> Volatility {
    volatility(&series.totals())
}

/// Volatility of the per-exam class medians, in date order.
pub fn exam_median_volatility(aggregates: &BTreeMap<NaiveDate, ExamAggregate>) -> Volatility {
    let medians: Vec<f64> = aggregates.values().map(|a| a.median_total).collect();
    volatility(&medians)
}

/// Per exam of the student, the class standard deviation and whether the
/// student's own standard deviation is larger.
pub fn class_spread(series: &StudentSeries) -> Vec<ClassSpreadRow> {
    let student_std = student_volatility(series).std_dev();

    series
        .points
        .iter()
        .map(|p| ClassSpreadRow {
            exam_date: p.exam_date,
            total_score: p.total_score,
            class_std: p.class_std,
            student_exceeds_class: match (student_std, p.class_std) {
                (Some(s), Some(c)) => Some(s > c),
                _ => None,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::aggregate::aggregate_by_exam;
    use crate::analyzers::series::build_student_series;
    use crate::analyzers::types::{Dataset, ScoreRecord};

    fn record(student: &str, date: &str, total: f64) -> ScoreRecord {
        ScoreRecord {
            student_id: student.to_string(),
            exam_date: date.parse().unwrap(),
            total_score: total,
            component_scores: BTreeMap::new(),
        }
    }

    fn dataset(records: Vec<ScoreRecord>) -> Dataset {
        Dataset {
            components: Vec::new(),
            records,
            dropped: 0,
        }
    }

    #[test]
    fn test_volatility_needs_two_points() {
        assert_eq!(volatility(&[]), Volatility::InsufficientData { points: 0 });
        assert_eq!(volatility(&[90.0]), Volatility::InsufficientData { points: 1 });
    }

    #[test]
    fn test_volatility_computed() {
        let v = volatility(&[80.0, 85.0, 90.0]);
        assert_eq!(v.mean(), Some(85.0));
        assert_eq!(v.std_dev(), Some(5.0));
    }

    #[test]
    fn test_constant_series_is_zero_not_missing() {
        assert_eq!(volatility(&[70.0, 70.0]).std_dev(), Some(0.0));
    }

    #[test]
    fn test_student_and_median_baselines_differ() {
        let ds = dataset(vec![
            record("A", "2024-01-01", 80.0),
            record("B", "2024-01-01", 90.0),
            record("A", "2024-02-01", 85.0),
            record("B", "2024-02-01", 80.0),
        ]);
        let aggs = aggregate_by_exam(&ds);
        let series = build_student_series(&ds, &aggs, "A").unwrap();

        let student = student_volatility(&series);
        let medians = exam_median_volatility(&aggs);
        assert_eq!(student.mean(), Some(82.5));
        assert_eq!(medians.mean(), Some(83.75));
        assert_ne!(student.std_dev(), medians.std_dev());
    }

    #[test]
    fn test_class_spread_flags() {
        let ds = dataset(vec![
            record("A", "2024-01-01", 60.0),
            record("B", "2024-01-01", 62.0),
            record("A", "2024-02-01", 90.0),
        ]);
        let aggs = aggregate_by_exam(&ds);
        let series = build_student_series(&ds, &aggs, "A").unwrap();
        let rows = class_spread(&series);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].student_exceeds_class, Some(true));
        // single-student exam: class spread not computable
        assert_eq!(rows[1].class_std, None);
        assert_eq!(rows[1].student_exceeds_class, None);
    }

    #[test]
    fn test_class_spread_single_exam_student() {
        let ds = dataset(vec![
            record("A", "2024-01-01", 60.0),
            record("B", "2024-01-01", 62.0),
        ]);
        let aggs = aggregate_by_exam(&ds);
        let series = build_student_series(&ds, &aggs, "A").unwrap();
        assert_eq!(class_spread(&series)[0].student_exceeds_class, None);
    }
}
