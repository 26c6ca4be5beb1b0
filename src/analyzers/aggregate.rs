use crate::analyzers::types::{Dataset, ExamAggregate, RankEntry, ScoreRecord};
use crate::analyzers::utility::{competition_ranks, median, percentile, sample_stddev};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

/// Groups a [`Dataset`] by exam date and computes one [`ExamAggregate`] per date.
///
/// Each aggregate carries the median and sample standard deviation of the
/// totals, the per-component medians, and a competition-style ranking. Ties
/// in the ranking keep upload order, so the earlier record is listed first.
#[tracing::instrument(skip_all, fields(records = dataset.len()))]
pub fn aggregate_by_exam(dataset: &Dataset) -> BTreeMap<NaiveDate, ExamAggregate> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&ScoreRecord>> = BTreeMap::new();
    for record in dataset.records() {
        by_date.entry(record.exam_date).or_default().push(record);
    }

    let aggregates: BTreeMap<NaiveDate, ExamAggregate> = by_date
        .into_iter()
        .map(|(date, rows)| (date, aggregate_exam(date, &rows, dataset.components())))
        .collect();

    debug!(exams = aggregates.len(), "Exam aggregates computed");
    aggregates
}

fn aggregate_exam(date: NaiveDate, rows: &[&ScoreRecord], components: &[String]) -> ExamAggregate {
    let totals: Vec<f64> = rows.iter().map(|r| r.total_score).collect();
    let count = rows.len();

    // sort_by is stable: equal totals stay in upload order
    let mut ordered: Vec<&ScoreRecord> = rows.to_vec();
    ordered.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));

    let sorted_totals: Vec<f64> = ordered.iter().map(|r| r.total_score).collect();
    let ranking = ordered
        .iter()
        .zip(competition_ranks(&sorted_totals))
        .map(|(r, rank)| RankEntry {
            student_id: r.student_id.clone(),
            total_score: r.total_score,
            rank,
            percentile: percentile(rank, count),
        })
        .collect();

    let mut component_medians = BTreeMap::new();
    for name in components {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.component_scores.get(name).copied())
            .collect();
        if let Some(m) = median(&values) {
            component_medians.insert(name.clone(), m);
        }
    }

    ExamAggregate {
        exam_date: date,
        // rows is never empty for a grouped date
        median_total: median(&totals).unwrap_or(f64::NAN),
        std_total: sample_stddev(&totals),
        count,
        ranking,
        component_medians,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_one_aggregate_per_date() {
        let ds = dataset(vec![
            record("A", "2024-01-01", 80.0),
            record("B", "2024-01-01", 90.0),
            record("A", "2024-02-01", 85.0),
        ]);
        let aggs = aggregate_by_exam(&ds);

        assert_eq!(aggs.len(), 2);
        let jan: NaiveDate = "2024-01-01".parse().unwrap();
        let feb: NaiveDate = "2024-02-01".parse().unwrap();
        assert_eq!(aggs[&jan].count, 2);
        assert_eq!(aggs[&feb].count, 1);
        assert_eq!(aggs[&jan].median_total, 85.0);
    }

    #[test]
    fn test_single_record_has_no_std() {
        let ds = dataset(vec![record("A", "2024-01-01", 80.0)]);
        let agg = aggregate_by_exam(&ds).into_values().next().unwrap();
        assert_eq!(agg.std_total, None);
        assert_eq!(agg.median_total, 80.0);
        assert_eq!(agg.ranking[0].rank, 1);
        assert_eq!(agg.ranking[0].percentile, 0.0);
    }

    #[test]
    fn test_std_is_sample_std() {
        let ds = dataset(vec![
            record("A", "2024-01-01", 80.0),
            record("B", "2024-01-01", 90.0),
        ]);
        let agg = aggregate_by_exam(&ds).into_values().next().unwrap();
        let sd = agg.std_total.unwrap();
        assert!((sd - 50.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_competition_ranking_with_stable_ties() {
        let ds = dataset(vec![
            record("D", "2024-01-01", 70.0),
            record("B", "2024-01-01", 80.0),
            record("A", "2024-01-01", 90.0),
            record("C", "2024-01-01", 80.0),
        ]);
        let agg = aggregate_by_exam(&ds).into_values().next().unwrap();

        let ids: Vec<_> = agg.ranking.iter().map(|e| e.student_id.as_str()).collect();
        let ranks: Vec<_> = agg.ranking.iter().map(|e| e.rank).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
        assert_eq!(ranks, vec![1, 2, 2, 4]);
        assert_eq!(agg.rank_of("C").unwrap().percentile, 50.0);
        assert_eq!(agg.rank_of("A").unwrap().percentile, 75.0);
    }

    #[test]
    fn test_component_medians() {
        let mut a = record("A", "2024-01-01", 80.0);
        a.component_scores.insert("选择".to_string(), 30.0);
        let mut b = record("B", "2024-01-01", 90.0);
        b.component_scores.insert("选择".to_string(), 40.0);
        let ds = Dataset {
            components: vec!["选择".to_string()],
            records: vec![a, b],
            dropped: 0,
        };

        let agg = aggregate_by_exam(&ds).into_values().next().unwrap();
        assert_eq!(agg.component_medians["选择"], 35.0);
    }
}
