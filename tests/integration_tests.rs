use flate2::Compression;
use flate2::write::GzEncoder;
use score_trends::analyzers::types::{Explanation, Volatility};
use score_trends::analyzers::{
    aggregate_by_exam, build_student_series, class_spread, exam_median_volatility,
    student_volatility, validate,
};
use score_trends::cache::DatasetCache;
use score_trends::config::ColumnConfig;
use score_trends::ingest::parse_table;
use score_trends::report::{StudentReport, render_markdown, students};
use score_trends::{SchemaError, ScoreError};
use std::io::Write;

const FIXTURE: &[u8] = include_bytes!("fixtures/class_scores.csv");

fn date(s: &str) -> chrono::NaiveDate {
    s.parse().unwrap()
}

#[test]
fn test_full_pipeline() {
    let table = parse_table(FIXTURE).expect("Failed to parse fixture");
    let dataset = validate(&table, &ColumnConfig::default()).expect("Failed to validate");

    // 赵六 misses one exam, one row has no name, one has a bad date
    assert_eq!(dataset.len(), 10);
    assert_eq!(dataset.dropped(), 3);
    assert_eq!(dataset.components(), ["选择".to_string(), "材料".to_string()]);
    assert_eq!(students(&dataset), vec!["张三", "李四", "王五", "赵六"]);

    let aggregates = aggregate_by_exam(&dataset);
    assert_eq!(aggregates.len(), 3);

    let jan = &aggregates[&date("2024-01-10")];
    assert_eq!(jan.count, 4);
    assert_eq!(jan.median_total, 80.0);
    let ranks: Vec<_> = jan.ranking.iter().map(|e| (e.student_id.as_str(), e.rank)).collect();
    assert_eq!(ranks, vec![("李四", 1), ("张三", 2), ("赵六", 2), ("王五", 4)]);
    assert_eq!(jan.component_medians["选择"], 33.5);

    let series = build_student_series(&dataset, &aggregates, "张三").unwrap();
    let explanations: Vec<_> = series.points.iter().map(|p| p.explanation).collect();
    assert_eq!(
        explanations,
        vec![Explanation::Equal, Explanation::Above, Explanation::Below]
    );
    let changes: Vec<_> = series.points.iter().map(|p| p.score_change).collect();
    assert_eq!(changes, vec![None, Some(8.0), Some(-8.0)]);
    assert_eq!(series.points[0].percentile, 50.0);
    assert_eq!(series.points[1].rank, 1);
    assert_eq!(series.points[1].percentile, 66.67);

    for p in &series.points {
        assert_eq!(p.diff_from_median, p.total_score - p.median_total);
    }
}

#[test]
fn test_volatility_baselines() {
    let table = parse_table(FIXTURE).unwrap();
    let dataset = validate(&table, &ColumnConfig::default()).unwrap();
    let aggregates = aggregate_by_exam(&dataset);

    let series = build_student_series(&dataset, &aggregates, "赵六").unwrap();
    assert_eq!(series.points.len(), 1);
    assert_eq!(
        student_volatility(&series),
        Volatility::InsufficientData { points: 1 }
    );
    assert_eq!(class_spread(&series)[0].student_exceeds_class, None);

    match exam_median_volatility(&aggregates) {
        Volatility::Computed { points, mean, .. } => {
            assert_eq!(points, 3);
            // medians 80, 85, 82
            assert!((mean - 82.333333).abs() < 1e-5);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_missing_total_column() {
    let sheet = "姓名,日期,选择\n张三,2024-01-10,30\n";
    let table = parse_table(sheet.as_bytes()).unwrap();
    match validate(&table, &ColumnConfig::default()) {
        Err(ScoreError::Schema(SchemaError::MissingColumns(cols))) => {
            assert_eq!(cols, vec!["total_score"]);
        }
        other => panic!("expected schema error, got {other:?}"),
    }
}

#[test]
fn test_gzip_upload_hits_same_values() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(FIXTURE).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut cache = DatasetCache::new();
    let plain = cache.get_or_load(FIXTURE, &ColumnConfig::default()).unwrap();
    let gz = cache.get_or_load(&compressed, &ColumnConfig::default()).unwrap();

    // different bytes, different keys, same content
    assert_eq!(cache.len(), 2);
    assert_eq!(*plain, *gz);
}

#[test]
fn test_student_report_json_and_markdown() {
    let table = parse_table(FIXTURE).unwrap();
    let dataset = validate(&table, &ColumnConfig::default()).unwrap();
    let report = StudentReport::build(&dataset, "李四").unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["series"]["student_id"], "李四");
    assert_eq!(json["student_volatility"]["status"], "computed");
    assert_eq!(json["dataset"]["dropped_rows"], 3);
    assert!(json["exams"]["2024-01-10"]["ranking"].is_array());

    let md = render_markdown(&report);
    assert!(md.contains("# Score Report: 李四"));
    assert!(md.contains("| 2024-03-20 | 95.00 |"));
}

#[test]
fn test_unknown_student_report() {
    let table = parse_table(FIXTURE).unwrap();
    let dataset = validate(&table, &ColumnConfig::default()).unwrap();
    let err = StudentReport::build(&dataset, "钱七").unwrap_err();
    assert!(matches!(err, ScoreError::StudentNotFound { .. }));
}
