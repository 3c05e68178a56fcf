// src/comparison/aggregate.rs
//
// Per-condition aggregation of recording metrics.

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::metrics::{MetricField, RecordingMetrics};
use crate::core::samples::ConditionLabel;
use crate::core::stats;
use crate::error::{AnalysisError, Result};

/// Mean and population standard deviation of one field across recordings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub mean: f64,
    pub std_dev: f64,
}

/// A recording left out of a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedRecording {
    pub source_id: String,
    /// Short error kind, e.g. `empty_data`
    pub kind: String,
    pub reason: String,
}

/// Aggregate of every recording sharing one condition label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSummary {
    pub condition: ConditionLabel,
    pub sample_size: usize,
    /// A single recording: every spread is zero
    pub degenerate: bool,
    /// Included source ids, sorted
    pub sources: Vec<String>,
    pub fields: BTreeMap<MetricField, FieldSummary>,
    pub excluded: Vec<ExcludedRecording>,
}

impl ConditionSummary {
    pub fn field(&self, field: MetricField) -> FieldSummary {
        // Every field is filled at construction
        self.fields.get(&field).copied().unwrap_or(FieldSummary {
            mean: 0.0,
            std_dev: 0.0,
        })
    }

    pub fn mean(&self, field: MetricField) -> f64 {
        self.field(field).mean
    }

    pub fn std_dev(&self, field: MetricField) -> f64 {
        self.field(field).std_dev
    }
}

/// Summarise recordings that all belong to `condition`.
///
/// The result does not depend on the order of `metrics`.
pub fn aggregate(condition: &ConditionLabel, metrics: &[RecordingMetrics]) -> Result<ConditionSummary> {
    summarise(condition, metrics, Vec::new())
}

/// Like [`aggregate`], but takes per-recording outcomes and excludes failures
pub fn aggregate_outcomes<I>(condition: &ConditionLabel, outcomes: I) -> Result<ConditionSummary>
where
    I: IntoIterator<Item = (String, Result<RecordingMetrics>)>,
{
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (source_id, outcome) in outcomes {
        match outcome {
            Ok(metrics) => included.push(metrics),
            Err(err) => {
                warn!("{}: excluded from condition {}: {}", source_id, condition, err);
                excluded.push(ExcludedRecording {
                    source_id,
                    kind: err.kind().to_string(),
                    reason: err.to_string(),
                });
            }
        }
    }

    excluded.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    summarise(condition, &included, excluded)
}

fn summarise(
    condition: &ConditionLabel,
    metrics: &[RecordingMetrics],
    excluded: Vec<ExcludedRecording>,
) -> Result<ConditionSummary> {
    if metrics.is_empty() {
        return Err(AnalysisError::InsufficientData {
            condition: condition.to_string(),
            excluded: excluded.len(),
        });
    }

    if let Some(stray) = metrics.iter().find(|m| m.condition() != condition) {
        return Err(AnalysisError::ConditionMismatch {
            source_id: stray.source_id().to_string(),
            expected: condition.to_string(),
            found: stray.condition().to_string(),
        });
    }

    let fields = MetricField::all()
        .into_iter()
        .map(|field| {
            let values: Vec<f64> = metrics.iter().map(|m| field.value(m)).collect();
            let summary = FieldSummary {
                mean: stats::mean(&values),
                std_dev: stats::population_std_dev(&values),
            };
            (field, summary)
        })
        .collect();

    let mut sources: Vec<String> = metrics.iter().map(|m| m.source_id().to_string()).collect();
    sources.sort();

    Ok(ConditionSummary {
        condition: condition.clone(),
        sample_size: metrics.len(),
        degenerate: metrics.len() == 1,
        sources,
        fields,
        excluded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::core::detector::SegmentDetector;
    use crate::core::metrics::calculate_metrics;
    use crate::core::samples::{Sample, SampleStore};

    fn label(s: &str) -> ConditionLabel {
        ConditionLabel::new(s).unwrap()
    }

    fn recording(condition: &str, source: &str, dbs: &[f64]) -> RecordingMetrics {
        let samples = dbs
            .iter()
            .enumerate()
            .map(|(i, &db)| Sample::new(i as f64 * 5.0, db))
            .collect();
        let store = SampleStore::new(source, label(condition), samples, 0, None).unwrap();
        let config = AnalysisConfig {
            threshold_db: 35.0,
            ..Default::default()
        };
        let segments = SegmentDetector::new(35.0).detect(&store);
        calculate_metrics(&store, &segments, &config)
    }

    #[test]
    fn test_empty_set_is_insufficient() {
        let err = aggregate(&label("A"), &[]).unwrap_err();
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[test]
    fn test_single_recording_is_degenerate() {
        let m = recording("A", "n1", &[20.0, 50.0, 30.0, 45.0]);
        let summary = aggregate(&label("A"), &[m]).unwrap();
        assert_eq!(summary.sample_size, 1);
        assert!(summary.degenerate);
        for field in MetricField::all() {
            assert_eq!(summary.std_dev(field), 0.0, "{field}");
        }
        assert_eq!(summary.mean(MetricField::NoiseRatio), 0.5);
    }

    #[test]
    fn test_mean_and_population_spread() {
        let quiet = recording("A", "n1", &[20.0; 10]);
        let noisy = recording("A", "n2", &[50.0, 50.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0, 20.0]);
        let summary = aggregate(&label("A"), &[quiet, noisy]).unwrap();
        assert_eq!(summary.sample_size, 2);
        assert!((summary.mean(MetricField::NoiseRatio) - 0.1).abs() < 1e-12);
        assert!((summary.std_dev(MetricField::NoiseRatio) - 0.1).abs() < 1e-12);
        assert_eq!(summary.sources, vec!["n1", "n2"]);
    }

    #[test]
    fn test_order_independence() {
        let a = recording("A", "n1", &[20.0, 41.0, 20.0, 38.0]);
        let b = recording("A", "n2", &[36.1, 20.0, 60.3, 20.0]);
        let c = recording("A", "n3", &[70.0, 70.0, 33.0, 35.5]);

        let forward = aggregate(&label("A"), &[a.clone(), b.clone(), c.clone()]).unwrap();
        let backward = aggregate(&label("A"), &[c, a, b]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_mismatched_condition_rejected() {
        let a = recording("A", "n1", &[20.0; 4]);
        let b = recording("B", "n2", &[20.0; 4]);
        let err = aggregate(&label("A"), &[a, b]).unwrap_err();
        assert_eq!(err.kind(), "condition_mismatch");
        assert!(err.to_string().contains("n2"));
    }

    #[test]
    fn test_failed_outcomes_are_excluded() {
        let outcomes = vec![
            ("n1".to_string(), Ok(recording("A", "n1", &[20.0; 4]))),
            (
                "empty.csv".to_string(),
                Err(AnalysisError::EmptyData {
                    source_id: "empty.csv".to_string(),
                    dropped_rows: 0,
                }),
            ),
            ("n2".to_string(), Ok(recording("A", "n2", &[50.0; 4]))),
        ];
        let summary = aggregate_outcomes(&label("A"), outcomes).unwrap();
        assert_eq!(summary.sample_size, 2);
        assert_eq!(summary.excluded.len(), 1);
        assert_eq!(summary.excluded[0].source_id, "empty.csv");
        assert_eq!(summary.excluded[0].kind, "empty_data");
    }

    #[test]
    fn test_all_failed_is_insufficient() {
        let outcomes = vec![(
            "empty.csv".to_string(),
            Err(AnalysisError::EmptyData {
                source_id: "empty.csv".to_string(),
                dropped_rows: 0,
            }),
        )];
        match aggregate_outcomes(&label("A"), outcomes) {
            Err(AnalysisError::InsufficientData { excluded, .. }) => assert_eq!(excluded, 1),
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }
}
