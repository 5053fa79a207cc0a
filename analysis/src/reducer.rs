//! Reduction of an [`AnalysisResult`] into the flat rows the metrics store keeps.

use crate::{
    analyzer::{
        AnalysisResult,
        QualityOutcome,
    },
    model::ModelId,
    scoring::ClassificationQuality,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

/// One point of a model's performance series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    pub model_id: ModelId,
    pub timestamp: DateTime<Utc>,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `1` iff at least one of the feature rows written with this row drifted.
    pub drift_score: u8,
    pub window_size: usize,
}

/// Drift statistic of one feature at one point in time. `drift_score` is the
/// p-value of the column test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDriftRow {
    pub model_id: ModelId,
    pub timestamp: DateTime<Utc>,
    pub feature_name: String,
    pub drift_score: f64,
    pub drifted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReducedMetrics {
    pub performance: PerformanceRow,
    pub features: Vec<FeatureDriftRow>,
}

/// Never fails. Unscored quality reads as 0.0 everywhere and missing drift as no
/// feature rows. `target` and `prediction` are filtered out whatever the analysis
/// reported.
pub fn reduce(model_id: &ModelId, timestamp: DateTime<Utc>, result: &AnalysisResult) -> ReducedMetrics {
    let (features, drift_score) = match &result.drift {
        Some(drift) => {
            let rows: Vec<FeatureDriftRow> = drift
                .feature_columns()
                .map(|(name, column)| FeatureDriftRow {
                    model_id: model_id.clone(),
                    timestamp,
                    feature_name: name.clone(),
                    drift_score: column.p_value,
                    drifted: column.drifted,
                })
                .collect();
            (rows, drift.drift_score())
        }
        None => (Vec::new(), 0),
    };

    let quality = match &result.quality {
        QualityOutcome::Scored(quality) => *quality,
        QualityOutcome::Unscored(_) => ClassificationQuality::default(),
    };

    ReducedMetrics {
        performance: PerformanceRow {
            model_id: model_id.clone(),
            timestamp,
            accuracy: quality.accuracy,
            precision: quality.precision,
            recall: quality.recall,
            f1: quality.f1,
            drift_score,
            window_size: result.current_rows,
        },
        features,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analyzer::DatasetDrift,
        drift::{
            ColumnDrift,
            ColumnKind,
            StatTest,
        },
        error::ScoringError,
    };
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn column(p_value: f64, drifted: bool) -> ColumnDrift {
        ColumnDrift {
            kind: ColumnKind::Continuous,
            stat_test: StatTest::KolmogorovSmirnov,
            p_value,
            drifted,
        }
    }

    fn result(columns: Option<Vec<(&str, ColumnDrift)>>, quality: QualityOutcome) -> AnalysisResult {
        AnalysisResult {
            reference_rows: 100,
            current_rows: 12,
            drift: columns.map(|columns| DatasetDrift {
                columns: columns.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<BTreeMap<_, _>>(),
            }),
            skipped_columns: Vec::new(),
            quality,
            baseline: None,
        }
    }

    #[test]
    fn scored_result_with_drift() {
        let quality = ClassificationQuality {
            accuracy: 0.9,
            precision: 0.8,
            recall: 0.7,
            f1: 0.75,
        };
        let analysis = result(
            Some(vec![("radius", column(0.001, true)), ("texture", column(0.6, false))]),
            QualityOutcome::Scored(quality),
        );
        let now = Utc::now();
        let reduced = reduce(&ModelId::new("m"), now, &analysis);

        assert_eq!(reduced.performance.accuracy, 0.9);
        assert_eq!(reduced.performance.f1, 0.75);
        assert_eq!(reduced.performance.drift_score, 1);
        assert_eq!(reduced.performance.window_size, 12);
        assert_eq!(
            reduced.features.iter().map(|r| r.feature_name.as_str()).collect::<Vec<_>>(),
            vec!["radius", "texture"]
        );
        assert!(reduced.features.iter().all(|r| r.timestamp == now && r.model_id.as_str() == "m"));
        assert_eq!(reduced.features[0].drift_score, 0.001);
    }

    #[test]
    fn reserved_columns_are_filtered() {
        let analysis = result(
            Some(vec![
                ("target", column(0.0, true)),
                ("prediction", column(0.0, true)),
                ("radius", column(0.4, false)),
            ]),
            QualityOutcome::Unscored(ScoringError::Empty),
        );
        let reduced = reduce(&ModelId::new("m"), Utc::now(), &analysis);

        assert_eq!(reduced.features.len(), 1);
        assert_eq!(reduced.features[0].feature_name, "radius");
        assert_eq!(reduced.performance.drift_score, 0);
    }

    #[test]
    fn missing_sub_results_degrade_to_defaults() {
        let analysis = result(None, QualityOutcome::Unscored(ScoringError::SingleClass(0)));
        let reduced = reduce(&ModelId::new("m"), Utc::now(), &analysis);

        assert!(reduced.features.is_empty());
        assert_eq!(reduced.performance.drift_score, 0);
        assert_eq!(
            (
                reduced.performance.accuracy,
                reduced.performance.precision,
                reduced.performance.recall,
                reduced.performance.f1
            ),
            (0.0, 0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn drift_flag_is_the_dataset_verdict() {
        let analysis = result(
            Some(vec![("target", column(0.0, true)), ("radius", column(0.6, false))]),
            QualityOutcome::Scored(ClassificationQuality::default()),
        );
        let reduced = reduce(&ModelId::new("m"), Utc::now(), &analysis);

        let verdict = analysis.drift.as_ref().map(DatasetDrift::drift_score);
        assert_eq!(verdict, Some(0));
        assert_eq!(Some(reduced.performance.drift_score), verdict);
    }

    #[test]
    fn reduction_is_repeatable() {
        let analysis = result(
            Some(vec![("radius", column(0.01, true))]),
            QualityOutcome::Scored(ClassificationQuality::default()),
        );
        let now = Utc::now();
        let id = ModelId::new("m");

        assert_eq!(reduce(&id, now, &analysis), reduce(&id, now, &analysis));
    }
}
