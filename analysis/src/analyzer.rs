//! Reference-vs-current comparison of one model.
//!
//! The analyzer is pure: given the two tables it runs one drift test per feature
//! column and scores the current predictions. Nothing here touches a store.

use crate::{
    drift::{
        AutoDriftTest,
        ColumnDrift,
        ColumnDriftTest,
    },
    error::{
        AnalysisError,
        DriftTestError,
        ScoringError,
        TableError,
    },
    model::{
        is_reserved_column,
        CurrentTable,
        ReferenceTable,
    },
    scoring::{
        ClassificationQuality,
        ClassificationScorer,
        LabelScorer,
    },
};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Per-feature drift of the columns whose test could be computed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DatasetDrift {
    pub columns: BTreeMap<String, ColumnDrift>,
}

impl DatasetDrift {
    /// Number of drifted feature columns. Reserved column names never count.
    pub fn drifted_count(&self) -> usize {
        self.feature_columns().filter(|(_, drift)| drift.drifted).count()
    }

    /// `1` iff at least one feature column drifted.
    pub fn drift_score(&self) -> u8 {
        u8::from(self.drifted_count() > 0)
    }

    pub fn feature_columns(&self) -> impl Iterator<Item = (&String, &ColumnDrift)> {
        self.columns.iter().filter(|(name, _)| !is_reserved_column(name))
    }
}

/// A column left out of [`DatasetDrift`] because its test was uncomputable.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedColumn {
    pub name: String,
    pub reason: DriftTestError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QualityOutcome {
    Scored(ClassificationQuality),
    Unscored(ScoringError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub reference_rows: usize,
    pub current_rows: usize,
    /// `None` when no column could be tested at all.
    pub drift: Option<DatasetDrift>,
    pub skipped_columns: Vec<SkippedColumn>,
    pub quality: QualityOutcome,
    /// Quality of the reference side, whose predictions are its own labels.
    pub baseline: Option<ClassificationQuality>,
}

pub struct Analyzer {
    drift_test: Box<dyn ColumnDriftTest>,
    scorer: Box<dyn ClassificationScorer>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Box::new(AutoDriftTest::default()), Box::new(LabelScorer::default()))
    }
}

impl Analyzer {
    pub fn new(drift_test: Box<dyn ColumnDriftTest>, scorer: Box<dyn ClassificationScorer>) -> Self {
        Self { drift_test, scorer }
    }

    pub fn analyze(&self, reference: &ReferenceTable, current: &CurrentTable) -> Result<AnalysisResult, AnalysisError> {
        if reference.feature_names() != current.feature_names() {
            return Err(TableError::SchemaMismatch {
                expected: reference.feature_names().to_vec(),
                actual: current.feature_names().to_vec(),
            }
            .into());
        }

        // Columns are independent, so the parallel run gives the same results as a
        // sequential one. Collecting into a Vec keeps schema order.
        let tested: Vec<(String, Result<ColumnDrift, DriftTestError>)> = (0..reference.feature_names().len())
            .into_par_iter()
            .map(|index| {
                let name = reference.feature_names()[index].clone();
                let result = self.drift_test.test(reference.column(index), current.column(index));
                (name, result)
            })
            .collect();

        let mut columns = BTreeMap::new();
        let mut skipped_columns = Vec::new();
        for (name, result) in tested {
            match result {
                Ok(drift) => {
                    columns.insert(name, drift);
                }
                Err(reason) => {
                    debug!(column = %name, %reason, "drift test skipped");
                    skipped_columns.push(SkippedColumn { name, reason });
                }
            }
        }
        let drift = (!columns.is_empty()).then_some(DatasetDrift { columns });

        let quality = match self.scorer.score(current.target(), current.prediction()) {
            Ok(quality) => QualityOutcome::Scored(quality),
            Err(reason) => {
                debug!(%reason, "classification quality unscored");
                QualityOutcome::Unscored(reason)
            }
        };
        let baseline = self.scorer.score(reference.target(), reference.prediction()).ok();

        Ok(AnalysisResult {
            reference_rows: reference.n_rows(),
            current_rows: current.n_rows(),
            drift,
            skipped_columns,
            quality,
            baseline,
        })
    }
}
