//! Per-column two-sample drift tests.
//!
//! Every test compares the reference values of one feature with its current values
//! and reports a p-value together with a drifted flag (`p_value < significance`).

use crate::error::DriftTestError;
use ndarray::ArrayView1;
use serde::{
    Deserialize,
    Serialize,
};
use statrs::distribution::{
    ChiSquared,
    ContinuousCDF,
};
use std::cmp::Ordering;
use strum::Display;

pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;
pub const DEFAULT_CATEGORICAL_MAX_UNIQUE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ColumnKind {
    Continuous,
    Categorical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatTest {
    #[strum(to_string = "ks")]
    KolmogorovSmirnov,
    #[strum(to_string = "chisquare")]
    ChiSquare,
}

/// Outcome of comparing one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub kind: ColumnKind,
    pub stat_test: StatTest,
    pub p_value: f64,
    pub drifted: bool,
}

/// Two-sample comparison of one feature column.
///
/// Implementations must be deterministic: the same samples always give the same
/// result, regardless of which thread runs the test.
pub trait ColumnDriftTest: Send + Sync {
    fn test(&self, reference: ArrayView1<'_, f64>, current: ArrayView1<'_, f64>) -> Result<ColumnDrift, DriftTestError>;
}

/// A column is categorical when every reference value is a finite integer and there
/// are at most `max_unique` distinct values.
pub fn infer_column_kind(reference: ArrayView1<'_, f64>, max_unique: usize) -> ColumnKind {
    if reference.iter().any(|v| !v.is_finite() || v.fract() != 0.0) {
        return ColumnKind::Continuous;
    }
    match sorted_unique(reference).len() {
        n if n <= max_unique => ColumnKind::Categorical,
        _ => ColumnKind::Continuous,
    }
}

fn check_samples(reference: ArrayView1<'_, f64>, current: ArrayView1<'_, f64>) -> Result<(), DriftTestError> {
    if reference.is_empty() {
        return Err(DriftTestError::EmptyReference);
    }
    if current.is_empty() {
        return Err(DriftTestError::EmptyCurrent);
    }
    if reference.iter().any(|v| !v.is_finite()) {
        return Err(DriftTestError::NonFinite("reference"));
    }
    if current.iter().any(|v| !v.is_finite()) {
        return Err(DriftTestError::NonFinite("current"));
    }
    Ok(())
}

fn sorted(sample: ArrayView1<'_, f64>) -> Vec<f64> {
    let mut values = sample.to_vec();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    values
}

fn sorted_unique(sample: ArrayView1<'_, f64>) -> Vec<f64> {
    let mut values = sorted(sample);
    values.dedup();
    values
}

/// Two-sample Kolmogorov-Smirnov test with the asymptotic p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KolmogorovSmirnovTest {
    significance: f64,
}

impl KolmogorovSmirnovTest {
    pub fn new(significance: f64) -> Self {
        Self {
            significance: significance.clamp(0.001, 0.5),
        }
    }

    /// Largest distance between the two empirical CDFs. Both inputs must be sorted.
    pub fn statistic(reference: &[f64], current: &[f64]) -> f64 {
        let (n1, n2) = (reference.len() as f64, current.len() as f64);
        let (mut i, mut j) = (0, 0);
        let mut distance: f64 = 0.0;

        while i < reference.len() && j < current.len() {
            let x = reference[i].min(current[j]);
            while i < reference.len() && reference[i] <= x {
                i += 1;
            }
            while j < current.len() && current[j] <= x {
                j += 1;
            }
            distance = distance.max((i as f64 / n1 - j as f64 / n2).abs());
        }

        distance
    }

    /// Survival function of the Kolmogorov distribution, with the small-sample
    /// correction `λ = (√nₑ + 0.12 + 0.11/√nₑ)·D`.
    pub fn p_value(statistic: f64, n1: usize, n2: usize) -> f64 {
        let effective = ((n1 * n2) as f64 / (n1 + n2) as f64).sqrt();
        let lambda = (effective + 0.12 + 0.11 / effective) * statistic;
        kolmogorov_survival(lambda)
    }
}

impl Default for KolmogorovSmirnovTest {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANCE)
    }
}

impl ColumnDriftTest for KolmogorovSmirnovTest {
    fn test(&self, reference: ArrayView1<'_, f64>, current: ArrayView1<'_, f64>) -> Result<ColumnDrift, DriftTestError> {
        check_samples(reference, current)?;

        let statistic = Self::statistic(&sorted(reference), &sorted(current));
        let p_value = Self::p_value(statistic, reference.len(), current.len());

        Ok(ColumnDrift {
            kind: ColumnKind::Continuous,
            stat_test: StatTest::KolmogorovSmirnov,
            p_value,
            drifted: p_value < self.significance,
        })
    }
}

fn kolmogorov_survival(lambda: f64) -> f64 {
    const EPS1: f64 = 1e-3;
    const EPS2: f64 = 1e-8;

    let a2 = -2.0 * lambda * lambda;
    let mut factor = 2.0;
    let mut sum = 0.0;
    let mut previous: f64 = 0.0;

    for j in 1..=100 {
        let j = j as f64;
        let term = factor * (a2 * j * j).exp();
        sum += term;
        if term.abs() <= EPS1 * previous || term.abs() <= EPS2 * sum {
            return sum.clamp(0.0, 1.0);
        }
        factor = -factor;
        previous = term.abs();
    }

    // The series only fails to converge for λ close to zero, where the samples are
    // indistinguishable.
    1.0
}

/// Chi-square test of homogeneity on the 2×k table of category counts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChiSquareTest {
    significance: f64,
}

impl ChiSquareTest {
    pub fn new(significance: f64) -> Self {
        Self {
            significance: significance.clamp(0.001, 0.5),
        }
    }
}

impl Default for ChiSquareTest {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANCE)
    }
}

impl ColumnDriftTest for ChiSquareTest {
    fn test(&self, reference: ArrayView1<'_, f64>, current: ArrayView1<'_, f64>) -> Result<ColumnDrift, DriftTestError> {
        check_samples(reference, current)?;

        let mut categories = sorted(reference);
        categories.extend(sorted(current));
        categories.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        categories.dedup();

        let p_value = if categories.len() < 2 {
            1.0
        } else {
            let counts = |sample: ArrayView1<'_, f64>| {
                let mut counts = vec![0.0; categories.len()];
                for value in sample.iter() {
                    if let Ok(index) = categories.binary_search_by(|c| c.partial_cmp(value).unwrap_or(Ordering::Equal)) {
                        counts[index] += 1.0;
                    }
                }
                counts
            };
            let observed = [counts(reference), counts(current)];
            let row_totals = [reference.len() as f64, current.len() as f64];
            let total = row_totals[0] + row_totals[1];

            let mut statistic = 0.0;
            for (row, row_total) in observed.iter().zip(row_totals) {
                for (column, count) in row.iter().enumerate() {
                    let column_total = observed[0][column] + observed[1][column];
                    let expected = row_total * column_total / total;
                    statistic += (count - expected).powi(2) / expected;
                }
            }

            let distribution = ChiSquared::new((categories.len() - 1) as f64)
                .map_err(|e| DriftTestError::Distribution(e.to_string()))?;
            (1.0 - distribution.cdf(statistic)).clamp(0.0, 1.0)
        };

        Ok(ColumnDrift {
            kind: ColumnKind::Categorical,
            stat_test: StatTest::ChiSquare,
            p_value,
            drifted: p_value < self.significance,
        })
    }
}

/// Chooses the test per column from the inferred column kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoDriftTest {
    continuous: KolmogorovSmirnovTest,
    categorical: ChiSquareTest,
    categorical_max_unique: usize,
}

impl AutoDriftTest {
    pub fn new(significance: f64, categorical_max_unique: usize) -> Self {
        Self {
            continuous: KolmogorovSmirnovTest::new(significance),
            categorical: ChiSquareTest::new(significance),
            categorical_max_unique,
        }
    }
}

impl Default for AutoDriftTest {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNIFICANCE, DEFAULT_CATEGORICAL_MAX_UNIQUE)
    }
}

impl ColumnDriftTest for AutoDriftTest {
    fn test(&self, reference: ArrayView1<'_, f64>, current: ArrayView1<'_, f64>) -> Result<ColumnDrift, DriftTestError> {
        check_samples(reference, current)?;
        match infer_column_kind(reference, self.categorical_max_unique) {
            ColumnKind::Continuous => self.continuous.test(reference, current),
            ColumnKind::Categorical => self.categorical.test(reference, current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn ks_identical_samples() {
        let data = Array1::from_vec((0..50).map(|i| i as f64).collect());
        let result = KolmogorovSmirnovTest::default().test(data.view(), data.view()).unwrap();

        assert_eq!(result.p_value, 1.0);
        assert!(!result.drifted);
    }

    #[test]
    fn ks_statistic_of_disjoint_samples() {
        let reference = [1.0, 2.0, 3.0, 4.0];
        let current = [10.0, 11.0, 12.0];
        assert_eq!(KolmogorovSmirnovTest::statistic(&reference, &current), 1.0);
    }

    #[test]
    fn ks_with_drift() {
        let reference = Array1::from_vec((0..30).map(|i| i as f64).collect());
        let current = Array1::from_vec((0..30).map(|i| 100.0 + i as f64).collect());
        let result = KolmogorovSmirnovTest::default().test(reference.view(), current.view()).unwrap();

        assert!(result.drifted);
        assert!(result.p_value < 1e-6);
        assert_eq!(result.stat_test, StatTest::KolmogorovSmirnov);
    }

    #[test]
    fn ks_interleaved_samples_do_not_drift() {
        let reference = Array1::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let current = Array1::from_vec(vec![1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5, 8.5, 9.5, 10.5]);
        let result = KolmogorovSmirnovTest::default().test(reference.view(), current.view()).unwrap();

        assert!(!result.drifted);
    }

    #[test]
    fn empty_and_non_finite_samples_are_uncomputable() {
        let reference = Array1::from_vec(vec![1.0, 2.0]);
        let empty = Array1::<f64>::zeros(0);
        let nan = Array1::from_vec(vec![1.0, f64::NAN]);
        let test = AutoDriftTest::default();

        assert_eq!(test.test(reference.view(), empty.view()), Err(DriftTestError::EmptyCurrent));
        assert_eq!(test.test(empty.view(), reference.view()), Err(DriftTestError::EmptyReference));
        assert_eq!(test.test(reference.view(), nan.view()), Err(DriftTestError::NonFinite("current")));
    }

    #[test]
    fn infers_categorical_columns() {
        let binary = Array1::from_vec(vec![0.0, 1.0, 1.0, 0.0]);
        let continuous = Array1::from_vec(vec![0.5, 1.0, 1.5]);
        let many_codes = Array1::from_vec((0..10).map(|i| i as f64).collect());

        assert_eq!(infer_column_kind(binary.view(), 5), ColumnKind::Categorical);
        assert_eq!(infer_column_kind(continuous.view(), 5), ColumnKind::Continuous);
        assert_eq!(infer_column_kind(many_codes.view(), 5), ColumnKind::Continuous);
    }

    #[test]
    fn chi_square_detects_shifted_proportions() {
        let reference = Array1::from_vec((0..100).map(|i| f64::from(i % 2 == 0)).collect());
        let current = Array1::from_vec((0..100).map(|i| f64::from(i % 10 == 0)).collect());
        let result = AutoDriftTest::default().test(reference.view(), current.view()).unwrap();

        assert_eq!(result.kind, ColumnKind::Categorical);
        assert_eq!(result.stat_test, StatTest::ChiSquare);
        assert!(result.drifted);
    }

    #[test]
    fn chi_square_same_proportions() {
        let reference = Array1::from_vec((0..90).map(|i| (i % 3) as f64).collect());
        let current = Array1::from_vec((0..30).map(|i| (i % 3) as f64).collect());
        let result = ChiSquareTest::default().test(reference.view(), current.view()).unwrap();

        assert!(result.p_value > 0.99);
        assert!(!result.drifted);
    }

    #[test]
    fn chi_square_single_shared_category() {
        let constant = Array1::from_vec(vec![1.0; 8]);
        let result = ChiSquareTest::default().test(constant.view(), constant.view()).unwrap();

        assert_eq!(result.p_value, 1.0);
        assert!(!result.drifted);
    }
}
