use crate::error::ScoringError;
use ndarray::ArrayView1;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationQuality {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// How per-class precision, recall and f1 are combined into one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Averaging {
    /// Scores of the `positive` class only.
    Binary { positive: i64 },
    /// Unweighted mean over every label seen in either column.
    Macro,
}

impl Averaging {
    /// Binary with positive class 1 when every label is 0 or 1, macro otherwise.
    pub fn infer(target: ArrayView1<'_, i64>, prediction: ArrayView1<'_, i64>) -> Self {
        if target.iter().chain(prediction.iter()).all(|l| *l == 0 || *l == 1) {
            Averaging::Binary { positive: 1 }
        } else {
            Averaging::Macro
        }
    }
}

pub trait ClassificationScorer: Send + Sync {
    fn score(&self, target: ArrayView1<'_, i64>, prediction: ArrayView1<'_, i64>) -> Result<ClassificationQuality, ScoringError>;
}

/// Scores hard labels. Zero denominators give 0.0 for the affected class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelScorer {
    averaging: Option<Averaging>,
}

impl LabelScorer {
    pub fn with_averaging(averaging: Averaging) -> Self {
        Self {
            averaging: Some(averaging),
        }
    }
}

impl ClassificationScorer for LabelScorer {
    fn score(&self, target: ArrayView1<'_, i64>, prediction: ArrayView1<'_, i64>) -> Result<ClassificationQuality, ScoringError> {
        if target.len() != prediction.len() {
            return Err(ScoringError::LengthMismatch {
                target: target.len(),
                prediction: prediction.len(),
            });
        }
        let first = *target.first().ok_or(ScoringError::Empty)?;
        if target.iter().all(|l| *l == first) {
            return Err(ScoringError::SingleClass(first));
        }

        let correct = target.iter().zip(prediction.iter()).filter(|(t, p)| t == p).count();
        let accuracy = correct as f64 / target.len() as f64;

        let (precision, recall, f1) = match self.averaging.unwrap_or_else(|| Averaging::infer(target, prediction)) {
            Averaging::Binary { positive } => class_scores(target, prediction, positive),
            Averaging::Macro => {
                let labels: BTreeSet<i64> = target.iter().chain(prediction.iter()).copied().collect();
                let n = labels.len() as f64;
                labels
                    .into_iter()
                    .map(|label| class_scores(target, prediction, label))
                    .fold((0.0, 0.0, 0.0), |acc, s| (acc.0 + s.0 / n, acc.1 + s.1 / n, acc.2 + s.2 / n))
            }
        };

        Ok(ClassificationQuality {
            accuracy,
            precision,
            recall,
            f1,
        })
    }
}

/// One-vs-rest precision, recall and f1 of `label`.
fn class_scores(target: ArrayView1<'_, i64>, prediction: ArrayView1<'_, i64>, label: i64) -> (f64, f64, f64) {
    let (mut tp, mut fp, mut fn_) = (0usize, 0usize, 0usize);
    for (t, p) in target.iter().zip(prediction.iter()) {
        match (*t == label, *p == label) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => {}
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    (precision, recall, f1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    #[test]
    fn perfect_predictions() {
        let labels = array![0, 1, 1, 0, 1];
        let quality = LabelScorer::default().score(labels.view(), labels.view()).unwrap();

        assert_eq!(
            quality,
            ClassificationQuality {
                accuracy: 1.0,
                precision: 1.0,
                recall: 1.0,
                f1: 1.0,
            }
        );
    }

    #[test]
    fn binary_scores_positive_class() {
        let target = array![1, 1, 1, 0, 0, 0];
        let prediction = array![1, 1, 0, 1, 0, 0];
        let quality = LabelScorer::default().score(target.view(), prediction.view()).unwrap();

        assert!((quality.accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert!((quality.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((quality.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((quality.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_positive_predictions_give_zero_precision() {
        let target = array![1, 0, 1, 0];
        let prediction = array![0, 0, 0, 0];
        let quality = LabelScorer::default().score(target.view(), prediction.view()).unwrap();

        assert_eq!(quality.accuracy, 0.5);
        assert_eq!(quality.precision, 0.0);
        assert_eq!(quality.recall, 0.0);
        assert_eq!(quality.f1, 0.0);
    }

    #[test]
    fn multi_class_uses_macro_average() {
        let target = array![0, 1, 2, 2];
        let prediction = array![0, 2, 2, 2];
        let quality = LabelScorer::default().score(target.view(), prediction.view()).unwrap();

        // class 0: p=1 r=1, class 1: p=0 r=0, class 2: p=2/3 r=1
        assert_eq!(quality.accuracy, 0.75);
        assert!((quality.precision - (1.0 + 2.0 / 3.0) / 3.0).abs() < 1e-12);
        assert!((quality.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((quality.f1 - (1.0 + 0.8) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn explicit_binary_averaging_on_other_labels() {
        let target = array![3, 3, 7, 7];
        let prediction = array![3, 7, 7, 7];
        let quality = LabelScorer::with_averaging(Averaging::Binary { positive: 3 })
            .score(target.view(), prediction.view())
            .unwrap();

        assert_eq!(quality.precision, 1.0);
        assert_eq!(quality.recall, 0.5);
    }

    #[test]
    fn degenerate_windows_are_unscored() {
        let single = array![1, 1, 1, 1, 1];
        let empty = ndarray::Array1::<i64>::zeros(0);
        let scorer = LabelScorer::default();

        assert_eq!(scorer.score(single.view(), single.view()), Err(ScoringError::SingleClass(1)));
        assert_eq!(scorer.score(empty.view(), empty.view()), Err(ScoringError::Empty));
        assert_eq!(
            scorer.score(single.view(), array![1, 0].view()),
            Err(ScoringError::LengthMismatch {
                target: 5,
                prediction: 2,
            })
        );
    }
}
