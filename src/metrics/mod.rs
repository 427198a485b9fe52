//! Classification metrics for evaluating K-Type classifiers.
//!
//! Provides accuracy, precision, recall, F1-score, a confusion matrix and a
//! per-class classification report for multi-class problems.

use crate::primitives::Matrix;
use std::fmt;

/// Averaging strategy for multi-class metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Average {
    /// Calculate metrics for each label, return unweighted mean.
    Macro,
    /// Calculate metrics globally by counting total TP, FP, FN.
    Micro,
    /// Weighted mean by support (number of true instances per label).
    Weighted,
}

/// Compute classification accuracy.
///
/// accuracy = `correct_predictions` / `total_predictions`
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn accuracy(y_pred: &[usize], y_true: &[usize]) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    let correct = y_pred
        .iter()
        .zip(y_true.iter())
        .filter(|(p, t)| p == t)
        .count();

    correct as f32 / y_true.len() as f32
}

/// Per-class true positives, false positives, false negatives and support.
fn compute_tp_fp_fn(
    y_pred: &[usize],
    y_true: &[usize],
    n_classes: usize,
) -> (Vec<usize>, Vec<usize>, Vec<usize>, Vec<usize>) {
    let mut tp = vec![0usize; n_classes];
    let mut fp = vec![0usize; n_classes];
    let mut fn_ = vec![0usize; n_classes];
    let mut support = vec![0usize; n_classes];

    for (&p, &t) in y_pred.iter().zip(y_true.iter()) {
        support[t] += 1;
        if p == t {
            tp[t] += 1;
        } else {
            fp[p] += 1;
            fn_[t] += 1;
        }
    }

    (tp, fp, fn_, support)
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        0.0
    } else {
        num as f32 / den as f32
    }
}

fn n_classes_of(y_pred: &[usize], y_true: &[usize]) -> usize {
    y_true
        .iter()
        .chain(y_pred.iter())
        .max()
        .map_or(0, |&m| m + 1)
}

fn average_per_class(per_class: &[f32], support: &[usize], average: Average) -> f32 {
    match average {
        Average::Macro => {
            if per_class.is_empty() {
                0.0
            } else {
                per_class.iter().sum::<f32>() / per_class.len() as f32
            }
        }
        Average::Weighted => {
            let total: usize = support.iter().sum();
            if total == 0 {
                0.0
            } else {
                per_class
                    .iter()
                    .zip(support.iter())
                    .map(|(v, &s)| v * s as f32)
                    .sum::<f32>()
                    / total as f32
            }
        }
        // Micro is handled by the callers from global counts.
        Average::Micro => unreachable!("micro averaging uses global counts"),
    }
}

/// Compute precision score: TP / (TP + FP).
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn precision(y_pred: &[usize], y_true: &[usize], average: Average) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    let n_classes = n_classes_of(y_pred, y_true);
    let (tp, fp, _, support) = compute_tp_fp_fn(y_pred, y_true, n_classes);

    if let Average::Micro = average {
        let total_tp: usize = tp.iter().sum();
        let total_fp: usize = fp.iter().sum();
        return ratio(total_tp, total_tp + total_fp);
    }

    let per_class: Vec<f32> = (0..n_classes).map(|i| ratio(tp[i], tp[i] + fp[i])).collect();
    average_per_class(&per_class, &support, average)
}

/// Compute recall score: TP / (TP + FN).
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn recall(y_pred: &[usize], y_true: &[usize], average: Average) -> f32 {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    let n_classes = n_classes_of(y_pred, y_true);
    let (tp, _, fn_, support) = compute_tp_fp_fn(y_pred, y_true, n_classes);

    if let Average::Micro = average {
        let total_tp: usize = tp.iter().sum();
        let total_fn: usize = fn_.iter().sum();
        return ratio(total_tp, total_tp + total_fn);
    }

    let per_class: Vec<f32> = (0..n_classes)
        .map(|i| ratio(tp[i], tp[i] + fn_[i]))
        .collect();
    average_per_class(&per_class, &support, average)
}

/// Compute F1 score: harmonic mean of precision and recall.
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn f1_score(y_pred: &[usize], y_true: &[usize], average: Average) -> f32 {
    let p = precision(y_pred, y_true, average);
    let r = recall(y_pred, y_true, average);
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

/// Compute the confusion matrix.
///
/// Rows are true classes, columns are predicted classes.
///
/// # Panics
///
/// Panics if vectors have different lengths or are empty.
#[must_use]
pub fn confusion_matrix(y_pred: &[usize], y_true: &[usize]) -> Matrix<usize> {
    assert_eq!(y_pred.len(), y_true.len(), "Vectors must have same length");
    assert!(!y_true.is_empty(), "Vectors cannot be empty");

    let n_classes = n_classes_of(y_pred, y_true);
    let mut m = vec![0usize; n_classes * n_classes];
    for (&p, &t) in y_pred.iter().zip(y_true.iter()) {
        m[t * n_classes + p] += 1;
    }
    Matrix::from_vec(n_classes, n_classes, m).expect("square matrix construction")
}

/// Per-class precision/recall/F1/support for one label.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassMetrics {
    /// Class display name.
    pub label: String,
    /// Precision for this class.
    pub precision: f32,
    /// Recall for this class.
    pub recall: f32,
    /// F1 score for this class.
    pub f1: f32,
    /// Number of true instances.
    pub support: usize,
}

/// Full classification report: per-class rows plus overall summaries.
///
/// The Display impl mirrors the familiar per-class table layout so the
/// training log reads like the original notebook output.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassificationReport {
    /// One row per class, in class-index order.
    pub per_class: Vec<ClassMetrics>,
    /// Overall accuracy.
    pub accuracy: f32,
    /// Macro-averaged (precision, recall, f1).
    pub macro_avg: (f32, f32, f32),
    /// Support-weighted (precision, recall, f1).
    pub weighted_avg: (f32, f32, f32),
    /// Total number of samples.
    pub total_support: usize,
}

impl ClassificationReport {
    /// Builds a report from predictions, truths and class display names.
    ///
    /// `class_names[i]` names class index `i`; indices outside the name list
    /// fall back to their numeric form.
    ///
    /// # Panics
    ///
    /// Panics if vectors have different lengths or are empty.
    #[must_use]
    pub fn compute(y_pred: &[usize], y_true: &[usize], class_names: &[String]) -> Self {
        // Every named class gets a row, even when it never appears in this
        // split; those rows report zero support rather than disappearing.
        let n_classes = class_names.len().max(n_classes_of(y_pred, y_true));
        let (tp, fp, fn_, support) = compute_tp_fp_fn(y_pred, y_true, n_classes);

        let per_class: Vec<ClassMetrics> = (0..n_classes)
            .map(|i| {
                let p = ratio(tp[i], tp[i] + fp[i]);
                let r = ratio(tp[i], tp[i] + fn_[i]);
                let f1 = if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) };
                let label = class_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| i.to_string());
                ClassMetrics {
                    label,
                    precision: p,
                    recall: r,
                    f1,
                    support: support[i],
                }
            })
            .collect();

        Self {
            accuracy: accuracy(y_pred, y_true),
            macro_avg: (
                precision(y_pred, y_true, Average::Macro),
                recall(y_pred, y_true, Average::Macro),
                f1_score(y_pred, y_true, Average::Macro),
            ),
            weighted_avg: (
                precision(y_pred, y_true, Average::Weighted),
                recall(y_pred, y_true, Average::Weighted),
                f1_score(y_pred, y_true, Average::Weighted),
            ),
            total_support: y_true.len(),
            per_class,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .per_class
            .iter()
            .map(|c| c.label.len())
            .max()
            .unwrap_or(12)
            .max(12);

        writeln!(
            f,
            "{:>width$}  precision  recall  f1-score  support",
            "",
            width = width
        )?;
        for c in &self.per_class {
            writeln!(
                f,
                "{:>width$}  {:>9.3}  {:>6.3}  {:>8.3}  {:>7}",
                c.label,
                c.precision,
                c.recall,
                c.f1,
                c.support,
                width = width
            )?;
        }
        writeln!(
            f,
            "{:>width$}  {:>28.3}  {:>7}",
            "accuracy",
            self.accuracy,
            self.total_support,
            width = width
        )?;
        writeln!(
            f,
            "{:>width$}  {:>9.3}  {:>6.3}  {:>8.3}  {:>7}",
            "macro avg",
            self.macro_avg.0,
            self.macro_avg.1,
            self.macro_avg.2,
            self.total_support,
            width = width
        )?;
        write!(
            f,
            "{:>width$}  {:>9.3}  {:>6.3}  {:>8.3}  {:>7}",
            "weighted avg",
            self.weighted_avg.0,
            self.weighted_avg.1,
            self.weighted_avg.2,
            self.total_support,
            width = width
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_basic() {
        let y_true = vec![0, 1, 2, 0, 1, 2];
        let y_pred = vec![0, 2, 1, 0, 0, 1];
        let acc = accuracy(&y_pred, &y_true);
        assert!((acc - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_accuracy_perfect() {
        let y = vec![0, 1, 2];
        assert!((accuracy(&y, &y) - 1.0).abs() < 1e-6);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_accuracy_length_mismatch_panics() {
        accuracy(&[0, 1], &[0]);
    }

    #[test]
    fn test_precision_recall_binary() {
        // pred:  1 1 0 0
        // true:  1 0 1 0
        let y_pred = vec![1, 1, 0, 0];
        let y_true = vec![1, 0, 1, 0];
        // class 1: tp=1 fp=1 fn=1 -> p=0.5, r=0.5
        let p = precision(&y_pred, &y_true, Average::Macro);
        let r = recall(&y_pred, &y_true, Average::Macro);
        assert!((p - 0.5).abs() < 1e-6);
        assert!((r - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_micro_equals_accuracy_for_single_label_tasks() {
        let y_true = vec![0, 1, 2, 0, 1, 2];
        let y_pred = vec![0, 2, 1, 0, 0, 1];
        let p = precision(&y_pred, &y_true, Average::Micro);
        let r = recall(&y_pred, &y_true, Average::Micro);
        let acc = accuracy(&y_pred, &y_true);
        assert!((p - acc).abs() < 1e-6);
        assert!((r - acc).abs() < 1e-6);
    }

    #[test]
    fn test_f1_zero_when_nothing_correct() {
        let y_true = vec![0, 0, 0];
        let y_pred = vec![1, 1, 1];
        assert_eq!(f1_score(&y_pred, &y_true, Average::Macro), 0.0);
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let y_true = vec![0, 1, 1, 2];
        let y_pred = vec![0, 1, 2, 2];
        let cm = confusion_matrix(&y_pred, &y_true);
        assert_eq!(cm.shape(), (3, 3));
        assert_eq!(cm.get(0, 0), 1);
        assert_eq!(cm.get(1, 1), 1);
        assert_eq!(cm.get(1, 2), 1);
        assert_eq!(cm.get(2, 2), 1);
        assert_eq!(cm.get(2, 0), 0);
    }

    #[test]
    fn test_classification_report_values() {
        let y_true = vec![0, 0, 1, 1];
        let y_pred = vec![0, 1, 1, 1];
        let names = vec!["Laitier".to_string(), "Céréalier".to_string()];
        let report = ClassificationReport::compute(&y_pred, &y_true, &names);

        assert_eq!(report.per_class.len(), 2);
        assert_eq!(report.per_class[0].label, "Laitier");
        assert_eq!(report.per_class[0].support, 2);
        // class 0: tp=1, fp=0, fn=1
        assert!((report.per_class[0].precision - 1.0).abs() < 1e-6);
        assert!((report.per_class[0].recall - 0.5).abs() < 1e-6);
        assert!((report.accuracy - 0.75).abs() < 1e-6);
        assert_eq!(report.total_support, 4);
    }

    #[test]
    fn test_classification_report_lists_absent_classes() {
        // Class 2 ("Herbager") never shows up in this split but is part of
        // the trained vocabulary; it must still get a row.
        let y_true = vec![0, 0, 1];
        let y_pred = vec![0, 1, 1];
        let names = vec![
            "Laitier".to_string(),
            "Céréalier".to_string(),
            "Herbager".to_string(),
        ];
        let report = ClassificationReport::compute(&y_pred, &y_true, &names);

        assert_eq!(report.per_class.len(), 3);
        assert_eq!(report.per_class[2].label, "Herbager");
        assert_eq!(report.per_class[2].support, 0);
        assert_eq!(report.per_class[2].precision, 0.0);
        assert_eq!(report.per_class[2].recall, 0.0);
    }

    #[test]
    fn test_classification_report_display() {
        let y_true = vec![0, 1];
        let y_pred = vec![0, 1];
        let names = vec!["A".to_string(), "B".to_string()];
        let report = ClassificationReport::compute(&y_pred, &y_true, &names);
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.contains('A'));
    }
}
