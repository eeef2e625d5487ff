use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Binary confusion matrix with `bad` as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_good: usize,
    pub false_bad: usize,
    pub false_good: usize,
    pub true_bad: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(actual: &[u8], predicted: &[u8]) -> Self {
        let mut m = Self::default();
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a, p) {
                (0, 0) => m.true_good += 1,
                (0, _) => m.false_bad += 1,
                (_, 0) => m.false_good += 1,
                _ => m.true_bad += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_good + self.false_bad + self.false_good + self.true_bad
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_good + self.true_bad, self.total())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn new(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

/// Hold-out metrics, in the shape of a classification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub good: ClassMetrics,
    pub bad: ClassMetrics,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl EvaluationReport {
    pub fn from_predictions(actual: &[u8], predicted: &[u8]) -> Self {
        let confusion = ConfusionMatrix::from_predictions(actual, predicted);
        let good = ClassMetrics::new(confusion.true_good, confusion.false_good, confusion.false_bad);
        let bad = ClassMetrics::new(confusion.true_bad, confusion.false_bad, confusion.false_good);
        let total = confusion.total();

        let macro_avg = ClassMetrics {
            precision: (good.precision + bad.precision) / 2.0,
            recall: (good.recall + bad.recall) / 2.0,
            f1: (good.f1 + bad.f1) / 2.0,
            support: total,
        };
        let weight = |g: f64, b: f64| {
            if total == 0 {
                0.0
            } else {
                (g * good.support as f64 + b * bad.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(good.precision, bad.precision),
            recall: weight(good.recall, bad.recall),
            f1: weight(good.f1, bad.f1),
            support: total,
        };

        Self {
            accuracy: confusion.accuracy(),
            confusion,
            good,
            bad,
            macro_avg,
            weighted_avg,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        );
        for (name, m) in [("good", &self.good), ("bad", &self.bad)] {
            let _ = writeln!(
                out,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, m.precision, m.recall, m.f1, m.support
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.confusion.total()
        );
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            let _ = writeln!(
                out,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, m.precision, m.recall, m.f1, m.support
            );
        }
        let c = &self.confusion;
        let _ = writeln!(out, "\nconfusion matrix (rows = actual, cols = predicted)");
        let _ = writeln!(out, "{:>8} {:>6} {:>6}", "", "good", "bad");
        let _ = writeln!(out, "{:>8} {:>6} {:>6}", "good", c.true_good, c.false_bad);
        let _ = writeln!(out, "{:>8} {:>6} {:>6}", "bad", c.false_good, c.true_bad);
        out
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_values() {
        let actual = [0, 0, 0, 0, 1, 1, 1, 1, 1, 0];
        let predicted = [0, 0, 0, 1, 1, 1, 0, 1, 1, 0];
        let r = EvaluationReport::from_predictions(&actual, &predicted);

        assert_eq!(
            r.confusion,
            ConfusionMatrix {
                true_good: 4,
                false_bad: 1,
                false_good: 1,
                true_bad: 4
            }
        );
        assert!((r.accuracy - 0.8).abs() < 1e-12);
        assert!((r.bad.precision - 0.8).abs() < 1e-12);
        assert!((r.bad.recall - 0.8).abs() < 1e-12);
        assert_eq!(r.good.support, 5);
        assert!((r.weighted_avg.f1 - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions() {
        let r = EvaluationReport::from_predictions(&[0, 1], &[0, 0]);
        assert_eq!(r.bad.precision, 0.0);
        assert_eq!(r.bad.f1, 0.0);
        assert!(r.render().contains("accuracy"));
    }
}
