//! Offline classifier evaluation: accuracy, confusion matrix, per-class metrics

use crate::FormClassifier;
use formcheck_common::{FeatureVector, Label, LabeledSample, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Rows are actual labels, columns predicted labels, both in class-index order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual: Label, predicted: Label) {
        self.counts[usize::from(actual.as_u8())][usize::from(predicted.as_u8())] += 1;
    }

    #[must_use]
    pub fn get(&self, actual: Label, predicted: Label) -> usize {
        self.counts[usize::from(actual.as_u8())][usize::from(predicted.as_u8())]
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    #[must_use]
    pub fn correct(&self) -> usize {
        Label::all().iter().map(|l| self.get(*l, *l)).sum()
    }
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Samples whose actual label is this class
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub samples: usize,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub classes: Vec<ClassMetrics>,
}

impl EvaluationReport {
    /// Build from a filled confusion matrix
    #[must_use]
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        let samples = confusion.total();
        let accuracy = ratio(confusion.correct(), samples);

        let classes = Label::all()
            .iter()
            .map(|&label| {
                let tp = confusion.get(label, label);
                let predicted: usize = Label::all().iter().map(|a| confusion.get(*a, label)).sum();
                let support: usize = Label::all().iter().map(|p| confusion.get(label, *p)).sum();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        Self {
            samples,
            accuracy,
            confusion,
            classes,
        }
    }

    /// Build from paired actual/predicted labels
    #[must_use]
    pub fn from_labels(pairs: impl IntoIterator<Item = (Label, Label)>) -> Self {
        let mut confusion = ConfusionMatrix::default();
        for (actual, predicted) in pairs {
            confusion.record(actual, predicted);
        }
        Self::from_confusion(confusion)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples:  {}", self.samples)?;
        writeln!(f, "Accuracy: {:.4}", self.accuracy)?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows actual, columns predicted):")?;
        writeln!(f, "{:>12} {:>10} {:>10}", "", "incorrect", "correct")?;
        for actual in Label::all() {
            writeln!(
                f,
                "{:>12} {:>10} {:>10}",
                actual.as_str(),
                self.confusion.get(actual, Label::Incorrect),
                self.confusion.get(actual, Label::Correct)
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for class in &self.classes {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                class.label.as_str(),
                class.precision,
                class.recall,
                class.f1,
                class.support
            )?;
        }
        Ok(())
    }
}

/// Run the classifier over labeled samples and score it
pub fn evaluate<C: FormClassifier + ?Sized>(
    classifier: &C,
    samples: &[LabeledSample],
) -> Result<EvaluationReport> {
    info!("Evaluating classifier on {} samples", samples.len());

    let features: Vec<FeatureVector> = samples.iter().map(|s| s.features.clone()).collect();
    let predictions = classifier.classify_batch(&features)?;

    let report = EvaluationReport::from_labels(
        samples
            .iter()
            .zip(&predictions)
            .map(|(sample, prediction)| (sample.label, prediction.label)),
    );

    info!("Accuracy: {:.4}", report.accuracy);
    Ok(report)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
