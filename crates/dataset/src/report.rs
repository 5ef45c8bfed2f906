//! Dataset diagnostics
//!
//! Counts, class split, session diversity, per-column variance, outliers,
//! an overall score out of 5 and recommendations for further collection.

use crate::SourceStats;
use formcheck_common::{Label, LabeledSample, CANONICAL_FEATURE_WIDTH};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Thresholds applied while building a report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportOptions {
    /// Values outside `[-bound, bound]` count as outliers
    pub outlier_bound: f32,
    /// Columns with variance below this are low-variance
    pub low_variance_threshold: f64,
    /// Whether every expected class directory was present
    pub structure_complete: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            outlier_bound: 2.0,
            low_variance_threshold: 0.001,
            structure_complete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    pub label: Label,
    pub count: usize,
    pub percentage: f64,
    /// Distinct recordings the samples came from
    pub sessions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BalanceVerdict {
    Balanced,
    Moderate,
    Imbalanced,
}

impl BalanceVerdict {
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio > 0.8 {
            BalanceVerdict::Balanced
        } else if ratio > 0.6 {
            BalanceVerdict::Moderate
        } else {
            BalanceVerdict::Imbalanced
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Grade {
    Excellent,
    Good,
    Moderate,
    Poor,
}

impl Grade {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 4.5 {
            Grade::Excellent
        } else if score >= 3.5 {
            Grade::Good
        } else if score >= 2.5 {
            Grade::Moderate
        } else {
            Grade::Poor
        }
    }
}

/// Five sub-scores, each out of 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Assessment {
    pub size: f64,
    pub balance: f64,
    pub diversity: f64,
    pub format: f64,
    pub structure: f64,
    pub total: f64,
    pub grade: Grade,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetReport {
    pub total_samples: usize,
    pub width: usize,
    pub classes: Vec<ClassSummary>,
    /// `min / max` of the class counts, 0 when a class is empty
    pub balance_ratio: f64,
    pub balance: BalanceVerdict,
    /// Sample variance (n - 1 denominator) per feature column
    pub column_variance: Vec<f64>,
    pub low_variance_columns: usize,
    pub outliers: usize,
    pub non_finite: usize,
    pub sources: SourceStats,
    pub assessment: Assessment,
    pub recommendations: Vec<String>,
}

impl DatasetReport {
    #[must_use]
    pub fn build(samples: &[LabeledSample], sources: SourceStats, options: &ReportOptions) -> Self {
        let total_samples = samples.len();
        let width = samples
            .first()
            .map_or(CANONICAL_FEATURE_WIDTH, |s| s.features.len());

        let classes = class_summaries(samples);
        let counts: Vec<usize> = classes.iter().map(|c| c.count).collect();
        let max = counts.iter().copied().max().unwrap_or(0);
        let min = counts.iter().copied().min().unwrap_or(0);
        let balance_ratio = if max == 0 { 0.0 } else { min as f64 / max as f64 };

        let column_variance = column_variance(samples, width);
        let low_variance_columns = column_variance
            .iter()
            .filter(|v| **v < options.low_variance_threshold)
            .count();

        let mut outliers = 0;
        let mut non_finite = 0;
        for value in samples.iter().flat_map(|s| s.features.as_slice()) {
            if !value.is_finite() {
                non_finite += 1;
            } else if value.abs() > options.outlier_bound {
                outliers += 1;
            }
        }

        let mut report = Self {
            total_samples,
            width,
            classes,
            balance_ratio,
            balance: BalanceVerdict::from_ratio(balance_ratio),
            column_variance,
            low_variance_columns,
            outliers,
            non_finite,
            sources,
            assessment: Assessment {
                size: 0.0,
                balance: 0.0,
                diversity: 0.0,
                format: 0.0,
                structure: 0.0,
                total: 0.0,
                grade: Grade::Poor,
            },
            recommendations: Vec::new(),
        };
        report.assessment = report.assess(options);
        report.recommendations = report.recommend();
        report
    }

    #[must_use]
    pub fn class(&self, label: Label) -> Option<&ClassSummary> {
        self.classes.iter().find(|c| c.label == label)
    }

    /// Distinct sessions over all classes
    #[must_use]
    pub fn total_sessions(&self) -> usize {
        self.classes.iter().map(|c| c.sessions).sum()
    }

    fn assess(&self, options: &ReportOptions) -> Assessment {
        let size = match self.total_samples {
            n if n >= 10_000 => 1.0,
            n if n >= 5_000 => 0.8,
            n if n >= 1_000 => 0.5,
            _ => 0.0,
        };

        let pct = |label| self.class(label).map_or(0.0, |c| c.percentage);
        let balance = if self.total_samples == 0 {
            0.0
        } else if (pct(Label::Correct) - pct(Label::Incorrect)).abs() < 15.0 {
            1.0
        } else {
            0.5
        };

        let diversity = match self.total_sessions() {
            n if n >= 50 => 1.0,
            n if n >= 20 => 0.8,
            _ => 0.5,
        };

        let format = if self.width == CANONICAL_FEATURE_WIDTH
            && self.sources.truncated == 0
            && self.sources.schema_mismatch == 0
        {
            1.0
        } else {
            0.5
        };

        let structure = if options.structure_complete { 1.0 } else { 0.0 };

        let total = size + balance + diversity + format + structure;
        Assessment {
            size,
            balance,
            diversity,
            format,
            structure,
            total,
            grade: Grade::from_score(total),
        }
    }

    fn recommend(&self) -> Vec<String> {
        let mut recommendations = Vec::new();

        if self.total_samples < 1_000 {
            recommendations.push(format!(
                "Collect more data: {} samples, at least 1,000 needed for a basic model",
                self.total_samples
            ));
        } else if self.total_samples < 5_000 {
            recommendations.push(format!(
                "Collect {} more samples to reach the recommended 5,000",
                5_000 - self.total_samples
            ));
        }

        if self.total_samples > 0 && self.balance_ratio < 0.7 {
            if let Some(minority) = self.classes.iter().min_by_key(|c| c.count) {
                recommendations.push(format!(
                    "Collect more '{}' samples (currently {})",
                    minority.label, minority.count
                ));
            }
        }

        if self.low_variance_columns * 5 > self.width {
            recommendations.push(
                "Record more varied sessions: different people, camera angles and lighting"
                    .to_string(),
            );
        }

        if self.sources.truncated > 0 {
            recommendations.push(format!(
                "{} samples were truncated from 132 to 99 features; verify the landmark layouts match",
                self.sources.truncated
            ));
        }

        recommendations
    }
}

fn class_summaries(samples: &[LabeledSample]) -> Vec<ClassSummary> {
    let mut counts: BTreeMap<Label, usize> = BTreeMap::new();
    let mut sessions: BTreeMap<Label, BTreeSet<(&str, &str)>> = BTreeMap::new();
    for sample in samples {
        *counts.entry(sample.label).or_default() += 1;
        sessions
            .entry(sample.label)
            .or_default()
            .insert((&sample.source.class_dir, &sample.source.session));
    }

    let total = samples.len();
    // Correct first, matching how reports are read
    [Label::Correct, Label::Incorrect]
        .into_iter()
        .map(|label| {
            let count = counts.get(&label).copied().unwrap_or(0);
            ClassSummary {
                label,
                count,
                percentage: if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                },
                sessions: sessions.get(&label).map_or(0, BTreeSet::len),
            }
        })
        .collect()
}

/// Sample variance per column over finite values
fn column_variance(samples: &[LabeledSample], width: usize) -> Vec<f64> {
    (0..width)
        .map(|col| {
            let values: Vec<f64> = samples
                .iter()
                .filter_map(|s| s.features.as_slice().get(col))
                .filter(|v| v.is_finite())
                .map(|v| f64::from(*v))
                .collect();
            if values.len() < 2 {
                return 0.0;
            }
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        })
        .collect()
}

impl fmt::Display for DatasetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Dataset quality report")?;
        writeln!(f, "  Total samples: {}", self.total_samples)?;
        writeln!(f, "  Features:      {}", self.width)?;
        writeln!(f)?;
        writeln!(f, "Label distribution")?;
        for class in &self.classes {
            writeln!(
                f,
                "  {:<9} ({}): {:>6} ({:.1}%) from {} sessions",
                class.label.as_str(),
                class.label.as_u8(),
                class.count,
                class.percentage,
                class.sessions
            )?;
        }
        writeln!(
            f,
            "  Balance ratio {:.2}: {:?}",
            self.balance_ratio, self.balance
        )?;
        writeln!(f)?;
        writeln!(f, "Feature statistics")?;
        writeln!(f, "  Non-finite values:    {}", self.non_finite)?;
        writeln!(f, "  Outliers:             {}", self.outliers)?;
        writeln!(
            f,
            "  Low-variance columns: {}/{}",
            self.low_variance_columns, self.width
        )?;
        writeln!(f)?;
        writeln!(f, "Sources")?;
        writeln!(f, "  Accepted:         {}", self.sources.accepted)?;
        writeln!(f, "  Truncated:        {}", self.sources.truncated)?;
        writeln!(f, "  Schema mismatch:  {}", self.sources.schema_mismatch)?;
        writeln!(f, "  Unreadable:       {}", self.sources.unreadable)?;
        writeln!(f, "  Duplicates:       {}", self.sources.duplicates_removed)?;
        writeln!(f)?;
        let a = &self.assessment;
        writeln!(
            f,
            "Score {:.1}/5 ({:?}): size {:.1}, balance {:.1}, diversity {:.1}, format {:.1}, structure {:.1}",
            a.total, a.grade, a.size, a.balance, a.diversity, a.format, a.structure
        )?;
        if !self.recommendations.is_empty() {
            writeln!(f)?;
            writeln!(f, "Recommendations")?;
            for recommendation in &self.recommendations {
                writeln!(f, "  - {recommendation}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_common::{FeatureVector, SampleSource};

    fn samples(label: Label, count: usize, sessions: usize) -> Vec<LabeledSample> {
        (0..count)
            .map(|i| LabeledSample {
                features: FeatureVector::new(
                    (0..99).map(|c| (i * 7 + c) as f32 * 0.001).collect(),
                )
                .unwrap(),
                label,
                source: SampleSource {
                    class_dir: label.as_str().to_string(),
                    session: format!("session_{}", i % sessions),
                    path: format!("{i}.npy").into(),
                },
            })
            .collect()
    }

    #[test]
    fn test_class_split_and_sessions() {
        let mut all = samples(Label::Correct, 120, 12);
        all.extend(samples(Label::Incorrect, 80, 9));

        let report = DatasetReport::build(&all, SourceStats::default(), &ReportOptions::default());
        assert_eq!(report.total_samples, 200);

        let correct = report.class(Label::Correct).unwrap();
        assert_eq!(correct.count, 120);
        assert_eq!(correct.percentage, 60.0);
        assert_eq!(correct.sessions, 12);

        let incorrect = report.class(Label::Incorrect).unwrap();
        assert_eq!(incorrect.percentage, 40.0);
        assert_eq!(incorrect.sessions, 9);

        assert!((report.balance_ratio - 80.0 / 120.0).abs() < 1e-12);
        assert_eq!(report.balance, BalanceVerdict::Moderate);
        assert_eq!(report.total_sessions(), 21);
    }

    #[test]
    fn test_assessment_scoring() {
        let mut all = samples(Label::Correct, 120, 12);
        all.extend(samples(Label::Incorrect, 80, 9));
        let report = DatasetReport::build(&all, SourceStats::default(), &ReportOptions::default());

        let a = report.assessment;
        assert_eq!(a.size, 0.0);
        assert_eq!(a.balance, 0.5); // 60/40 split differs by 20 points
        assert_eq!(a.diversity, 0.8);
        assert_eq!(a.format, 1.0);
        assert_eq!(a.structure, 1.0);
        assert!((a.total - 3.3).abs() < 1e-9);
        assert_eq!(a.grade, Grade::Moderate);

        assert!(report.recommendations[0].contains("1,000"));
        assert!(report.recommendations.iter().any(|r| r.contains("'incorrect'")));
    }

    #[test]
    fn test_outliers_and_variance() {
        let constant = |label| LabeledSample {
            features: FeatureVector::new(vec![0.5; 99]).unwrap(),
            label,
            source: SampleSource {
                class_dir: "Valid".to_string(),
                session: "s".to_string(),
                path: "a.npy".into(),
            },
        };
        let mut all = vec![constant(Label::Correct), constant(Label::Correct)];
        let mut values = vec![0.5f32; 99];
        values[0] = 2.5;
        values[1] = -3.0;
        values[2] = 2.0;
        values[3] = f32::NAN;
        all.push(LabeledSample {
            features: FeatureVector::new(values).unwrap(),
            label: Label::Incorrect,
            source: all[0].source.clone(),
        });

        let report = DatasetReport::build(&all, SourceStats::default(), &ReportOptions::default());
        assert_eq!(report.outliers, 2);
        assert_eq!(report.non_finite, 1);
        assert_eq!(report.column_variance.len(), 99);
        assert!(report.column_variance[0] > 1.0);
        // 95 constant columns plus column 3, whose finite values are equal
        assert_eq!(report.low_variance_columns, 96);
        assert!(report
            .recommendations
            .iter()
            .any(|r| r.contains("varied sessions")));
    }

    #[test]
    fn test_empty_dataset_report() {
        let options = ReportOptions {
            structure_complete: false,
            ..ReportOptions::default()
        };
        let report = DatasetReport::build(&[], SourceStats::default(), &options);
        assert_eq!(report.total_samples, 0);
        assert_eq!(report.balance_ratio, 0.0);
        assert_eq!(report.balance, BalanceVerdict::Imbalanced);
        assert_eq!(report.assessment.structure, 0.0);
        assert_eq!(report.assessment.grade, Grade::Poor);
        assert!(report.to_string().contains("Total samples: 0"));
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(Grade::from_score(4.5), Grade::Excellent);
        assert_eq!(Grade::from_score(3.5), Grade::Good);
        assert_eq!(Grade::from_score(2.5), Grade::Moderate);
        assert_eq!(Grade::from_score(2.4), Grade::Poor);
    }
}
