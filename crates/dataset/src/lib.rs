//! Offline dataset assembly
//!
//! Turns per-class directories of stored landmark vectors or videos into one
//! labeled table with the canonical 99-feature schema, and reports on its
//! quality.
//!
//! Layouts:
//! - stored vectors: `<root>/<class_dir>/<session>/*.npy`
//! - videos: `<root>/<class_dir>/*.{mp4,mov,avi,mkv}`
//!
//! The label of every sample comes from its class directory through an
//! explicit [`LabelMapping`](formcheck_common::LabelMapping).

pub mod assembler;
pub mod dedup;
pub mod io;
pub mod npy;
pub mod report;
pub mod stored;
pub mod video;

pub use assembler::{Assembly, DatasetAssembler};
pub use dedup::dedup_samples;
pub use io::{read_dataset_csv, write_dataset_csv};
pub use npy::read_npy_vector;
pub use report::{Assessment, BalanceVerdict, ClassSummary, DatasetReport, Grade, ReportOptions};
pub use stored::collect_stored_samples;
pub use video::{extract_video_samples, FfmpegFrameSource, FrameSource, VideoBatch, VideoSummary};

use formcheck_common::{
    FormCheckError, Label, LabeledSample, Result, CANONICAL_FEATURE_WIDTH,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::AddAssign;

/// Labeled samples sharing one feature width
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    width: usize,
    samples: Vec<LabeledSample>,
}

impl Dataset {
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            width,
            samples: Vec::new(),
        }
    }

    /// Empty dataset with the 99-feature schema
    #[must_use]
    pub fn canonical() -> Self {
        Self::new(CANONICAL_FEATURE_WIDTH)
    }

    pub fn from_samples(width: usize, samples: Vec<LabeledSample>) -> Result<Self> {
        let mut dataset = Self::new(width);
        dataset.extend(samples)?;
        Ok(dataset)
    }

    /// Add a sample, rejecting any width other than the dataset's
    pub fn push(&mut self, sample: LabeledSample) -> Result<()> {
        if sample.features.len() != self.width {
            return Err(FormCheckError::SchemaMismatch {
                expected: format!("{} features", self.width),
                found: sample.features.len(),
            });
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = LabeledSample>) -> Result<()> {
        for sample in samples {
            self.push(sample)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<LabeledSample> {
        self.samples
    }

    /// Sample count per label; both labels are always present
    #[must_use]
    pub fn class_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts: BTreeMap<Label, usize> = Label::all().iter().map(|l| (*l, 0)).collect();
        for sample in &self.samples {
            *counts.entry(sample.label).or_default() += 1;
        }
        counts
    }
}

/// What happened to the inputs of an assembly run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Samples accepted into the dataset before deduplication
    pub accepted: usize,
    /// Accepted samples that were cut from 132 to 99 features
    pub truncated: usize,
    /// Inputs skipped for an unsupported width or malformed values
    pub schema_mismatch: usize,
    /// Inputs that could not be read or decoded
    pub unreadable: usize,
    /// Exact duplicates dropped
    pub duplicates_removed: usize,
}

impl AddAssign for SourceStats {
    fn add_assign(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.truncated += other.truncated;
        self.schema_mismatch += other.schema_mismatch;
        self.unreadable += other.unreadable;
        self.duplicates_removed += other.duplicates_removed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_common::{FeatureVector, SampleSource};

    fn sample(width: usize, label: Label) -> LabeledSample {
        LabeledSample {
            features: FeatureVector::new(vec![0.5; width]).unwrap(),
            label,
            source: SampleSource {
                class_dir: "Valid".to_string(),
                session: "s1".to_string(),
                path: "a.npy".into(),
            },
        }
    }

    #[test]
    fn test_dataset_enforces_width() {
        let mut dataset = Dataset::canonical();
        dataset.push(sample(99, Label::Correct)).unwrap();
        let err = dataset.push(sample(132, Label::Correct)).unwrap_err();
        assert!(matches!(err, FormCheckError::SchemaMismatch { found: 132, .. }));
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_class_counts_include_empty_labels() {
        let dataset = Dataset::from_samples(99, vec![sample(99, Label::Correct)]).unwrap();
        let counts = dataset.class_counts();
        assert_eq!(counts[&Label::Correct], 1);
        assert_eq!(counts[&Label::Incorrect], 0);
    }

    #[test]
    fn test_source_stats_accumulate() {
        let mut total = SourceStats {
            accepted: 2,
            unreadable: 1,
            ..SourceStats::default()
        };
        total += SourceStats {
            accepted: 3,
            truncated: 3,
            ..SourceStats::default()
        };
        assert_eq!(total.accepted, 5);
        assert_eq!(total.truncated, 3);
        assert_eq!(total.unreadable, 1);
    }
}
