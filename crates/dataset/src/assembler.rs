//! Assembly runs: sources in, one deduplicated canonical dataset out

use crate::io::{read_dataset_csv, write_dataset_csv};
use crate::report::{DatasetReport, ReportOptions};
use crate::stored::collect_stored_samples;
use crate::video::{extract_video_samples, FrameSource, VideoSummary};
use crate::{dedup_samples, Dataset, SourceStats};
use formcheck_common::{DatasetConfig, LabeledSample, Result, CANONICAL_FEATURE_WIDTH};
use formcheck_pose::LandmarkDetector;
use std::path::{Path, PathBuf};
use tracing::info;

/// Result of one assembly run
#[derive(Debug, Clone)]
pub struct Assembly {
    pub dataset: Dataset,
    pub report: DatasetReport,
    /// Per-video outcomes, empty for stored-vector runs
    pub videos: Vec<VideoSummary>,
}

/// Builds datasets from the locations and label mappings in [`DatasetConfig`]
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    config: DatasetConfig,
}

impl DatasetAssembler {
    #[must_use]
    pub fn new(config: DatasetConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Assemble from `<stored_root>/<class_dir>/<session>/*.npy`
    pub fn assemble_stored(&self) -> Result<Assembly> {
        let batch = collect_stored_samples(&self.config.stored_root, &self.config.stored_labels)?;
        self.finish(batch.samples, batch.stats, true, Vec::new())
    }

    /// Assemble from `<video_root>/<class_dir>/*.<ext>`
    ///
    /// When `existing` names a dataset file, its rows come first and new rows
    /// that duplicate them are dropped, so re-running over the same videos
    /// leaves the dataset unchanged.
    pub fn assemble_videos(
        &self,
        source: &dyn FrameSource,
        detector: &mut dyn LandmarkDetector,
        existing: Option<&Path>,
    ) -> Result<Assembly> {
        let mut samples = Vec::new();
        let mut stats = SourceStats::default();

        if let Some(path) = existing.filter(|p| p.exists()) {
            info!("Merging with existing dataset {}", path.display());
            let (existing_samples, existing_stats) = read_dataset_csv(path)?;
            samples.extend(existing_samples);
            stats += existing_stats;
        }

        let batch = extract_video_samples(
            &self.config.video_root,
            &self.config.video_labels,
            &self.config.video_extensions,
            source,
            detector,
        )?;
        samples.extend(batch.samples);
        stats += batch.stats;

        self.finish(samples, stats, true, batch.videos)
    }

    /// Concatenate dataset files in order and drop duplicate rows
    pub fn merge(&self, inputs: &[PathBuf]) -> Result<Assembly> {
        let mut samples = Vec::new();
        let mut stats = SourceStats::default();
        for path in inputs {
            let (batch, batch_stats) = read_dataset_csv(path)?;
            samples.extend(batch);
            stats += batch_stats;
        }
        self.finish(samples, stats, true, Vec::new())
    }

    /// Diagnostics for an existing dataset file, without deduplication
    ///
    /// The report only reads `path`; `structure_complete` is taken as given
    /// for the structure sub-score.
    pub fn check(&self, path: &Path, structure_complete: bool) -> Result<DatasetReport> {
        let (samples, stats) = read_dataset_csv(path)?;
        Ok(DatasetReport::build(
            &samples,
            stats,
            &self.report_options(structure_complete),
        ))
    }

    /// Whether either configured source layout is present with every mapped
    /// class directory
    ///
    /// Relative roots resolve against the current working directory.
    #[must_use]
    pub fn source_layout_complete(&self) -> bool {
        self.config
            .stored_labels
            .validate(&self.config.stored_root)
            .is_ok()
            || self
                .config
                .video_labels
                .validate(&self.config.video_root)
                .is_ok()
    }

    /// Write the dataset to `output`, or to the configured dataset path
    pub fn write(&self, assembly: &Assembly, output: Option<&Path>) -> Result<PathBuf> {
        let path = output.map_or_else(|| self.config.output_csv.clone(), Path::to_path_buf);
        write_dataset_csv(&path, &assembly.dataset)?;
        Ok(path)
    }

    fn finish(
        &self,
        samples: Vec<LabeledSample>,
        mut stats: SourceStats,
        structure_complete: bool,
        videos: Vec<VideoSummary>,
    ) -> Result<Assembly> {
        let (samples, removed) = dedup_samples(samples);
        stats.duplicates_removed += removed;

        let dataset = Dataset::from_samples(CANONICAL_FEATURE_WIDTH, samples)?;
        let report = DatasetReport::build(
            dataset.samples(),
            stats,
            &self.report_options(structure_complete),
        );

        info!(
            "Assembled {} samples ({} duplicates removed)",
            dataset.len(),
            removed
        );
        Ok(Assembly {
            dataset,
            report,
            videos,
        })
    }

    fn report_options(&self, structure_complete: bool) -> ReportOptions {
        ReportOptions {
            outlier_bound: self.config.outlier_bound,
            low_variance_threshold: self.config.low_variance_threshold,
            structure_complete,
        }
    }
}
