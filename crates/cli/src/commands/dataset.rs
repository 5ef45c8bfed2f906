//! Dataset commands: build, merge, normalize and inspect training tables

use anyhow::{Context as _, Result};
use clap::Args;
use formcheck_common::{DetectorConfig, FormCheckConfig};
use formcheck_dataset::{Assembly, DatasetAssembler, FfmpegFrameSource};
use formcheck_features::normalize_csv;
use formcheck_pose::OnnxPoseDetector;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

#[derive(Args)]
pub struct AssembleCommand {
    /// Root with `<class>/<session>/*.npy` (overrides config)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Output CSV (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the report as JSON
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,
}

impl AssembleCommand {
    pub fn execute(self, mut config: FormCheckConfig) -> Result<()> {
        let start = Instant::now();
        if let Some(root) = self.root {
            config.dataset.stored_root = root;
        }
        let assembler = DatasetAssembler::new(config.dataset);

        let assembly = assembler.assemble_stored().with_context(|| {
            format!(
                "Failed to assemble dataset from {}",
                assembler.config().stored_root.display()
            )
        })?;
        finish(&assembler, &assembly, self.output.as_deref(), self.report_json.as_deref())?;

        println!("✓ Completed in {:.3}s", start.elapsed().as_secs_f64());
        Ok(())
    }
}

#[derive(Args)]
pub struct ExtractCommand {
    /// Root with `<class>/*.{mp4,mov,avi,mkv}` (overrides config)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Output CSV (overrides config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pose landmark model (overrides config)
    #[arg(long)]
    pose_model: Option<PathBuf>,

    /// Require a higher pose-presence score per frame
    #[arg(long)]
    strict: bool,

    /// Start from an empty table instead of merging into the output file
    #[arg(long)]
    fresh: bool,

    /// ffmpeg binary
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// ffprobe binary
    #[arg(long, default_value = "ffprobe")]
    ffprobe: PathBuf,

    /// Also write the report as JSON
    #[arg(long, value_name = "FILE")]
    report_json: Option<PathBuf>,
}

impl ExtractCommand {
    pub fn execute(self, mut config: FormCheckConfig) -> Result<()> {
        let start = Instant::now();
        if let Some(root) = self.root {
            config.dataset.video_root = root;
        }
        let mut detector_config = if self.strict {
            DetectorConfig {
                model_path: config.detector.model_path.clone(),
                input_size: config.detector.input_size,
                ..DetectorConfig::strict()
            }
        } else {
            config.detector.clone()
        };
        if let Some(model) = self.pose_model {
            detector_config.model_path = model;
        }

        let mut detector = OnnxPoseDetector::new(detector_config.clone()).with_context(|| {
            format!(
                "Failed to load pose model from {}",
                detector_config.model_path.display()
            )
        })?;
        let source = FfmpegFrameSource::with_tools(self.ffmpeg, self.ffprobe);

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| config.dataset.output_csv.clone());
        let assembler = DatasetAssembler::new(config.dataset);
        let existing = (!self.fresh).then_some(output.as_path());

        let assembly = assembler
            .assemble_videos(&source, &mut detector, existing)
            .with_context(|| {
                format!(
                    "Failed to extract dataset from {}",
                    assembler.config().video_root.display()
                )
            })?;

        println!("Videos:");
        for video in &assembly.videos {
            let name = video
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match &video.error {
                Some(error) => println!("  ✗ {}/{}: {}", video.class_dir, name, error),
                None => println!(
                    "  ✓ {}/{}: {}/{} frames with a detected body",
                    video.class_dir, name, video.extracted, video.frames
                ),
            }
        }

        finish(&assembler, &assembly, Some(&output), self.report_json.as_deref())?;
        println!("✓ Completed in {:.3}s", start.elapsed().as_secs_f64());
        Ok(())
    }
}

#[derive(Args)]
pub struct MergeCommand {
    /// Dataset files, earlier files win on duplicates
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Output CSV
    #[arg(short, long)]
    output: PathBuf,
}

impl MergeCommand {
    pub fn execute(self, config: FormCheckConfig) -> Result<()> {
        let assembler = DatasetAssembler::new(config.dataset);
        let assembly = assembler
            .merge(&self.inputs)
            .context("Failed to merge datasets")?;
        finish(&assembler, &assembly, Some(&self.output), None)
    }
}

#[derive(Args)]
pub struct NormalizeCommand {
    /// Dataset with 99 or 132 feature columns and a `label` column
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Destination for the 99-feature dataset
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
}

impl NormalizeCommand {
    pub fn execute(self) -> Result<()> {
        let summary = normalize_csv(&self.input, &self.output)
            .with_context(|| format!("Failed to normalize {}", self.input.display()))?;
        println!(
            "✓ {} rows: {} -> {} features, written to {}",
            summary.rows,
            summary.input_features,
            summary.output_features,
            self.output.display()
        );
        Ok(())
    }
}

#[derive(Args)]
pub struct CheckCommand {
    /// Dataset CSV (defaults to the configured dataset)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Score the source layout as complete without looking for the
    /// configured roots
    #[arg(long)]
    structure_complete: bool,
}

impl CheckCommand {
    pub fn execute(self, config: FormCheckConfig) -> Result<()> {
        let input = self
            .input
            .unwrap_or_else(|| config.dataset.output_csv.clone());
        let assembler = DatasetAssembler::new(config.dataset);
        let structure_complete = self.structure_complete || assembler.source_layout_complete();
        let report = assembler
            .check(&input, structure_complete)
            .with_context(|| format!("Failed to check {}", input.display()))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!("{report}");
        }
        Ok(())
    }
}

/// Write the table and print the report
fn finish(
    assembler: &DatasetAssembler,
    assembly: &Assembly,
    output: Option<&Path>,
    report_json: Option<&Path>,
) -> Result<()> {
    let path = assembler
        .write(assembly, output)
        .context("Failed to write dataset")?;
    info!("Wrote {} samples to {}", assembly.dataset.len(), path.display());

    if let Some(report_path) = report_json {
        let json = serde_json::to_string_pretty(&assembly.report)?;
        std::fs::write(report_path, json)
            .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    }

    println!("{}", assembly.report);
    println!("✓ Dataset written to {}", path.display());
    Ok(())
}
