//! Video sources: `<root>/<class_dir>/*.{mp4,mov,avi,mkv}`
//!
//! Frames are decoded by the `ffmpeg` command-line tool as raw RGB24 on a
//! pipe; `ffprobe` supplies the frame size.

use crate::stored::{file_name, has_extension, sorted_entries};
use crate::SourceStats;
use formcheck_common::{FormCheckError, Label, LabelMapping, LabeledSample, Result, SampleSource};
use formcheck_features::build_canonical_features;
use formcheck_pose::LandmarkDetector;
use image::RgbImage;
use serde::Serialize;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, info, warn};

/// Frame iterator over one video
pub type Frames<'a> = Box<dyn Iterator<Item = Result<RgbImage>> + 'a>;

/// Something that decodes a video file into RGB frames
pub trait FrameSource {
    /// Open a video; an error means the video cannot be read at all
    fn frames<'a>(&'a self, path: &Path) -> Result<Frames<'a>>;
}

/// Decodes videos with the `ffmpeg` and `ffprobe` binaries
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegFrameSource {
    /// Use explicit tool paths instead of `PATH` lookup
    #[must_use]
    pub fn with_tools(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Displayed frame size, accounting for rotation metadata
    fn probe_dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height:stream_tags=rotate:stream_side_data=rotation",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .map_err(|e| FormCheckError::InputFormat(format!("Failed to execute ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FormCheckError::InputFormat(format!(
                "ffprobe failed for {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        parse_probe_output(&output.stdout).ok_or_else(|| {
            FormCheckError::InputFormat(format!("No video stream in {}", path.display()))
        })
    }
}

impl FrameSource for FfmpegFrameSource {
    fn frames<'a>(&'a self, path: &Path) -> Result<Frames<'a>> {
        let (width, height) = self.probe_dimensions(path)?;
        debug!("Decoding {} at {}x{}", path.display(), width, height);

        let mut child = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FormCheckError::InputFormat(format!("Failed to execute ffmpeg: {e}")))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            FormCheckError::InputFormat("ffmpeg stdout was not captured".to_string())
        })?;

        Ok(Box::new(FfmpegFrames {
            child,
            stdout,
            width,
            height,
            finished: false,
        }))
    }
}

/// Pull `(width, height)` out of `ffprobe -of json`, swapping for 90/270 rotation
fn parse_probe_output(stdout: &[u8]) -> Option<(u32, u32)> {
    let json: serde_json::Value = serde_json::from_slice(stdout).ok()?;
    let stream = json.get("streams")?.get(0)?;
    let width = u32::try_from(stream.get("width")?.as_u64()?).ok()?;
    let height = u32::try_from(stream.get("height")?.as_u64()?).ok()?;
    if width == 0 || height == 0 {
        return None;
    }

    let side_rotation = stream
        .get("side_data_list")
        .and_then(|list| list.as_array())
        .and_then(|list| list.iter().find_map(|d| d.get("rotation")?.as_i64()));
    let tag_rotation = stream
        .get("tags")
        .and_then(|tags| tags.get("rotate"))
        .and_then(|r| r.as_str())
        .and_then(|r| r.parse::<i64>().ok());

    let rotation = side_rotation.or(tag_rotation).unwrap_or(0).rem_euclid(180);
    if rotation == 90 {
        Some((height, width))
    } else {
        Some((width, height))
    }
}

struct FfmpegFrames {
    child: Child,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    finished: bool,
}

impl Iterator for FfmpegFrames {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buffer = vec![0u8; self.width as usize * self.height as usize * 3];
        match self.stdout.read_exact(&mut buffer) {
            Ok(()) => {
                let frame = RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
                    FormCheckError::InputFormat("Frame buffer size mismatch".to_string())
                });
                Some(frame)
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.finished = true;
                match self.child.wait() {
                    Ok(status) if !status.success() => Some(Err(FormCheckError::InputFormat(
                        format!("ffmpeg exited with {status}"),
                    ))),
                    _ => None,
                }
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e.into()))
            }
        }
    }
}

impl Drop for FfmpegFrames {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Per-video extraction outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoSummary {
    pub path: PathBuf,
    pub class_dir: String,
    pub label: Label,
    /// Frames decoded
    pub frames: usize,
    /// Frames that produced a sample
    pub extracted: usize,
    /// Why the video was skipped or cut short
    pub error: Option<String>,
}

/// Samples extracted from a video root
#[derive(Debug, Clone, Default)]
pub struct VideoBatch {
    pub samples: Vec<LabeledSample>,
    pub videos: Vec<VideoSummary>,
    pub stats: SourceStats,
}

/// Run the detector over every frame of every video under the mapped class directories
///
/// Frames without a detection are skipped. A video that cannot be opened is
/// logged, counted as unreadable and skipped. Detector failures abort the run.
pub fn extract_video_samples(
    root: &Path,
    labels: &LabelMapping,
    extensions: &[String],
    source: &dyn FrameSource,
    detector: &mut dyn LandmarkDetector,
) -> Result<VideoBatch> {
    labels.validate(root)?;
    info!("Extracting landmarks from videos under {}", root.display());

    let mut batch = VideoBatch::default();
    for (class_dir, label) in labels.iter() {
        let videos: Vec<PathBuf> = sorted_entries(&root.join(class_dir))?
            .into_iter()
            .filter(|path| has_extension(path, extensions))
            .collect();
        info!("{}: {} videos", class_dir, videos.len());

        for path in videos {
            let summary = extract_one(&path, class_dir, label, source, detector, &mut batch)?;
            info!(
                "{}: {} of {} frames extracted",
                summary.path.display(),
                summary.extracted,
                summary.frames
            );
            batch.videos.push(summary);
        }
    }

    info!(
        "Extracted {} samples from {} videos",
        batch.stats.accepted,
        batch.videos.len()
    );
    Ok(batch)
}

fn extract_one(
    path: &Path,
    class_dir: &str,
    label: Label,
    source: &dyn FrameSource,
    detector: &mut dyn LandmarkDetector,
    batch: &mut VideoBatch,
) -> Result<VideoSummary> {
    let mut summary = VideoSummary {
        path: path.to_path_buf(),
        class_dir: class_dir.to_string(),
        label,
        frames: 0,
        extracted: 0,
        error: None,
    };

    let frames = match source.frames(path) {
        Ok(frames) => frames,
        Err(e) => {
            warn!("Skipping video {}: {e}", path.display());
            batch.stats.unreadable += 1;
            summary.error = Some(e.to_string());
            return Ok(summary);
        }
    };

    let session = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name(path));

    for frame in frames {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Stopped decoding {} after {} frames: {e}", path.display(), summary.frames);
                summary.error = Some(e.to_string());
                break;
            }
        };
        summary.frames += 1;

        let Some(landmarks) = detector.detect(&frame)? else {
            continue;
        };
        match build_canonical_features(&landmarks) {
            Ok(features) => {
                batch.samples.push(LabeledSample {
                    features,
                    label,
                    source: SampleSource {
                        class_dir: class_dir.to_string(),
                        session: session.clone(),
                        path: path.to_path_buf(),
                    },
                });
                batch.stats.accepted += 1;
                summary.extracted += 1;
            }
            Err(e) => {
                debug!("Frame {} of {}: {e}", summary.frames, path.display());
                batch.stats.schema_mismatch += 1;
            }
        }
    }

    Ok(summary)
}
