//! Stored landmark vectors: `<root>/<class_dir>/<session>/*.npy`

use crate::npy::read_npy_vector;
use crate::SourceStats;
use formcheck_common::{
    FeatureVector, FormCheckError, Label, LabelMapping, LabeledSample, Result, SampleSource,
    CANONICAL_FEATURE_WIDTH, EXTENDED_FEATURE_WIDTH,
};
use formcheck_features::{classify_width, normalize, WidthClass};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Samples read from a stored-vector root
#[derive(Debug, Clone, Default)]
pub struct StoredBatch {
    pub samples: Vec<LabeledSample>,
    pub stats: SourceStats,
}

/// Read every session folder of every mapped class directory
///
/// The mapping is validated first. Files whose width is neither 99 nor 132,
/// or that cannot be parsed, are logged and skipped. Traversal is sorted so
/// repeated runs produce the same sample order.
pub fn collect_stored_samples(root: &Path, labels: &LabelMapping) -> Result<StoredBatch> {
    labels.validate(root)?;
    info!("Collecting stored samples from {}", root.display());

    let mut batch = StoredBatch::default();
    for (class_dir, label) in labels.iter() {
        let class_path = root.join(class_dir);
        let before = batch.samples.len();

        for session_path in sorted_entries(&class_path)? {
            if !session_path.is_dir() {
                debug!("Ignoring {} outside a session folder", session_path.display());
                continue;
            }
            let session = file_name(&session_path);

            for file in sorted_entries(&session_path)? {
                if !has_extension(&file, &["npy"]) {
                    continue;
                }
                let source = SampleSource {
                    class_dir: class_dir.to_string(),
                    session: session.clone(),
                    path: file,
                };
                read_sample(source, label, &mut batch);
            }
        }

        info!(
            "{}: {} samples (label {})",
            class_dir,
            batch.samples.len() - before,
            label.as_u8()
        );
    }

    if batch.stats.truncated > 0 {
        warn!(
            "Truncated {} stored vectors from {EXTENDED_FEATURE_WIDTH} to {CANONICAL_FEATURE_WIDTH} features; assumes landmarks 0-32 match the live detector layout",
            batch.stats.truncated
        );
    }
    info!(
        "Collected {} stored samples ({} truncated, {} schema mismatches, {} unreadable)",
        batch.stats.accepted,
        batch.stats.truncated,
        batch.stats.schema_mismatch,
        batch.stats.unreadable
    );
    Ok(batch)
}

fn read_sample(source: SampleSource, label: Label, batch: &mut StoredBatch) {
    let values = match read_npy_vector(&source.path) {
        Ok(values) => values,
        Err(e) => {
            warn!("Skipping unreadable {}: {e}", source.path.display());
            batch.stats.unreadable += 1;
            return;
        }
    };

    let width = classify_width(values.len());
    let features: Result<FeatureVector> = normalize(&values);
    match features {
        Ok(features) => {
            if width == WidthClass::Extended {
                batch.stats.truncated += 1;
            }
            batch.stats.accepted += 1;
            batch.samples.push(LabeledSample {
                features,
                label,
                source,
            });
        }
        Err(FormCheckError::SchemaMismatch { found, .. }) => {
            warn!(
                "Skipping {}: unexpected feature count {found}",
                source.path.display()
            );
            batch.stats.schema_mismatch += 1;
        }
        Err(e) => {
            warn!("Skipping {}: {e}", source.path.display());
            batch.stats.unreadable += 1;
        }
    }
}

/// Directory entries sorted by path
pub(crate) fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Case-insensitive extension match
pub(crate) fn has_extension(path: &Path, extensions: &[impl AsRef<str>]) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e.as_ref())))
            .unwrap_or(false)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
