//! Canonical feature schema and width repair
//!
//! Historical sample stores hold either 99 values (33 landmarks) or 132 values
//! (44 landmarks). Training and inference use 99. Wider vectors are repaired by
//! keeping the first 99 values in order, which assumes the first 33 landmarks
//! of the 44-landmark layout are the 33 live-detector landmarks in the same
//! positions. That assumption has not been checked against the detector that
//! produced the 132-wide dumps.

use formcheck_common::{
    FeatureVector, FormCheckError, Label, Result, CANONICAL_FEATURE_WIDTH, COORDS_PER_LANDMARK,
    EXTENDED_FEATURE_WIDTH, POSE_LANDMARKS,
};
use serde::Serialize;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// How a stored vector width relates to the canonical schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthClass {
    /// 99 values, used as-is
    Canonical,
    /// 132 values, truncated to the first 99
    Extended,
    /// Anything else, rejected
    Unknown,
}

#[must_use]
pub fn classify_width(width: usize) -> WidthClass {
    match width {
        CANONICAL_FEATURE_WIDTH => WidthClass::Canonical,
        EXTENDED_FEATURE_WIDTH => WidthClass::Extended,
        _ => WidthClass::Unknown,
    }
}

/// Bring a stored vector to the canonical 99-feature schema
pub fn normalize(values: &[f32]) -> Result<FeatureVector> {
    match classify_width(values.len()) {
        WidthClass::Canonical => FeatureVector::new(values.to_vec()),
        WidthClass::Extended => FeatureVector::new(values[..CANONICAL_FEATURE_WIDTH].to_vec()),
        WidthClass::Unknown => Err(FormCheckError::SchemaMismatch {
            expected: format!("{CANONICAL_FEATURE_WIDTH} or {EXTENDED_FEATURE_WIDTH} features"),
            found: values.len(),
        }),
    }
}

/// Column names `x{i}`, `y{i}`, `z{i}` for each landmark index
#[must_use]
pub fn feature_columns(landmarks: usize) -> Vec<String> {
    let mut columns = Vec::with_capacity(landmarks * COORDS_PER_LANDMARK);
    for i in 0..landmarks {
        columns.push(format!("x{i}"));
        columns.push(format!("y{i}"));
        columns.push(format!("z{i}"));
    }
    columns
}

/// Full tabular header: feature columns followed by `label`
#[must_use]
pub fn header_row(landmarks: usize) -> Vec<String> {
    let mut header = feature_columns(landmarks);
    header.push("label".to_string());
    header
}

/// Outcome of rewriting a tabular dataset into the canonical schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizeCsvSummary {
    pub rows: usize,
    pub input_features: usize,
    pub output_features: usize,
}

/// Rewrite a tabular dataset so it carries the first 99 feature columns and `label`
///
/// The input header must contain a `label` column and either 99 or 132
/// feature columns. Label values must be 0 or 1.
pub fn normalize_csv(input: &Path, output: &Path) -> Result<NormalizeCsvSummary> {
    info!("Normalizing dataset {} -> {}", input.display(), output.display());

    let mut reader = csv::Reader::from_path(input).map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();

    let label_index = headers
        .iter()
        .position(|h| h == "label")
        .ok_or_else(|| FormCheckError::InputFormat(format!("{} has no label column", input.display())))?;
    let feature_indices: Vec<usize> = (0..headers.len()).filter(|i| *i != label_index).collect();

    let input_features = feature_indices.len();
    match classify_width(input_features) {
        WidthClass::Canonical => debug!("Dataset already has {input_features} features"),
        WidthClass::Extended => warn!(
            "Truncating {input_features} features to the first {CANONICAL_FEATURE_WIDTH}; assumes landmarks 0-32 match the live detector layout"
        ),
        WidthClass::Unknown => {
            return Err(FormCheckError::SchemaMismatch {
                expected: format!(
                    "{CANONICAL_FEATURE_WIDTH} or {EXTENDED_FEATURE_WIDTH} feature columns"
                ),
                found: input_features,
            })
        }
    }

    // Rows go to a temporary file beside the target, so `output` may be `input`
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;
    let mut staged = NamedTempFile::new_in(parent)?;

    let mut rows = 0;
    {
        let mut writer = csv::Writer::from_writer(staged.as_file_mut());
        writer.write_record(header_row(POSE_LANDMARKS)).map_err(csv_error)?;

        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            let label_field = record.get(label_index).unwrap_or_default().trim();
            let label = label_field
                .parse::<u8>()
                .ok()
                .and_then(Label::from_u8)
                .ok_or_else(|| {
                    FormCheckError::InputFormat(format!(
                        "Row {}: invalid label {label_field:?}",
                        line + 1
                    ))
                })?;

            let mut row: Vec<&str> = feature_indices
                .iter()
                .take(CANONICAL_FEATURE_WIDTH)
                .map(|i| record.get(*i).unwrap_or_default())
                .collect();
            let label_text = label.as_u8().to_string();
            row.push(&label_text);
            writer.write_record(&row).map_err(csv_error)?;
            rows += 1;
        }
        writer.flush()?;
    }
    drop(reader);
    staged.persist(output).map_err(|e| e.error)?;

    info!("Normalized {rows} rows to {CANONICAL_FEATURE_WIDTH} features");

    Ok(NormalizeCsvSummary {
        rows,
        input_features,
        output_features: CANONICAL_FEATURE_WIDTH,
    })
}

fn csv_error(err: csv::Error) -> FormCheckError {
    FormCheckError::Csv(err.to_string())
}
