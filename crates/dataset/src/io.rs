//! Tabular dataset files: `x0,y0,z0,...,label`

use crate::{Dataset, SourceStats};
use formcheck_common::{
    FormCheckError, Label, LabeledSample, Result, SampleSource, CANONICAL_FEATURE_WIDTH,
    COORDS_PER_LANDMARK,
};
use formcheck_features::{classify_width, header_row, normalize, WidthClass};
use std::path::Path;
use tracing::{info, warn};

/// Write one row per sample with the dataset's header
pub fn write_dataset_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    writer
        .write_record(header_row(dataset.width() / COORDS_PER_LANDMARK))
        .map_err(csv_error)?;

    let mut row = Vec::with_capacity(dataset.width() + 1);
    for sample in dataset.samples() {
        row.clear();
        row.extend(sample.features.as_slice().iter().map(f32::to_string));
        row.push(sample.label.as_u8().to_string());
        writer.write_record(&row).map_err(csv_error)?;
    }
    writer.flush()?;

    info!("Wrote {} samples to {}", dataset.len(), path.display());
    Ok(())
}

/// Read a dataset file back into canonical samples
///
/// The file must have a `label` column and 99 or 132 feature columns; wider
/// rows are cut to 99. Rows are attributed to a session named after the file,
/// so diversity counts of re-read datasets are per file, not per recording.
pub fn read_dataset_csv(path: &Path) -> Result<(Vec<LabeledSample>, SourceStats)> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_error)?;
    let headers = reader.headers().map_err(csv_error)?.clone();

    let label_index = headers.iter().position(|h| h == "label").ok_or_else(|| {
        FormCheckError::InputFormat(format!("{} has no label column", path.display()))
    })?;
    let feature_indices: Vec<usize> = (0..headers.len()).filter(|i| *i != label_index).collect();

    let width = classify_width(feature_indices.len());
    if width == WidthClass::Unknown {
        return Err(FormCheckError::SchemaMismatch {
            expected: "99 or 132 feature columns".to_string(),
            found: feature_indices.len(),
        });
    }
    if width == WidthClass::Extended {
        warn!(
            "{}: truncating {} features to the first {CANONICAL_FEATURE_WIDTH}; assumes landmarks 0-32 match the live detector layout",
            path.display(),
            feature_indices.len()
        );
    }

    let session = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut samples = Vec::new();
    let mut stats = SourceStats::default();
    let mut values = Vec::with_capacity(feature_indices.len());

    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;

        values.clear();
        let parsed: std::result::Result<(), String> = feature_indices.iter().try_for_each(|i| {
            let field = record.get(*i).unwrap_or_default().trim();
            let value = field
                .parse::<f32>()
                .map_err(|_| format!("invalid value {field:?} in column {}", &headers[*i]))?;
            values.push(value);
            Ok(())
        });

        let label = record
            .get(label_index)
            .and_then(|field| field.trim().parse::<u8>().ok())
            .and_then(Label::from_u8);

        let label = match (parsed, label) {
            (Ok(()), Some(label)) => label,
            (parsed, _) => {
                warn!(
                    "Skipping row {} of {}: {}",
                    row + 1,
                    path.display(),
                    parsed.err().unwrap_or_else(|| "invalid label".to_string())
                );
                stats.schema_mismatch += 1;
                continue;
            }
        };

        let features = normalize(&values)?;
        if width == WidthClass::Extended {
            stats.truncated += 1;
        }
        stats.accepted += 1;
        samples.push(LabeledSample {
            features,
            label,
            source: SampleSource {
                class_dir: label.as_str().to_string(),
                session: session.clone(),
                path: path.to_path_buf(),
            },
        });
    }

    info!("Read {} samples from {}", samples.len(), path.display());
    Ok((samples, stats))
}

fn csv_error(err: csv::Error) -> FormCheckError {
    FormCheckError::Csv(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formcheck_common::FeatureVector;
    use tempfile::TempDir;

    fn sample(seed: f32, label: Label) -> LabeledSample {
        LabeledSample {
            features: FeatureVector::new((0..99).map(|i| seed + i as f32 * 0.013).collect())
                .unwrap(),
            label,
            source: SampleSource {
                class_dir: "Valid".to_string(),
                session: "s".to_string(),
                path: "a.npy".into(),
            },
        }
    }

    #[test]
    fn test_written_file_reads_back_bit_identical() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/dataset.csv");
        let dataset = Dataset::from_samples(
            99,
            vec![sample(0.1, Label::Correct), sample(-0.7, Label::Incorrect)],
        )
        .unwrap();

        write_dataset_csv(&path, &dataset).unwrap();
        let (samples, stats) = read_dataset_csv(&path).unwrap();

        assert_eq!(stats.accepted, 2);
        assert_eq!(samples[0].features, dataset.samples()[0].features);
        assert_eq!(samples[1].label, Label::Incorrect);
        assert_eq!(samples[1].source.session, "dataset");

        let header = std::fs::read_to_string(&path).unwrap();
        assert!(header.starts_with("x0,y0,z0,x1,"));
        assert!(header.lines().next().unwrap().ends_with("z32,label"));
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mixed.csv");
        let header = header_row(33).join(",");
        let good = format!("{},1", vec!["0.5"; 99].join(","));
        let bad_value = format!("{},0", [vec!["oops"], vec!["0.5"; 98]].concat().join(","));
        let bad_label = format!("{},7", vec!["0.5"; 99].join(","));
        std::fs::write(&path, format!("{header}\n{good}\n{bad_value}\n{bad_label}\n")).unwrap();

        let (samples, stats) = read_dataset_csv(&path).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(stats.schema_mismatch, 2);
    }

    #[test]
    fn test_unknown_width_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("narrow.csv");
        std::fs::write(&path, "x0,y0,z0,label\n0.1,0.2,0.3,1\n").unwrap();
        assert!(matches!(
            read_dataset_csv(&path),
            Err(FormCheckError::SchemaMismatch { found: 3, .. })
        ));
    }
}
