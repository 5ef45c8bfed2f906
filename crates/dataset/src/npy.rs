//! `.npy` landmark dumps

use formcheck_common::{FormCheckError, Result};
use npyz::NpyFile;
use std::path::Path;
use tracing::debug;

/// Read one stored landmark vector
///
/// `f8` and `f4` arrays are accepted. Multi-dimensional arrays (for example
/// `(33, 3)` or `(1, 99)`) are flattened in storage order.
pub fn read_npy_vector(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path)?;
    let npy = NpyFile::new(&bytes[..]).map_err(|e| malformed(path, &e))?;
    let shape = npy.shape().to_vec();

    let values = match npy.into_vec::<f64>() {
        Ok(values) => values.into_iter().map(|v| v as f32).collect(),
        Err(_) => NpyFile::new(&bytes[..])
            .and_then(|npy| npy.into_vec::<f32>())
            .map_err(|e| malformed(path, &e))?,
    };

    debug!("Read {} with shape {:?}", path.display(), shape);
    Ok(values)
}

fn malformed(path: &Path, err: &std::io::Error) -> FormCheckError {
    FormCheckError::InputFormat(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};
    use ndarray_npy::write_npy;
    use tempfile::TempDir;

    #[test]
    fn test_reads_f64_vector() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.npy");
        let array = Array1::from_iter((0..99).map(|i| f64::from(i) / 10.0));
        write_npy(&path, &array).unwrap();

        let values = read_npy_vector(&path).unwrap();
        assert_eq!(values.len(), 99);
        assert_eq!(values[10], 1.0);
    }

    #[test]
    fn test_reads_and_flattens_f32_matrix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.npy");
        let array = Array2::from_shape_fn((44, 3), |(r, c)| (r * 3 + c) as f32);
        write_npy(&path, &array).unwrap();

        let values = read_npy_vector(&path).unwrap();
        assert_eq!(values.len(), 132);
        assert_eq!(values[4], 4.0);
        assert_eq!(values[131], 131.0);
    }

    #[test]
    fn test_garbage_is_input_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.npy");
        std::fs::write(&path, b"not an npy file").unwrap();

        assert!(matches!(
            read_npy_vector(&path),
            Err(FormCheckError::InputFormat(_))
        ));
    }
}
