//! CSV sample matrix loader.

use crate::core::SampleMatrix;
use crate::error::{PipelineError, Result};
use ::csv::{ReaderBuilder, Trim};
use ndarray::Array2;
use std::path::Path;
use tracing::info;

/// Load a headered CSV of numeric cells into a sample matrix.
///
/// Column 0 is expected to hold the millisecond timestamp. Empty cells read
/// as NaN; any other non-numeric cell fails with its row and column.
pub fn load_sample_matrix_csv(path: impl AsRef<Path>) -> Result<SampleMatrix> {
    let path = path.as_ref();
    let csv_error = |message: String| PipelineError::Csv {
        path: path.display().to_string(),
        message,
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| match e.into_kind() {
            ::csv::ErrorKind::Io(io) => PipelineError::Io(io),
            other => csv_error(format!("{other:?}")),
        })?;

    let columns = reader.headers().map_err(|e| csv_error(e.to_string()))?.len();
    let mut values = Vec::new();
    let mut rows = 0;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| csv_error(format!("row {}: {e}", row_idx + 1)))?;
        for (col_idx, cell) in record.iter().enumerate() {
            let value = if cell.is_empty() {
                f64::NAN
            } else {
                cell.parse::<f64>().map_err(|_| {
                    csv_error(format!(
                        "row {}, column {}: '{cell}' is not a number",
                        row_idx + 1,
                        col_idx + 1
                    ))
                })?
            };
            values.push(value);
        }
        rows += 1;
    }

    let matrix = Array2::from_shape_vec((rows, columns), values)
        .map_err(|e| csv_error(e.to_string()))?;
    info!(path = %path.display(), rows, columns, "Loaded sample matrix");
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_numeric_csv() {
        let file = csv_file("timestamp,ax,ay\n1000,0.5,-1\n2000, 1.5 ,2e-3\n");
        let matrix = load_sample_matrix_csv(file.path()).unwrap();

        assert_eq!(matrix.dim(), (2, 3));
        assert_eq!(matrix[[1, 0]], 2000.0);
        assert_eq!(matrix[[1, 1]], 1.5);
        assert_eq!(matrix[[1, 2]], 0.002);
    }

    #[test]
    fn test_empty_cell_is_nan() {
        let file = csv_file("t,a\n1,\n");
        let matrix = load_sample_matrix_csv(file.path()).unwrap();
        assert!(matrix[[0, 1]].is_nan());
    }

    #[test]
    fn test_header_only_gives_empty_matrix() {
        let file = csv_file("t,a,b\n");
        let matrix = load_sample_matrix_csv(file.path()).unwrap();
        assert_eq!(matrix.dim(), (0, 3));
    }

    #[test]
    fn test_bad_cell_reports_position() {
        let file = csv_file("t,a\n1,2\n3,oops\n");
        let err = load_sample_matrix_csv(file.path()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("row 2"), "{msg}");
        assert!(msg.contains("column 2"), "{msg}");
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let file = csv_file("t,a\n1,2\n3\n");
        assert!(matches!(load_sample_matrix_csv(file.path()), Err(PipelineError::Csv { .. })));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_sample_matrix_csv("/nonexistent/recording.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
