//! CSV ingest for point sets.
//!
//! One point per row, one coordinate per column. Every cell must parse as a
//! finite number.
//!
//! Design goals:
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Consistent dimension**: the first valid row fixes `d`; later rows with a
//!   different column count are rejected
//! - **Deterministic behavior** (no hidden reordering)

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use nalgebra::DMatrix;
use tracing::{debug, warn};

use crate::domain::DatasetStats;
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: the point matrix plus what happened on the way.
#[derive(Debug, Clone)]
pub struct IngestedPoints {
    /// `d × N`, one point per column, in file order.
    pub points: DMatrix<f64>,
    /// Column names when the file had a header.
    pub columns: Option<Vec<String>>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load points from a CSV file.
pub fn load_points(path: &Path, has_header: bool) -> Result<IngestedPoints, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    let ingested = read_points(file, has_header)?;
    debug!(
        path = %path.display(),
        rows = ingested.rows_read,
        used = ingested.stats.n_points,
        dim = ingested.stats.dim,
        "loaded points"
    );
    Ok(ingested)
}

/// Parse points from any CSV reader.
pub fn read_points<R: Read>(reader: R, has_header: bool) -> Result<IngestedPoints, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let columns = if has_header {
        let headers = reader
            .headers()
            .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?;
        Some(headers.iter().map(normalize_header_name).collect::<Vec<_>>())
    } else {
        None
    };

    let mut dim = columns.as_ref().map(|c| c.len());
    let mut values: Vec<f64> = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line: idx + if has_header { 2 } else { 1 },
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        // Prefer the reader's own position so comment lines don't skew numbering.
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);

        match parse_row(&record, dim) {
            Ok(row) => {
                dim.get_or_insert(row.len());
                values.extend(row);
            }
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    for e in &row_errors {
        warn!(line = e.line, "skipped row: {}", e.message);
    }

    let dim = dim.unwrap_or(0);
    if dim == 0 || values.is_empty() {
        return Err(AppError::new(3, "No valid points found in CSV."));
    }
    let n = values.len() / dim;
    let points = DMatrix::from_column_slice(dim, n, &values);
    let stats = compute_stats(&points);

    Ok(IngestedPoints {
        points,
        columns,
        stats,
        row_errors,
        rows_read,
    })
}

fn parse_row(record: &StringRecord, dim: Option<usize>) -> Result<Vec<f64>, String> {
    if let Some(d) = dim {
        if record.len() != d {
            return Err(format!("expected {d} columns, found {}", record.len()));
        }
    }
    if record.is_empty() {
        return Err("empty row".to_string());
    }
    record
        .iter()
        .enumerate()
        .map(|(col, cell)| match cell.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            Ok(_) => Err(format!("non-finite value in column {}", col + 1)),
            Err(_) => Err(format!("invalid number '{cell}' in column {}", col + 1)),
        })
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

/// Per-axis bounds of a point set.
pub fn compute_stats(points: &DMatrix<f64>) -> DatasetStats {
    let (dim, n) = points.shape();
    let min = (0..dim).map(|i| points.row(i).min()).collect();
    let max = (0..dim).map(|i| points.row(i).max()).collect();
    DatasetStats {
        n_points: n,
        dim,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_points_column_wise_with_header() {
        let csv = "x,y,z\n0,0,0\n1,2,3\n10,10,10\n";
        let data = read_points(csv.as_bytes(), true).unwrap();
        assert_eq!(data.points.shape(), (3, 3));
        assert_eq!(data.points.column(1).as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(data.columns.unwrap(), vec!["x", "y", "z"]);
        assert_eq!(data.stats.max, vec![10.0, 10.0, 10.0]);
        assert!(data.row_errors.is_empty());
    }

    #[test]
    fn skips_bad_rows_and_reports_them() {
        let csv = "1.0,2.0\nfoo,3.0\n4.0\n5.0,6.0\nNaN,1.0\n";
        let data = read_points(csv.as_bytes(), false).unwrap();
        assert_eq!(data.points.shape(), (2, 2));
        assert_eq!(data.rows_read, 5);
        assert_eq!(data.row_errors.len(), 3);
        assert_eq!(data.row_errors[0].line, 2);
        assert!(data.row_errors[1].message.contains("expected 2 columns"));
    }

    #[test]
    fn empty_file_is_an_error() {
        let err = read_points("x,y\n".as_bytes(), true).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn strips_bom_from_first_header() {
        let csv = "\u{feff}X,Y\n1,2\n";
        let data = read_points(csv.as_bytes(), true).unwrap();
        assert_eq!(data.columns.unwrap()[0], "x");
    }
}
