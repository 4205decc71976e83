//! Export points and responsibilities to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use nalgebra::DMatrix;

use crate::error::AppError;
use crate::models::hard_labels;

/// Write a `d × N` point matrix as CSV, one point per row.
pub fn write_points_csv(path: &Path, points: &DMatrix<f64>) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create points CSV '{}': {e}", path.display())))?;
    write_points(&mut file, points)
}

/// Write an `N × K` responsibility matrix as CSV with a hard label per row.
pub fn write_responsibilities_csv(path: &Path, resp: &DMatrix<f64>) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create responsibilities CSV '{}': {e}", path.display()),
        )
    })?;
    write_responsibilities(&mut file, resp)
}

fn write_points<W: Write>(out: &mut W, points: &DMatrix<f64>) -> Result<(), AppError> {
    let header = (0..points.nrows())
        .map(|j| format!("x{j}"))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(out, "{header}").map_err(|e| AppError::new(2, format!("Failed to write points CSV header: {e}")))?;

    for col in points.column_iter() {
        let row = col.iter().map(|v| format!("{v}")).collect::<Vec<_>>().join(",");
        writeln!(out, "{row}").map_err(|e| AppError::new(2, format!("Failed to write points CSV row: {e}")))?;
    }
    Ok(())
}

fn write_responsibilities<W: Write>(out: &mut W, resp: &DMatrix<f64>) -> Result<(), AppError> {
    let mut header = vec!["point".to_string()];
    header.extend((0..resp.ncols()).map(|c| format!("comp_{c}")));
    header.push("label".to_string());
    writeln!(out, "{}", header.join(","))
        .map_err(|e| AppError::new(2, format!("Failed to write responsibilities CSV header: {e}")))?;

    let labels = hard_labels(resp);
    for (i, (row, label)) in resp.row_iter().zip(labels).enumerate() {
        let probs = row.iter().map(|v| format!("{v:.10}")).collect::<Vec<_>>().join(",");
        writeln!(out, "{i},{probs},{label}")
            .map_err(|e| AppError::new(2, format!("Failed to write responsibilities CSV row: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::load_points;

    #[test]
    fn points_written_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let points = DMatrix::from_column_slice(2, 3, &[0.5, -1.0, 2.0, 3.25, 10.0, 10.0]);

        write_points_csv(&path, &points).unwrap();
        let back = load_points(&path, true).unwrap();
        assert_eq!(back.points, points);
        assert_eq!(back.columns.unwrap(), vec!["x0", "x1"]);
    }

    #[test]
    fn tiny_offsets_survive_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tight.csv");
        let points = DMatrix::from_column_slice(
            2,
            3,
            &[1.0, -3.0, 1.0 + 1e-12, -3.0 - 2e-12, 0.1 + 0.2, 1e-300],
        );

        write_points_csv(&path, &points).unwrap();
        let back = load_points(&path, true).unwrap();
        assert_eq!(back.points, points);
    }

    #[test]
    fn responsibilities_carry_hard_labels() {
        let resp = DMatrix::from_row_slice(2, 2, &[0.9, 0.1, 0.25, 0.75]);
        let mut buf = Vec::new();
        write_responsibilities(&mut buf, &resp).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "point,comp_0,comp_1,label");
        assert!(lines[1].starts_with("0,0.9000000000,"));
        assert!(lines[1].ends_with(",0"));
        assert!(lines[2].ends_with(",1"));
    }
}
