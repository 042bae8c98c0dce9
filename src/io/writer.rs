// src/io/writer.rs

use crate::error::{ReportError, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use tracing::debug;

fn open_append(path: &Path) -> Result<csv::Writer<fs::File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ReportError::io(path, e))?;
    Ok(csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file))
}

/// True when the file exists and already holds data.
pub fn has_content(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() > 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(ReportError::io(path, e)),
    }
}

/// Writes the two header rows (names, then units).
///
/// Returns `false` without touching the file if it already has content, so a
/// second call never duplicates the header.
pub fn write_header(path: &Path, names: &[&str], units: &[&str]) -> Result<bool> {
    if has_content(path)? {
        return Ok(false);
    }

    let mut wtr = open_append(path)?;
    wtr.write_record(names)
        .and_then(|_| wtr.write_record(units))
        .map_err(|e| ReportError::csv(path, e))?;
    wtr.flush().map_err(|e| ReportError::io(path, e))?;
    Ok(true)
}

/// Appends data rows below whatever the file already holds.
///
/// # Arguments
/// * `path` - The daily or annual report file.
/// * `rows` - Rows in header column order.
pub fn append_rows(path: &Path, rows: &[Vec<String>]) -> Result<usize> {
    let mut wtr = open_append(path)?;
    for row in rows {
        wtr.write_record(row).map_err(|e| ReportError::csv(path, e))?;
    }

    // Flush the buffer to ensure all data is written
    wtr.flush().map_err(|e| ReportError::io(path, e))?;

    debug!(rows = rows.len(), path = %path.display(), "appended report rows");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("soil_report.csv");

        assert!(write_header(&path, &["year", "j_day", "temp"], &["", "", "C"]).unwrap());
        append_rows(&path, &[row(&["2020", "1", "5.0"]), row(&["2020", "2", "6.5"])]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "year,j_day,temp\n,,C\n2020,1,5.0\n2020,2,6.5\n");
    }

    #[test]
    fn header_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed_annual.csv");

        assert!(write_header(&path, &["year", "DM"], &["", "kg"]).unwrap());
        assert!(!write_header(&path, &["year", "DM"], &["", "kg"]).unwrap());

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn later_years_append_without_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crop_annual.csv");

        write_header(&path, &["year", "yield"], &["", "kg/ha"]).unwrap();
        append_rows(&path, &[row(&["2020", "10.5"])]).unwrap();
        append_rows(&path, &[row(&["2021", "11.0"])]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "year,yield\n,kg/ha\n2020,10.5\n2021,11.0\n");
    }

    #[test]
    fn missing_directory_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("x.csv");
        let err = append_rows(&path, &[]).unwrap_err();
        assert!(err.to_string().contains("absent"));
    }
}
