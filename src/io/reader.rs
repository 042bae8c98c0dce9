// src/io/reader.rs

use crate::error::{ReportError, Result};
use std::path::{Path, PathBuf};

/// One data column of a report file.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub unit: String,
    pub values: Vec<f64>,
}

/// A report file loaded back from disk.
///
/// The leading `date_columns` columns (`year`, and `j_day` for daily files)
/// are kept as integers; everything after them is parsed as `f64`.
#[derive(Debug, Clone)]
pub struct ColumnTable {
    pub path: PathBuf,
    pub dates: Vec<Vec<i64>>,
    pub columns: Vec<Column>,
}

impl ColumnTable {
    pub fn read(report: &str, path: &Path, date_columns: usize) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| ReportError::csv(path, e))?;

        let mut records = rdr.records();
        let mut next_row = |what: &str| -> Result<Vec<String>> {
            match records.next() {
                Some(record) => Ok(record
                    .map_err(|e| ReportError::csv(path, e))?
                    .iter()
                    .map(str::to_string)
                    .collect()),
                None => Err(ReportError::Render {
                    report: report.to_string(),
                    path: path.to_path_buf(),
                    reason: format!("file has no {} row", what),
                }),
            }
        };

        let names = next_row("name")?;
        let units = next_row("unit")?;
        let width = names.len();
        let mismatch = |row: usize, found: usize| ReportError::ColumnMismatch {
            report: report.to_string(),
            path: path.to_path_buf(),
            row,
            expected: width,
            found,
        };
        if units.len() != width {
            return Err(mismatch(2, units.len()));
        }
        if width < date_columns {
            return Err(ReportError::Render {
                report: report.to_string(),
                path: path.to_path_buf(),
                reason: format!("expected {} date columns, file has {}", date_columns, width),
            });
        }

        let mut dates = vec![Vec::new(); date_columns];
        let mut columns: Vec<Column> = names
            .iter()
            .zip(&units)
            .skip(date_columns)
            .map(|(name, unit)| Column {
                name: name.clone(),
                unit: unit.clone(),
                values: Vec::new(),
            })
            .collect();

        for (offset, record) in records.enumerate() {
            let row = offset + 3;
            let record = record.map_err(|e| ReportError::csv(path, e))?;
            if record.len() != width {
                return Err(mismatch(row, record.len()));
            }
            for (index, cell) in record.iter().enumerate() {
                let unparsable = |kind: &str| ReportError::Render {
                    report: report.to_string(),
                    path: path.to_path_buf(),
                    reason: format!("row {}, column '{}': '{}' is not {}", row, names[index], cell, kind),
                };
                if index < date_columns {
                    let value = cell.trim().parse::<i64>().map_err(|_| unparsable("an integer"))?;
                    dates[index].push(value);
                } else {
                    let value = cell.trim().parse::<f64>().map_err(|_| unparsable("a number"))?;
                    columns[index - date_columns].values.push(value);
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            dates,
            columns,
        })
    }

    pub fn row_count(&self) -> usize {
        self.dates
            .first()
            .map(Vec::len)
            .or_else(|| self.columns.first().map(|c| c.values.len()))
            .unwrap_or(0)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn reads_names_units_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "soil_report.csv",
            "year,j_day,temp\n,,C\n2020,1,5.0\n2020,2,6.5\n",
        );

        let table = ColumnTable::read("soil_report", &path, 2).unwrap();
        assert_eq!(table.dates.len(), 2);
        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.dates[1], vec![1, 2]);
        let temp = table.column("temp").unwrap();
        assert_eq!(temp.unit, "C");
        assert_eq!(temp.values, vec![5.0, 6.5]);
    }

    #[test]
    fn ragged_row_names_file_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.csv", "year,j_day,temp\n,,C\n2020,1\n");

        let err = ColumnTable::read("soil_report", &path, 2).unwrap_err();
        match &err {
            ReportError::ColumnMismatch {
                report,
                row,
                expected,
                found,
                ..
            } => {
                assert_eq!(report, "soil_report");
                assert_eq!((*row, *expected, *found), (3, 3, 2));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("bad.csv"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ColumnTable::read("crop_report", &dir.path().join("nope.csv"), 2).unwrap_err();
        assert!(err.to_string().contains("nope.csv"));
    }

    #[test]
    fn text_cells_do_not_parse_as_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "crop.csv", "year,j_day,crop\n,,\n2020,1,corn\n");
        assert!(ColumnTable::read("crop_report", &path, 2).is_err());
    }
}
