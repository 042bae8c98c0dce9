// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while declaring, sampling, writing or charting reports.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Expression error in '{expression}': {reason}")]
    Parse { expression: String, reason: String },

    #[error("Report '{report}', binding '{binding}' ({expression}): {reason}")]
    Evaluation {
        report: String,
        binding: String,
        expression: String,
        reason: String,
    },

    #[error("Pen {pen_id} does not exist (simulation has {pen_count} pens)")]
    PenOutOfRange { pen_id: usize, pen_count: usize },

    #[error("Report '{report}': {operation} is not allowed while {phase}")]
    Lifecycle {
        report: String,
        operation: &'static str,
        phase: &'static str,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error at {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Report '{report}' has malformed data in {}: row {row} has {found} cells, header has {expected}", path.display())]
    ColumnMismatch {
        report: String,
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Report '{report}' could not render {}: {reason}", path.display())]
    Render {
        report: String,
        path: PathBuf,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, ReportError>;

impl ReportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ReportError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        ReportError::Csv {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Config(err.to_string())
    }
}
