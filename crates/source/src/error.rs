use std::{io, path::PathBuf};

use thiserror::Error;

use crate::schema::FieldType;

/// What was wrong with one field of one record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldProblem {
    #[error("required field is missing")]
    Missing,
    #[error("expected {expected}, found {found} {raw:?}")]
    WrongType {
        expected: FieldType,
        found: &'static str,
        raw: String,
    },
    #[error("nested arrays and objects are not supported")]
    NotScalar,
    #[error("record is not an object")]
    NotAnObject,
}

/// A record that cannot enter any batch.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("record {sequence_index}: field {field:?}: {problem}")]
pub struct MalformedRecordError {
    pub sequence_index: usize,
    pub field: String,
    pub problem: FieldProblem,
}

impl MalformedRecordError {
    pub fn new(sequence_index: usize, field: impl Into<String>, problem: FieldProblem) -> Self {
        Self {
            sequence_index,
            field: field.into(),
            problem,
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot tell the input format of {} (use .csv or .json, or pass a format)", .0.display())]
    UnknownFormat(PathBuf),

    #[error("unsupported input format {0:?}")]
    UnsupportedFormat(String),

    #[error("CSV decode failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON input must be an array of objects, found {0}")]
    NotAnArray(&'static str),

    #[error("invalid schema: {0}")]
    Schema(String),

    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),
}

impl SourceError {
    pub fn as_malformed(&self) -> Option<&MalformedRecordError> {
        match self {
            SourceError::Malformed(e) => Some(e),
            _ => None,
        }
    }
}
