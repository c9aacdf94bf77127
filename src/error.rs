use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WfdbError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A field name that is not part of any line-kind schema was queried
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A field mapping handed to the writer carries a key outside the schema
    #[error("Invalid input key: {0}")]
    UnknownKey(String),

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Missing required field '{missing_dependency}' for field '{field}'")]
    Dependency {
        field: String,
        missing_dependency: String,
    },

    #[error("Parse error on line {line_number}: {reason}")]
    Parse { line_number: usize, reason: String },

    #[error("Invalid value for field '{field}': {raw_value:?}")]
    Type { field: String, raw_value: String },

    #[error("Field '{field}' has {actual} values, expected {expected}")]
    SizeMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Segment '{segment}' is inconsistent with the master record: {reason}")]
    SegmentInconsistency { segment: String, reason: String },

    #[error("Malformed record line: {line:?}")]
    MalformedRecordLine { line: String },

    #[error("Header declares {expected} signal/segment lines but only {found} are present")]
    SignalCountMismatch { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, WfdbError>;

impl WfdbError {
    pub(crate) fn missing(field: &str) -> Self {
        WfdbError::MissingRequired {
            field: field.to_string(),
        }
    }

    pub(crate) fn type_error(field: &str, raw_value: &str) -> Self {
        WfdbError::Type {
            field: field.to_string(),
            raw_value: raw_value.to_string(),
        }
    }
}
