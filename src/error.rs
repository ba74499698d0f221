use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::retcode::Retcode;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, WdmError>;

/// Blocking taxonomy for [`WdmError`].
///
/// Callers usually only care whether a failure is theirs to fix
/// (`Validation`), a missing or occupied data set (`Directory`), a file-level
/// problem (`Io`), a broken file (`Protocol`) or contention (`Lock`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Validation,
    Directory,
    Io,
    Protocol,
    Lock,
}

#[derive(Debug, Error)]
pub enum WdmError {
    #[error("Buffer too small at {file}:{line}: need at least {expected} bytes, got {actual}")]
    TooShortBuffer {
        actual:   usize,
        expected: usize,
        file:     &'static str,
        line:     u32,
    },

    #[error("Invalid record identifier: Expected {expected:?}, got {actual:?}")]
    BlockIDError {
        actual: String,
        expected: String,
    },

    #[error("Invalid file handling")]
    IOError(#[from] std::io::Error),

    #[error("Record linking error: {0}")]
    BlockLinkError(String),

    #[error("Record serialization error: {0}")]
    BlockSerializationError(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("String \"{value}\" is too long for {field}: must have a length equal or less than {max_len}")]
    AttributeTooLong {
        field: String,
        value: String,
        max_len: usize,
    },

    #[error("{0} is not a valid attribute name")]
    UnknownAttribute(String),

    #[error("Attribute {name} expects a {expected} value, got {value:?}")]
    AttributeTypeMismatch {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error(
        "DSN {dsn} has a tcode of {expected_tcode} and tsstep of {expected_tsstep}, \
         but the data has a tcode of {tcode} and tsstep of {tsstep}"
    )]
    FrequencyMismatch {
        dsn: i32,
        expected_tcode: i32,
        expected_tsstep: i32,
        tcode: i32,
        tsstep: i32,
    },

    #[error("The base year for DSN {dsn} is {base_year}; the first year of the series is {year}")]
    BaseYearViolation {
        dsn: i32,
        base_year: i32,
        year: i32,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Requested {what} date {requested} is outside the period of record {start} to {end}")]
    DateOutOfRange {
        what: &'static str,
        requested: String,
        start: String,
        end: String,
    },

    #[error("The DSN {0} does not exist in the dataset")]
    DsnNotFound(i32),

    #[error("DSN {0} exists")]
    DsnExists(i32),

    #[error("The DSN number must be >= 1 and <= 32000, got {0}")]
    DsnOutOfRange(i32),

    #[error("No data available for DSN {dsn}")]
    NoDataAvailable { dsn: i32 },

    #[error("Trying to open file {0:?} and it cannot be found")]
    FileNotFound(PathBuf),

    #[error("File {0:?} exists")]
    FileExists(PathBuf),

    #[error("Input and output path cannot be the same: {0:?}")]
    SamePath(PathBuf),

    #[error("WDM engine returned error code {code}. {context} WDM error: {message}")]
    Engine {
        code: i32,
        message: &'static str,
        context: String,
    },

    #[error("Timed out after {waited:?} waiting for lock on {path:?}")]
    LockTimeout {
        path: PathBuf,
        waited: Duration,
    },
}

impl WdmError {
    /// Builds an [`WdmError::Engine`] from a raw status code and caller context.
    pub fn engine(code: Retcode, context: impl Into<String>) -> Self {
        WdmError::Engine {
            code: code.code(),
            message: code.message(),
            context: context.into(),
        }
    }

    /// Classify this error into the blocking taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            WdmError::AttributeTooLong { .. }
            | WdmError::UnknownAttribute(_)
            | WdmError::AttributeTypeMismatch { .. }
            | WdmError::FrequencyMismatch { .. }
            | WdmError::BaseYearViolation { .. }
            | WdmError::InvalidDate(_)
            | WdmError::DateOutOfRange { .. }
            | WdmError::Config(_) => ErrorClass::Validation,
            WdmError::DsnNotFound(_)
            | WdmError::DsnExists(_)
            | WdmError::DsnOutOfRange(_)
            | WdmError::NoDataAvailable { .. } => ErrorClass::Directory,
            WdmError::IOError(_)
            | WdmError::FileNotFound(_)
            | WdmError::FileExists(_)
            | WdmError::SamePath(_) => ErrorClass::Io,
            WdmError::LockTimeout { .. } => ErrorClass::Lock,
            WdmError::TooShortBuffer { .. }
            | WdmError::BlockIDError { .. }
            | WdmError::BlockLinkError(_)
            | WdmError::BlockSerializationError(_)
            | WdmError::CorruptRecord(_)
            | WdmError::Engine { .. } => ErrorClass::Protocol,
        }
    }

    /// The legacy status code this condition corresponds to, when there is one.
    pub fn retcode(&self) -> Option<i32> {
        match self {
            WdmError::Engine { code, .. } => Some(*code),
            WdmError::DsnNotFound(_) => Some(-81),
            WdmError::DsnExists(_) => Some(-71),
            WdmError::DsnOutOfRange(_) => Some(-84),
            WdmError::FrequencyMismatch { .. } => Some(-15),
            WdmError::BaseYearViolation { .. } => Some(-14),
            WdmError::NoDataAvailable { .. } => Some(-40),
            WdmError::AttributeTooLong { .. } => Some(-101),
            WdmError::UnknownAttribute(_) => Some(-111),
            WdmError::AttributeTypeMismatch { .. } => Some(-45),
            WdmError::InvalidDate(_) => Some(-8),
            WdmError::BlockIDError { .. } => Some(-89),
            _ => None,
        }
    }
}
