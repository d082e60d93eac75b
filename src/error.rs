use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `SirLaborError` and maps other errors to
/// convert to a `SirLaborError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SirLaborError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    /// A malformed or out-of-range reference in an input table or schedule.
    InputError(String),
    /// A parameter value outside its documented domain.
    ConfigError(String),
    ReportError(String),
}

impl From<io::Error> for SirLaborError {
    fn from(error: io::Error) -> Self {
        SirLaborError::IoError(error)
    }
}

impl From<serde_json::Error> for SirLaborError {
    fn from(error: serde_json::Error) -> Self {
        SirLaborError::JsonError(error)
    }
}

impl From<csv::Error> for SirLaborError {
    fn from(error: csv::Error) -> Self {
        SirLaborError::CsvError(error)
    }
}

impl std::error::Error for SirLaborError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SirLaborError::IoError(error) => Some(error),
            SirLaborError::JsonError(error) => Some(error),
            SirLaborError::CsvError(error) => Some(error),
            _ => None,
        }
    }
}

impl Display for SirLaborError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SirLaborError::IoError(error) => write!(f, "I/O error: {error}"),
            SirLaborError::JsonError(error) => write!(f, "JSON error: {error}"),
            SirLaborError::CsvError(error) => write!(f, "CSV error: {error}"),
            SirLaborError::InputError(message) => write!(f, "input error: {message}"),
            SirLaborError::ConfigError(message) => write!(f, "configuration error: {message}"),
            SirLaborError::ReportError(message) => write!(f, "report error: {message}"),
        }
    }
}
