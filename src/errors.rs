// Error types for boxbox

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum BoxBoxError {
    // Lookup errors
    #[snafu(display("Not found: {what}"))]
    NotFound { what: String },
    #[snafu(display("Data not loaded yet: {what}"))]
    NotLoaded { what: String },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidInput { field: String, reason: String },
    #[snafu(display("{reason}"))]
    ValidationFailure { reason: String },
    #[snafu(display("Input stream closed"))]
    InputClosed,
    #[snafu(display("Error reading user input"))]
    InputIOError { source: io::Error },
    #[snafu(display("Error writing to the terminal"))]
    OutputIOError { source: io::Error },

    // Errors talking to the data provider
    #[snafu(display("Request to data provider failed"))]
    UpstreamRequest { source: reqwest::Error },
    #[snafu(display("Unexpected data provider response: {reason}"))]
    UpstreamResponse { reason: String },

    // Response cache errors
    #[snafu(display("Error accessing response cache"))]
    CacheIOError { source: io::Error },
    #[snafu(display("Error parsing provider data"))]
    DeserializeError { source: serde_json::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // Chart errors
    #[snafu(display("Chart generation failed: {reason}"))]
    ChartGenerationError { reason: String },
    #[snafu(display("Error writing chart file"))]
    WriterError { source: io::Error },
}

impl From<reqwest::Error> for BoxBoxError {
    fn from(value: reqwest::Error) -> Self {
        BoxBoxError::UpstreamRequest { source: value }
    }
}

impl BoxBoxError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        BoxBoxError::NotFound { what: what.into() }
    }

    pub(crate) fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BoxBoxError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
