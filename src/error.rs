use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::anthropic::AnthropicError;
use crate::sheets::SheetsError;

/// Every way a single pipeline invocation can fail.
///
/// None of these are retried; each one routes the invocation into the
/// `HandleError` stage and ends it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid workflow state: {0}")]
    Schema(String),

    #[error("spreadsheet_id is required before ingestion")]
    MissingIdentifier,

    #[error("failed to fetch sheet data: {0}")]
    Fetch(String),

    #[error("column `{column}` in row {row} is not a non-negative integer: {value}")]
    DataType {
        column: String,
        row: usize,
        value: String,
    },

    #[error("income_call total is zero, response rate is undefined")]
    ZeroDenominator,

    #[error("report synthesis failed: {0}")]
    Synthesis(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Schema(_) => ErrorKind::Schema,
            PipelineError::MissingIdentifier => ErrorKind::MissingIdentifier,
            PipelineError::Fetch(_) => ErrorKind::Fetch,
            PipelineError::DataType { .. } => ErrorKind::DataType,
            PipelineError::ZeroDenominator => ErrorKind::ZeroDenominator,
            PipelineError::Synthesis(_) => ErrorKind::Synthesis,
        }
    }
}

impl From<SheetsError> for PipelineError {
    fn from(err: SheetsError) -> Self {
        PipelineError::Fetch(err.to_string())
    }
}

impl From<AnthropicError> for PipelineError {
    fn from(err: AnthropicError) -> Self {
        PipelineError::Synthesis(err.to_string())
    }
}

/// Stable, serializable name for a [`PipelineError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "SchemaError")]
    Schema,
    #[serde(rename = "MissingIdentifierError")]
    MissingIdentifier,
    #[serde(rename = "FetchError")]
    Fetch,
    #[serde(rename = "DataTypeError")]
    DataType,
    #[serde(rename = "ZeroDenominatorError")]
    ZeroDenominator,
    #[serde(rename = "SynthesisError")]
    Synthesis,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Schema => write!(f, "SchemaError"),
            ErrorKind::MissingIdentifier => write!(f, "MissingIdentifierError"),
            ErrorKind::Fetch => write!(f, "FetchError"),
            ErrorKind::DataType => write!(f, "DataTypeError"),
            ErrorKind::ZeroDenominator => write!(f, "ZeroDenominatorError"),
            ErrorKind::Synthesis => write!(f, "SynthesisError"),
        }
    }
}
