//! Error types for the Google Sheets client.

use thiserror::Error;

/// Failures while reading values from a spreadsheet.
#[derive(Debug, Error)]
pub enum SheetsError {
    /// The API answered with a non-success status (403 not shared, 404 unknown id, ...).
    #[error("Sheets API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The spreadsheet has no sheet to fall back to when no range was given.
    #[error("spreadsheet {0} has no sheets")]
    NoSheets(String),

    /// The configured base URL cannot carry path segments.
    #[error("invalid Sheets API base URL: {0}")]
    InvalidUrl(String),

    /// Transport failure (DNS, refused connection, timeout, bad body).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = SheetsError::Api {
            status: 403,
            message: "The caller does not have permission".into(),
        };
        assert_eq!(
            err.to_string(),
            "Sheets API error (status 403): The caller does not have permission"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SheetsError>();
    }
}
