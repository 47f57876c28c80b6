pub mod client;
pub mod error;
pub mod types;

pub use client::{SheetSource, SheetsAuth, SheetsClient};
pub use error::SheetsError;
pub use types::{to_json, CellValue, Row};
