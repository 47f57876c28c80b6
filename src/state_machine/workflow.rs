use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Number;

use crate::error::{ErrorKind, PipelineError};
use crate::grading::YesterdayData;
use crate::sheets::Row;

/// Caller-supplied context for today, passed through to report synthesis untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub weather: String,
    pub event: String,
    /// Kept as a JSON number so integer and float inputs survive a round trip unchanged.
    pub attendance_rate: Number,
}

impl Default for Condition {
    fn default() -> Self {
        Self {
            weather: "unknown".to_string(),
            event: "unknown".to_string(),
            attendance_rate: Number::from(0),
        }
    }
}

/// How urgently the floor needs to act on the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Urgency::Low => write!(f, "low"),
            Urgency::Medium => write!(f, "medium"),
            Urgency::High => write!(f, "high"),
            Urgency::Critical => write!(f, "critical"),
        }
    }
}

/// The operational report handed to the notification transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Report {
    pub summary: String,
    pub urgency: Urgency,
    pub strategy: String,
}

/// Per-invocation routing marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Success,
    Error,
}

/// User-facing description of the failure that ended an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PipelineError> for ErrorInfo {
    fn from(err: &PipelineError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The single record threaded through every stage of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub sheet_name: Option<String>,
    #[serde(default)]
    pub range_name: Option<String>,
    #[serde(default)]
    pub sheets_data: Option<Vec<Row>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub yesterday_data: YesterdayData,
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition: Condition,
    #[serde(default)]
    pub customer_request: Option<String>,
    #[serde(default)]
    pub report: Option<Report>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: Status,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Partial update returned by a stage. `None` leaves the field as it was.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub sheets_data: Option<Vec<Row>>,
    pub yesterday_data: Option<YesterdayData>,
    pub report: Option<Report>,
    pub status: Option<Status>,
    pub error: Option<ErrorInfo>,
}

impl StateUpdate {
    pub fn success() -> Self {
        Self {
            status: Some(Status::Success),
            ..Default::default()
        }
    }

    pub fn failure(err: &PipelineError) -> Self {
        Self {
            status: Some(Status::Error),
            error: Some(ErrorInfo::from(err)),
            ..Default::default()
        }
    }
}

impl WorkflowState {
    /// Keeps the caller-supplied inputs and resets everything the stages own.
    pub fn inputs_only(self) -> Self {
        Self {
            spreadsheet_id: self.spreadsheet_id,
            sheet_name: self.sheet_name,
            range_name: self.range_name,
            condition: self.condition,
            customer_request: self.customer_request,
            ..Default::default()
        }
    }

    /// Merges a stage's update into the running state, last writer wins per field.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(rows) = update.sheets_data {
            self.sheets_data = Some(rows);
        }
        if let Some(data) = update.yesterday_data {
            self.yesterday_data = data;
        }
        if let Some(report) = update.report {
            self.report = Some(report);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
    }
}
