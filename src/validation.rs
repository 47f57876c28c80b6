//! Gate between the loosely-typed JSON record callers hand in (and get back)
//! and the strict [`WorkflowState`] the stages work on.

use serde_json::Value;

use crate::error::PipelineError;
use crate::state_machine::WorkflowState;

/// Parses an inbound record into a [`WorkflowState`].
///
/// Missing optional fields take their defaults; unknown keys are ignored.
/// Anything of the wrong shape (a non-numeric `attendance_rate`, an unknown
/// grade or urgency, a non-object record) is a `Schema` error.
pub fn validate(raw: &Value) -> Result<WorkflowState, PipelineError> {
    if !raw.is_object() {
        return Err(PipelineError::Schema(format!(
            "expected a JSON object, got {}",
            json_type(raw)
        )));
    }
    serde_json::from_value(raw.clone()).map_err(|e| PipelineError::Schema(e.to_string()))
}

/// Renders a [`WorkflowState`] back into a record carrying every schema field.
/// Absent optional values are written as `null`.
pub fn normalize(state: &WorkflowState) -> Result<Value, PipelineError> {
    serde_json::to_value(state).map_err(|e| PipelineError::Schema(e.to_string()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
