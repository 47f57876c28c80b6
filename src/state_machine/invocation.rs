use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::Stage;
use super::workflow::{ErrorInfo, Status, WorkflowState};

/// Bookkeeping for one pipeline run: where it is and where it has been.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: String,
    pub stage: Stage,
    pub history: Vec<Stage>,
    pub started_at: DateTime<Utc>,
}

impl Invocation {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            stage: Stage::Start,
            history: Vec::new(),
            started_at: Utc::now(),
        }
    }
}

impl Default for Invocation {
    fn default() -> Self {
        Self::new()
    }
}

/// Structured audit record produced when an invocation reaches END.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub invocation_id: String,
    pub status: Status,
    pub stage_transitions: Vec<Stage>,
    pub error: Option<ErrorInfo>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl AuditRecord {
    pub fn new(invocation: &Invocation, state: &WorkflowState) -> Self {
        let now = Utc::now();
        let mut transitions = invocation.history.clone();
        transitions.push(invocation.stage);

        Self {
            invocation_id: invocation.id.clone(),
            status: state.status,
            stage_transitions: transitions,
            error: state.error.clone(),
            started_at: invocation.started_at,
            completed_at: now,
            duration_ms: (now - invocation.started_at).num_milliseconds(),
        }
    }
}
