use std::fmt;

use serde::{Deserialize, Serialize};

use super::invocation::Invocation;
use super::workflow::Status;

/// Stages of the SLA pipeline.
///
/// START → VALIDATE_INPUT → INGEST → {GRADE | HANDLE_ERROR | END} → SYNTHESIZE
/// → [VALIDATE_OUTPUT] → END
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Start,
    ValidateInput,
    Ingest,
    Grade,
    Synthesize,
    ValidateOutput,
    HandleError,
    End,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Start => write!(f, "START"),
            Stage::ValidateInput => write!(f, "VALIDATE_INPUT"),
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Grade => write!(f, "GRADE"),
            Stage::Synthesize => write!(f, "SYNTHESIZE"),
            Stage::ValidateOutput => write!(f, "VALIDATE_OUTPUT"),
            Stage::HandleError => write!(f, "HANDLE_ERROR"),
            Stage::End => write!(f, "END"),
        }
    }
}

/// Routing decision read off the status marker after a stage ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The stage succeeded; follow the normal edge.
    Continue,
    /// The stage failed; go to HANDLE_ERROR.
    Error,
    /// No verdict was recorded; stop without further work.
    Halt,
}

impl From<Status> for Route {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => Route::Continue,
            Status::Error => Route::Error,
            Status::Pending => Route::Halt,
        }
    }
}

/// The result of evaluating a stage transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move on to the next stage.
    Next(Stage),
    /// The invocation is already at END.
    Complete,
}

/// Drives an [`Invocation`] through the stage graph.
#[derive(Debug, Clone, Copy)]
pub struct StateMachine {
    /// Whether SYNTHESIZE is followed by VALIDATE_OUTPUT before END.
    pub validate_output: bool,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self {
            validate_output: true,
        }
    }
}

impl StateMachine {
    /// The stage that follows `stage` given `route`. There is no edge back to an
    /// earlier stage, so every invocation terminates.
    pub fn successor(&self, stage: Stage, route: Route) -> Stage {
        match (stage, route) {
            (Stage::Start, _) => Stage::ValidateInput,
            (Stage::HandleError, _) | (Stage::End, _) => Stage::End,
            (_, Route::Error) => Stage::HandleError,
            (_, Route::Halt) => Stage::End,
            (Stage::ValidateInput, Route::Continue) => Stage::Ingest,
            (Stage::Ingest, Route::Continue) => Stage::Grade,
            (Stage::Grade, Route::Continue) => Stage::Synthesize,
            (Stage::Synthesize, Route::Continue) if self.validate_output => Stage::ValidateOutput,
            (Stage::Synthesize, Route::Continue) => Stage::End,
            (Stage::ValidateOutput, Route::Continue) => Stage::End,
        }
    }

    /// Advance the invocation one step and record the stage it left.
    pub fn next(&self, invocation: &mut Invocation, route: Route) -> Transition {
        if invocation.stage == Stage::End {
            return Transition::Complete;
        }

        let next = self.successor(invocation.stage, route);
        invocation.history.push(invocation.stage);
        invocation.stage = next;
        Transition::Next(next)
    }
}
