use serde_json::Value;
use tracing::{error, info, info_span, Instrument};

use crate::error::PipelineError;
use crate::grading;
use crate::report::ReportSynthesizer;
use crate::sheets::SheetSource;
use crate::state_machine::{
    AuditRecord, Invocation, Route, Stage, StateMachine, StateUpdate, Status, WorkflowState,
};
use crate::validation;

/// Drives one request through VALIDATE_INPUT → INGEST → GRADE → SYNTHESIZE
/// (→ VALIDATE_OUTPUT), diverting to HANDLE_ERROR on the first failure.
///
/// The pipeline only borrows its collaborators, so independent invocations can
/// run concurrently against the same instance.
pub struct SlaPipeline<F, R> {
    source: F,
    synthesizer: R,
    machine: StateMachine,
}

/// Final state of an invocation together with its audit trail.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub state: WorkflowState,
    pub audit: AuditRecord,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.state.status == Status::Success
    }

    /// The outbound, loosely-typed record.
    pub fn normalized(&self) -> Result<Value, PipelineError> {
        validation::normalize(&self.state)
    }
}

impl<F: SheetSource, R: ReportSynthesizer> SlaPipeline<F, R> {
    pub fn new(source: F, synthesizer: R) -> Self {
        Self {
            source,
            synthesizer,
            machine: StateMachine::default(),
        }
    }

    /// Enables or disables the VALIDATE_OUTPUT stage (on by default).
    pub fn with_output_validation(mut self, enabled: bool) -> Self {
        self.machine.validate_output = enabled;
        self
    }

    pub async fn run(&self, raw: &Value) -> PipelineOutcome {
        self.run_with(raw, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_stage` as each stage is entered.
    pub async fn run_with(&self, raw: &Value, on_stage: impl FnMut(Stage)) -> PipelineOutcome {
        let invocation = Invocation::new();
        let span = info_span!("invocation", invocation_id = %invocation.id);
        self.drive(invocation, raw, on_stage).instrument(span).await
    }

    async fn drive(
        &self,
        mut invocation: Invocation,
        raw: &Value,
        mut on_stage: impl FnMut(Stage),
    ) -> PipelineOutcome {
        let mut state = WorkflowState::default();

        while invocation.stage != Stage::End {
            let stage = invocation.stage;
            on_stage(stage);
            info!(stage = %stage, "entering stage");

            let route = match stage {
                Stage::Start => Route::Continue,
                Stage::ValidateInput => match validation::validate(raw) {
                    Ok(validated) => {
                        state = validated.inputs_only();
                        commit(&mut state, stage, Ok(StateUpdate::success()))
                    }
                    Err(e) => commit(&mut state, stage, Err(e)),
                },
                Stage::Ingest => {
                    let result = self.ingest(&state).await;
                    commit(&mut state, stage, result)
                }
                Stage::Grade => {
                    let result = grade_stage(&state);
                    commit(&mut state, stage, result)
                }
                Stage::Synthesize => {
                    let result = self.synthesize(&state).await;
                    commit(&mut state, stage, result)
                }
                Stage::ValidateOutput => {
                    let result = validate_output(&state);
                    commit(&mut state, stage, result)
                }
                Stage::HandleError => {
                    handle_error(&mut state);
                    Route::Continue
                }
                Stage::End => break,
            };

            self.machine.next(&mut invocation, route);
        }

        on_stage(Stage::End);
        let audit = AuditRecord::new(&invocation, &state);
        info!(
            status = ?audit.status,
            duration_ms = audit.duration_ms,
            stages = audit.stage_transitions.len(),
            "invocation finished"
        );
        PipelineOutcome { state, audit }
    }

    async fn ingest(&self, state: &WorkflowState) -> Result<StateUpdate, PipelineError> {
        let spreadsheet_id = state
            .spreadsheet_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(PipelineError::MissingIdentifier)?;

        let rows = self
            .source
            .fetch(
                spreadsheet_id,
                state.sheet_name.as_deref(),
                state.range_name.as_deref(),
            )
            .await?;
        info!(spreadsheet_id, rows = rows.len(), "sheet data ingested");

        Ok(StateUpdate {
            sheets_data: Some(rows),
            ..Default::default()
        })
    }

    async fn synthesize(&self, state: &WorkflowState) -> Result<StateUpdate, PipelineError> {
        let report = self
            .synthesizer
            .synthesize(
                &state.yesterday_data,
                &state.condition,
                state.customer_request.as_deref(),
            )
            .await?;
        info!(urgency = %report.urgency, "report synthesized");

        Ok(StateUpdate {
            report: Some(report),
            ..Default::default()
        })
    }
}

fn grade_stage(state: &WorkflowState) -> Result<StateUpdate, PipelineError> {
    let rows = state.sheets_data.as_deref().unwrap_or_default();
    let data = grading::grade(rows)?;
    info!(
        income_call = data.income_call,
        answer_call = data.answer_call,
        grade = %data.sla_result,
        "sla graded"
    );

    Ok(StateUpdate {
        yesterday_data: Some(data),
        ..Default::default()
    })
}

/// The report must be present, and the state must survive the gate unchanged.
fn validate_output(state: &WorkflowState) -> Result<StateUpdate, PipelineError> {
    if state.report.is_none() {
        return Err(PipelineError::Schema(
            "report must be populated before handoff".to_string(),
        ));
    }

    let revalidated = validation::validate(&validation::normalize(state)?)?;
    if &revalidated != state {
        return Err(PipelineError::Schema(
            "state changed across the validation round trip".to_string(),
        ));
    }
    Ok(StateUpdate::success())
}

/// Folds a stage result into the state and reads the route off the status marker.
fn commit(
    state: &mut WorkflowState,
    stage: Stage,
    result: Result<StateUpdate, PipelineError>,
) -> Route {
    match result {
        Ok(update) => {
            state.apply(StateUpdate {
                status: Some(Status::Success),
                ..update
            });
            info!(stage = %stage, "stage completed");
        }
        Err(e) => {
            info!(stage = %stage, error = %e, "stage failed");
            state.apply(StateUpdate::failure(&e));
        }
    }
    Route::from(state.status)
}

fn handle_error(state: &mut WorkflowState) {
    state.status = Status::Error;
    match &state.error {
        Some(info) => error!(kind = %info.kind, message = %info.message, "invocation failed"),
        None => error!("invocation failed without an error record"),
    }
}
