//! Report synthesis: turns yesterday's SLA figures and today's conditions into
//! a short operational report by asking an LLM for a fixed-shape JSON answer.

use tracing::debug;

use crate::anthropic::{Message, MessageSender, MessagesRequest};
use crate::error::PipelineError;
use crate::grading::YesterdayData;
use crate::state_machine::{Condition, Report};

/// Produces the `{summary, urgency, strategy}` report for one invocation.
pub trait ReportSynthesizer {
    async fn synthesize(
        &self,
        yesterday: &YesterdayData,
        condition: &Condition,
        customer_request: Option<&str>,
    ) -> Result<Report, PipelineError>;
}

const PERSONA: &str = "You are the operations lead of a customer-service call center. \
Write today's briefing for the floor managers in the firm, measured voice of the center director.";

const EXAMPLE: &str = r#"{
  "summary": "Extra staffing and minimal AUX time for the snowstorm",
  "urgency": "critical",
  "strategy": "1. Heavy snow is expected today. At the client's request, answer every delivery-delay inquiry with \"arrival time cannot be confirmed\" to keep talk time short.\n2. Yesterday's snow pushed handle time up sharply between 10:00 and 14:00. Keep agents at their desks in that window and shift meal breaks to minimise AUX.\n3. Attendance is low today. Check whether some agents on leave can take an extra shift.\n4. Yesterday's SLA was weak. The client will grant an A grade if we answer 60% of calls today, so give consistent answers to delivery-delay and simple status calls."
}"#;

/// Builds the text brief sent to the model. Same inputs, same brief.
pub fn build_brief(
    yesterday: &YesterdayData,
    condition: &Condition,
    customer_request: Option<&str>,
) -> String {
    let request = customer_request
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("none");

    format!(
        "<rules>\n\
         1. Meeting the client's request comes first.\n\
         2. Base the report on yesterday's SLA result, adjusted for today's situation.\n\
         3. Plan the strategy around today's weather, events and attendance rate.\n\
         4. Keep the whole report under 500 characters.\n\
         </rules>\n\
         <data>\n\
         <yesterday_result>\n\
         Inbound calls: {income}\n\
         Answered calls: {answer}\n\
         SLA grade: {grade}\n\
         </yesterday_result>\n\
         <customer_request>\n\
         {request}\n\
         </customer_request>\n\
         <condition>\n\
         Weather: {weather}\n\
         Event: {event}\n\
         Attendance rate: {attendance}\n\
         </condition>\n\
         </data>\n\
         <example>\n\
         {EXAMPLE}\n\
         </example>\n\
         Respond with ONLY a JSON object, no other text, with exactly these fields:\n\
         {{\"summary\": \"<one line>\", \"urgency\": \"<low|medium|high|critical>\", \"strategy\": \"<numbered actions>\"}}",
        income = yesterday.income_call,
        answer = yesterday.answer_call,
        grade = yesterday.sla_result,
        weather = condition.weather,
        event = condition.event,
        attendance = condition.attendance_rate,
    )
}

/// Parses the model's reply into a [`Report`], tolerating a Markdown code fence.
pub fn parse_report(text: &str) -> Result<Report, PipelineError> {
    let body = strip_code_fence(text.trim());
    serde_json::from_str::<Report>(body)
        .map_err(|e| PipelineError::Synthesis(format!("malformed report from model: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`) on the opening fence line. On a one-line
    // fence only a leading `json` tag is dropped.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.strip_prefix("json").unwrap_or(rest),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// [`ReportSynthesizer`] backed by the Anthropic Messages API.
pub struct LlmReportSynthesizer<S> {
    sender: S,
    model: String,
    max_tokens: u32,
}

impl<S: MessageSender> LlmReportSynthesizer<S> {
    pub fn new(sender: S, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            sender,
            model: model.into(),
            max_tokens,
        }
    }
}

impl<S: MessageSender> ReportSynthesizer for LlmReportSynthesizer<S> {
    async fn synthesize(
        &self,
        yesterday: &YesterdayData,
        condition: &Condition,
        customer_request: Option<&str>,
    ) -> Result<Report, PipelineError> {
        let req = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(PERSONA.to_string()),
            messages: vec![Message {
                role: "user".into(),
                content: build_brief(yesterday, condition, customer_request),
            }],
        };

        let response = self.sender.send_message(&req).await?;
        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "report synthesized"
        );
        parse_report(&response.text())
    }
}
