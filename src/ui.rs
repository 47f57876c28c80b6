//! Terminal output: a stage spinner while the pipeline runs, then the report
//! and audit record in color.
//!
//! Uses `indicatif` for the spinner and `console` for styling.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::grading::{Grade, YesterdayData};
use crate::state_machine::{AuditRecord, Stage, Status, Urgency, WorkflowState};

/// Spinner that follows one invocation through its stages.
pub struct RunProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    bold: Style,
}

impl RunProgress {
    pub fn start(label: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("START: {label}"));
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            bold: Style::new().bold(),
        }
    }

    pub fn update_stage(&self, stage: Stage) {
        self.pb.set_message(format!("{stage}"));
    }

    /// Stops the spinner and prints the verdict and, on success, the report.
    pub fn complete(&self, state: &WorkflowState) {
        self.pb.finish_and_clear();
        match (&state.status, &state.error) {
            (Status::Success, _) => {
                println!("  {} Pipeline completed", self.green.apply_to("✓"));
            }
            (_, Some(error)) => {
                println!(
                    "  {} {}: {}",
                    self.red.apply_to("✗"),
                    error.kind,
                    error.message
                );
            }
            _ => {
                println!("  {} Pipeline stopped without a verdict", self.yellow.apply_to("…"));
            }
        }

        if state.yesterday_data.income_call > 0 {
            print_grade(&state.yesterday_data, None);
        }

        if let Some(report) = &state.report {
            let urgency = match report.urgency {
                Urgency::Critical | Urgency::High => &self.red,
                Urgency::Medium => &self.yellow,
                Urgency::Low => &self.green,
            };
            println!();
            println!("{}", self.bold.apply_to(&report.summary));
            println!("Urgency: {}", urgency.apply_to(report.urgency));
            println!();
            println!("{}", report.strategy);
        }
    }

    pub fn print_audit(&self, record: &AuditRecord) {
        let status_style = match record.status {
            Status::Success => &self.green,
            Status::Error => &self.red,
            Status::Pending => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Audit Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}

/// One-line grade summary, with a goal verdict when a goal is given.
pub fn print_grade(data: &YesterdayData, goal: Option<(Grade, bool)>) {
    let (green, yellow, red) = (
        Style::new().green().bold(),
        Style::new().yellow(),
        Style::new().red().bold(),
    );
    let grade_style = if data.sla_result >= Grade::B {
        &green
    } else if data.sla_result >= Grade::D {
        &yellow
    } else {
        &red
    };
    print!(
        "  Yesterday: {} answered of {} → {}",
        data.answer_call,
        data.income_call,
        grade_style.apply_to(data.sla_result)
    );
    match goal {
        Some((goal, true)) => println!(" ({} goal {goal})", green.apply_to("meets")),
        Some((goal, false)) => println!(" ({} goal {goal})", red.apply_to("misses")),
        None => println!(),
    }
}
