//! Command-line interface built on clap.
//!
//! [`Cli`] carries the subcommands ([`Command`]: run, grade, validate) and the
//! global `--config` / `--verbose` flags.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::grading::Grade;

/// Grades yesterday's call-center SLA and drafts today's operations report.
#[derive(Debug, Parser)]
#[command(name = "callsla", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the config file (defaults to ./callsla.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline: ingest, grade, synthesize the report.
    Run(RunArgs),

    /// Grade rows from a local JSON file without calling any service.
    Grade {
        /// JSON file: an array of rows (header first) or an array of records.
        #[arg(long)]
        rows: PathBuf,

        /// Grade to compare the result against.
        #[arg(long)]
        goal: Option<Grade>,
    },

    /// Check a workflow record and print its normalized form.
    Validate {
        /// JSON file holding the record.
        file: PathBuf,
    },
}

#[derive(Debug, Default, clap::Args)]
pub struct RunArgs {
    /// JSON file with the inbound record; the flags below override its fields.
    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub spreadsheet_id: Option<String>,

    /// Sheet (tab) name, e.g. 202501.
    #[arg(long)]
    pub sheet: Option<String>,

    /// A1 range, e.g. `A1:D25` or `202501!A1:D25`.
    #[arg(long)]
    pub range: Option<String>,

    /// The client's request for today.
    #[arg(long)]
    pub request: Option<String>,

    #[arg(long)]
    pub weather: Option<String>,

    #[arg(long)]
    pub event: Option<String>,

    #[arg(long)]
    pub attendance_rate: Option<f64>,

    /// Post the report to the configured Slack channel.
    #[arg(long, default_value_t = false)]
    pub notify: bool,

    /// Slack user who asked for the broadcast; checked against the configured boss.
    #[arg(long, requires = "notify")]
    pub requested_by: Option<String>,

    /// Slack channel the request came from; checked against the source channel.
    #[arg(long, requires = "notify")]
    pub from_channel: Option<String>,

    /// Print the normalized state as JSON instead of the formatted report.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
