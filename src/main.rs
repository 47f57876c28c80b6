mod anthropic;
mod cli;
mod config;
mod error;
mod grading;
mod notify;
mod orchestrator;
mod report;
mod sheets;
mod state_machine;
mod ui;
mod validation;

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::{Map, Number, Value, json};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use anthropic::AnthropicClient;
use cli::{Cli, Command, RunArgs};
use config::{CallSlaConfig, LogFormat, SlackConfig};
use notify::{BROADCAST_CONFIRMATION, CommandGuard, NotifyError, REJECTION_NOTICE, SlackNotifier};
use orchestrator::SlaPipeline;
use report::LlmReportSynthesizer;
use sheets::{Row, SheetsAuth, SheetsClient};
use state_machine::Report;
use ui::RunProgress;

/// RUST_LOG wins, then `--verbose`, then the configured level. Logs go to
/// stderr so `--json` output stays clean.
fn init_logging(config: &CallSlaConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = CallSlaConfig::load(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Command::Run(args) => run(&config, args).await,
        Command::Grade { rows, goal } => {
            let rows = read_rows(&rows)?;
            let data = grading::grade(&rows)?;
            let rate = grading::response_rate(data.income_call, data.answer_call)?;

            ui::print_grade(
                &data,
                goal.map(|g| (g, grading::is_goal_achieved(data.sla_result, g))),
            );
            println!("  Response rate: {rate:.2}%");
            Ok(())
        }
        Command::Validate { file } => {
            let raw = read_json(&file)?;
            let state = validation::validate(&raw)?;
            println!("{}", serde_json::to_string_pretty(&validation::normalize(&state)?)?);
            Ok(())
        }
    }
}

async fn run(config: &CallSlaConfig, args: RunArgs) -> Result<()> {
    if args.notify {
        authorize_broadcast(&config.slack, &args).await?;
    }
    let raw = build_request(config, &args)?;

    let sheets = SheetsClient::with_base_url(sheets_auth(config)?, config.sheets.base_url.clone())?
        .with_value_render_option(config.sheets.value_render_option.clone());

    if config.anthropic.api_key.is_empty() {
        bail!("no Anthropic API key: set [anthropic].api_key or ANTHROPIC_API_KEY");
    }
    let sender = AnthropicClient::with_base_url(
        config.anthropic.api_key.clone(),
        config.anthropic.base_url.clone(),
    )?;
    let synthesizer =
        LlmReportSynthesizer::new(sender, &config.anthropic.model, config.anthropic.max_tokens);

    let pipeline = SlaPipeline::new(sheets, synthesizer)
        .with_output_validation(config.pipeline.validate_output);

    let outcome = if args.json {
        let outcome = pipeline.run(&raw).await;
        println!("{}", serde_json::to_string_pretty(&outcome.normalized()?)?);
        outcome
    } else {
        let progress = RunProgress::start("daily SLA report");
        let outcome = pipeline
            .run_with(&raw, |stage| progress.update_stage(stage))
            .await;
        progress.complete(&outcome.state);
        progress.print_audit(&outcome.audit);
        outcome
    };

    if !outcome.is_success() {
        match &outcome.state.error {
            Some(error) => bail!("{}: {}", error.kind, error.message),
            None => bail!("pipeline stopped without a verdict"),
        }
    }

    if args.notify
        && let Some(report) = &outcome.state.report
    {
        broadcast(config, &args, report).await?;
    }
    Ok(())
}

/// Who may broadcast, decided before anything is fetched or generated.
/// Returns the rejection reason for a sender the guard does not accept.
fn broadcast_rejection(slack: &SlackConfig, args: &RunArgs) -> Option<String> {
    if slack.boss_user_id.is_empty() {
        return None;
    }
    let guard = CommandGuard {
        boss_user_id: slack.boss_user_id.clone(),
        source_channel_id: slack.source_channel_id.clone(),
    };
    let user = args.requested_by.as_deref().unwrap_or_default();
    let channel = args.from_channel.as_deref().unwrap_or_default();
    (!guard.authorize(user, channel))
        .then(|| format!("user `{user}` in channel `{channel}` may not broadcast reports"))
}

async fn authorize_broadcast(slack: &SlackConfig, args: &RunArgs) -> Result<()> {
    if let Some(reason) = broadcast_rejection(slack, args) {
        if !slack.bot_token.is_empty()
            && !slack.source_channel_id.is_empty()
            && let Err(e) = post_rejection(slack).await
        {
            warn!(error = %e, "could not post rejection notice");
        }
        bail!(reason);
    }

    if slack.target_channel_id.is_empty() {
        bail!("no target channel: set [slack].target_channel_id or TARGET_CHANNEL_ID");
    }
    Ok(())
}

async fn post_rejection(slack: &SlackConfig) -> Result<String, NotifyError> {
    SlackNotifier::with_base_url(slack.bot_token.clone(), slack.base_url.clone())?
        .post_message(&slack.source_channel_id, REJECTION_NOTICE)
        .await
}

async fn broadcast(config: &CallSlaConfig, args: &RunArgs, report: &Report) -> Result<()> {
    let slack = &config.slack;
    let notifier = SlackNotifier::with_base_url(slack.bot_token.clone(), slack.base_url.clone())?;
    notifier
        .post_report(&slack.target_channel_id, report)
        .await
        .context("posting report to Slack")?;

    if let Some(user) = args.requested_by.as_deref()
        && !slack.source_channel_id.is_empty()
        && let Err(e) = notifier
            .post_ephemeral(&slack.source_channel_id, user, BROADCAST_CONFIRMATION)
            .await
    {
        warn!(error = %e, "could not confirm broadcast to requester");
    }
    Ok(())
}

fn sheets_auth(config: &CallSlaConfig) -> Result<SheetsAuth> {
    if !config.sheets.access_token.is_empty() {
        Ok(SheetsAuth::Bearer(config.sheets.access_token.clone()))
    } else if !config.sheets.api_key.is_empty() {
        Ok(SheetsAuth::ApiKey(config.sheets.api_key.clone()))
    } else {
        bail!("no Google Sheets credentials: set GOOGLE_SHEETS_ACCESS_TOKEN or GOOGLE_SHEETS_API_KEY")
    }
}

/// The inbound record: the `--input` file (if any), then config defaults for
/// the sheet location, then the command-line flags on top.
fn build_request(config: &CallSlaConfig, args: &RunArgs) -> Result<Value> {
    let mut record = match &args.input {
        Some(path) => match read_json(path)? {
            Value::Object(map) => map,
            _ => bail!("{} must hold a JSON object", path.display()),
        },
        None => Map::new(),
    };

    set_default(&mut record, "spreadsheet_id", config.sheets.spreadsheet_id.as_deref());
    set_default(&mut record, "sheet_name", config.sheets.sheet_name.as_deref());

    set(&mut record, "spreadsheet_id", args.spreadsheet_id.as_deref());
    set(&mut record, "sheet_name", args.sheet.as_deref());
    set(&mut record, "range_name", args.range.as_deref());
    set(&mut record, "customer_request", args.request.as_deref());

    if args.weather.is_some() || args.event.is_some() || args.attendance_rate.is_some() {
        let condition = record.entry("condition").or_insert(Value::Null);
        if condition.is_null() {
            *condition = json!({"weather": "unknown", "event": "unknown", "attendance_rate": 0});
        }
        let Value::Object(condition) = condition else {
            bail!("`condition` in the input record must be an object");
        };
        set(condition, "weather", args.weather.as_deref());
        set(condition, "event", args.event.as_deref());
        if let Some(rate) = args.attendance_rate {
            let rate = Number::from_f64(rate).context("attendance rate must be finite")?;
            condition.insert("attendance_rate".to_string(), Value::Number(rate));
        }
    }

    Ok(Value::Object(record))
}

fn set(record: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        record.insert(key.to_string(), Value::String(value.to_string()));
    }
}

fn set_default(record: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    let missing = record.get(key).is_none_or(Value::is_null);
    if missing {
        set(record, key, value);
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

/// Raw sheet rows (array of arrays, header first) or ready-made records.
fn read_rows(path: &Path) -> Result<Vec<Row>> {
    match read_json(path)? {
        Value::Array(items) if items.iter().all(Value::is_array) => {
            let raw = serde_json::from_value(Value::Array(items))?;
            Ok(sheets::to_json(raw, false))
        }
        other => serde_json::from_value(other)
            .with_context(|| format!("{} holds neither raw rows nor records", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args() -> RunArgs {
        RunArgs::default()
    }

    fn temp_json(value: &Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{value}").unwrap();
        file
    }

    #[test]
    fn request_from_flags_only() {
        let args = RunArgs {
            spreadsheet_id: Some("1AbC".into()),
            request: Some("Answer 60%".into()),
            weather: Some("heavy snow".into()),
            attendance_rate: Some(0.6),
            ..args()
        };
        let raw = build_request(&CallSlaConfig::default(), &args).unwrap();

        assert_eq!(raw["spreadsheet_id"], "1AbC");
        assert_eq!(raw["customer_request"], "Answer 60%");
        assert_eq!(
            raw["condition"],
            json!({"weather": "heavy snow", "event": "unknown", "attendance_rate": 0.6})
        );
        assert!(validation::validate(&raw).is_ok());
    }

    #[test]
    fn flags_override_input_file_and_config_fills_gaps() {
        let file = temp_json(&json!({
            "spreadsheet_id": "from-file",
            "condition": {"weather": "sunny", "event": "sale", "attendance_rate": 1}
        }));
        let mut config = CallSlaConfig::default();
        config.sheets.spreadsheet_id = Some("from-config".into());
        config.sheets.sheet_name = Some("202501".into());

        let args = RunArgs {
            input: Some(file.path().to_path_buf()),
            event: Some("none".into()),
            ..args()
        };
        let raw = build_request(&config, &args).unwrap();

        assert_eq!(raw["spreadsheet_id"], "from-file");
        assert_eq!(raw["sheet_name"], "202501");
        assert_eq!(
            raw["condition"],
            json!({"weather": "sunny", "event": "none", "attendance_rate": 1})
        );
    }

    #[test]
    fn input_file_must_be_an_object() {
        let file = temp_json(&json!(["1AbC"]));
        let args = RunArgs {
            input: Some(file.path().to_path_buf()),
            ..args()
        };
        assert!(build_request(&CallSlaConfig::default(), &args).is_err());
    }

    #[test]
    fn read_rows_accepts_raw_rows_and_records() {
        let raw = temp_json(&json!([
            ["hour", "income_call", "answer_call"],
            ["9", "100", "95"],
            ["10", "100", "95"]
        ]));
        let rows = read_rows(raw.path()).unwrap();
        assert_eq!(grading::grade(&rows).unwrap().sla_result, grading::Grade::S);

        let records = temp_json(&json!([
            {"income_call": 230, "answer_call": 210},
            {"income_call": 230, "answer_call": 209}
        ]));
        let rows = read_rows(records.path()).unwrap();
        let data = grading::grade(&rows).unwrap();
        assert_eq!((data.income_call, data.answer_call), (460, 419));
        assert_eq!(data.sla_result, grading::Grade::A);
    }

    #[test]
    fn sheets_auth_prefers_access_token() {
        let mut config = CallSlaConfig::default();
        assert!(sheets_auth(&config).is_err());

        config.sheets.api_key = "key".into();
        assert_eq!(sheets_auth(&config).unwrap(), SheetsAuth::ApiKey("key".into()));

        config.sheets.access_token = "ya29".into();
        assert_eq!(sheets_auth(&config).unwrap(), SheetsAuth::Bearer("ya29".into()));
    }

    fn guarded_slack(base_url: String) -> CallSlaConfig {
        let mut config = CallSlaConfig::default();
        config.slack = SlackConfig {
            bot_token: "xoxb-1".into(),
            base_url,
            boss_user_id: "U-boss".into(),
            source_channel_id: "C-src".into(),
            target_channel_id: "C-target".into(),
        };
        config
    }

    fn notify_as(user: &str, channel: &str) -> RunArgs {
        RunArgs {
            spreadsheet_id: Some("1AbC".into()),
            notify: true,
            requested_by: Some(user.into()),
            from_channel: Some(channel.into()),
            ..args()
        }
    }

    #[test]
    fn broadcast_gate_follows_the_guard() {
        let config = guarded_slack(notify::API_URL.into());
        assert!(broadcast_rejection(&config.slack, &notify_as("U-boss", "C-src")).is_none());
        assert!(broadcast_rejection(&config.slack, &notify_as("U-other", "C-src")).is_some());
        assert!(broadcast_rejection(&config.slack, &notify_as("U-boss", "C-other")).is_some());

        let open = CallSlaConfig::default();
        assert!(broadcast_rejection(&open.slack, &notify_as("anyone", "anywhere")).is_none());
    }

    #[tokio::test]
    async fn unauthorized_notify_is_rejected_before_the_pipeline() {
        use wiremock::matchers::{body_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_json(json!({"channel": "C-src", "text": REJECTION_NOTICE})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "ts": "1.1"})))
            .expect(1)
            .mount(&server)
            .await;

        // No Sheets or Anthropic credentials: reaching the pipeline would fail differently.
        let config = guarded_slack(server.uri());
        let err = run(&config, notify_as("U-other", "C-src")).await.unwrap_err();
        assert!(err.to_string().contains("may not broadcast"), "{err}");
    }

    #[tokio::test]
    async fn notify_without_target_channel_fails_early() {
        let mut config = guarded_slack(notify::API_URL.into());
        config.slack.target_channel_id.clear();
        let err = run(&config, notify_as("U-boss", "C-src")).await.unwrap_err();
        assert!(err.to_string().contains("no target channel"), "{err}");
    }
}
