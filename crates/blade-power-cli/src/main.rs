//! blade-power CLI - query and change the power state of a blade.
//!
//! This is the entry point for the `bladepower` binary.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use blade_power_control::{
    ClientConfig, HttpHardwareClient, PowerError, PowerExecutor, PowerOutcome, PowerReport,
    PowerState, PowerTask, PowerTaskConfig, ServerHardware,
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code when the change was not confirmed in time under `--strict`.
const EXIT_TIMED_OUT: u8 = 2;

/// Query and set blade power state through a management appliance.
#[derive(Parser, Debug)]
#[command(name = "bladepower")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Appliance base URL.
    #[arg(long, env = "BLADE_POWER_URL", default_value = "https://localhost")]
    url: String,

    /// Session token sent in the `Auth` header.
    #[arg(long, env = "BLADE_POWER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// REST API version sent in the `X-API-Version` header.
    #[arg(long, env = "BLADE_POWER_API_VERSION", default_value_t = 800)]
    api_version: u32,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,

    /// Enable debug logging.
    #[arg(long, default_value = "false")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the observed power state of a blade.
    Status {
        /// Server hardware URI, e.g. `/rest/server-hardware/30373237`.
        uri: String,
    },

    /// Set the power state of a blade and wait for the change.
    Set {
        /// Server hardware URI.
        uri: String,

        /// Desired state: `on` or `off`.
        #[arg(value_parser = parse_target)]
        state: PowerState,

        /// Maximum number of task status checks.
        #[arg(long, default_value_t = PowerTaskConfig::default().max_iterations)]
        timeout: u32,

        /// Seconds between task status checks.
        #[arg(long, default_value_t = PowerTaskConfig::default().wait_time_seconds)]
        wait: u64,

        /// Treat an unconfirmed change as an error.
        #[arg(long)]
        strict: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn parse_target(s: &str) -> Result<PowerState, String> {
    match s.parse::<PowerState>() {
        Ok(PowerState::Unknown) => Err("target state must be `on` or `off`".to_string()),
        Ok(state) => Ok(state),
        Err(e) => Err(e.to_string()),
    }
}

impl Args {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new(&self.url);
        config.api_version = self.api_version;
        config.request_timeout_seconds = self.request_timeout;
        if let Some(token) = &self.token {
            config = config.with_session_token(token);
        }
        config
    }
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "info,blade_power=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let client = Arc::new(
        HttpHardwareClient::new(&args.client_config()).context("failed to create appliance client")?,
    );

    match args.command {
        Command::Status { uri } => {
            let task = PowerTask::with_defaults(client, ServerHardware::from_uri(&uri));
            let state = task
                .query_current_state()
                .await
                .with_context(|| format!("failed to query {uri}"))?;
            let hardware = task.hardware();
            println!("{}\t{}\t{state}", hardware.uri, hardware.name);
            Ok(ExitCode::SUCCESS)
        }
        Command::Set {
            uri,
            state,
            timeout,
            wait,
            strict,
            json,
        } => {
            let config = PowerTaskConfig::new(timeout, wait);
            let task = PowerTask::new(client, ServerHardware::from_uri(&uri), config);
            let executor = PowerExecutor::new(task);

            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            let report = executor
                .execute_with_cancel(state, cancel)
                .await
                .with_context(|| format!("failed to power {state} {uri}"))?;

            print_report(&report, json)?;
            finish(report, strict)
        }
    }
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling power task");
            cancel.cancel();
        }
    });
}

fn describe(outcome: PowerOutcome) -> &'static str {
    match outcome {
        PowerOutcome::AlreadySatisfied => "already in requested state",
        PowerOutcome::Completed => "completed",
        PowerOutcome::TaskFailed => "task failed",
        PowerOutcome::TimedOut => "not confirmed before timeout",
    }
}

fn print_report(report: &PowerReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let elapsed = report.finished_at - report.started_at;
    println!(
        "{}: {} ({} checks, {}s)",
        report.target,
        describe(report.outcome),
        report.iterations,
        elapsed.num_seconds()
    );
    if let Some(task) = &report.task {
        println!("task {} {}: {}", task.uri, task.task_state, task.task_status);
    }
    Ok(())
}

fn finish(report: PowerReport, strict: bool) -> anyhow::Result<ExitCode> {
    if report.outcome.is_confirmed() || (report.outcome == PowerOutcome::TimedOut && !strict) {
        return Ok(ExitCode::SUCCESS);
    }

    match report.into_result() {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(e @ PowerError::Timeout { .. }) => {
            eprintln!("error: {e}");
            Ok(ExitCode::from(EXIT_TIMED_OUT))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blade_power_control::TaskHandle;
    use chrono::Utc;
    use clap::CommandFactory;

    fn report(outcome: PowerOutcome) -> PowerReport {
        let now = Utc::now();
        PowerReport {
            target: PowerState::On,
            outcome,
            iterations: 4,
            task: Some(TaskHandle {
                uri: "/rest/tasks/AB12".to_string(),
                task_state: "Error".to_string(),
                ..TaskHandle::default()
            }),
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn target_must_be_on_or_off() {
        assert_eq!(parse_target("on"), Ok(PowerState::On));
        assert_eq!(parse_target("OFF"), Ok(PowerState::Off));
        assert!(parse_target("unknown").is_err());
        assert!(parse_target("reboot").is_err());
    }

    #[test]
    fn set_defaults() {
        let args = Args::try_parse_from(["bladepower", "set", "/rest/server-hardware/1", "off"]).unwrap();
        match args.command {
            Command::Set {
                state,
                timeout,
                wait,
                strict,
                ..
            } => {
                assert_eq!(state, PowerState::Off);
                assert_eq!(timeout, 36);
                assert_eq!(wait, 10);
                assert!(!strict);
            }
            Command::Status { .. } => panic!("expected set"),
        }
    }

    #[test]
    fn client_config_from_flags() {
        let args = Args::try_parse_from([
            "bladepower",
            "--url",
            "https://oneview.example.com",
            "--token",
            "secret",
            "--api-version",
            "1200",
            "status",
            "/rest/server-hardware/1",
        ])
        .unwrap();
        let config = args.client_config();
        assert_eq!(config.base_url, "https://oneview.example.com");
        assert_eq!(config.api_version, 1200);
        assert_eq!(config.session_token.as_deref(), Some("secret"));
    }

    #[test]
    fn timeout_exit_codes() {
        assert_eq!(
            finish(report(PowerOutcome::TimedOut), false).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            finish(report(PowerOutcome::TimedOut), true).unwrap(),
            ExitCode::from(EXIT_TIMED_OUT)
        );
    }

    #[test]
    fn failed_task_is_an_error() {
        assert!(finish(report(PowerOutcome::TaskFailed), false).is_err());
        assert_eq!(
            finish(report(PowerOutcome::Completed), true).unwrap(),
            ExitCode::SUCCESS
        );
        assert_eq!(
            finish(report(PowerOutcome::AlreadySatisfied), true).unwrap(),
            ExitCode::SUCCESS
        );
    }
}
