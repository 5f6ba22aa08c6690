use std::{path::PathBuf, process::ExitCode, time::Instant};

use anyhow::Context;
use clap::Args;
use log::warn;
use recsync_engine::{
    CancelToken, ConfigOverrides, ConfigurationError, HttpTransport, SyncConfig, plan, run_sync,
};
use recsync_runtime::{
    default_config_path,
    history::{HistoryStore, RunEvent, RunTotals},
};
use recsync_source::{InputFormat, Schema, open_records};
use signal_hook::consts::{SIGINT, SIGTERM};

use crate::printer::{ColorChoice, OutputFormat, PrinterConfig, make_printer};

#[derive(Debug, Args)]
pub struct OutputOptions {
    /// Print the report as a single JSON document
    #[arg(long)]
    pub json: bool,

    /// When to use colors: auto, always, never
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Maximum number of failed records to list
    #[arg(long, value_name = "N", default_value = "20")]
    pub max_failures: usize,
}

impl OutputOptions {
    pub fn printer_config(&self) -> PrinterConfig {
        PrinterConfig {
            format: if self.json {
                OutputFormat::Json
            } else {
                OutputFormat::Human
            },
            color: ColorChoice::parse(&self.color),
            max_failures: self.max_failures,
        }
    }
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// CSV or JSON array file to send
    pub input: PathBuf,

    /// Input format (csv or json); inferred from the extension when omitted
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<InputFormat>,

    /// JSON file mapping field names to types
    #[arg(long, value_name = "PATH")]
    pub schema: Option<PathBuf>,

    /// Endpoint URL, overrides RECSYNC_ENDPOINT and the config file
    #[arg(long, value_name = "URL")]
    pub endpoint: Option<String>,

    /// User for HTTP basic auth; the password comes from
    /// RECSYNC_BASIC_AUTH_PASSWORD or the config file
    #[arg(long, value_name = "USER")]
    pub basic_auth_user: Option<String>,

    /// Records per batch
    #[arg(long, short = 'b', value_name = "N")]
    pub batch_size: Option<usize>,

    /// Batches in flight at once [default: 1]
    #[arg(long, short = 'c', value_name = "N")]
    pub concurrency: Option<usize>,

    /// Attempts per batch, counting the first [default: 3]
    #[arg(long, short = 'r', value_name = "N")]
    pub max_retries: Option<u32>,

    /// Per-attempt timeout in milliseconds [default: 30000]
    #[arg(long = "timeout-ms", value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// First backoff ceiling in milliseconds [default: 200]
    #[arg(long = "base-delay-ms", value_name = "MS")]
    pub base_delay_ms: Option<u64>,

    /// Largest backoff delay in milliseconds [default: 10000]
    #[arg(long = "max-delay-ms", value_name = "MS")]
    pub max_delay_ms: Option<u64>,

    /// Cancel batches not yet sent after this many milliseconds
    #[arg(long = "run-timeout-ms", value_name = "MS")]
    pub run_timeout_ms: Option<u64>,

    /// Config file [default: $XDG_CONFIG_HOME/recsync/config.json]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Read, validate and batch the input without sending anything
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub output: OutputOptions,
}

impl SyncArgs {
    /// The command-line layer. Secrets are never taken from flags.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: self.endpoint.clone(),
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            timeout_millis: self.timeout_ms,
            base_delay_millis: self.base_delay_ms,
            max_delay_millis: self.max_delay_ms,
            run_timeout_millis: self.run_timeout_ms,
            token: None,
            basic_auth_user: self.basic_auth_user.clone(),
            basic_auth_password: None,
        }
    }

    /// Config file, then environment, then flags.
    pub fn layers(&self) -> anyhow::Result<ConfigOverrides> {
        let file = match &self.config {
            Some(path) => ConfigOverrides::load(path)?,
            None => ConfigOverrides::load_if_exists(&default_config_path())?,
        };
        Ok(file
            .merge(ConfigOverrides::from_env())
            .merge(self.overrides()))
    }
}

pub fn run(args: SyncArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("[error] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: SyncArgs) -> anyhow::Result<ExitCode> {
    let layers = args.layers()?;
    let schema = args
        .schema
        .as_deref()
        .map(Schema::load)
        .transpose()
        .context("failed to load schema")?;
    let records = open_records(&args.input, args.format, schema)?;
    let mut printer = make_printer(args.output.printer_config());

    if args.dry_run {
        let batch_size = layers
            .batch_size
            .ok_or(ConfigurationError::MissingBatchSize)?;
        let plan = plan(records, batch_size)?;
        printer.print_plan(&plan)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = SyncConfig::resolve(layers)?;

    let cancel = CancelToken::new();
    install_signal_handlers(&cancel)?;

    let started = Instant::now();
    let report = run_sync(records, &config, HttpTransport::new(&config), &cancel)?;

    if cancel.is_cancelled() {
        warn!(
            "[sync] run cancelled, {} records were never sent",
            report.cancelled()
        );
    }

    if let Some(store) = HistoryStore::new() {
        let totals = RunTotals {
            total: report.total_records,
            succeeded: report.succeeded,
            failed: report.failed,
        };
        store.log_run(RunEvent::new(
            args.input.display().to_string(),
            config.endpoint.clone(),
            totals,
            started.elapsed().as_millis() as u64,
        ));
    }

    printer.print_report(&report)?;

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

/// The first SIGINT/SIGTERM cancels the run. A second one exits at once,
/// even while an attempt is still on the wire.
fn install_signal_handlers(cancel: &CancelToken) -> anyhow::Result<()> {
    for signal in [SIGINT, SIGTERM] {
        // Registered first so it sees the flag as it was before this signal.
        signal_hook::flag::register_conditional_shutdown(signal, 128 + signal, cancel.flag())
            .context("failed to install signal handler")?;
        signal_hook::flag::register(signal, cancel.flag())
            .context("failed to install signal handler")?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
