use std::process::ExitCode;

use clap::Args;
use log::{error, info};
use recsync_runtime::history::HistoryStore;

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of entries to display
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,

    /// Clear all history
    #[arg(long)]
    pub clear: bool,
}

pub fn run(args: HistoryArgs) -> ExitCode {
    let store = match HistoryStore::new() {
        Some(s) => s,
        None => {
            info!("[history] history is currently disabled");
            println!("History is disabled.");
            return ExitCode::SUCCESS;
        }
    };

    if args.clear {
        return match store.clear() {
            Ok(()) => {
                println!("History cleared");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("[history] failed to clear {}: {e}", store.path().display());
                ExitCode::from(2)
            }
        };
    }

    let runs = store.recent_runs(args.limit);

    if runs.is_empty() {
        println!("No history yet.");
        return ExitCode::SUCCESS;
    }

    println!(
        "{:<20}  {:>7}  {:>7}  {:>7}  {:>8}  INPUT",
        "TIMESTAMP", "TOTAL", "OK", "FAILED", "TIME"
    );
    println!("{}", "-".repeat(80));

    for run in runs {
        let ts = run.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();

        println!(
            "{:<20}  {:>7}  {:>7}  {:>7}  {:>6}ms  {}",
            ts, run.total, run.succeeded, run.failed, run.duration_ms, run.input
        );
    }

    let total = store.count();
    if total > args.limit {
        println!(
            "\n({} more entries, use --limit to show more)",
            total - args.limit
        );
    }

    ExitCode::SUCCESS
}
