use std::{
    env,
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::PROGRAM_NAME;

pub const HISTORY_VERSION: u8 = 1;

pub const HISTORY_DISABLED_ENV: &str = "RECSYNC_HISTORY";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum HistoryEvent {
    Run(RunEvent),
}

/// One completed synchronization pass.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RunEvent {
    /// Schema version
    pub version: u8,

    pub timestamp: DateTime<Utc>,

    /// Input file as given on the command line.
    pub input: String,

    pub endpoint: String,

    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

/// Totals carried by a [`RunEvent`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl RunEvent {
    pub fn new(input: String, endpoint: String, totals: RunTotals, duration_ms: u64) -> Self {
        Self {
            version: HISTORY_VERSION,
            timestamp: Utc::now(),
            input,
            endpoint,
            total: totals.total,
            succeeded: totals.succeeded,
            failed: totals.failed,
            duration_ms,
        }
    }
}

pub struct HistoryStore {
    path: PathBuf,
}

pub fn state_dir() -> Option<PathBuf> {
    if let Ok(xdg_state) = env::var("XDG_STATE_HOME")
        && !xdg_state.is_empty()
    {
        return Some(PathBuf::from(xdg_state).join(PROGRAM_NAME));
    }

    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|p| p.join(PROGRAM_NAME))
}

pub fn history_log_path() -> Option<PathBuf> {
    state_dir().map(|d| d.join("history.log"))
}

fn history_disabled() -> bool {
    match env::var(HISTORY_DISABLED_ENV) {
        Ok(val) => val == "0" || val.eq_ignore_ascii_case("false"),
        Err(_) => false,
    }
}

impl HistoryStore {
    pub fn new() -> Option<Self> {
        if history_disabled() {
            return None;
        }

        let path = history_log_path()?;
        Some(Self { path })
    }

    /// Create a history store with a custom path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best effort: a failed append is logged at debug level and dropped.
    pub fn log_run(&self, event: RunEvent) {
        if let Err(e) = self.append_event(&HistoryEvent::Run(event)) {
            debug!("Failed to log history event: {}", e);
        }
    }

    fn append_event(&self, event: &HistoryEvent) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(event).map_err(io::Error::other)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // One line per write under O_APPEND; a torn line is skipped on read.
        file.write_all(line.as_bytes())?;

        Ok(())
    }

    pub fn iter_events(&self) -> impl Iterator<Item = HistoryEvent> {
        self.read_events().into_iter().flatten()
    }

    fn read_events(&self) -> Option<Vec<HistoryEvent>> {
        let file = File::open(&self.path).ok()?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for line in reader.lines() {
            match line {
                Ok(line) => match serde_json::from_str(&line) {
                    Ok(ev) => events.push(ev),
                    Err(e) => debug!("Skipping malformed history line: {e}"),
                },
                Err(e) => {
                    debug!("Error reading history log: {e}");
                    break;
                }
            }
        }
        Some(events)
    }

    /// Most recent runs first.
    pub fn recent_runs(&self, limit: usize) -> Vec<RunEvent> {
        let mut runs: Vec<RunEvent> = self
            .iter_events()
            .map(|e| match e {
                HistoryEvent::Run(r) => r,
            })
            .collect();

        runs.reverse();
        runs.truncate(limit);
        runs
    }

    pub fn count(&self) -> usize {
        self.iter_events().count()
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
