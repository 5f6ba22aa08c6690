use std::fmt;

use serde::Serialize;

/// Why a record did not make it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Non-retryable response for the whole batch.
    Permanent { status: Option<u16>, message: String },
    /// Every attempt failed transiently.
    RetriesExhausted { attempts: u32, last_error: String },
    /// The server rejected this record in a partial acknowledgment.
    Rejected { message: String },
    /// A 2xx body that could not be read as an acknowledgment.
    Malformed { message: String },
    /// The run was cancelled before the batch finished.
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Permanent {
                status: Some(status),
                message,
            } => write!(f, "HTTP {status}: {message}"),
            FailureReason::Permanent {
                status: None,
                message,
            } => write!(f, "request failed: {message}"),
            FailureReason::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "retries exhausted after {attempts} attempts: {last_error}"),
            FailureReason::Rejected { message } => write!(f, "rejected: {message}"),
            FailureReason::Malformed { message } => write!(f, "malformed response: {message}"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Terminal result of transmitting one batch. Indices are record sequence
/// indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Vec<usize>),
    PartialFailure {
        succeeded: Vec<usize>,
        failed: Vec<(usize, FailureReason)>,
    },
    Failure(Vec<usize>, FailureReason),
}

impl Outcome {
    pub fn succeeded(&self) -> &[usize] {
        match self {
            Outcome::Success(indices) => indices,
            Outcome::PartialFailure { succeeded, .. } => succeeded,
            Outcome::Failure(..) => &[],
        }
    }

    /// Failed records paired with their reasons.
    pub fn failures(&self) -> Vec<(usize, FailureReason)> {
        match self {
            Outcome::Success(_) => Vec::new(),
            Outcome::PartialFailure { failed, .. } => failed.clone(),
            Outcome::Failure(indices, reason) => {
                indices.iter().map(|&i| (i, reason.clone())).collect()
            }
        }
    }

    pub fn failed_count(&self) -> usize {
        match self {
            Outcome::Success(_) => 0,
            Outcome::PartialFailure { failed, .. } => failed.len(),
            Outcome::Failure(indices, _) => indices.len(),
        }
    }

    /// Every record index the outcome speaks for.
    pub fn indices(&self) -> Vec<usize> {
        let mut all = self.succeeded().to_vec();
        match self {
            Outcome::Success(_) => {}
            Outcome::PartialFailure { failed, .. } => all.extend(failed.iter().map(|(i, _)| *i)),
            Outcome::Failure(indices, _) => all.extend_from_slice(indices),
        }
        all
    }
}

/// An [`Outcome`] keyed by the batch it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch_index: usize,
    /// Network attempts made for this batch. Zero if it never started.
    pub attempts: u32,
    pub outcome: Outcome,
}

impl BatchOutcome {
    pub fn cancelled(batch_index: usize, indices: Vec<usize>) -> Self {
        Self {
            batch_index,
            attempts: 0,
            outcome: Outcome::Failure(indices, FailureReason::Cancelled),
        }
    }
}
