use std::time::Duration;

use hashbrown::HashMap;
use serde::Serialize;

use crate::{
    batcher::Batch,
    error::AggregationInvariantError,
    outcome::{BatchOutcome, FailureReason},
};

/// One record that did not make it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    pub sequence_index: usize,
    pub batch_index: usize,
    pub reason: FailureReason,
}

/// Final summary of a run. `failures` is sorted by `sequence_index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub total_records: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Records whose batch needed more than one attempt.
    pub retried: usize,
    pub batches: usize,
    /// Network attempts across all batches.
    pub attempts: u64,
    pub elapsed_ms: u64,
    pub failures: Vec<RecordFailure>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn cancelled(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.reason == FailureReason::Cancelled)
            .count()
    }
}

/// Collects batch outcomes in any order and checks them against the batches
/// that were planned.
pub struct Aggregator {
    /// Sorted record indices per batch.
    planned: HashMap<usize, Vec<usize>>,
    total_records: usize,
    outcomes: HashMap<usize, BatchOutcome>,
}

impl Aggregator {
    pub fn new(batches: &[Batch]) -> Self {
        let planned: HashMap<usize, Vec<usize>> = batches
            .iter()
            .map(|b| {
                let mut indices = b.sequence_indices();
                indices.sort_unstable();
                (b.batch_index(), indices)
            })
            .collect();
        let total_records = batches.iter().map(Batch::len).sum();

        Self {
            planned,
            total_records,
            outcomes: HashMap::with_capacity(batches.len()),
        }
    }

    pub fn received(&self) -> usize {
        self.outcomes.len()
    }

    /// Record one outcome. Each batch may report once, and only for its own
    /// records.
    pub fn record(&mut self, outcome: BatchOutcome) -> Result<(), AggregationInvariantError> {
        let batch_index = outcome.batch_index;
        let Some(expected) = self.planned.get(&batch_index) else {
            return Err(AggregationInvariantError::UnknownBatch(batch_index));
        };
        if self.outcomes.contains_key(&batch_index) {
            return Err(AggregationInvariantError::DuplicateOutcome(batch_index));
        }

        let mut covered = outcome.outcome.indices();
        covered.sort_unstable();
        if &covered != expected {
            return Err(AggregationInvariantError::RecordMismatch { batch_index });
        }

        self.outcomes.insert(batch_index, outcome);
        Ok(())
    }

    /// Build the report once every planned batch has reported.
    pub fn finish(self, elapsed: Duration) -> Result<Report, AggregationInvariantError> {
        let mut batch_indices: Vec<usize> = self.planned.keys().copied().collect();
        batch_indices.sort_unstable();

        if let Some(&missing) = batch_indices
            .iter()
            .find(|i| !self.outcomes.contains_key(*i))
        {
            return Err(AggregationInvariantError::MissingOutcome(missing));
        }

        let mut succeeded = 0;
        let mut retried = 0;
        let mut attempts = 0u64;
        let mut failures = Vec::new();

        for batch_index in &batch_indices {
            let outcome = &self.outcomes[batch_index];

            succeeded += outcome.outcome.succeeded().len();
            attempts += u64::from(outcome.attempts);
            if outcome.attempts > 1 {
                retried += self.planned[batch_index].len();
            }
            failures.extend(outcome.outcome.failures().into_iter().map(
                |(sequence_index, reason)| RecordFailure {
                    sequence_index,
                    batch_index: *batch_index,
                    reason,
                },
            ));
        }

        failures.sort_by_key(|f| f.sequence_index);
        let failed = failures.len();

        if succeeded + failed != self.total_records {
            return Err(AggregationInvariantError::CountMismatch {
                total: self.total_records,
                succeeded,
                failed,
            });
        }

        Ok(Report {
            total_records: self.total_records,
            succeeded,
            failed,
            retried,
            batches: batch_indices.len(),
            attempts,
            elapsed_ms: elapsed.as_millis() as u64,
            failures,
        })
    }
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
