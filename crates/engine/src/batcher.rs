use recsync_source::Record;

use crate::error::ConfigurationError;

/// An ordered, non-empty group of records sent together.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    batch_index: usize,
    records: Vec<Record>,
}

impl Batch {
    pub fn new(batch_index: usize, records: Vec<Record>) -> Self {
        debug_assert!(!records.is_empty(), "batches are never empty");
        Self {
            batch_index,
            records,
        }
    }

    /// 0-based, increasing in source order.
    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence indices of the records, in batch order.
    pub fn sequence_indices(&self) -> Vec<usize> {
        self.records.iter().map(Record::sequence_index).collect()
    }
}

/// Groups a record stream into batches of exactly `batch_size`, except the
/// last, which holds the remainder.
///
/// Errors from the underlying stream are passed through and end the
/// batching; records collected for the unfinished batch are dropped.
pub struct Batcher<I> {
    records: I,
    batch_size: usize,
    next_index: usize,
    done: bool,
}

impl<I> Batcher<I> {
    pub fn new(records: I, batch_size: usize) -> Result<Self, ConfigurationError> {
        if batch_size == 0 {
            return Err(ConfigurationError::InvalidBatchSize(batch_size));
        }

        Ok(Self {
            records,
            batch_size,
            next_index: 0,
            done: false,
        })
    }
}

impl<I, E> Iterator for Batcher<I>
where
    I: Iterator<Item = Result<Record, E>>,
{
    type Item = Result<Batch, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut records = Vec::with_capacity(self.batch_size);
        while records.len() < self.batch_size {
            match self.records.next() {
                Some(Ok(record)) => records.push(record),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    break;
                }
            }
        }

        if records.is_empty() {
            return None;
        }

        let batch = Batch::new(self.next_index, records);
        self.next_index += 1;
        Some(Ok(batch))
    }
}

/// Shape of a run without sending anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub records: usize,
    pub batch_sizes: Vec<usize>,
}

impl BatchPlan {
    pub fn from_batches(batches: &[Batch]) -> Self {
        let batch_sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        Self {
            records: batch_sizes.iter().sum(),
            batch_sizes,
        }
    }

    pub fn batches(&self) -> usize {
        self.batch_sizes.len()
    }
}

#[cfg(test)]
#[path = "batcher_tests.rs"]
mod tests;
