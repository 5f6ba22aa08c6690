use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use log::{debug, info};

use crate::{
    batcher::Batch,
    cancel::CancelToken,
    error::ConfigurationError,
    outcome::BatchOutcome,
    transport::{Transport, TransportClient},
};

/// Runs batches through a fixed pool of worker threads.
///
/// At most `concurrency` batches are in flight at once. Every batch handed
/// to [`dispatch`](Self::dispatch) yields exactly one [`BatchOutcome`].
pub struct Dispatcher<'a, T> {
    client: &'a TransportClient<T>,
    concurrency: usize,
}

impl<'a, T: Transport> Dispatcher<'a, T> {
    pub fn new(
        client: &'a TransportClient<T>,
        concurrency: usize,
    ) -> Result<Self, ConfigurationError> {
        if concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency(concurrency));
        }
        Ok(Self {
            client,
            concurrency,
        })
    }

    /// Send all `batches`, calling `on_outcome` on this thread as each one
    /// finishes, in completion order.
    ///
    /// Once `cancel` trips no new batch is started; batches never started
    /// are reported as cancelled.
    pub fn dispatch<F>(&self, batches: Vec<Batch>, cancel: &CancelToken, mut on_outcome: F)
    where
        F: FnMut(BatchOutcome),
    {
        let total = batches.len();
        if total == 0 {
            return;
        }

        let workers = self.concurrency.min(total);
        let (job_tx, job_rx) = channel::bounded::<Batch>(workers);
        let (result_tx, result_rx) = channel::unbounded::<BatchOutcome>();

        debug!("[dispatch] {total} batches across {workers} workers");

        thread::scope(|s| {
            for worker_id in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let client = self.client;

                s.spawn(move || worker_loop(worker_id, client, job_rx, result_tx, cancel));
            }
            drop(job_rx);

            {
                let result_tx = result_tx.clone();
                s.spawn(move || feed(batches, job_tx, result_tx, cancel));
            }
            drop(result_tx);

            let mut finished = 0;
            for outcome in result_rx.iter() {
                finished += 1;
                debug!(
                    "[dispatch] batch {} finished ({finished}/{total})",
                    outcome.batch_index
                );
                on_outcome(outcome);
            }

            info!("[dispatch] all {finished} batches reached an outcome");
        });
    }
}

/// Queue batches for the workers in order. After cancellation the rest are
/// reported directly without being queued.
fn feed(
    batches: Vec<Batch>,
    job_tx: Sender<Batch>,
    result_tx: Sender<BatchOutcome>,
    cancel: &CancelToken,
) {
    let mut pending = batches.into_iter();

    for batch in pending.by_ref() {
        if cancel.is_cancelled() {
            let _ = result_tx.send(never_started(&batch));
            break;
        }
        // Blocks while every worker is busy and the queue is full.
        if let Err(channel::SendError(batch)) = job_tx.send(batch) {
            let _ = result_tx.send(never_started(&batch));
            break;
        }
    }

    let skipped = pending.len();
    for batch in pending {
        let _ = result_tx.send(never_started(&batch));
    }
    if skipped > 0 {
        info!("[dispatch] cancelled; {skipped} batches were not started");
    }
}

fn worker_loop<T: Transport>(
    worker_id: usize,
    client: &TransportClient<T>,
    job_rx: Receiver<Batch>,
    result_tx: Sender<BatchOutcome>,
    cancel: &CancelToken,
) {
    for batch in job_rx.iter() {
        let outcome = if cancel.is_cancelled() {
            never_started(&batch)
        } else {
            debug!(
                "[dispatch] worker {worker_id} took batch {}",
                batch.batch_index()
            );
            client.deliver(&batch, cancel)
        };

        if result_tx.send(outcome).is_err() {
            return;
        }
    }
}

fn never_started(batch: &Batch) -> BatchOutcome {
    BatchOutcome::cancelled(batch.batch_index(), batch.sequence_indices())
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
