use std::time::Instant;

use log::{error, info};
use recsync_source::{Record, SourceError};

use crate::{
    aggregate::{Aggregator, Report},
    batcher::{Batch, BatchPlan, Batcher},
    cancel::CancelToken,
    config::SyncConfig,
    dispatcher::Dispatcher,
    error::SyncError,
    transport::{Transport, TransportClient},
};

/// Read and batch the whole input. Any malformed record aborts here,
/// before anything is sent.
pub fn collect_batches<I>(records: I, batch_size: usize) -> Result<Vec<Batch>, SyncError>
where
    I: Iterator<Item = Result<Record, SourceError>>,
{
    let batches = Batcher::new(records, batch_size)?.collect::<Result<Vec<_>, _>>()?;
    Ok(batches)
}

/// Validate and batch the input without sending it.
pub fn plan<I>(records: I, batch_size: usize) -> Result<BatchPlan, SyncError>
where
    I: Iterator<Item = Result<Record, SourceError>>,
{
    let batches = collect_batches(records, batch_size)?;
    Ok(BatchPlan::from_batches(&batches))
}

/// One synchronization pass: batch `records`, send them through
/// `transport`, and reconcile the outcomes into a [`Report`].
///
/// Per-batch transport failures end up in the report. Only configuration,
/// input, and internal consistency errors are returned as `Err`.
pub fn run_sync<I, T>(
    records: I,
    config: &SyncConfig,
    transport: T,
    cancel: &CancelToken,
) -> Result<Report, SyncError>
where
    I: Iterator<Item = Result<Record, SourceError>>,
    T: Transport,
{
    config.validate()?;
    let started = Instant::now();

    let batches = collect_batches(records, config.batch_size)?;
    let records_total: usize = batches.iter().map(Batch::len).sum();
    info!(
        "[sync] {records_total} records in {} batches -> {}",
        batches.len(),
        config.endpoint
    );

    let client = TransportClient::new(transport, config.retry_policy());
    let dispatcher = Dispatcher::new(&client, config.concurrency)?;
    let mut aggregator = Aggregator::new(&batches);
    let mut violation = None;

    {
        let _watchdog = config.run_timeout.map(|t| cancel.cancel_after(t));

        dispatcher.dispatch(batches, cancel, |outcome| {
            if let Err(e) = aggregator.record(outcome) {
                error!("[sync] {e}");
                violation.get_or_insert(e);
            }
        });
    }

    if let Some(e) = violation {
        return Err(e.into());
    }

    let report = aggregator.finish(started.elapsed())?;
    info!(
        "[sync] done: {} succeeded, {} failed, {} attempts in {}ms",
        report.succeeded, report.failed, report.attempts, report.elapsed_ms
    );
    Ok(report)
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
