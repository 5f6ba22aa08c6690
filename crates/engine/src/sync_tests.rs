use super::*;
use crate::{
    error::ConfigurationError,
    outcome::FailureReason,
    transport::{Response, TransportError},
};
use recsync_source::{FieldProblem, MalformedRecordError, Value};
use std::{
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

fn records(n: usize) -> impl Iterator<Item = Result<Record, SourceError>> {
    (0..n).map(|i| Ok(Record::new(i, vec![("id".into(), Value::Int(i as i64))])))
}

fn config(batch_size: usize, concurrency: usize, max_retries: u32) -> SyncConfig {
    let mut config = SyncConfig::new("http://sync.test/batches", batch_size);
    config.concurrency = concurrency;
    config.max_retries = max_retries;
    config.base_delay = Duration::from_millis(1);
    config.max_delay = Duration::from_millis(5);
    config
}

/// Rejects the listed batches with a 4xx, accepts the rest.
#[derive(Default)]
struct RejectingTransport {
    reject: Vec<usize>,
    sent: Mutex<Vec<usize>>,
}

impl Transport for RejectingTransport {
    fn send(&self, batch_index: usize, _payload: &[u8]) -> Result<Response, TransportError> {
        self.sent.lock().unwrap().push(batch_index);
        if self.reject.contains(&batch_index) {
            Ok(Response::new(400, r#"{"error":"bad batch"}"#))
        } else {
            Ok(Response::new(200, ""))
        }
    }
}

#[test]
fn permanent_rejection_fails_only_that_batch() {
    let transport = RejectingTransport {
        reject: vec![1],
        ..Default::default()
    };
    let report =
        run_sync(records(10), &config(3, 2, 1), &transport, &CancelToken::new()).unwrap();

    assert_eq!(report.total_records, 10);
    assert_eq!(report.succeeded, 7);
    assert_eq!(report.failed, 3);
    assert_eq!(report.batches, 4);
    assert!(!report.is_success());

    let failed: Vec<_> = report.failures.iter().map(|f| f.sequence_index).collect();
    assert_eq!(failed, vec![3, 4, 5]);
    for failure in &report.failures {
        assert_eq!(failure.batch_index, 1);
        assert_eq!(
            failure.reason,
            FailureReason::Permanent {
                status: Some(400),
                message: "bad batch".into(),
            }
        );
    }

    // Permanent failures are not retried.
    let mut sent = transport.sent.lock().unwrap().clone();
    sent.sort_unstable();
    assert_eq!(sent, vec![0, 1, 2, 3]);
    assert_eq!(report.attempts, 4);
}

/// Fails the first call for every batch with a 503.
#[derive(Default)]
struct FlakyTransport {
    seen: Mutex<Vec<usize>>,
}

impl Transport for FlakyTransport {
    fn send(&self, batch_index: usize, _payload: &[u8]) -> Result<Response, TransportError> {
        let mut seen = self.seen.lock().unwrap();
        if seen.contains(&batch_index) {
            Ok(Response::new(200, ""))
        } else {
            seen.push(batch_index);
            Ok(Response::new(503, "busy"))
        }
    }
}

#[test]
fn transient_failures_recover_within_budget() {
    let report = run_sync(
        records(4),
        &config(2, 2, 2),
        FlakyTransport::default(),
        &CancelToken::new(),
    )
    .unwrap();
    assert!(report.is_success());
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.retried, 4);
    assert_eq!(report.attempts, 4);
}

#[test]
fn zero_retries_gives_up_after_one_attempt() {
    let report = run_sync(
        records(4),
        &config(2, 1, 0),
        FlakyTransport::default(),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(report.failed, 4);
    assert_eq!(report.attempts, 2);
    assert!(report.failures.iter().all(|f| matches!(
        f.reason,
        FailureReason::RetriesExhausted { attempts: 1, .. }
    )));
}

/// Holds the first call long enough for the run timeout to fire.
struct SlowTransport {
    calls: AtomicUsize,
}

impl Transport for SlowTransport {
    fn send(&self, _batch_index: usize, _payload: &[u8]) -> Result<Response, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(150));
        Ok(Response::new(200, ""))
    }
}

#[test]
fn run_timeout_cancels_unstarted_batches() {
    let mut config = config(2, 1, 0);
    config.run_timeout = Some(Duration::from_millis(30));
    let transport = SlowTransport {
        calls: AtomicUsize::new(0),
    };
    let cancel = CancelToken::new();

    let report = run_sync(records(6), &config, &transport, &cancel).unwrap();

    assert!(cancel.is_cancelled());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 4);
    assert_eq!(report.cancelled(), 4);
    let failed: Vec<_> = report.failures.iter().map(|f| f.sequence_index).collect();
    assert_eq!(failed, vec![2, 3, 4, 5]);
}

#[test]
fn cancelled_before_start_sends_nothing() {
    let transport = RejectingTransport::default();
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = run_sync(records(5), &config(2, 2, 1), &transport, &cancel).unwrap();
    assert!(transport.sent.lock().unwrap().is_empty());
    assert_eq!(report.failed, 5);
    assert_eq!(report.cancelled(), 5);
    assert_eq!(report.attempts, 0);
}

#[test]
fn zero_batch_size_is_a_configuration_error() {
    let transport = RejectingTransport::default();
    let err = run_sync(records(3), &config(0, 1, 1), &transport, &CancelToken::new()).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Configuration(ConfigurationError::InvalidBatchSize(0))
    ));
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[test]
fn malformed_record_aborts_before_sending() {
    let input = records(4).chain(std::iter::once(Err(SourceError::from(
        MalformedRecordError::new(4, "id", FieldProblem::Missing),
    ))));
    let transport = RejectingTransport::default();

    let err = run_sync(input, &config(2, 1, 1), &transport, &CancelToken::new()).unwrap_err();
    let malformed = err.as_malformed().unwrap();
    assert_eq!(malformed.sequence_index, 4);
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[test]
fn empty_input_is_an_empty_success() {
    let transport = RejectingTransport::default();
    let report = run_sync(records(0), &config(3, 2, 1), &transport, &CancelToken::new()).unwrap();
    assert_eq!(report.total_records, 0);
    assert_eq!(report.batches, 0);
    assert!(report.is_success());
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[test]
fn plan_reports_batch_sizes_without_sending() {
    let plan = plan(records(7), 3).unwrap();
    assert_eq!(plan.records, 7);
    assert_eq!(plan.batch_sizes, vec![3, 3, 1]);
    assert_eq!(plan.batches(), 3);
}
