use super::*;
use crate::{
    outcome::{FailureReason, Outcome},
    retry::RetryPolicy,
    transport::{Response, TransportError},
};
use recsync_source::Record;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

fn batches(n: usize, size: usize) -> Vec<Batch> {
    (0..n)
        .map(|b| {
            Batch::new(
                b,
                (b * size..(b + 1) * size)
                    .map(|i| Record::new(i, vec![]))
                    .collect(),
            )
        })
        .collect()
}

fn run(
    transport: impl Transport,
    batches: Vec<Batch>,
    concurrency: usize,
    cancel: &CancelToken,
) -> Vec<BatchOutcome> {
    let client = TransportClient::new(transport, RetryPolicy::immediate(1));
    let dispatcher = Dispatcher::new(&client, concurrency).unwrap();
    let mut outcomes = Vec::new();
    dispatcher.dispatch(batches, cancel, |o| outcomes.push(o));
    outcomes
}

/// Tracks how many calls overlap.
#[derive(Default)]
struct GaugeTransport {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Transport for GaugeTransport {
    fn send(&self, _batch_index: usize, _payload: &[u8]) -> Result<Response, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        std::thread::sleep(Duration::from_millis(15));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Response::new(200, ""))
    }
}

#[test]
fn never_exceeds_concurrency_limit() {
    for concurrency in [1, 2, 3, 5] {
        let transport = GaugeTransport::default();
        let outcomes = run(&transport, batches(12, 2), concurrency, &CancelToken::new());

        assert_eq!(outcomes.len(), 12);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 12);
        let peak = transport.max_in_flight.load(Ordering::SeqCst);
        assert!(
            peak <= concurrency,
            "peak {peak} exceeded limit {concurrency}"
        );
        assert!(peak >= 1);
    }
}

#[test]
fn parallel_workers_actually_overlap() {
    let transport = GaugeTransport::default();
    run(&transport, batches(8, 1), 4, &CancelToken::new());
    assert!(transport.max_in_flight.load(Ordering::SeqCst) > 1);
}

#[test]
fn every_batch_gets_exactly_one_outcome() {
    let transport = GaugeTransport::default();
    let outcomes = run(&transport, batches(9, 3), 4, &CancelToken::new());

    let mut seen: BTreeMap<usize, usize> = BTreeMap::new();
    for o in &outcomes {
        *seen.entry(o.batch_index).or_default() += 1;
        assert_eq!(o.attempts, 1);
        assert!(matches!(o.outcome, Outcome::Success(_)));
    }
    assert_eq!(seen.len(), 9);
    assert!(seen.values().all(|&count| count == 1));
}

#[test]
fn no_batches_no_outcomes() {
    let transport = GaugeTransport::default();
    let outcomes = run(&transport, Vec::new(), 3, &CancelToken::new());
    assert!(outcomes.is_empty());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn zero_concurrency_is_rejected() {
    let client = TransportClient::new(GaugeTransport::default(), RetryPolicy::immediate(1));
    assert!(matches!(
        Dispatcher::new(&client, 0),
        Err(ConfigurationError::InvalidConcurrency(0))
    ));
}

/// Succeeds, and trips the token while handling call number `cancel_on`.
struct CancellingTransport {
    cancel: CancelToken,
    cancel_on: usize,
    calls: AtomicUsize,
}

impl Transport for CancellingTransport {
    fn send(&self, _batch_index: usize, _payload: &[u8]) -> Result<Response, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.cancel_on {
            self.cancel.cancel();
        }
        Ok(Response::new(200, ""))
    }
}

#[test]
fn cancellation_reports_unstarted_batches_as_cancelled() {
    let cancel = CancelToken::new();
    let transport = CancellingTransport {
        cancel: cancel.clone(),
        cancel_on: 2,
        calls: AtomicUsize::new(0),
    };

    let mut outcomes = run(&transport, batches(5, 2), 1, &cancel);
    outcomes.sort_by_key(|o| o.batch_index);

    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    assert_eq!(outcomes.len(), 5);

    for o in &outcomes[..2] {
        assert!(matches!(o.outcome, Outcome::Success(_)), "{o:?}");
    }
    for o in &outcomes[2..] {
        assert_eq!(o.attempts, 0);
        assert_eq!(
            o.outcome,
            Outcome::Failure(o.outcome.indices(), FailureReason::Cancelled)
        );
    }
}

#[test]
fn cancelled_before_start_sends_nothing() {
    let cancel = CancelToken::new();
    cancel.cancel();

    let transport = GaugeTransport::default();
    let outcomes = run(&transport, batches(4, 1), 2, &cancel);

    assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcomes.len(), 4);
    assert!(
        outcomes
            .iter()
            .all(|o| o.outcome == Outcome::Failure(o.outcome.indices(), FailureReason::Cancelled))
    );
}
