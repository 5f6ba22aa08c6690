use super::*;
use recsync_source::{Record, Value};
use std::sync::Mutex;

/// Replies from a script, one entry per call; the last entry repeats.
struct ScriptedTransport {
    script: Vec<Result<Response, TransportError>>,
    calls: AtomicU64,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Result<Response, TransportError>>) -> Self {
        Self {
            script,
            calls: AtomicU64::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, _batch_index: usize, payload: &[u8]) -> Result<Response, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
        self.payloads.lock().unwrap().push(payload.to_vec());
        self.script[call.min(self.script.len() - 1)].clone()
    }
}

fn batch(batch_index: usize, indices: std::ops::Range<usize>) -> Batch {
    Batch::new(
        batch_index,
        indices
            .map(|i| Record::new(i, vec![("id".into(), Value::Int(i as i64))]))
            .collect(),
    )
}

fn deliver(transport: &ScriptedTransport, max_retries: u32) -> BatchOutcome {
    let client = TransportClient::new(transport, RetryPolicy::immediate(max_retries));
    let outcome = client.deliver(&batch(1, 3..6), &CancelToken::new());
    assert_eq!(client.attempts(), transport.calls());
    outcome
}

#[test]
fn classify_by_status_and_error() {
    let transient = |r: Result<Response, TransportError>| {
        matches!(classify(r), Classified::Transient(_))
    };
    let permanent = |r: Result<Response, TransportError>| {
        matches!(classify(r), Classified::Permanent(_))
    };

    assert!(transient(Err(TransportError::Timeout)));
    assert!(transient(Err(TransportError::Connection("reset".into()))));
    assert!(permanent(Err(TransportError::Request("bad url".into()))));

    for status in [429, 500, 502, 503, 504, 599] {
        assert!(transient(Ok(Response::new(status, ""))), "{status}");
    }
    for status in [301, 400, 401, 403, 404, 409, 422] {
        assert!(permanent(Ok(Response::new(status, ""))), "{status}");
    }
    for status in [200, 201, 202, 204] {
        assert_eq!(
            classify(Ok(Response::new(status, ""))),
            Classified::Delivered(None)
        );
    }
}

#[test]
fn classify_carries_the_decoded_ack() {
    let body = r#"{"results":[{"sequence_index":4,"ok":false,"error":"dup"}]}"#;
    let expected = BatchAck {
        results: vec![recsync_protocol::RecordAck {
            sequence_index: 4,
            ok: false,
            error: Some("dup".into()),
        }],
    };

    assert_eq!(
        classify(Ok(Response::new(200, body))),
        Classified::Delivered(Some(expected))
    );
}

#[test]
fn classify_keeps_retry_after_and_body_message() {
    let mut busy = Response::new(503, r#"{"error": "overloaded"}"#);
    busy.retry_after = Some(Duration::from_secs(2));

    assert_eq!(
        classify(Ok(busy)),
        Classified::Transient(TransientTransportError {
            message: "HTTP 503: overloaded".into(),
            retry_after: Some(Duration::from_secs(2)),
        })
    );

    assert_eq!(
        classify(Ok(Response::new(404, ""))),
        Classified::Permanent(PermanentTransportError {
            reason: FailureReason::Permanent {
                status: Some(404),
                message: "status 404".into()
            }
        })
    );
}

#[test]
fn undecodable_success_body_is_malformed() {
    let classified = classify(Ok(Response::new(200, "<html/>")));
    assert!(matches!(
        classified,
        Classified::Permanent(PermanentTransportError {
            reason: FailureReason::Malformed { .. }
        })
    ));
}

#[test]
fn always_transient_exhausts_exactly_r_attempts() {
    for r in 1..=5 {
        let transport = ScriptedTransport::new(vec![Ok(Response::new(503, "busy"))]);
        let outcome = deliver(&transport, r);

        assert_eq!(transport.calls(), r as u64, "R={r}");
        assert_eq!(outcome.attempts, r);
        assert_eq!(
            outcome.outcome,
            Outcome::Failure(
                vec![3, 4, 5],
                FailureReason::RetriesExhausted {
                    attempts: r,
                    last_error: "HTTP 503: busy".into()
                }
            )
        );
    }
}

#[test]
fn permanent_failure_makes_one_attempt() {
    let transport = ScriptedTransport::new(vec![Ok(Response::new(400, "bad schema"))]);
    let outcome = deliver(&transport, 5);

    assert_eq!(transport.calls(), 1);
    assert_eq!(
        outcome.outcome,
        Outcome::Failure(
            vec![3, 4, 5],
            FailureReason::Permanent {
                status: Some(400),
                message: "bad schema".into()
            }
        )
    );
}

#[test]
fn transient_then_success() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::Timeout),
        Ok(Response::new(429, "")),
        Ok(Response::new(200, "")),
    ]);
    let outcome = deliver(&transport, 3);

    assert_eq!(transport.calls(), 3);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.outcome, Outcome::Success(vec![3, 4, 5]));
}

#[test]
fn every_attempt_resends_the_same_payload() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::Connection("reset".into())),
        Ok(Response::new(204, "")),
    ]);
    deliver(&transport, 3);

    let payloads = transport.payloads.lock().unwrap();
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0], payloads[1]);

    let json: serde_json::Value = serde_json::from_slice(&payloads[0]).unwrap();
    assert_eq!(json["batch_index"], 1);
    assert_eq!(json["records"].as_array().unwrap().len(), 3);
}

#[test]
fn per_record_acknowledgment_yields_partial_failure() {
    let body = r#"{"results": [
        {"sequence_index": 3, "ok": true},
        {"sequence_index": 4, "ok": false, "error": "duplicate id"},
        {"sequence_index": 5, "ok": true}
    ]}"#;
    let transport = ScriptedTransport::new(vec![Ok(Response::new(200, body))]);
    let outcome = deliver(&transport, 3);

    assert_eq!(
        outcome.outcome,
        Outcome::PartialFailure {
            succeeded: vec![3, 5],
            failed: vec![(
                4,
                FailureReason::Rejected {
                    message: "duplicate id".into()
                }
            )],
        }
    );
}

#[test]
fn all_ok_acknowledgment_is_success() {
    let body = r#"{"results": [
        {"sequence_index": 3, "ok": true},
        {"sequence_index": 4, "ok": true},
        {"sequence_index": 5, "ok": true}
    ]}"#;
    let transport = ScriptedTransport::new(vec![Ok(Response::new(200, body))]);
    assert_eq!(deliver(&transport, 1).outcome, Outcome::Success(vec![3, 4, 5]));
}

#[test]
fn cancel_during_backoff_stops_retrying() {
    let transport = ScriptedTransport::new(vec![Ok(Response::new(500, ""))]);
    let policy = RetryPolicy::new(10, Duration::from_secs(30), Duration::from_secs(30));
    let client = TransportClient::new(&transport, policy);

    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        remote.cancel();
    });

    let outcome = client.deliver(&batch(0, 0..2), &cancel);
    canceller.join().unwrap();

    // The first backoff may be as short as zero under full jitter, so one or
    // a few attempts can land before the cancel does.
    assert!(outcome.attempts >= 1 && outcome.attempts < 10);
    assert_eq!(
        outcome.outcome,
        Outcome::Failure(vec![0, 1], FailureReason::Cancelled)
    );
}
