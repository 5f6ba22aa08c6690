use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use log::{debug, info, warn};
use rand::Rng;
use recsync_protocol::{
    BatchAck,
    codec::{decode_ack, encode_batch, error_message},
};
use thiserror::Error;

use crate::{
    batcher::Batch,
    cancel::CancelToken,
    outcome::{BatchOutcome, FailureReason, Outcome},
    retry::{AttemptEvent, RetryPolicy, RetryState},
};

/// Raw reply to one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Parsed `Retry-After` header, seconds form only.
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.into(),
        }
    }
}

/// Failure below HTTP: nothing usable came back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("attempt timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    /// The request itself could not be built or sent; retrying won't help.
    #[error("invalid request: {0}")]
    Request(String),
}

/// Sends one encoded batch per call. Exactly one network exchange per call.
pub trait Transport: Send + Sync {
    fn send(&self, batch_index: usize, payload: &[u8]) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, batch_index: usize, payload: &[u8]) -> Result<Response, TransportError> {
        (**self).send(batch_index, payload)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, batch_index: usize, payload: &[u8]) -> Result<Response, TransportError> {
        (**self).send(batch_index, payload)
    }
}

/// Worth another attempt: timeouts, connection failures, 429 and 5xx.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransientTransportError {
    pub message: String,
    pub retry_after: Option<Duration>,
}

/// Not worth another attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PermanentTransportError {
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// 2xx, with the acknowledgment if the body carried one.
    Delivered(Option<BatchAck>),
    Transient(TransientTransportError),
    Permanent(PermanentTransportError),
}

pub fn classify(result: Result<Response, TransportError>) -> Classified {
    let response = match result {
        Ok(response) => response,
        Err(e @ (TransportError::Timeout | TransportError::Connection(_))) => {
            return Classified::Transient(TransientTransportError {
                message: e.to_string(),
                retry_after: None,
            });
        }
        Err(TransportError::Request(message)) => {
            return Classified::Permanent(PermanentTransportError {
                reason: FailureReason::Permanent {
                    status: None,
                    message,
                },
            });
        }
    };

    let status = response.status;
    match status {
        200..=299 => match decode_ack(&response.body) {
            Ok(ack) => Classified::Delivered(ack),
            Err(e) => Classified::Permanent(PermanentTransportError {
                reason: FailureReason::Malformed {
                    message: format!("{e:#}"),
                },
            }),
        },
        429 | 500..=599 => Classified::Transient(TransientTransportError {
            message: format!("HTTP {status}: {}", status_message(&response)),
            retry_after: response.retry_after,
        }),
        _ => Classified::Permanent(PermanentTransportError {
            reason: FailureReason::Permanent {
                status: Some(status),
                message: status_message(&response),
            },
        }),
    }
}

fn status_message(response: &Response) -> String {
    let message = error_message(&response.body);
    if message.is_empty() {
        format!("status {}", response.status)
    } else {
        message
    }
}

/// Delivers batches through a [`Transport`], retrying transient failures.
pub struct TransportClient<T> {
    transport: T,
    policy: RetryPolicy,
    attempts: AtomicU64,
}

impl<T: Transport> TransportClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            attempts: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Network calls made so far, across all batches.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Run the attempt loop for one batch until it reaches a terminal state.
    ///
    /// A cancelled run stops a batch that is waiting out a backoff; an
    /// attempt already on the wire is allowed to finish.
    pub fn deliver(&self, batch: &Batch, cancel: &CancelToken) -> BatchOutcome {
        let batch_index = batch.batch_index();
        let indices = batch.sequence_indices();

        let payload = match encode_batch(batch_index, batch.records()) {
            Ok(payload) => payload,
            Err(e) => {
                return BatchOutcome {
                    batch_index,
                    attempts: 0,
                    outcome: Outcome::Failure(
                        indices,
                        FailureReason::Permanent {
                            status: None,
                            message: format!("{e:#}"),
                        },
                    ),
                };
            }
        };

        let mut rng = rand::rng();
        let mut ack = None;
        let mut state = RetryState::start();

        loop {
            match state {
                RetryState::Attempting { attempt } => {
                    self.attempts.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        "[transport] batch {batch_index} attempt {attempt}/{}",
                        self.policy.max_attempts()
                    );

                    let event = match classify(self.transport.send(batch_index, &payload)) {
                        Classified::Delivered(body) => {
                            ack = body;
                            AttemptEvent::Delivered
                        }
                        Classified::Transient(e) => {
                            warn!("[transport] batch {batch_index} attempt {attempt} failed: {e}");
                            AttemptEvent::Transient {
                                error: e.message,
                                retry_after: e.retry_after,
                            }
                        }
                        Classified::Permanent(e) => {
                            warn!("[transport] batch {batch_index} rejected: {e}");
                            AttemptEvent::Permanent(e.reason)
                        }
                    };

                    state = state.on_event(event, &self.policy, rng.random::<f64>());
                }
                RetryState::Backoff { delay, .. } => {
                    debug!("[transport] batch {batch_index} backing off for {delay:?}");
                    state = if cancel.sleep(delay) {
                        state.resume()
                    } else {
                        state.cancel()
                    };
                }
                RetryState::Delivered { attempts } => {
                    info!("[transport] batch {batch_index} delivered after {attempts} attempt(s)");
                    return BatchOutcome {
                        batch_index,
                        attempts,
                        outcome: resolve_delivery(indices, ack.as_ref()),
                    };
                }
                RetryState::GaveUp { attempts, reason } => {
                    return BatchOutcome {
                        batch_index,
                        attempts,
                        outcome: Outcome::Failure(indices, reason),
                    };
                }
            }
        }
    }
}

/// Turn a 2xx reply into an outcome using its acknowledgment, if any.
fn resolve_delivery(indices: Vec<usize>, ack: Option<&BatchAck>) -> Outcome {
    let Some(ack) = ack else {
        return Outcome::Success(indices);
    };

    let resolution = ack.resolve(&indices);
    if resolution.failed.is_empty() {
        return Outcome::Success(resolution.succeeded);
    }

    Outcome::PartialFailure {
        succeeded: resolution.succeeded,
        failed: resolution
            .failed
            .into_iter()
            .map(|(index, message)| (index, FailureReason::Rejected { message }))
            .collect(),
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
