mod aggregate;
mod batcher;
mod cancel;
mod config;
mod dispatcher;
mod error;
mod http;
mod outcome;
mod retry;
mod sync;
mod transport;

pub use aggregate::{Aggregator, RecordFailure, Report};
pub use batcher::{Batch, BatchPlan, Batcher};
pub use cancel::{CancelToken, Watchdog};
pub use config::{BasicAuth, ConfigFileError, ConfigOverrides, SyncConfig};
pub use dispatcher::Dispatcher;
pub use error::{AggregationInvariantError, ConfigurationError, SyncError};
pub use http::{BATCH_INDEX_HEADER, HttpTransport};
pub use outcome::{BatchOutcome, FailureReason, Outcome};
pub use retry::{AttemptEvent, RetryPolicy, RetryState};
pub use sync::{collect_batches, plan, run_sync};
pub use transport::{
    Classified, PermanentTransportError, Response, TransientTransportError, Transport,
    TransportClient, TransportError, classify,
};
