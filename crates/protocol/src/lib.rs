pub mod codec;

use serde::{Deserialize, Serialize};

/// Version of the request envelope. Bumped on any incompatible change.
pub const WIRE_VERSION: u32 = 1;

/// Body of one `POST` to the endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub version: u32,
    pub batch_index: usize,
    pub records: Vec<WireRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub sequence_index: usize,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Optional per-record acknowledgment in a 2xx response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAck {
    #[serde(default)]
    pub results: Vec<RecordAck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordAck {
    pub sequence_index: usize,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error body some servers send with non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Per-record verdicts for one batch, in batch order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AckResolution {
    pub succeeded: Vec<usize>,
    pub failed: Vec<(usize, String)>,
}

pub const NOT_ACKNOWLEDGED: &str = "not acknowledged";

impl BatchAck {
    /// Attribute the acknowledgment to the records that were sent.
    ///
    /// An empty `results` list acknowledges everything. Otherwise records
    /// the server did not mention are rejected, entries for records that
    /// were not sent are ignored, and the first entry per record wins.
    pub fn resolve(&self, sent: &[usize]) -> AckResolution {
        if self.results.is_empty() {
            return AckResolution {
                succeeded: sent.to_vec(),
                failed: Vec::new(),
            };
        }

        let mut resolution = AckResolution::default();
        for &index in sent {
            match self.results.iter().find(|r| r.sequence_index == index) {
                Some(ack) if ack.ok => resolution.succeeded.push(index),
                Some(ack) => resolution.failed.push((
                    index,
                    ack.error.clone().unwrap_or_else(|| "rejected".to_owned()),
                )),
                None => resolution
                    .failed
                    .push((index, NOT_ACKNOWLEDGED.to_owned())),
            }
        }
        resolution
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
