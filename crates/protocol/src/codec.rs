use anyhow::{Context, Result};
use recsync_source::Record;

use crate::{BatchAck, BatchRequest, ErrorBody, WIRE_VERSION, WireRecord};

/// Longest failure message taken from a response body.
pub const MAX_ERROR_MESSAGE_LEN: usize = 512;

/// Serialize one batch as the JSON request body.
///
/// Wire format:
///   `{"version":1,"batch_index":n,"records":[{"sequence_index":i,"fields":{...}}]}`
pub fn encode_batch(batch_index: usize, records: &[Record]) -> Result<Vec<u8>> {
    let request = BatchRequest {
        version: WIRE_VERSION,
        batch_index,
        records: records
            .iter()
            .map(|r| WireRecord {
                sequence_index: r.sequence_index(),
                fields: r.to_json_object(),
            })
            .collect(),
    };

    serde_json::to_vec(&request).with_context(|| format!("failed to encode batch {batch_index}"))
}

/// Decode a 2xx response body. Blank bodies carry no acknowledgment.
pub fn decode_ack(body: &[u8]) -> Result<Option<BatchAck>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let ack: BatchAck =
        serde_json::from_slice(body).context("response body is not a batch acknowledgment")?;
    Ok(Some(ack))
}

/// Human-readable reason from a non-2xx body: the `error` field of a JSON
/// body, else the body text, truncated to [`MAX_ERROR_MESSAGE_LEN`] bytes.
pub fn error_message(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        return truncate(parsed.error.trim());
    }

    truncate(String::from_utf8_lossy(body).trim())
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_ERROR_MESSAGE_LEN {
        return text.to_owned();
    }

    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
