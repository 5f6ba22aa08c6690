use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use log::trace;
use recsync_runtime::user_agent;
use ureq::Agent;

use crate::{
    config::SyncConfig,
    transport::{Response, Transport, TransportError},
};

/// Header naming the batch a request carries.
pub const BATCH_INDEX_HEADER: &str = "X-Batch-Index";

/// Blocking HTTP transport: one `POST` of the JSON batch per attempt.
pub struct HttpTransport {
    agent: Agent,
    endpoint: String,
    authorization: Option<String>,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &SyncConfig) -> Self {
        // Status codes are classified by the caller, so they must not
        // surface as errors here.
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            endpoint: config.endpoint.clone(),
            authorization: authorization(config),
            user_agent: user_agent(),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, batch_index: usize, payload: &[u8]) -> Result<Response, TransportError> {
        let mut request = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("User-Agent", &self.user_agent)
            .header(BATCH_INDEX_HEADER, batch_index.to_string());

        if let Some(value) = &self.authorization {
            request = request.header("Authorization", value);
        }

        let mut response = request.send(payload).map_err(map_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.body_mut().read_to_vec().map_err(map_error)?;

        trace!(
            "[transport] batch {batch_index}: HTTP {status}, {} byte body",
            body.len()
        );

        Ok(Response {
            status,
            retry_after,
            body,
        })
    }
}

fn authorization(config: &SyncConfig) -> Option<String> {
    if let Some(token) = &config.token {
        return Some(format!("Bearer {token}"));
    }
    config.basic_auth.as_ref().map(|auth| {
        let credentials = STANDARD.encode(format!("{}:{}", auth.user, auth.password));
        format!("Basic {credentials}")
    })
}

/// Seconds form of `Retry-After`. The HTTP-date form is ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn map_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::Io(e) => TransportError::Connection(e.to_string()),
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => {
            TransportError::Connection(err.to_string())
        }
        ureq::Error::Protocol(_) => TransportError::Connection(err.to_string()),
        other => TransportError::Request(other.to_string()),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
