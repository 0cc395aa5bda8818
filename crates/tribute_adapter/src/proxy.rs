#![forbid(unsafe_code)]

use std::io::Read;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ProxyConfig;

pub const MAX_UPSTREAM_BODY_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("upstream unreachable: {0}")]
    Transport(String),
    #[error("upstream body unreadable: {0}")]
    Body(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Blocking relay to the configured upstream. Callers on an async runtime run
/// `forward` on a blocking thread.
#[derive(Debug)]
pub struct ForwardingProxy {
    target_url: String,
    agent: ureq::Agent,
}

impl ForwardingProxy {
    pub fn new(config: &ProxyConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self {
            target_url: config.target_url.clone(),
            agent,
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Upstream error statuses are relayed as replies, not errors; only a failed
    /// exchange is an `Err`.
    pub fn forward(&self, method: &str, body: &[u8]) -> Result<UpstreamReply, ProxyError> {
        let request = self
            .agent
            .request(method, &self.target_url)
            .set("Content-Type", "application/json");
        let result = if forwards_body(method) {
            request.send_bytes(body)
        } else {
            request.call()
        };
        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(transport)) => {
                warn!(method, error = %transport, "upstream exchange failed");
                return Err(ProxyError::Transport(transport.to_string()));
            }
        };
        let status = response.status();
        let body = read_bounded(response.into_reader(), MAX_UPSTREAM_BODY_BYTES)?;
        debug!(method, status, bytes = body.len(), "upstream replied");
        Ok(UpstreamReply { status, body })
    }
}

/// A body over `limit` is an error, never a truncated relay.
fn read_bounded(reader: impl Read, limit: u64) -> Result<Vec<u8>, ProxyError> {
    let mut buf = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|err| ProxyError::Body(err.to_string()))?;
    if buf.len() as u64 > limit {
        return Err(ProxyError::Body(format!(
            "upstream body exceeds {limit} bytes"
        )));
    }
    Ok(buf)
}

fn forwards_body(method: &str) -> bool {
    !matches!(method, "GET" | "HEAD")
}
