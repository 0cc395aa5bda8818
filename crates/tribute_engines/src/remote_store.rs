#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};
use tribute_contracts::{
    ClientId, DeleteTributePayload, NewTributePayload, RecordId, TributeRecord,
};

use crate::envelope::{classify_envelope, records_from_values, RemoteEnvelope};

pub const REMOTE_TIMEOUT_MS_DEFAULT: u64 = 10_000;
const REASON_MAX_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteStoreError {
    #[error("remote store unreachable ({kind}): {detail}")]
    Network { kind: &'static str, detail: String },
    #[error("remote store response malformed: {0}")]
    MalformedResponse(String),
    #[error("remote store rejected request{}: {reason}", http_status_suffix(.http_status))]
    Rejected {
        http_status: Option<u16>,
        reason: String,
    },
}

impl RemoteStoreError {
    fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse(bounded_reason(detail.into()))
    }

    fn rejected(http_status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            http_status,
            reason: bounded_reason(reason.into()),
        }
    }
}

/// Result of a best-effort delete. Never blocks the local removal that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Confirmed,
    Unconfirmed(RemoteStoreError),
}

impl DeleteOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

/// The remote system of record.
pub trait RemoteTributeStore: Send + Sync {
    fn list(&self) -> Result<Vec<TributeRecord>, RemoteStoreError>;
    fn create(&self, payload: &NewTributePayload) -> Result<RecordId, RemoteStoreError>;
    fn delete(&self, id: &RecordId, owner: &ClientId) -> DeleteOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTributeStoreConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl HttpTributeStoreConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim().to_string(),
            timeout_ms: REMOTE_TIMEOUT_MS_DEFAULT,
            user_agent: format!("tribute-wall/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// `None` when no endpoint is configured, which means local-only operation.
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("TRIBUTE_REMOTE_ENDPOINT").ok()?;
        let endpoint = endpoint.trim().to_string();
        if endpoint.is_empty() {
            return None;
        }
        let mut config = Self::new(endpoint);
        config.timeout_ms = http_timeout_ms_from_env();
        Some(config)
    }
}

pub fn http_timeout_ms_from_env() -> u64 {
    env::var("TRIBUTE_HTTP_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| (100..=120_000).contains(v))
        .unwrap_or(REMOTE_TIMEOUT_MS_DEFAULT)
}

pub struct HttpTributeStore {
    config: HttpTributeStoreConfig,
    agent: ureq::Agent,
}

impl HttpTributeStore {
    pub fn new(config: HttpTributeStoreConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms.max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(&config.user_agent)
            .build();
        Self { config, agent }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn post_json<T: serde::Serialize>(&self, payload: &T) -> Result<Value, RemoteStoreError> {
        let response = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .send_json(payload)
            .map_err(remote_error_from_ureq)?;
        read_json_body(response)
    }
}

impl RemoteTributeStore for HttpTributeStore {
    fn list(&self) -> Result<Vec<TributeRecord>, RemoteStoreError> {
        let response = self
            .agent
            .get(&self.config.endpoint)
            .set("Accept", "application/json")
            .call()
            .map_err(remote_error_from_ureq)?;
        let body = read_json_body(response)?;
        match classify_envelope(&body) {
            RemoteEnvelope::Records(items) => {
                let records = records_from_values(items);
                debug!(count = records.len(), "remote tribute list fetched");
                Ok(records)
            }
            RemoteEnvelope::Failure { status, message } => Err(RemoteStoreError::rejected(
                None,
                failure_reason(status, message),
            )),
            other => Err(RemoteStoreError::malformed(format!(
                "expected a record list, got {}",
                envelope_label(&other)
            ))),
        }
    }

    fn create(&self, payload: &NewTributePayload) -> Result<RecordId, RemoteStoreError> {
        let body = self.post_json(payload)?;
        match classify_envelope(&body) {
            RemoteEnvelope::Created { id: Some(id) } => {
                info!(record_id = %id, "remote tribute created");
                Ok(id)
            }
            RemoteEnvelope::Created { id: None } => Err(RemoteStoreError::malformed(
                "success reported without a record id",
            )),
            RemoteEnvelope::Failure { status, message } => Err(RemoteStoreError::rejected(
                None,
                failure_reason(status, message),
            )),
            other => Err(RemoteStoreError::rejected(
                None,
                format!("no success reported ({})", envelope_label(&other)),
            )),
        }
    }

    fn delete(&self, id: &RecordId, owner: &ClientId) -> DeleteOutcome {
        let payload = DeleteTributePayload {
            delete_id: id.clone(),
            uuid: owner.as_str().to_string(),
        };
        let outcome = match self.post_json(&payload) {
            Ok(body) => match classify_envelope(&body) {
                RemoteEnvelope::Deleted | RemoteEnvelope::Created { .. } => {
                    DeleteOutcome::Confirmed
                }
                RemoteEnvelope::Failure { status, message } => DeleteOutcome::Unconfirmed(
                    RemoteStoreError::rejected(None, failure_reason(status, message)),
                ),
                other => DeleteOutcome::Unconfirmed(RemoteStoreError::malformed(format!(
                    "expected a delete ack, got {}",
                    envelope_label(&other)
                ))),
            },
            Err(err) => DeleteOutcome::Unconfirmed(err),
        };
        match &outcome {
            DeleteOutcome::Confirmed => info!(record_id = %id, "remote tribute deleted"),
            DeleteOutcome::Unconfirmed(err) => {
                warn!(record_id = %id, error = %err, "remote tribute delete not confirmed")
            }
        }
        outcome
    }
}

fn read_json_body(response: ureq::Response) -> Result<Value, RemoteStoreError> {
    let raw = response.into_string().map_err(|err| RemoteStoreError::Network {
        kind: "body_read",
        detail: bounded_reason(err.to_string()),
    })?;
    serde_json::from_str::<Value>(&raw)
        .map_err(|err| RemoteStoreError::malformed(format!("body is not json: {err}")))
}

fn remote_error_from_ureq(err: ureq::Error) -> RemoteStoreError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            RemoteStoreError::rejected(Some(code), format!("http status {code}: {}", body.trim()))
        }
        ureq::Error::Transport(transport) => {
            let detail = transport.to_string();
            let combined = format!("{:?} {}", transport.kind(), detail);
            RemoteStoreError::Network {
                kind: classify_transport_error_kind(&combined),
                detail: bounded_reason(detail),
            }
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

fn http_status_suffix(http_status: &Option<u16>) -> String {
    http_status
        .map(|s| format!(" (http {s})"))
        .unwrap_or_default()
}

fn failure_reason(status: Option<String>, message: Option<String>) -> String {
    match (status, message) {
        (_, Some(message)) => message,
        (Some(status), None) => format!("status {status}"),
        (None, None) => "no reason given".to_string(),
    }
}

fn envelope_label(envelope: &RemoteEnvelope) -> &'static str {
    match envelope {
        RemoteEnvelope::Records(_) => "record list",
        RemoteEnvelope::Created { .. } => "create ack",
        RemoteEnvelope::Deleted => "delete ack",
        RemoteEnvelope::Failure { .. } => "failure",
        RemoteEnvelope::Unrecognized => "unrecognized body",
    }
}

fn bounded_reason(msg: String) -> String {
    if msg.chars().count() > REASON_MAX_CHARS {
        msg.chars().take(REASON_MAX_CHARS).collect()
    } else {
        msg
    }
}
