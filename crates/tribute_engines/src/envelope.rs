#![forbid(unsafe_code)]

//! Classification of whatever the remote sheet endpoint sends back.
//!
//! The endpoint is third-party and its schema drifts, so nothing here trusts a field
//! before checking its shape.

use serde_json::{Map, Value};
use tracing::warn;
use tribute_contracts::{RecordId, TributeRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEnvelope {
    Records(Vec<Value>),
    Created { id: Option<RecordId> },
    Deleted,
    Failure {
        status: Option<String>,
        message: Option<String>,
    },
    Unrecognized,
}

pub fn classify_envelope(body: &Value) -> RemoteEnvelope {
    match body {
        Value::Array(items) => RemoteEnvelope::Records(items.clone()),
        Value::Object(map) => classify_object(map),
        _ => RemoteEnvelope::Unrecognized,
    }
}

fn classify_object(map: &Map<String, Value>) -> RemoteEnvelope {
    let status = map
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_ascii_lowercase());

    if let Some(status) = status.as_deref() {
        if matches!(status, "error" | "fail" | "failed" | "failure") {
            return RemoteEnvelope::Failure {
                status: Some(status.to_string()),
                message: failure_message(map),
            };
        }
    }
    // Acks take precedence over any payload array sent alongside them.
    match status.as_deref() {
        Some("deleted") => return RemoteEnvelope::Deleted,
        Some("success") | Some("ok") => {
            if let Some(id) = created_id(map) {
                return RemoteEnvelope::Created { id: Some(id) };
            }
        }
        _ => {}
    }
    if let Some(items) = map
        .get("data")
        .or_else(|| map.get("records"))
        .and_then(Value::as_array)
    {
        return RemoteEnvelope::Records(items.clone());
    }
    match status.as_deref() {
        Some("success") | Some("ok") => RemoteEnvelope::Created { id: None },
        Some(other) => RemoteEnvelope::Failure {
            status: Some(other.to_string()),
            message: failure_message(map),
        },
        None => RemoteEnvelope::Unrecognized,
    }
}

fn created_id(map: &Map<String, Value>) -> Option<RecordId> {
    map.get("id")
        .and_then(|v| serde_json::from_value::<Option<RecordId>>(v.clone()).ok())
        .flatten()
}

fn failure_message(map: &Map<String, Value>) -> Option<String> {
    map.get("message")
        .or_else(|| map.get("error"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Entries that cannot be read as records are dropped, not fatal.
pub fn records_from_values(items: Vec<Value>) -> Vec<TributeRecord> {
    let total = items.len();
    let records: Vec<TributeRecord> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            if !item.is_object() {
                warn!(index, "skipping non-object tribute entry");
                return None;
            }
            match serde_json::from_value::<TributeRecord>(item) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(index, error = %err, "skipping unreadable tribute entry");
                    None
                }
            }
        })
        .collect();
    if records.len() != total {
        warn!(
            kept = records.len(),
            total, "remote tribute list contained unreadable entries"
        );
    }
    records
}
