#![forbid(unsafe_code)]

use std::sync::Arc;

use tracing::{debug, warn};
use tribute_contracts::TributeRecord;

use crate::error::StorageError;
use crate::slot::SlotStore;
use crate::RECORDS_SLOT_KEY;

/// Local snapshot of the remote wall. Never authoritative; a successful list
/// fetch overwrites it wholesale.
#[derive(Clone)]
pub struct RecordCache {
    slots: Arc<dyn SlotStore>,
}

impl RecordCache {
    pub fn new(slots: Arc<dyn SlotStore>) -> Self {
        Self { slots }
    }

    /// Missing or unreadable snapshots read as empty.
    pub fn load(&self) -> Vec<TributeRecord> {
        let raw = match self.slots.get(RECORDS_SLOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "tribute cache read failed, treating as empty");
                return Vec::new();
            }
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<Vec<TributeRecord>>(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "tribute cache snapshot unparseable, treating as empty");
                Vec::new()
            }
        }
    }

    pub fn save(&self, records: &[TributeRecord]) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(records)?;
        self.slots.set(RECORDS_SLOT_KEY, &serialized)?;
        debug!(count = records.len(), "tribute cache saved");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        let removed = self.slots.remove(RECORDS_SLOT_KEY)?;
        debug!(removed, "tribute cache cleared");
        Ok(())
    }
}
