#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};
use tribute_contracts::{
    ClientId, ContractViolation, RecordId, TributeDraft, TributeRecord, TributeTimestamp,
};
use tribute_engines::{DeleteOutcome, RemoteStoreError, RemoteTributeStore};
use tribute_storage::identity::random_token;
use tribute_storage::{RecordCache, StorageError};

use crate::render::render_wall;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("tribute not accepted: {0}")]
    Validation(#[from] ContractViolation),
    #[error("a tribute submission is already in flight")]
    SubmissionInFlight,
    #[error("tribute submission failed: {0}")]
    SubmissionFailed(#[source] RemoteStoreError),
    #[error("tribute {id} is not in the local wall")]
    UnknownRecord { id: RecordId },
    #[error("tribute {id} belongs to another client")]
    NotOwner { id: RecordId },
    #[error("local tribute storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// Where the wall is drawn. Implementations only display; they hold no wall state.
pub trait WallView: Send + Sync {
    fn show_wall(&self, markup: &str);
    fn set_submit_enabled(&self, enabled: bool);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWallView;

impl WallView for NoopWallView {
    fn show_wall(&self, _markup: &str) {}
    fn set_submit_enabled(&self, _enabled: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    Remote,
    CacheFallback,
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallSnapshot {
    pub records: Vec<TributeRecord>,
    pub source: SnapshotSource,
    pub markup: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub removed: usize,
    /// `None` when running without a remote store.
    pub remote: Option<DeleteOutcome>,
}

/// Busy flag guarding submission. Not a queue: a second submit while one is in
/// flight is refused.
#[derive(Debug, Default)]
struct SubmitGate {
    busy: AtomicBool,
}

impl SubmitGate {
    fn try_acquire<'a>(&'a self, view: &'a dyn WallView) -> Option<SubmitPermit<'a>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        view.set_submit_enabled(false);
        Some(SubmitPermit { gate: self, view })
    }
}

/// Re-enables submission when dropped, on every exit path.
struct SubmitPermit<'a> {
    gate: &'a SubmitGate,
    view: &'a dyn WallView,
}

impl Drop for SubmitPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
        self.view.set_submit_enabled(true);
    }
}

/// Orchestrates the remote store, the local snapshot and the view.
///
/// Load, submit and delete are independent of one another. A delete that finishes while
/// a load is in flight can be overwritten by that load's snapshot; the last write to the
/// cache wins and the next load replaces everything.
pub struct WallSynchronizer {
    remote: Option<Arc<dyn RemoteTributeStore>>,
    cache: RecordCache,
    client_id: ClientId,
    view: Arc<dyn WallView>,
    submit_gate: SubmitGate,
}

impl WallSynchronizer {
    /// Passing no remote store runs the wall local-only: the cache is the only store.
    pub fn new(
        remote: Option<Arc<dyn RemoteTributeStore>>,
        cache: RecordCache,
        client_id: ClientId,
        view: Arc<dyn WallView>,
    ) -> Self {
        Self {
            remote,
            cache,
            client_id,
            view,
            submit_gate: SubmitGate::default(),
        }
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn is_local_only(&self) -> bool {
        self.remote.is_none()
    }

    pub fn cached_records(&self) -> Vec<TributeRecord> {
        self.cache.load()
    }

    /// Always renders something: the remote list when reachable, the cached snapshot
    /// otherwise.
    pub fn load(&self) -> WallSnapshot {
        let (records, source) = match &self.remote {
            None => (self.cache.load(), SnapshotSource::LocalOnly),
            Some(remote) => match remote.list() {
                Ok(records) => {
                    if let Err(err) = self.cache.save(&records) {
                        warn!(error = %err, "could not refresh tribute cache");
                    }
                    (records, SnapshotSource::Remote)
                }
                Err(err) => {
                    warn!(error = %err, "remote tribute list failed, showing cached wall");
                    (self.cache.load(), SnapshotSource::CacheFallback)
                }
            },
        };
        info!(count = records.len(), source = ?source, "tribute wall loaded");
        let markup = self.render(&records);
        WallSnapshot {
            records,
            source,
            markup,
        }
    }

    /// The cache only ever gains a record the remote store accepted.
    pub fn submit(
        &self,
        name: &str,
        relation: &str,
        message: &str,
    ) -> Result<TributeRecord, SyncError> {
        let draft = TributeDraft::v1(name, relation, message)?;
        let _permit = self
            .submit_gate
            .try_acquire(&*self.view)
            .ok_or(SyncError::SubmissionInFlight)?;

        let payload = draft.into_payload(&self.client_id, TributeTimestamp::now());
        let id = match &self.remote {
            Some(remote) => remote.create(&payload).map_err(|err| {
                warn!(error = %err, "tribute submission failed");
                SyncError::SubmissionFailed(err)
            })?,
            None => RecordId::Text(format!("local-{}", random_token())),
        };

        let record = TributeRecord::from_payload(id, payload);
        let mut records = self.cache.load();
        records.push(record.clone());
        self.cache.save(&records)?;
        self.render(&records);
        info!(record_id = ?record.id, "tribute posted");
        Ok(record)
    }

    /// Local removal happens whatever the remote store answers.
    pub fn delete(&self, id: &RecordId) -> Result<DeleteReport, SyncError> {
        let mut records = self.cache.load();
        let Some(target) = records.iter().find(|r| r.has_id(id)) else {
            return Err(SyncError::UnknownRecord { id: id.clone() });
        };
        if !target.is_owned_by(&self.client_id) {
            return Err(SyncError::NotOwner { id: id.clone() });
        }

        // The remote gets the id as stored, not as typed.
        let stored_id = target.id.clone().unwrap_or_else(|| id.clone());
        let remote = self
            .remote
            .as_ref()
            .map(|remote| remote.delete(&stored_id, &self.client_id));

        let before = records.len();
        records.retain(|r| !r.has_id(id));
        self.cache.save(&records)?;
        self.render(&records);
        let removed = before - records.len();
        info!(record_id = %id, removed, "tribute deleted locally");
        Ok(DeleteReport { removed, remote })
    }

    /// Drops the local snapshot only; the remote store is untouched.
    pub fn clear_local(&self) -> Result<WallSnapshot, SyncError> {
        self.cache.clear()?;
        let markup = self.render(&[]);
        info!("local tribute snapshot cleared");
        Ok(WallSnapshot {
            records: Vec::new(),
            source: SnapshotSource::LocalOnly,
            markup,
        })
    }

    fn render(&self, records: &[TributeRecord]) -> String {
        let markup = render_wall(records, Some(&self.client_id));
        self.view.show_wall(&markup);
        markup
    }
}
