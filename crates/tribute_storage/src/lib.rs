#![forbid(unsafe_code)]

pub mod error;
pub mod identity;
pub mod record_cache;
pub mod slot;

pub use error::StorageError;
pub use identity::IdentityProvider;
pub use record_cache::RecordCache;
pub use slot::{FileSlotStore, MemorySlotStore, SlotStore};

/// Slot holding the last-known tribute snapshot.
pub const RECORDS_SLOT_KEY: &str = "tributes_v1";
/// Slot holding this profile's client identity.
pub const CLIENT_ID_SLOT_KEY: &str = "tribute_client_id";
