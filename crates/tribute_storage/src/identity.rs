#![forbid(unsafe_code)]

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{info, warn};
use tribute_contracts::ClientId;

use crate::error::StorageError;
use crate::slot::SlotStore;
use crate::CLIENT_ID_SLOT_KEY;

#[derive(Clone)]
pub struct IdentityProvider {
    slots: Arc<dyn SlotStore>,
}

impl IdentityProvider {
    pub fn new(slots: Arc<dyn SlotStore>) -> Self {
        Self { slots }
    }

    /// Stable for the lifetime of the slot store; a blank or invalid stored value is replaced.
    pub fn get_or_create_client_id(&self) -> Result<ClientId, StorageError> {
        if let Some(raw) = self.slots.get(CLIENT_ID_SLOT_KEY)? {
            match ClientId::new(raw) {
                Ok(existing) => return Ok(existing),
                Err(err) => warn!(error = %err, "stored client id unusable, issuing a new one"),
            }
        }
        let fresh = generate_client_id()?;
        self.slots.set(CLIENT_ID_SLOT_KEY, fresh.as_str())?;
        info!(client_id = %fresh, "issued new client id");
        Ok(fresh)
    }
}

fn generate_client_id() -> Result<ClientId, StorageError> {
    Ok(ClientId::new(random_token())?)
}

/// Hyphenated UUID v4 text drawn from the OS RNG.
pub fn random_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .hyphenated()
        .to_string()
}
