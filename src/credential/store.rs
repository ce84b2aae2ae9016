use std::sync::{Arc, RwLock};

use tracing::{debug, error, info};

use crate::credential::slot::{CredentialSlot, MemorySlot};
use crate::credential::token::Credential;
use crate::helpers::time::now_i64;
use crate::observability::metrics::get_metrics;

static SAVE_OP: &str = "save";
static REMOVE_OP: &str = "remove";
static LOAD_OP: &str = "load";

/// Single source of truth for the live credential.
///
/// The in-memory value is authoritative; every write is mirrored to the
/// persisted slot on a best-effort basis.
pub struct CredentialStore {
    current: RwLock<Option<Credential>>,
    slot: Arc<dyn CredentialSlot>,
    safety_margin_seconds: u64,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("present", &self.get().is_some())
            .field("safety_margin_seconds", &self.safety_margin_seconds)
            .finish()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl CredentialStore {
    pub fn in_memory() -> Self {
        Self::with_slot(Arc::new(MemorySlot::new()))
    }

    /// Seed the store from whatever the slot currently holds.
    pub fn with_slot(slot: Arc<dyn CredentialSlot>) -> Self {
        let current = match slot.load() {
            Ok(raw) => raw.map(Credential::parse),
            Err(err) => {
                error!("loading credential slot failed: {:#}", err);
                get_metrics().credential_slot_failures.with_label_values(&[LOAD_OP]).inc();
                None
            }
        };
        info!(present = current.is_some(), "credential store initialized");
        Self {
            current: RwLock::new(current),
            slot,
            safety_margin_seconds: 0,
        }
    }

    pub fn with_safety_margin(mut self, safety_margin_seconds: u64) -> Self {
        self.safety_margin_seconds = safety_margin_seconds;
        self
    }

    pub fn get(&self) -> Option<Credential> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the stored credential as a whole.
    pub fn set(&self, credential: Credential) {
        self.persist(Some(&credential));
        self.replace(Some(credential));
    }

    pub fn clear(&self) {
        self.persist(None);
        self.replace(None);
    }

    /// Mirror a value to the slot only. Blocking I/O for file slots.
    pub(crate) fn persist(&self, credential: Option<&Credential>) {
        match credential {
            Some(credential) => {
                if let Err(err) = self.slot.save(&credential.raw_value) {
                    error!("persisting credential failed: {:#}", err);
                    get_metrics().credential_slot_failures.with_label_values(&[SAVE_OP]).inc();
                }
            }
            None => {
                if let Err(err) = self.slot.remove() {
                    error!("removing persisted credential failed: {:#}", err);
                    get_metrics().credential_slot_failures.with_label_values(&[REMOVE_OP]).inc();
                }
            }
        }
    }

    /// Swap the in-memory value only; never touches the slot.
    pub(crate) fn replace(&self, credential: Option<Credential>) {
        debug!(present = credential.is_some(), expires_at = ?credential.as_ref().and_then(|c| c.expires_at), "credential replaced");
        match self.current.write() {
            Ok(mut guard) => *guard = credential,
            Err(poisoned) => *poisoned.into_inner() = credential,
        }
    }

    /// Expiry check against the wall clock. Undecodable expiry counts as expired.
    pub fn is_expired(&self, credential: &Credential) -> bool {
        credential.is_expired_at(now_i64(), self.safety_margin_seconds)
    }
}
