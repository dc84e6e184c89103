use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::store::{SessionKey, SessionStore};

/// Who the current session speaks as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// Anonymous session. The id is assigned by the backend on the first
    /// guest send and is absent until then.
    Guest { guest_id: Option<String> },
    Authenticated { token: String },
}

impl Identity {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated { .. })
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Identity::Authenticated { token } => Some(token),
            Identity::Guest { .. } => None,
        }
    }
}

/// How the client was started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LaunchKind {
    #[default]
    Navigate,
    /// A hard reload. Always starts a fresh guest conversation.
    Reload,
}

/// Reads and updates the persisted identity.
///
/// Store failures are logged and read as "absent", so a broken store degrades
/// to a fresh guest session instead of failing sends.
pub struct IdentityResolver<S> {
    store: Arc<S>,
}

impl<S> Clone for IdentityResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SessionStore> IdentityResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn read(&self, key: SessionKey) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value.filter(|v| !v.trim().is_empty()),
            Err(e) => {
                warn!(key = key.as_str(), error = %e, "Failed to read session store");
                None
            }
        }
    }

    fn clear(&self, key: SessionKey) {
        if let Err(e) = self.store.clear(key) {
            warn!(key = key.as_str(), error = %e, "Failed to clear session store");
        }
    }

    /// Applies launch-time rules. A reload purges the stored guest id.
    pub fn on_launch(&self, kind: LaunchKind) {
        if kind == LaunchKind::Reload {
            debug!("Reload detected, discarding guest conversation");
            self.clear(SessionKey::GuestId);
        }
    }

    pub fn resolve(&self) -> Identity {
        match self.read(SessionKey::Credential) {
            Some(token) => Identity::Authenticated { token },
            None => Identity::Guest {
                guest_id: self.read(SessionKey::GuestId),
            },
        }
    }

    pub fn credential(&self) -> Option<String> {
        self.read(SessionKey::Credential)
    }

    /// Persists a server-assigned guest id unless one is already stored.
    /// Returns true when the id was stored.
    pub fn adopt_guest_id(&self, guest_id: &str) -> bool {
        if self.read(SessionKey::GuestId).is_some() {
            return false;
        }
        match self.store.set(SessionKey::GuestId, guest_id) {
            Ok(()) => {
                debug!(guest_id, "Stored guest id");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to store guest id");
                false
            }
        }
    }

    pub fn forget_guest(&self) {
        self.clear(SessionKey::GuestId);
    }

    pub fn sign_in(&self, token: &str) -> Result<(), S::Error> {
        self.store.set(SessionKey::Credential, token)?;
        info!("Signed in");
        Ok(())
    }

    pub fn sign_out(&self) {
        self.clear(SessionKey::Credential);
        info!("Signed out");
    }
}
