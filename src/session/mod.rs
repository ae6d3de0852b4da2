//! Session ownership.
//!
//! The [`SessionStore`] is the only owner of the bearer credential. Its
//! presence gates every authenticated request and the polling lifecycle.
//! Changes are published synchronously through a `watch` channel, so a
//! reader never observes a credential that was already replaced or cleared.

mod storage;

pub use storage::{CredentialStorage, FileCredentialStorage, MemoryCredentialStorage};

use crate::error::{Error, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Opaque bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token. Blank tokens are rejected.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(Error::invalid_input("Credential token is empty"));
        }
        Ok(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// What dependents observe about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current credential, if any.
    pub credential: Option<Credential>,
    /// Bumped on every credential change.
    pub epoch: u64,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}

/// Owns the credential and its persistence.
pub struct SessionStore {
    state: watch::Sender<SessionState>,
    storage: Box<dyn CredentialStorage>,
}

impl SessionStore {
    /// Create a store, restoring any credential persisted by a previous run.
    pub fn new(storage: impl CredentialStorage + 'static) -> Self {
        let credential = match storage.load() {
            Ok(token) => token.and_then(|t| Credential::new(t).ok()),
            Err(e) => {
                warn!("Failed to restore persisted credential: {}", e);
                None
            }
        };

        if credential.is_some() {
            info!("Restored persisted session");
        }

        let (state, _) = watch::channel(SessionState {
            credential,
            epoch: 0,
        });

        Self {
            state,
            storage: Box::new(storage),
        }
    }

    /// Current credential.
    pub fn credential(&self) -> Option<Credential> {
        self.state.borrow().credential.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Current session epoch.
    pub fn epoch(&self) -> u64 {
        self.state.borrow().epoch
    }

    /// Snapshot of credential and epoch, read together.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Install a new credential. The very next request carries it.
    pub fn set_credential(&self, token: impl Into<String>) -> Result<()> {
        let credential = Credential::new(token)?;

        if let Err(e) = self.storage.store(credential.as_str()) {
            warn!("Failed to persist credential: {}", e);
        }

        self.state.send_modify(|state| {
            state.credential = Some(credential);
            state.epoch += 1;
        });

        info!(epoch = self.epoch(), "Session credential set");
        Ok(())
    }

    /// Drop the credential. Returns `false` when there was none to clear.
    pub fn clear_credential(&self) -> bool {
        self.clear_where(|_| true)
    }

    /// Drop the credential only if it is still the one installed at `epoch`.
    ///
    /// Returns `false` when the session was already cleared or replaced.
    pub fn clear_credential_if(&self, epoch: u64) -> bool {
        self.clear_where(|state| state.epoch == epoch)
    }

    fn clear_where(&self, matches: impl FnOnce(&SessionState) -> bool) -> bool {
        let cleared = self.state.send_if_modified(|state| {
            if state.credential.is_none() || !matches(state) {
                return false;
            }
            state.credential = None;
            state.epoch += 1;
            true
        });

        if cleared {
            if let Err(e) = self.storage.clear() {
                warn!("Failed to remove persisted credential: {}", e);
            }
            info!(epoch = self.epoch(), "Session credential cleared");
        } else {
            debug!("Session already cleared or replaced");
        }

        cleared
    }

    /// Observe credential changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restores_persisted_credential() {
        let session = SessionStore::new(MemoryCredentialStorage::with_token("persisted"));
        assert_eq!(session.credential().unwrap().as_str(), "persisted");
        assert_eq!(session.epoch(), 0);
    }

    #[test]
    fn test_set_is_visible_immediately_and_persisted() {
        let storage = MemoryCredentialStorage::new();
        let session = SessionStore::new(storage.clone());
        assert!(!session.is_authenticated());

        session.set_credential("fresh").unwrap();
        assert_eq!(session.credential().unwrap().bearer(), "Bearer fresh");
        assert_eq!(storage.stored(), Some("fresh".to_string()));
        assert_eq!(session.epoch(), 1);
    }

    #[test]
    fn test_blank_token_rejected() {
        let session = SessionStore::new(MemoryCredentialStorage::new());
        assert!(session.set_credential("   ").is_err());
        assert!(!session.is_authenticated());
        assert_eq!(session.epoch(), 0);
    }

    #[test]
    fn test_clear_only_bumps_epoch_once() {
        let storage = MemoryCredentialStorage::with_token("tok");
        let session = SessionStore::new(storage.clone());
        let mut rx = session.subscribe();

        assert!(session.clear_credential());
        assert!(!session.clear_credential());
        assert_eq!(session.epoch(), 1);
        assert_eq!(storage.stored(), None);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[test]
    fn test_clear_if_ignores_replaced_credential() {
        let storage = MemoryCredentialStorage::with_token("old");
        let session = SessionStore::new(storage.clone());
        let sent_with = session.epoch();

        session.set_credential("new").unwrap();
        assert!(!session.clear_credential_if(sent_with));
        assert_eq!(session.credential().unwrap().as_str(), "new");
        assert_eq!(storage.stored(), Some("new".to_string()));

        assert!(session.clear_credential_if(session.epoch()));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("secret-token").unwrap();
        assert_eq!(format!("{:?}", credential), "Credential(***)");
    }
}
