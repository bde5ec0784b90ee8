//! Dashboard identity - which container is the trusted home
//!
//! The broker's memory does not survive restarts, but the user's open
//! dashboard container does. The persisted identity plus a home-address
//! prefix fallback keeps an already-open, legitimate dashboard from being
//! orphaned by a restart that raced a container reload.

use eyre::Result;
use syncstore::Store;
use tracing::{debug, info};

use super::registry::ContainerId;

/// Store key for the persisted dashboard container id
pub const KEY_DASHBOARD_CONTAINER: &str = "dashboardContainerId";

/// Outcome of evaluating a registration against the identity policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Container matches the persisted identity
    AdmittedKnown,

    /// Identity was missing or stale; the origin matched the home address
    /// prefix and the identity was re-pinned to this container
    AdmittedFallback,

    /// Not the dashboard; the surface stays inert
    Rejected,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }
}

/// Decides whether a registering container is the trusted dashboard
///
/// The in-memory copy of the identity is only a read-through cache and may
/// be dropped at any time; the persisted value is authoritative.
pub struct IdentityManager {
    home_prefix: String,
    cached: Option<Option<ContainerId>>,
}

impl IdentityManager {
    pub fn new(home_prefix: impl Into<String>) -> Self {
        Self {
            home_prefix: home_prefix.into(),
            cached: None,
        }
    }

    /// Currently trusted container, read through the store on first use
    pub fn current(&mut self, store: &Store) -> Result<Option<ContainerId>> {
        if let Some(cached) = self.cached {
            return Ok(cached);
        }
        let persisted: Option<ContainerId> = store.get(KEY_DASHBOARD_CONTAINER)?;
        self.cached = Some(persisted);
        Ok(persisted)
    }

    /// Two-branch admission policy: exact identity match, then home-address
    /// prefix fallback, which re-pins and persists the identity
    pub fn evaluate(&mut self, store: &Store, container_id: ContainerId, origin: &str) -> Result<Admission> {
        if self.current(store)? == Some(container_id) {
            debug!(container_id, "Admission: persisted identity match");
            return Ok(Admission::AdmittedKnown);
        }

        if !self.home_prefix.is_empty() && origin.starts_with(&self.home_prefix) {
            store.set(KEY_DASHBOARD_CONTAINER, &container_id)?;
            self.cached = Some(Some(container_id));
            info!(container_id, origin, "Admission: home prefix fallback, identity pinned");
            return Ok(Admission::AdmittedFallback);
        }

        debug!(container_id, origin, "Admission: rejected");
        Ok(Admission::Rejected)
    }

    /// Clear the trusted identity (container torn down or unreachable)
    pub fn clear(&mut self, store: &Store) -> Result<()> {
        store.remove(KEY_DASHBOARD_CONTAINER)?;
        self.cached = Some(None);
        info!("Dashboard identity cleared");
        Ok(())
    }

    /// Drop the in-memory cache, forcing the next read through the store
    pub fn forget_cache(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HOME: &str = "app://syncpane/";

    #[test]
    fn test_exact_match_branch() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        store.set(KEY_DASHBOARD_CONTAINER, &42u64).unwrap();

        let mut identity = IdentityManager::new(HOME);
        let admission = identity.evaluate(&store, 42, "https://chatgpt.com/").unwrap();
        assert_eq!(admission, Admission::AdmittedKnown);
    }

    #[test]
    fn test_prefix_fallback_branch_pins_identity() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let mut identity = IdentityManager::new(HOME);
        let admission = identity.evaluate(&store, 7, "app://syncpane/dashboard").unwrap();
        assert_eq!(admission, Admission::AdmittedFallback);

        // Identity is now persisted
        let persisted: Option<u64> = store.get(KEY_DASHBOARD_CONTAINER).unwrap();
        assert_eq!(persisted, Some(7));
    }

    #[test]
    fn test_reject_branch() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let mut identity = IdentityManager::new(HOME);
        let admission = identity.evaluate(&store, 7, "https://chatgpt.com/").unwrap();
        assert_eq!(admission, Admission::Rejected);

        let persisted: Option<u64> = store.get(KEY_DASHBOARD_CONTAINER).unwrap();
        assert_eq!(persisted, None);
    }

    #[test]
    fn test_stale_identity_repinned_by_prefix() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();
        store.set(KEY_DASHBOARD_CONTAINER, &42u64).unwrap();

        // A reopened dashboard registers under a new container id
        let mut identity = IdentityManager::new(HOME);
        let admission = identity.evaluate(&store, 99, "app://syncpane/dashboard").unwrap();
        assert_eq!(admission, Admission::AdmittedFallback);

        let persisted: Option<u64> = store.get(KEY_DASHBOARD_CONTAINER).unwrap();
        assert_eq!(persisted, Some(99));
    }

    #[test]
    fn test_survives_restart_via_persisted_identity() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let mut identity = IdentityManager::new(HOME);
        identity.evaluate(&store, 7, "app://syncpane/dashboard").unwrap();
        drop(identity);

        // Fresh manager, empty cache: the persisted identity admits the
        // container even when the origin no longer matches the prefix
        let mut identity = IdentityManager::new(HOME);
        let admission = identity.evaluate(&store, 7, "https://gemini.google.com/app").unwrap();
        assert_eq!(admission, Admission::AdmittedKnown);
    }

    #[test]
    fn test_clear_removes_persisted_identity() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let mut identity = IdentityManager::new(HOME);
        identity.evaluate(&store, 7, "app://syncpane/dashboard").unwrap();
        identity.clear(&store).unwrap();

        assert_eq!(identity.current(&store).unwrap(), None);
        let persisted: Option<u64> = store.get(KEY_DASHBOARD_CONTAINER).unwrap();
        assert_eq!(persisted, None);
    }

    #[test]
    fn test_empty_prefix_disables_fallback() {
        let temp = tempdir().unwrap();
        let store = Store::open(temp.path()).unwrap();

        let mut identity = IdentityManager::new("");
        let admission = identity.evaluate(&store, 7, "app://syncpane/dashboard").unwrap();
        assert_eq!(admission, Admission::Rejected);
    }
}
