//! Service catalog - which external services exist and which are enabled
//!
//! The catalog is persisted, but merged against the built-in default set on
//! every load so newly introduced services appear without clobbering user
//! edits to known ones. The registry's admission check reads it: a surface
//! registering under an unknown or disabled service key is not admitted.

use std::collections::BTreeMap;

use eyre::Result;
use serde::{Deserialize, Serialize};
use syncstore::Store;

/// Store key for the persisted catalog
pub const KEY_SERVICES: &str = "services";

/// One external chat service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDef {
    /// Human-readable name
    #[serde(rename = "name")]
    pub display_name: String,

    /// Address of the service's chat page
    pub url: String,

    /// Whether surfaces for this service participate in sync
    pub enabled: bool,
}

impl ServiceDef {
    fn new(display_name: &str, url: &str, enabled: bool) -> Self {
        Self {
            display_name: display_name.to_string(),
            url: url.to_string(),
            enabled,
        }
    }
}

/// Catalog of services keyed by service key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceCatalog {
    pub services: BTreeMap<String, ServiceDef>,
}

impl ServiceCatalog {
    /// Whether a service key exists and is enabled
    pub fn is_enabled(&self, key: &str) -> bool {
        self.services.get(key).is_some_and(|s| s.enabled)
    }

    pub fn get(&self, key: &str) -> Option<&ServiceDef> {
        self.services.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ServiceDef> {
        self.services.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, def: ServiceDef) {
        self.services.insert(key.into(), def);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ServiceDef)> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Built-in default service set
pub fn default_catalog() -> ServiceCatalog {
    let mut catalog = ServiceCatalog::default();
    catalog.insert("chatgpt", ServiceDef::new("ChatGPT", "https://chatgpt.com/", true));
    catalog.insert("gemini", ServiceDef::new("Gemini", "https://gemini.google.com/app", true));
    catalog.insert("grok", ServiceDef::new("Grok", "https://grok.com/", true));
    catalog.insert("claude", ServiceDef::new("Claude", "https://claude.ai/new", false));
    catalog.insert(
        "perplexity",
        ServiceDef::new("Perplexity", "https://www.perplexity.ai/", false),
    );
    catalog
}

/// Merge a stored catalog over the defaults
///
/// Stored entries win for keys they define (user edits are preserved);
/// default keys the stored catalog is missing are filled in.
pub fn merge_with_defaults(stored: ServiceCatalog) -> ServiceCatalog {
    let mut merged = default_catalog();
    for (key, def) in stored.services {
        merged.services.insert(key, def);
    }
    merged
}

/// Load the catalog from the store, merged against the built-in defaults
pub fn load(store: &Store) -> Result<ServiceCatalog> {
    let stored: Option<ServiceCatalog> = store.get(KEY_SERVICES)?;
    Ok(match stored {
        Some(stored) => merge_with_defaults(stored),
        None => default_catalog(),
    })
}

/// Persist the catalog
pub fn save(store: &Store, catalog: &ServiceCatalog) -> Result<()> {
    store.set(KEY_SERVICES, catalog)
}
