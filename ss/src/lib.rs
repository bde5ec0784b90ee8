//! SyncStore - durable key/value state with atomic JSON documents
//!
//! Small persistent store used by the syncpane daemon for the facts that
//! must outlive a broker restart (service catalog, sync-enabled flag,
//! trusted dashboard identity). One key maps to one JSON document on disk.
//!
//! # Architecture
//!
//! ```text
//! .syncstore/
//! ├── services.json
//! ├── syncEnabled.json
//! └── dashboardContainerId.json
//! ```
//!
//! Writes go through a temp file and an atomic rename, so a reader never
//! observes a half-written document and a crash mid-write leaves the prior
//! value intact.
//!
//! # Example
//!
//! ```ignore
//! use syncstore::Store;
//!
//! let store = Store::open(".syncstore")?;
//! store.set("syncEnabled", &true)?;
//! let enabled: Option<bool> = store.get("syncEnabled")?;
//! ```

pub mod cli;
pub mod config;
mod store;

pub use store::Store;
