//! Surface adapter seam
//!
//! The per-service adapters of the hosting shell live behind this trait:
//! locating the editable element and performing text replacement or
//! submission is service-specific plumbing, and the coordinator's contract
//! is unaffected by which adapter sits behind it.

use async_trait::async_trait;
use eyre::Result;

/// One editable text area bound to an external service
#[async_trait]
pub trait SurfaceAdapter: Send + Sync {
    /// Service key this surface is bound to
    fn service_key(&self) -> &str;

    /// Replace the surface's full text
    async fn set_text(&self, text: &str) -> Result<()>;

    /// Trigger the surface's submit action
    async fn submit(&self) -> Result<()>;
}
