// ─── Component Catalog ───
// Local cache of ready-to-deploy runtime files, laid out as
//   <root>/<family>/<version>/<x32|x64>/*.dll
// Population (download + extraction) lives in `fetch`; the deployment
// engine only ever reads the cache through the `PayloadSource` seam.

mod cache;
mod fetch;

pub use cache::CatalogCache;
pub use fetch::{ReleaseFetcher, VersionEntry, VersionIndex};

use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::arch::Architecture;
use crate::core::deploy::ComponentFamily;
use crate::core::error::StudioResult;

/// Read-side boundary between the deployment engine and the cache.
#[async_trait]
pub trait PayloadSource: Send + Sync {
    /// Ordered payload paths for one (family, version, architecture).
    ///
    /// An architecture subfolder that is simply not cached yields an
    /// empty list, not an error.
    async fn list_payload_files(
        &self,
        family: ComponentFamily,
        version: &str,
        arch: Architecture,
    ) -> StudioResult<Vec<PathBuf>>;
}
