use std::path::Path;

use tracing::{debug, warn};

use super::model::Manifest;
use crate::core::error::{StudioError, StudioResult};

/// Reads and writes the per-game-directory manifest sidecar.
///
/// Purely structural: a manifest that fails to parse is reported as "no
/// manifest" and the semantic consequences are the deployment engine's
/// problem, not this store's.
pub struct ManifestStore;

impl ManifestStore {
    /// Load the manifest for a game directory.
    ///
    /// Returns `None` when the sidecar is absent, unreadable, or
    /// corrupt — never an error.
    pub async fn read(game_dir: &Path) -> Option<Manifest> {
        let path = Manifest::path_in(game_dir);
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read {:?}: {}", path, e);
                return None;
            }
        };

        match serde_json::from_str::<Manifest>(&json) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Corrupt manifest at {:?}, treating as absent: {}", path, e);
                None
            }
        }
    }

    /// Persist the manifest as pretty-printed JSON, full-file overwrite.
    pub async fn write(game_dir: &Path, manifest: &Manifest) -> StudioResult<()> {
        let path = Manifest::path_in(game_dir);
        let json = serde_json::to_string_pretty(manifest)?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| StudioError::Io {
                path: path.clone(),
                source,
            })?;
        debug!("Wrote manifest {:?}", path);
        Ok(())
    }

    /// Remove the sidecar; no-op when it does not exist.
    pub async fn delete(game_dir: &Path) -> StudioResult<()> {
        let path = Manifest::path_in(game_dir);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StudioError::Io { path, source }),
        }
    }
}
