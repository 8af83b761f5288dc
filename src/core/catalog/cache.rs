use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::PayloadSource;
use crate::core::arch::Architecture;
use crate::core::deploy::ComponentFamily;
use crate::core::error::{StudioError, StudioResult};

const APP_DIR_NAME: &str = "VkStudio";
const PAYLOAD_EXTENSION: &str = "dll";

/// Filesystem view of the extracted-release cache.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    root: PathBuf,
}

impl CatalogCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Per-user default: `<data_dir>/VkStudio/cache`.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
            .join("cache")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn version_dir(&self, family: ComponentFamily, version: &str) -> PathBuf {
        self.root.join(family.id()).join(version)
    }

    /// Architecture subfolder for one cached version; `None` only for
    /// `Unknown`, which is never a deployable target.
    pub fn payload_dir(
        &self,
        family: ComponentFamily,
        version: &str,
        arch: Architecture,
    ) -> Option<PathBuf> {
        let subdir = match arch {
            Architecture::ThirtyTwoBit => "x32",
            Architecture::SixtyFourBit => "x64",
            Architecture::Unknown => return None,
        };
        Some(self.version_dir(family, version).join(subdir))
    }

    /// Whether any payload for this (family, version) is present locally.
    pub fn has_version(&self, family: ComponentFamily, version: &str) -> bool {
        [Architecture::ThirtyTwoBit, Architecture::SixtyFourBit]
            .into_iter()
            .filter_map(|arch| self.payload_dir(family, version, arch))
            .any(|dir| dir.is_dir())
    }
}

#[async_trait]
impl PayloadSource for CatalogCache {
    async fn list_payload_files(
        &self,
        family: ComponentFamily,
        version: &str,
        arch: Architecture,
    ) -> StudioResult<Vec<PathBuf>> {
        let Some(dir) = self.payload_dir(family, version, arch) else {
            return Ok(Vec::new());
        };
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|source| StudioError::Io {
                path: dir.clone(),
                source,
            })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| StudioError::Io {
            path: dir.clone(),
            source,
        })? {
            let path = entry.path();
            let is_payload = path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case(PAYLOAD_EXTENSION))
                    .unwrap_or(false);
            if is_payload {
                files.push(path);
            }
        }

        // read_dir order is platform-dependent; sort for a stable listing.
        files.sort();
        Ok(files)
    }
}
