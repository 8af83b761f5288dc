// ─── Game Discovery ───
// Enumerates installed games across storefronts and collects candidate
// executables for architecture probing. Pure read-only scanning; the
// deployment engine consumes the (game dir, executables) pairs.

mod steam;

pub use steam::SteamScanner;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::core::error::{StudioError, StudioResult};

/// Where a game record came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Storefront {
    Steam,
    Manual,
}

/// One installed game with its deployment-relevant paths.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredGame {
    pub id: String,
    pub name: String,
    pub install_dir: PathBuf,
    /// Native executables found in the install tree, candidates for
    /// architecture probing.
    pub executables: Vec<PathBuf>,
    pub storefront: Storefront,
}

/// A storefront-specific catalog reader.
#[async_trait]
pub trait StorefrontScanner: Send + Sync {
    async fn scan(&self) -> StudioResult<Vec<DiscoveredGame>>;
}

// Launcher/redistributable folders that hold installers rather than the
// game's own binaries.
const SKIPPED_DIRS: &[&str] = &[
    "_commonredist",
    "commonredist",
    "redist",
    "directx",
    "dotnet",
    "vcredist",
    "installers",
    "support",
];

/// Collect `.exe` files from a game directory: the top level plus one
/// subdirectory level, skipping redistributable folders.
pub async fn find_candidate_executables(dir: &Path) -> StudioResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut subdirs = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await.map_err(|source| StudioError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    while let Some(entry) = entries.next_entry().await.map_err(|source| StudioError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
            if !SKIPPED_DIRS.contains(&name.as_str()) {
                subdirs.push(path);
            }
        } else if is_executable(&path) {
            found.push(path);
        }
    }

    for subdir in subdirs {
        let mut entries = match tokio::fs::read_dir(&subdir).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_file() && is_executable(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

fn is_executable(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("exe"))
        .unwrap_or(false)
}

/// Treats a single user-picked directory as one game.
pub struct ManualScanner {
    dir: PathBuf,
}

impl ManualScanner {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl StorefrontScanner for ManualScanner {
    async fn scan(&self) -> StudioResult<Vec<DiscoveredGame>> {
        if !self.dir.is_dir() {
            return Err(StudioError::GameDirNotFound(self.dir.clone()));
        }
        let name = self
            .dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.dir.to_string_lossy().to_string());
        let executables = find_candidate_executables(&self.dir).await?;

        Ok(vec![DiscoveredGame {
            id: format!("manual:{}", Uuid::new_v4()),
            name,
            install_dir: self.dir.clone(),
            executables,
            storefront: Storefront::Manual,
        }])
    }
}
