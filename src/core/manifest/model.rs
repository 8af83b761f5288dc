use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::arch::Architecture;
use crate::core::deploy::ComponentFamily;

/// Sidecar filename written into every managed game directory.
pub const MANIFEST_FILE_NAME: &str = "vkstudio_manifest.json";

/// Suffix appended to a pre-existing file when it is renamed aside.
pub const BACKUP_SUFFIX: &str = ".bak_vkstudio";

/// One file the engine placed in the game directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeployedFile {
    /// Filename only, never a path.
    pub name: String,
    /// Hex SHA-256 of the bytes as they landed on disk.
    pub hash: String,
    /// Renamed-aside original; present only when a third-party file
    /// occupied this name before the first tracked install.
    #[serde(rename = "backupPath", skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

/// Per-family version record inside the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentRecord {
    pub version: String,
    pub fork: String,
}

/// Full deployment record persisted as `vkstudio_manifest.json`.
///
/// The manifest is the single source of truth for what this tool owns
/// in a game directory; no file is considered ours unless listed here.
///
/// The top-level `engineVersion` / `engineFork` / flat `dlls` fields
/// predate multi-family support and keep mirroring the most recently
/// installed family so older readers stay functional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub game_id: String,
    pub engine_version: String,
    pub engine_fork: String,
    pub architecture: Architecture,
    pub installed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
    pub dlls: Vec<DeployedFile>,
    /// Insertion order doubles as install recency: the last entry is
    /// the most recently (re)installed family.
    #[serde(default)]
    pub components: IndexMap<String, ComponentRecord>,
}

impl Manifest {
    /// Sidecar path inside a game directory.
    pub fn path_in(game_dir: &Path) -> PathBuf {
        game_dir.join(MANIFEST_FILE_NAME)
    }

    /// Backup path for one payload filename, same directory as the original.
    pub fn backup_path_for(game_dir: &Path, name: &str) -> PathBuf {
        game_dir.join(format!("{name}{BACKUP_SUFFIX}"))
    }

    /// Entries claimed by one family, per the ownership partition.
    pub fn entries_for(&self, family: ComponentFamily) -> Vec<&DeployedFile> {
        self.dlls
            .iter()
            .filter(|f| ComponentFamily::owning(&f.name) == Some(family))
            .collect()
    }

    pub fn entry_for_name(&self, name: &str) -> Option<&DeployedFile> {
        self.dlls.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Every filename currently tracked, across all families.
    pub fn tracked_names(&self) -> Vec<String> {
        self.dlls.iter().map(|f| f.name.clone()).collect()
    }

    /// Drop one family's file entries and component record, keeping
    /// everything owned by other families untouched.
    pub fn remove_family(&mut self, family: ComponentFamily) {
        self.dlls
            .retain(|f| ComponentFamily::owning(&f.name) != Some(family));
        self.components.shift_remove(family.id());
    }

    /// Most recently installed surviving family, if any.
    pub fn most_recent_component(&self) -> Option<(&str, &ComponentRecord)> {
        self.components.last().map(|(id, rec)| (id.as_str(), rec))
    }

    /// Re-point the legacy compat fields after a partial uninstall.
    pub fn refresh_compat_fields(&mut self) {
        if let Some((id, record)) = self.most_recent_component() {
            let fork = id.to_string();
            let version = record.version.clone();
            self.engine_fork = fork;
            self.engine_version = version;
        }
    }
}
