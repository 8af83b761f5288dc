// ─── Integrity Checker ───
// Re-derives installed-file hashes and compares them to the manifest.
// Findings are values, not errors: a missing or altered file is normal
// observed state for the caller to present, not an exception.

use std::path::Path;

use serde::Serialize;
use tracing::debug;

use crate::core::deploy::ComponentFamily;
use crate::core::error::StudioResult;
use crate::core::hash::sha256_file;
use crate::core::manifest::ManifestStore;

/// Observed state of a deployment, first problem wins.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "status", content = "file")]
pub enum IntegrityReport {
    /// Every tracked file is present and hash-matches.
    Ok,
    /// The named tracked file is absent from the game directory.
    Missing(String),
    /// The named tracked file exists but its content changed.
    Corrupt(String),
    /// No manifest, or the requested family was never installed.
    NotInstalled,
}

pub struct IntegrityChecker;

impl IntegrityChecker {
    /// Verify a game directory against its manifest, optionally scoped
    /// to one family.
    ///
    /// Short-circuits on the first divergence; callers wanting a full
    /// diff re-run per file. Filesystem faults while re-hashing an
    /// existing file (permission loss, etc.) propagate as errors.
    pub async fn check(
        game_dir: &Path,
        family: Option<ComponentFamily>,
    ) -> StudioResult<IntegrityReport> {
        let Some(manifest) = ManifestStore::read(game_dir).await else {
            return Ok(IntegrityReport::NotInstalled);
        };

        let entries: Vec<_> = match family {
            Some(family) => manifest.entries_for(family).into_iter().cloned().collect(),
            None => manifest.dlls.clone(),
        };
        if entries.is_empty() {
            return Ok(IntegrityReport::NotInstalled);
        }

        for entry in &entries {
            let target = game_dir.join(&entry.name);
            if !target.exists() {
                debug!("Tracked file missing: {:?}", target);
                return Ok(IntegrityReport::Missing(entry.name.clone()));
            }
            let actual = sha256_file(&target).await?;
            if actual != entry.hash {
                debug!(
                    "Hash drift for {:?}: manifest {}, disk {}",
                    target, entry.hash, actual
                );
                return Ok(IntegrityReport::Corrupt(entry.name.clone()));
            }
        }

        Ok(IntegrityReport::Ok)
    }
}
