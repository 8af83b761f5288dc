use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::events::{DeployEvent, DeployObserver, NoopObserver};
use super::family::ComponentFamily;
use crate::core::arch::Architecture;
use crate::core::catalog::PayloadSource;
use crate::core::error::{StudioError, StudioResult};
use crate::core::hash::sha256_file;
use crate::core::integrity::{IntegrityChecker, IntegrityReport};
use crate::core::manifest::{ComponentRecord, DeployedFile, Manifest, ManifestStore};
use crate::core::settings::{RuntimeSettings, CONFIG_FILE_NAME};

/// One install/update request against a game directory.
#[derive(Debug, Clone)]
pub struct InstallRequest<'a> {
    pub game_dir: &'a Path,
    /// Stable identity of the game (e.g. `steam:220`); recorded on the
    /// first manifest write and kept thereafter.
    pub game_id: &'a str,
    pub family: ComponentFamily,
    pub version: &'a str,
    pub architecture: Architecture,
}

/// Structured result of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub family: ComponentFamily,
    pub version: String,
    pub architecture: Architecture,
    pub files_deployed: usize,
    pub backups_created: usize,
    pub manifest_path: PathBuf,
}

/// Structured result of a successful uninstall.
#[derive(Debug, Clone, Serialize)]
pub struct UninstallOutcome {
    pub families_removed: Vec<ComponentFamily>,
    pub files_removed: usize,
    pub files_restored: usize,
    pub manifest_deleted: bool,
}

/// A payload-named file present in an unmanaged directory.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UntrackedFile {
    pub name: String,
    pub family: ComponentFamily,
}

/// Orchestrates install, update, and uninstall of runtime components.
///
/// All ownership decisions flow through `ComponentFamily::owning`; the
/// manifest is the single source of truth for what this tool has placed
/// in a directory. Operations against the same game directory serialize
/// on a per-path mutex; different directories run independently.
pub struct DeploymentEngine {
    source: Arc<dyn PayloadSource>,
    observer: Arc<dyn DeployObserver>,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl DeploymentEngine {
    pub fn new(source: Arc<dyn PayloadSource>) -> Self {
        Self {
            source,
            observer: Arc::new(NoopObserver),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DeployObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Install or update one family in a game directory.
    ///
    /// Re-installing an already-active family replaces its files while
    /// preserving the original backup; an update is the same call with
    /// a different version. The manifest is written only after every
    /// payload file has been copied and hashed, so a mid-operation
    /// fault leaves stray untracked files but never a lying manifest.
    pub async fn install(&self, request: InstallRequest<'_>) -> StudioResult<InstallOutcome> {
        // Refusals come before any filesystem mutation.
        if request.architecture == Architecture::Unknown {
            return Err(StudioError::UnknownArchitecture {
                dir: request.game_dir.to_path_buf(),
            });
        }
        if !request.game_dir.is_dir() {
            return Err(StudioError::GameDirNotFound(request.game_dir.to_path_buf()));
        }

        let payload = self
            .source
            .list_payload_files(request.family, request.version, request.architecture)
            .await?;
        let payload = Self::claimed_by(request.family, payload);
        if payload.is_empty() {
            return Err(StudioError::EmptyPayload {
                family: request.family,
                version: request.version.to_string(),
                arch: request.architecture.to_string(),
            });
        }

        let lock = self.dir_lock(request.game_dir).await;
        let _guard = lock.lock().await;

        info!(
            "Installing {} {} ({}-bit) into {:?}",
            request.family, request.version, request.architecture, request.game_dir
        );
        self.observer.on_event(&DeployEvent::InstallStarted {
            family: request.family,
            version: request.version.to_string(),
            game_dir: request.game_dir.to_path_buf(),
        });

        let prior = ManifestStore::read(request.game_dir).await;
        if prior
            .as_ref()
            .is_some_and(|m| m.components.contains_key(request.family.id()))
        {
            match IntegrityChecker::check(request.game_dir, Some(request.family)).await? {
                IntegrityReport::Ok => debug!("Prior {} install is intact", request.family),
                state => warn!("Prior {} install is degraded: {:?}", request.family, state),
            }
        }
        let tracked: Vec<String> = prior.as_ref().map(|m| m.tracked_names()).unwrap_or_default();

        let mut deployed = Vec::with_capacity(payload.len());
        let mut backups_created = 0usize;

        for src in &payload {
            let name = src
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    StudioError::Other(format!("Payload path has no usable filename: {:?}", src))
                })?
                .to_string();
            let target = request.game_dir.join(&name);
            let is_tracked = tracked.iter().any(|t| t.eq_ignore_ascii_case(&name));

            let mut backup_path = None;
            if target.exists() && !is_tracked {
                let backup = Manifest::backup_path_for(request.game_dir, &name);
                if backup.exists() {
                    // A backup with no manifest pointing at it: the
                    // manifest was lost or corrupted after an earlier
                    // install. The backup holds the user's original
                    // file; adopt it rather than burying it under a
                    // rename of what is almost certainly our own stale
                    // payload.
                    info!("Adopting orphaned backup {:?}", backup);
                    self.observer.on_event(&DeployEvent::BackupAdopted {
                        name: name.clone(),
                        backup: backup.clone(),
                    });
                } else {
                    tokio::fs::rename(&target, &backup)
                        .await
                        .map_err(|source| StudioError::Io {
                            path: target.clone(),
                            source,
                        })?;
                    backups_created += 1;
                    debug!("Backed up {:?} -> {:?}", target, backup);
                    self.observer.on_event(&DeployEvent::FileBackedUp {
                        name: name.clone(),
                        backup: backup.clone(),
                    });
                }
                backup_path = Some(backup.to_string_lossy().to_string());
            } else if is_tracked {
                // Reinstall/update path: the previous backup, if any,
                // stays the one and only backup.
                backup_path = prior
                    .as_ref()
                    .and_then(|m| m.entry_for_name(&name))
                    .and_then(|entry| entry.backup_path.clone());
            }

            tokio::fs::copy(src, &target)
                .await
                .map_err(|source| StudioError::Io {
                    path: target.clone(),
                    source,
                })?;

            // Hash the bytes as they landed, not the source, so copy
            // corruption is caught by the next integrity check.
            let hash = sha256_file(&target).await?;
            debug!("Deployed {:?} ({})", target, hash);
            self.observer.on_event(&DeployEvent::FileDeployed {
                name: name.clone(),
                hash: hash.clone(),
            });

            deployed.push(DeployedFile {
                name,
                hash,
                backup_path,
            });
        }

        let files_deployed = deployed.len();
        let mut manifest = match prior {
            Some(mut manifest) => {
                manifest.remove_family(request.family);
                manifest
            }
            None => Manifest {
                game_id: request.game_id.to_string(),
                engine_version: String::new(),
                engine_fork: String::new(),
                architecture: request.architecture,
                installed_at: Utc::now(),
                config_path: None,
                dlls: Vec::new(),
                components: IndexMap::new(),
            },
        };
        manifest.dlls.extend(deployed);
        manifest.components.insert(
            request.family.id().to_string(),
            ComponentRecord {
                version: request.version.to_string(),
                fork: request.family.id().to_string(),
            },
        );
        // Compat fields mirror the family written last.
        manifest.engine_version = request.version.to_string();
        manifest.engine_fork = request.family.id().to_string();
        manifest.architecture = request.architecture;
        manifest.installed_at = Utc::now();

        ManifestStore::write(request.game_dir, &manifest).await?;

        info!(
            "Installed {} {}: {} files, {} new backups",
            request.family, request.version, files_deployed, backups_created
        );
        self.observer.on_event(&DeployEvent::InstallFinished {
            family: request.family,
            files_deployed,
        });

        Ok(InstallOutcome {
            family: request.family,
            version: request.version.to_string(),
            architecture: request.architecture,
            files_deployed,
            backups_created,
            manifest_path: Manifest::path_in(request.game_dir),
        })
    }

    /// Remove one family, or every family when `scope` is `None`.
    ///
    /// Deletes tracked files (tolerating ones already gone), restores
    /// recorded backups, and either rewrites or deletes the manifest.
    pub async fn uninstall(
        &self,
        game_dir: &Path,
        scope: Option<ComponentFamily>,
    ) -> StudioResult<UninstallOutcome> {
        let lock = self.dir_lock(game_dir).await;
        let _guard = lock.lock().await;

        let Some(mut manifest) = ManifestStore::read(game_dir).await else {
            return Err(StudioError::NothingDeployed {
                dir: game_dir.to_path_buf(),
            });
        };

        let targets: Vec<DeployedFile> = match scope {
            Some(family) => manifest.entries_for(family).into_iter().cloned().collect(),
            None => manifest.dlls.clone(),
        };
        if targets.is_empty() {
            return Err(StudioError::NothingDeployed {
                dir: game_dir.to_path_buf(),
            });
        }

        info!(
            "Uninstalling {} from {:?}",
            scope.map_or_else(|| "all components".to_string(), |f| f.to_string()),
            game_dir
        );

        let mut families_removed = Vec::new();
        for entry in &targets {
            if let Some(family) = ComponentFamily::owning(&entry.name) {
                if !families_removed.contains(&family) {
                    families_removed.push(family);
                }
            }
        }

        let mut files_removed = 0usize;
        let mut files_restored = 0usize;
        for entry in &targets {
            let target = game_dir.join(&entry.name);
            match tokio::fs::remove_file(&target).await {
                Ok(()) => {
                    files_removed += 1;
                    self.observer.on_event(&DeployEvent::FileRemoved {
                        name: entry.name.clone(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    // Expected for a degraded install; removal resolves it.
                    debug!("Tracked file already gone: {:?}", target);
                }
                Err(source) => return Err(StudioError::Io { path: target, source }),
            }

            if let Some(backup) = entry.backup_path.as_deref().map(PathBuf::from) {
                if backup.exists() {
                    tokio::fs::rename(&backup, &target)
                        .await
                        .map_err(|source| StudioError::Io {
                            path: backup.clone(),
                            source,
                        })?;
                    files_restored += 1;
                    debug!("Restored {:?} from {:?}", target, backup);
                    self.observer.on_event(&DeployEvent::FileRestored {
                        name: entry.name.clone(),
                    });
                }
            }
        }

        match scope {
            Some(family) => manifest.remove_family(family),
            None => {
                // Unscoped removal empties the record outright, including
                // any entry the ownership partition no longer attributes.
                manifest.dlls.clear();
                manifest.components.clear();
            }
        }

        let manifest_deleted = if manifest.dlls.is_empty() && manifest.components.is_empty() {
            Self::remove_generated_config(game_dir, &manifest).await?;
            ManifestStore::delete(game_dir).await?;
            true
        } else {
            manifest.refresh_compat_fields();
            ManifestStore::write(game_dir, &manifest).await?;
            false
        };

        info!(
            "Uninstalled from {:?}: {} files removed, {} restored, manifest {}",
            game_dir,
            files_removed,
            files_restored,
            if manifest_deleted { "deleted" } else { "kept" }
        );
        self.observer.on_event(&DeployEvent::UninstallFinished {
            game_dir: game_dir.to_path_buf(),
            manifest_deleted,
        });

        Ok(UninstallOutcome {
            families_removed,
            files_removed,
            files_restored,
            manifest_deleted,
        })
    }

    /// Render the tunable-config file into a game directory and record
    /// its path in the manifest (when one exists).
    pub async fn apply_settings(
        &self,
        game_dir: &Path,
        settings: &RuntimeSettings,
    ) -> StudioResult<PathBuf> {
        let lock = self.dir_lock(game_dir).await;
        let _guard = lock.lock().await;

        let path = settings.write_into(game_dir).await?;
        if let Some(mut manifest) = ManifestStore::read(game_dir).await {
            manifest.config_path = Some(path.to_string_lossy().to_string());
            ManifestStore::write(game_dir, &manifest).await?;
        }
        Ok(path)
    }

    /// Report payload-named files in a directory this tool does not
    /// track. Only meaningful without a manifest; read-only. Lets a
    /// caller warn that an Install would treat a manually installed
    /// runtime as "pre-existing, will be backed up".
    pub async fn detect_untracked(game_dir: &Path) -> StudioResult<Vec<UntrackedFile>> {
        if ManifestStore::read(game_dir).await.is_some() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(game_dir)
            .await
            .map_err(|source| StudioError::Io {
                path: game_dir.to_path_buf(),
                source,
            })?;

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|source| StudioError::Io {
            path: game_dir.to_path_buf(),
            source,
        })? {
            if !entry.path().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(family) = ComponentFamily::owning(&name) {
                found.push(UntrackedFile { name, family });
            }
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    /// Payload files whose names the family's table actually claims.
    ///
    /// A cache directory can accumulate stray DLLs; deploying a file
    /// the ownership partition cannot attribute would make it
    /// unremovable, so such files are skipped up front.
    fn claimed_by(family: ComponentFamily, payload: Vec<PathBuf>) -> Vec<PathBuf> {
        payload
            .into_iter()
            .filter(|path| {
                let name = path.file_name().map(|n| n.to_string_lossy().to_string());
                match name.as_deref().and_then(ComponentFamily::owning) {
                    Some(owner) if owner == family => true,
                    _ => {
                        warn!("Skipping payload file not claimed by {}: {:?}", family, path);
                        false
                    }
                }
            })
            .collect()
    }

    /// Delete the generated tunable-config file, never a game file:
    /// only a manifest-recorded path whose filename is exactly ours.
    async fn remove_generated_config(game_dir: &Path, manifest: &Manifest) -> StudioResult<()> {
        let Some(config_path) = manifest.config_path.as_deref().map(PathBuf::from) else {
            return Ok(());
        };
        if config_path.file_name().and_then(|n| n.to_str()) != Some(CONFIG_FILE_NAME) {
            warn!(
                "Manifest config path {:?} is not a generated config; leaving it",
                config_path
            );
            return Ok(());
        }
        let full = if config_path.is_absolute() {
            config_path
        } else {
            game_dir.join(config_path)
        };
        match tokio::fs::remove_file(&full).await {
            Ok(()) => debug!("Removed generated config {:?}", full),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(StudioError::Io { path: full, source }),
        }
        Ok(())
    }

    async fn dir_lock(&self, game_dir: &Path) -> Arc<Mutex<()>> {
        // Canonicalize so `/games/hl2` and `/games/hl2/.` share a lock;
        // fall back to the given path when the dir does not exist yet.
        let key = std::fs::canonicalize(game_dir).unwrap_or_else(|_| game_dir.to_path_buf());
        let mut locks = self.locks.lock().await;
        locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
