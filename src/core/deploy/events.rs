use std::path::PathBuf;

use super::family::ComponentFamily;

/// Progress notifications published by the deployment engine.
///
/// The engine never owns a log widget or notification list; a caller
/// that wants UI feedback injects a `DeployObserver` and renders these
/// however it likes.
#[derive(Debug, Clone)]
pub enum DeployEvent {
    InstallStarted {
        family: ComponentFamily,
        version: String,
        game_dir: PathBuf,
    },
    /// A pre-existing third-party file was renamed aside.
    FileBackedUp { name: String, backup: PathBuf },
    /// An orphaned backup from a lost manifest was re-recorded instead
    /// of being overwritten by a fresh rename.
    BackupAdopted { name: String, backup: PathBuf },
    FileDeployed { name: String, hash: String },
    InstallFinished {
        family: ComponentFamily,
        files_deployed: usize,
    },
    FileRemoved { name: String },
    /// A backed-up original was renamed back into place.
    FileRestored { name: String },
    UninstallFinished {
        game_dir: PathBuf,
        manifest_deleted: bool,
    },
}

/// Sink for deployment progress events.
///
/// Implementations must be `Send + Sync`; the engine is shared across
/// async tasks.
pub trait DeployObserver: Send + Sync {
    fn on_event(&self, event: &DeployEvent);
}

/// Discards every event; the default when no frontend is attached.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl DeployObserver for NoopObserver {
    fn on_event(&self, _event: &DeployEvent) {}
}
