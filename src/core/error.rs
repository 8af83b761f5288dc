use std::path::PathBuf;
use thiserror::Error;

use crate::core::deploy::ComponentFamily;

/// Central error type for the entire backend.
/// Every module returns `Result<T, StudioError>`.
#[derive(Debug, Error)]
pub enum StudioError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-256 mismatch for {path:?}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Catalog ─────────────────────────────────────────
    #[error("Version {version} not published for {family}")]
    VersionNotFound {
        family: ComponentFamily,
        version: String,
    },

    // ── Deployment ──────────────────────────────────────
    #[error("Refusing to deploy into {dir:?}: executable architecture is unknown")]
    UnknownArchitecture { dir: PathBuf },

    #[error("No payload files for {family} {version} ({arch}) in local cache")]
    EmptyPayload {
        family: ComponentFamily,
        version: String,
        arch: String,
    },

    #[error("Game directory not found: {0:?}")]
    GameDirNotFound(PathBuf),

    #[error("No tracked deployment in {dir:?}")]
    NothingDeployed { dir: PathBuf },

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type StudioResult<T> = Result<T, StudioError>;

impl From<std::io::Error> for StudioError {
    fn from(source: std::io::Error) -> Self {
        StudioError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
