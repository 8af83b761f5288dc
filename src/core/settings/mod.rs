// ─── Runtime Settings ───
// Renders and parses the tunable-config file deployed next to the
// runtime DLLs. Plain `key = value` lines; unknown keys survive a
// parse/render round-trip so user additions are never dropped.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::debug;

use crate::core::error::{StudioError, StudioResult};

/// Generated config filename; its presence is what uninstall is allowed
/// to delete, never any other file.
pub const CONFIG_FILE_NAME: &str = "vkstudio.conf";

const HEADER: &str = "# Generated by VkStudio. Removed when the last runtime component\n# is uninstalled from this directory.\n";

/// Tunable knobs for the deployed translation runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeSettings {
    /// On-screen overlay elements, e.g. `fps,frametimes`.
    pub hud: Option<String>,
    pub frame_rate_limit: Option<u32>,
    pub log_level: Option<String>,
    /// Keys this version does not model, in file order.
    pub extra: IndexMap<String, String>,
}

impl RuntimeSettings {
    pub fn render(&self) -> String {
        let mut out = String::from(HEADER);
        if let Some(hud) = &self.hud {
            out.push_str(&format!("hud = {hud}\n"));
        }
        if let Some(limit) = self.frame_rate_limit {
            out.push_str(&format!("frame_rate_limit = {limit}\n"));
        }
        if let Some(level) = &self.log_level {
            out.push_str(&format!("log_level = {level}\n"));
        }
        for (key, value) in &self.extra {
            out.push_str(&format!("{key} = {value}\n"));
        }
        out
    }

    pub fn parse(text: &str) -> Self {
        let mut settings = RuntimeSettings::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "hud" => settings.hud = Some(value.to_string()),
                "frame_rate_limit" => match value.parse() {
                    Ok(limit) => settings.frame_rate_limit = Some(limit),
                    // Keep a malformed value verbatim instead of losing it.
                    Err(_) => {
                        settings.extra.insert(key.to_string(), value.to_string());
                    }
                },
                "log_level" => settings.log_level = Some(value.to_string()),
                _ => {
                    settings.extra.insert(key.to_string(), value.to_string());
                }
            }
        }
        settings
    }

    /// Write the rendered config into a game directory, returning the
    /// generated path for the manifest's `configPath`.
    pub async fn write_into(&self, game_dir: &Path) -> StudioResult<PathBuf> {
        let path = game_dir.join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, self.render())
            .await
            .map_err(|source| StudioError::Io {
                path: path.clone(),
                source,
            })?;
        debug!("Wrote runtime config {:?}", path);
        Ok(path)
    }

    /// Read back the config from a game directory, `None` when absent.
    pub async fn read_from(game_dir: &Path) -> StudioResult<Option<Self>> {
        let path = game_dir.join(CONFIG_FILE_NAME);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(Self::parse(&text))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StudioError::Io { path, source }),
        }
    }
}
