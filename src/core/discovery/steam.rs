use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{find_candidate_executables, DiscoveredGame, Storefront, StorefrontScanner};
use crate::core::error::StudioResult;

/// Reads Steam's on-disk catalog: `libraryfolders.vdf` for library
/// roots, then each `appmanifest_*.acf` for installed games.
///
/// Missing or unreadable storefront files degrade to an empty (or
/// partial) scan with a warning; they are never an error to the caller.
pub struct SteamScanner {
    steam_root: PathBuf,
}

/// `"key"    "value"` pairs in Valve's KeyValues text format.
fn kv_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([A-Za-z0-9_]+)"\s+"([^"]*)""#).expect("static regex"))
}

fn unescape_vdf(value: &str) -> String {
    value.replace(r"\\", r"\")
}

/// First occurrence of each key; the fields we need live in the
/// manifest's top section, above any nested blocks.
fn top_fields(text: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for caps in kv_re().captures_iter(text) {
        fields
            .entry(caps[1].to_ascii_lowercase())
            .or_insert_with(|| caps[2].to_string());
    }
    fields
}

impl SteamScanner {
    pub fn new(steam_root: PathBuf) -> Self {
        Self { steam_root }
    }

    /// Probe the usual per-platform Steam locations.
    pub fn locate_default() -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".steam").join("steam"));
            candidates.push(home.join(".local").join("share").join("Steam"));
        }
        candidates.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
        candidates.into_iter().find(|p| p.is_dir())
    }

    /// Every library root, always including the Steam root itself.
    async fn library_roots(&self) -> Vec<PathBuf> {
        let vdf = self.steam_root.join("steamapps").join("libraryfolders.vdf");
        let mut roots = vec![self.steam_root.clone()];

        let text = match tokio::fs::read_to_string(&vdf).await {
            Ok(text) => text,
            Err(e) => {
                debug!("No library index at {:?}: {}", vdf, e);
                return roots;
            }
        };
        for caps in kv_re().captures_iter(&text) {
            if &caps[1] == "path" {
                let root = PathBuf::from(unescape_vdf(&caps[2]));
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
        }
        roots
    }

    async fn games_in(&self, root: &Path) -> Vec<DiscoveredGame> {
        let steamapps = root.join("steamapps");
        let mut games = Vec::new();

        let mut entries = match tokio::fs::read_dir(&steamapps).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot read library {:?}: {}", steamapps, e);
                return games;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if !file_name.starts_with("appmanifest_") || !file_name.ends_with(".acf") {
                continue;
            }
            let text = match tokio::fs::read_to_string(entry.path()).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Cannot read {:?}: {}", entry.path(), e);
                    continue;
                }
            };

            let fields = top_fields(&text);
            let (Some(appid), Some(name), Some(installdir)) = (
                fields.get("appid"),
                fields.get("name"),
                fields.get("installdir"),
            ) else {
                warn!("Incomplete app manifest {:?}", entry.path());
                continue;
            };

            let install_dir = steamapps.join("common").join(installdir);
            if !install_dir.is_dir() {
                debug!("Manifest {:?} points at missing {:?}", entry.path(), install_dir);
                continue;
            }
            let executables = find_candidate_executables(&install_dir)
                .await
                .unwrap_or_default();

            games.push(DiscoveredGame {
                id: format!("steam:{appid}"),
                name: name.clone(),
                install_dir,
                executables,
                storefront: Storefront::Steam,
            });
        }
        games
    }
}

#[async_trait]
impl StorefrontScanner for SteamScanner {
    async fn scan(&self) -> StudioResult<Vec<DiscoveredGame>> {
        let mut games = Vec::new();
        for root in self.library_roots().await {
            games.extend(self.games_in(&root).await);
        }
        games.sort_by(|a, b| a.name.cmp(&b.name));
        info!("Steam scan found {} installed games", games.len());
        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_library(root: &Path, appid: &str, name: &str, installdir: &str) {
        let steamapps = root.join("steamapps");
        let game_dir = steamapps.join("common").join(installdir);
        tokio::fs::create_dir_all(&game_dir).await.unwrap();
        tokio::fs::write(game_dir.join("game.exe"), b"MZ").await.unwrap();
        let acf = format!(
            "\"AppState\"\n{{\n\t\"appid\"\t\t\"{appid}\"\n\t\"name\"\t\t\"{name}\"\n\t\"installdir\"\t\t\"{installdir}\"\n}}\n"
        );
        tokio::fs::write(steamapps.join(format!("appmanifest_{appid}.acf")), acf)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn scans_root_and_extra_libraries() {
        let root = tempfile::tempdir().unwrap();
        let extra = tempfile::tempdir().unwrap();
        seed_library(root.path(), "220", "Half-Life 2", "Half-Life 2").await;
        seed_library(extra.path(), "620", "Portal 2", "Portal 2").await;

        let vdf = format!(
            "\"libraryfolders\"\n{{\n\t\"1\"\n\t{{\n\t\t\"path\"\t\t\"{}\"\n\t}}\n}}\n",
            extra.path().display()
        );
        tokio::fs::write(
            root.path().join("steamapps").join("libraryfolders.vdf"),
            vdf,
        )
        .await
        .unwrap();

        let games = SteamScanner::new(root.path().to_path_buf()).scan().await.unwrap();
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].id, "steam:220");
        assert_eq!(games[0].name, "Half-Life 2");
        assert_eq!(games[1].id, "steam:620");
        assert_eq!(games[1].executables.len(), 1);
        assert!(games.iter().all(|g| g.storefront == Storefront::Steam));
    }

    #[tokio::test]
    async fn missing_vdf_still_scans_the_root() {
        let root = tempfile::tempdir().unwrap();
        seed_library(root.path(), "400", "Portal", "Portal").await;

        let games = SteamScanner::new(root.path().to_path_buf()).scan().await.unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].id, "steam:400");
    }

    #[tokio::test]
    async fn manifest_for_uninstalled_game_is_skipped() {
        let root = tempfile::tempdir().unwrap();
        let steamapps = root.path().join("steamapps");
        tokio::fs::create_dir_all(&steamapps).await.unwrap();
        tokio::fs::write(
            steamapps.join("appmanifest_999.acf"),
            "\"AppState\"\n{\n\t\"appid\"\t\"999\"\n\t\"name\"\t\"Gone\"\n\t\"installdir\"\t\"Gone\"\n}\n",
        )
        .await
        .unwrap();

        let games = SteamScanner::new(root.path().to_path_buf()).scan().await.unwrap();
        assert!(games.is_empty());
    }

    #[test]
    fn vdf_escaped_backslashes_are_unescaped() {
        assert_eq!(unescape_vdf(r"D:\\Games\\SteamLibrary"), r"D:\Games\SteamLibrary");
    }
}
