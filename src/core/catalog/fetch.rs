// ─── Release Fetcher ───
// Downloads published release archives and extracts their payload into
// the local catalog cache. This is the only networked corner of the
// crate; everything downstream consumes the cache through PayloadSource.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use super::CatalogCache;
use crate::core::deploy::ComponentFamily;
use crate::core::error::{StudioError, StudioResult};
use crate::core::hash::sha256_bytes;
use crate::core::http::build_http_client;

const RELEASE_BASE_URL: &str = "https://releases.vkstudio.app";
const DOWNLOAD_CONCURRENCY: usize = 4;

/// Published versions for one family, newest first.
#[derive(Debug, Deserialize)]
pub struct VersionIndex {
    pub versions: Vec<VersionEntry>,
}

/// A single downloadable release.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    pub url: String,
    /// Hex SHA-256 of the archive, when the index publishes one.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl VersionIndex {
    pub fn find_version(&self, version: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.version == version)
    }
}

/// Downloads release archives and populates the catalog cache.
pub struct ReleaseFetcher {
    client: reqwest::Client,
    cache: CatalogCache,
}

impl ReleaseFetcher {
    pub fn new(cache: CatalogCache) -> StudioResult<Self> {
        Ok(Self {
            client: build_http_client()?,
            cache,
        })
    }

    /// Fetch the remote version index for one family.
    pub async fn fetch_version_index(&self, family: ComponentFamily) -> StudioResult<VersionIndex> {
        let url = format!("{}/{}/index.json", RELEASE_BASE_URL, family.id());
        info!("Fetching version index for {}...", family);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(StudioError::DownloadFailed {
                url,
                status: response.status().as_u16(),
            });
        }

        let index: VersionIndex = response.json().await?;
        info!("Loaded {} published {} versions", index.versions.len(), family);
        Ok(index)
    }

    /// Download and extract one release into the cache.
    ///
    /// Skips work when the cache already holds payload for the version.
    /// Returns the version directory either way.
    pub async fn populate(&self, family: ComponentFamily, version: &str) -> StudioResult<PathBuf> {
        let version_dir = self.cache.version_dir(family, version);
        if self.cache.has_version(family, version) {
            debug!("{} {} already cached at {:?}", family, version, version_dir);
            return Ok(version_dir);
        }

        let index = self.fetch_version_index(family).await?;
        let entry = index
            .find_version(version)
            .ok_or_else(|| StudioError::VersionNotFound {
                family,
                version: version.to_string(),
            })?;

        let response = self.client.get(&entry.url).send().await?;
        if !response.status().is_success() {
            return Err(StudioError::DownloadFailed {
                url: entry.url.clone(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await?;

        // Validate before extraction, on the in-memory buffer.
        if let Some(expected) = &entry.sha256 {
            let actual = sha256_bytes(&bytes);
            if &actual != expected {
                return Err(StudioError::HashMismatch {
                    path: PathBuf::from(&entry.url),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        extract_payload(&bytes, &version_dir)?;
        info!("Cached {} {} at {:?}", family, version, version_dir);
        Ok(version_dir)
    }

    /// Populate several releases concurrently.
    ///
    /// Returns the requests that failed (if any).
    pub async fn populate_many(
        &self,
        requests: Vec<(ComponentFamily, String)>,
    ) -> Vec<((ComponentFamily, String), StudioError)> {
        info!(
            "Populating cache: {} releases, concurrency={}",
            requests.len(),
            DOWNLOAD_CONCURRENCY
        );

        let results: Vec<_> = stream::iter(requests)
            .map(|request| async move {
                let result = self.populate(request.0, &request.1).await;
                (request, result)
            })
            .buffer_unordered(DOWNLOAD_CONCURRENCY)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(request, result)| match result {
                Ok(_) => None,
                Err(e) => Some((request, e)),
            })
            .collect()
    }
}

/// Extract the `x32/` and `x64/` subtrees of a release archive.
///
/// Release archives carry a single top-level folder (`dxvk-2.7.1/...`)
/// which is stripped; anything outside the architecture subtrees or not
/// a DLL (readmes, licenses) is skipped.
fn extract_payload(archive_bytes: &[u8], version_dir: &Path) -> StudioResult<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(archive_bytes))?;

    for index in 0..archive.len() {
        let mut zipped = archive.by_index(index)?;
        let enclosed_name = zipped
            .enclosed_name()
            .ok_or_else(|| StudioError::Other("Invalid zip entry path".into()))?;

        let mut rel_path = PathBuf::new();
        let mut components = enclosed_name.components();
        let _ = components.next(); // top-level release folder
        for component in components {
            if let Component::Normal(part) = component {
                rel_path.push(part);
            }
        }

        let wanted = matches!(
            rel_path.components().next(),
            Some(Component::Normal(first)) if first == "x32" || first == "x64"
        ) && rel_path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("dll"))
            .unwrap_or(false);
        if !wanted || zipped.name().ends_with('/') {
            continue;
        }

        let out_path = version_dir.join(rel_path);
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StudioError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|source| StudioError::Io {
            path: out_path.clone(),
            source,
        })?;
        std::io::copy(&mut zipped, &mut out).map_err(|source| StudioError::Io {
            path: out_path,
            source,
        })?;
    }

    Ok(())
}
