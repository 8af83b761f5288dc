//! Integration tests for the deployment engine.
//!
//! These tests verify:
//! - Install/uninstall round-trips restore the pre-install file set
//! - Reinstall idempotence and single-generation backups
//! - Multi-family coexistence in one game directory
//! - Unknown-architecture refusal and empty-payload failure
//! - Orphaned-backup adoption after a lost manifest

use std::path::Path;
use std::sync::Arc;

use vkstudio::core::arch::Architecture;
use vkstudio::core::catalog::CatalogCache;
use vkstudio::core::deploy::{ComponentFamily, DeploymentEngine, InstallRequest};
use vkstudio::core::hash::sha256_bytes;
use vkstudio::core::integrity::{IntegrityChecker, IntegrityReport};
use vkstudio::core::manifest::{Manifest, ManifestStore};
use vkstudio::core::settings::{RuntimeSettings, CONFIG_FILE_NAME};
use vkstudio::StudioError;

const DXGI_BYTES: &[u8] = b"DXGI 2.7.1 payload";
const D3D11_BYTES: &[u8] = b"D3D11 2.7.1 payload";

struct Fixture {
    _cache_dir: tempfile::TempDir,
    game_dir: tempfile::TempDir,
    engine: DeploymentEngine,
}

async fn seed_payload(
    cache_root: &Path,
    family: ComponentFamily,
    version: &str,
    files: &[(&str, &[u8])],
) {
    let cache = CatalogCache::new(cache_root.to_path_buf());
    let dir = cache
        .payload_dir(family, version, Architecture::SixtyFourBit)
        .unwrap();
    tokio::fs::create_dir_all(&dir).await.unwrap();
    for (name, bytes) in files {
        tokio::fs::write(dir.join(name), bytes).await.unwrap();
    }
}

async fn fixture() -> Fixture {
    let cache_dir = tempfile::tempdir().unwrap();
    seed_payload(
        cache_dir.path(),
        ComponentFamily::Dxvk,
        "2.7.1",
        &[("dxgi.dll", DXGI_BYTES), ("d3d11.dll", D3D11_BYTES)],
    )
    .await;
    seed_payload(
        cache_dir.path(),
        ComponentFamily::Dxvk,
        "2.7.2",
        &[("dxgi.dll", b"DXGI 2.7.2 payload"), ("d3d11.dll", b"D3D11 2.7.2 payload")],
    )
    .await;
    seed_payload(
        cache_dir.path(),
        ComponentFamily::Vkd3dProton,
        "2.14.1",
        &[("d3d12.dll", b"D3D12 payload"), ("d3d12core.dll", b"D3D12 core payload")],
    )
    .await;

    let engine = DeploymentEngine::new(Arc::new(CatalogCache::new(
        cache_dir.path().to_path_buf(),
    )));
    Fixture {
        _cache_dir: cache_dir,
        game_dir: tempfile::tempdir().unwrap(),
        engine,
    }
}

fn dxvk_request<'a>(fx: &'a Fixture, version: &'a str) -> InstallRequest<'a> {
    InstallRequest {
        game_dir: fx.game_dir.path(),
        game_id: "steam:220",
        family: ComponentFamily::Dxvk,
        version,
        architecture: Architecture::SixtyFourBit,
    }
}

fn vkd3d_request(fx: &Fixture) -> InstallRequest<'_> {
    InstallRequest {
        game_dir: fx.game_dir.path(),
        game_id: "steam:220",
        family: ComponentFamily::Vkd3dProton,
        version: "2.14.1",
        architecture: Architecture::SixtyFourBit,
    }
}

async fn read(path: impl AsRef<Path>) -> Vec<u8> {
    tokio::fs::read(path).await.unwrap()
}

#[tokio::test]
async fn install_deploys_files_and_writes_manifest() {
    let fx = fixture().await;
    let outcome = fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();

    assert_eq!(outcome.files_deployed, 2);
    assert_eq!(outcome.backups_created, 0);
    assert_eq!(read(fx.game_dir.path().join("dxgi.dll")).await, DXGI_BYTES);
    assert_eq!(read(fx.game_dir.path().join("d3d11.dll")).await, D3D11_BYTES);

    let manifest = ManifestStore::read(fx.game_dir.path()).await.unwrap();
    assert_eq!(manifest.game_id, "steam:220");
    assert_eq!(manifest.engine_version, "2.7.1");
    assert_eq!(manifest.engine_fork, "dxvk");
    assert_eq!(manifest.architecture, Architecture::SixtyFourBit);
    assert_eq!(manifest.dlls.len(), 2);
    assert_eq!(manifest.components["dxvk"].version, "2.7.1");

    let entry = manifest.entry_for_name("dxgi.dll").unwrap();
    assert_eq!(entry.hash, sha256_bytes(DXGI_BYTES));
    assert_eq!(entry.backup_path, None);
}

#[tokio::test]
async fn round_trip_restores_pre_install_state() {
    let fx = fixture().await;
    let original_dxgi = fx.game_dir.path().join("dxgi.dll");
    tokio::fs::write(&original_dxgi, b"ORIGINAL").await.unwrap();
    tokio::fs::write(fx.game_dir.path().join("game.exe"), b"GAME").await.unwrap();

    let outcome = fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();
    assert_eq!(outcome.backups_created, 1);

    // Pre-existing file was renamed aside and recorded.
    let backup = Manifest::backup_path_for(fx.game_dir.path(), "dxgi.dll");
    assert_eq!(read(&original_dxgi).await, DXGI_BYTES);
    assert_eq!(read(&backup).await, b"ORIGINAL");
    let manifest = ManifestStore::read(fx.game_dir.path()).await.unwrap();
    assert_eq!(
        manifest.entry_for_name("dxgi.dll").unwrap().backup_path,
        Some(backup.to_string_lossy().to_string())
    );

    let outcome = fx.engine.uninstall(fx.game_dir.path(), None).await.unwrap();
    assert!(outcome.manifest_deleted);
    assert_eq!(outcome.files_restored, 1);

    // Exact pre-install file set, byte for byte.
    assert_eq!(read(&original_dxgi).await, b"ORIGINAL");
    assert_eq!(read(fx.game_dir.path().join("game.exe")).await, b"GAME");
    assert!(!backup.exists());
    assert!(!fx.game_dir.path().join("d3d11.dll").exists());
    assert!(!Manifest::path_in(fx.game_dir.path()).exists());
}

#[tokio::test]
async fn reinstall_is_idempotent_and_keeps_single_backup() {
    let fx = fixture().await;
    tokio::fs::write(fx.game_dir.path().join("dxgi.dll"), b"ORIGINAL")
        .await
        .unwrap();

    fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();
    let first = ManifestStore::read(fx.game_dir.path()).await.unwrap();

    let outcome = fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();
    assert_eq!(outcome.backups_created, 0);
    let second = ManifestStore::read(fx.game_dir.path()).await.unwrap();

    assert_eq!(first.dlls, second.dlls);

    // The one backup still holds the original; no second generation.
    let backup = Manifest::backup_path_for(fx.game_dir.path(), "dxgi.dll");
    assert_eq!(read(&backup).await, b"ORIGINAL");
    let double_backup = Manifest::backup_path_for(fx.game_dir.path(), "dxgi.dll.bak_vkstudio");
    assert!(!double_backup.exists());
}

#[tokio::test]
async fn update_replaces_files_and_preserves_backup() {
    let fx = fixture().await;
    tokio::fs::write(fx.game_dir.path().join("dxgi.dll"), b"ORIGINAL")
        .await
        .unwrap();

    fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();
    fx.engine.install(dxvk_request(&fx, "2.7.2")).await.unwrap();

    let manifest = ManifestStore::read(fx.game_dir.path()).await.unwrap();
    assert_eq!(manifest.engine_version, "2.7.2");
    assert_eq!(manifest.components["dxvk"].version, "2.7.2");
    assert_eq!(
        read(fx.game_dir.path().join("dxgi.dll")).await,
        b"DXGI 2.7.2 payload"
    );

    // Backup from before the first install survives the update...
    let backup = Manifest::backup_path_for(fx.game_dir.path(), "dxgi.dll");
    assert_eq!(read(&backup).await, b"ORIGINAL");

    // ...and a final uninstall still restores the original bytes.
    fx.engine.uninstall(fx.game_dir.path(), None).await.unwrap();
    assert_eq!(read(fx.game_dir.path().join("dxgi.dll")).await, b"ORIGINAL");
}

#[tokio::test]
async fn families_coexist_and_uninstall_independently() {
    let fx = fixture().await;
    fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();
    fx.engine.install(vkd3d_request(&fx)).await.unwrap();

    let outcome = fx
        .engine
        .uninstall(fx.game_dir.path(), Some(ComponentFamily::Dxvk))
        .await
        .unwrap();
    assert_eq!(outcome.families_removed, vec![ComponentFamily::Dxvk]);
    assert!(!outcome.manifest_deleted);

    // The other family's files and records are untouched.
    assert!(fx.game_dir.path().join("d3d12.dll").exists());
    assert!(fx.game_dir.path().join("d3d12core.dll").exists());
    assert!(!fx.game_dir.path().join("dxgi.dll").exists());

    let manifest = ManifestStore::read(fx.game_dir.path()).await.unwrap();
    assert!(!manifest.components.contains_key("dxvk"));
    assert_eq!(manifest.components["vkd3d-proton"].version, "2.14.1");
    // Compat fields re-point at the most recently installed survivor.
    assert_eq!(manifest.engine_fork, "vkd3d-proton");
    assert_eq!(manifest.engine_version, "2.14.1");

    let report = IntegrityChecker::check(fx.game_dir.path(), Some(ComponentFamily::Vkd3dProton))
        .await
        .unwrap();
    assert_eq!(report, IntegrityReport::Ok);
    let report = IntegrityChecker::check(fx.game_dir.path(), Some(ComponentFamily::Dxvk))
        .await
        .unwrap();
    assert_eq!(report, IntegrityReport::NotInstalled);
}

#[tokio::test]
async fn unknown_architecture_is_refused_before_any_mutation() {
    let fx = fixture().await;
    tokio::fs::write(fx.game_dir.path().join("dxgi.dll"), b"ORIGINAL")
        .await
        .unwrap();

    let mut request = dxvk_request(&fx, "2.7.1");
    request.architecture = Architecture::Unknown;
    let err = fx.engine.install(request).await.unwrap_err();
    assert!(matches!(err, StudioError::UnknownArchitecture { .. }));

    // Directory completely untouched: no manifest, no backup, original bytes.
    assert_eq!(read(fx.game_dir.path().join("dxgi.dll")).await, b"ORIGINAL");
    assert!(!Manifest::path_in(fx.game_dir.path()).exists());
    assert!(!Manifest::backup_path_for(fx.game_dir.path(), "dxgi.dll").exists());
}

#[tokio::test]
async fn missing_payload_version_fails_without_mutation() {
    let fx = fixture().await;
    let err = fx.engine.install(dxvk_request(&fx, "9.9.9")).await.unwrap_err();
    assert!(matches!(err, StudioError::EmptyPayload { .. }));
    assert!(!Manifest::path_in(fx.game_dir.path()).exists());
}

#[tokio::test]
async fn orphaned_backup_is_adopted_not_overwritten() {
    let fx = fixture().await;
    // A previous install whose manifest was lost: our stale payload sits
    // in place, the user's original survives only in the backup file.
    tokio::fs::write(fx.game_dir.path().join("dxgi.dll"), b"STALE PAYLOAD")
        .await
        .unwrap();
    let backup = Manifest::backup_path_for(fx.game_dir.path(), "dxgi.dll");
    tokio::fs::write(&backup, b"ORIGINAL").await.unwrap();

    let outcome = fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();
    assert_eq!(outcome.backups_created, 0);
    assert_eq!(read(&backup).await, b"ORIGINAL");

    let manifest = ManifestStore::read(fx.game_dir.path()).await.unwrap();
    assert_eq!(
        manifest.entry_for_name("dxgi.dll").unwrap().backup_path,
        Some(backup.to_string_lossy().to_string())
    );

    fx.engine.uninstall(fx.game_dir.path(), None).await.unwrap();
    assert_eq!(read(fx.game_dir.path().join("dxgi.dll")).await, b"ORIGINAL");
    assert!(!backup.exists());
}

#[tokio::test]
async fn uninstall_without_deployment_is_an_error() {
    let fx = fixture().await;
    let err = fx.engine.uninstall(fx.game_dir.path(), None).await.unwrap_err();
    assert!(matches!(err, StudioError::NothingDeployed { .. }));

    // Scoped to a family that was never installed, same answer.
    fx.engine.install(vkd3d_request(&fx)).await.unwrap();
    let err = fx
        .engine
        .uninstall(fx.game_dir.path(), Some(ComponentFamily::Dxvk))
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::NothingDeployed { .. }));
}

#[tokio::test]
async fn uninstall_tolerates_already_missing_files() {
    let fx = fixture().await;
    fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();
    tokio::fs::remove_file(fx.game_dir.path().join("d3d11.dll"))
        .await
        .unwrap();

    let outcome = fx.engine.uninstall(fx.game_dir.path(), None).await.unwrap();
    assert_eq!(outcome.files_removed, 1);
    assert!(outcome.manifest_deleted);
}

#[tokio::test]
async fn detect_untracked_reports_manual_installs_only_without_manifest() {
    let fx = fixture().await;
    tokio::fs::write(fx.game_dir.path().join("d3d9.dll"), b"manual")
        .await
        .unwrap();
    tokio::fs::write(fx.game_dir.path().join("game.exe"), b"GAME")
        .await
        .unwrap();

    let found = DeploymentEngine::detect_untracked(fx.game_dir.path())
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "d3d9.dll");
    assert_eq!(found[0].family, ComponentFamily::Dxvk);

    // Once a manifest exists the report is empty.
    fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();
    let found = DeploymentEngine::detect_untracked(fx.game_dir.path())
        .await
        .unwrap();
    assert!(found.is_empty());
}

#[tokio::test]
async fn generated_config_is_removed_with_the_last_family() {
    let fx = fixture().await;
    fx.engine.install(dxvk_request(&fx, "2.7.1")).await.unwrap();

    let settings = RuntimeSettings {
        hud: Some("fps".into()),
        ..Default::default()
    };
    let config_path = fx
        .engine
        .apply_settings(fx.game_dir.path(), &settings)
        .await
        .unwrap();
    assert_eq!(config_path.file_name().unwrap(), CONFIG_FILE_NAME);
    let manifest = ManifestStore::read(fx.game_dir.path()).await.unwrap();
    assert_eq!(
        manifest.config_path,
        Some(config_path.to_string_lossy().to_string())
    );

    fx.engine.uninstall(fx.game_dir.path(), None).await.unwrap();
    assert!(!config_path.exists());
    assert!(!Manifest::path_in(fx.game_dir.path()).exists());
}
