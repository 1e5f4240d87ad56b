//! Mods-folder maintenance: duplicate remediation, auto-install cleanup,
//! listing and enable/disable toggling for the UI mods panel.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::metadata::ModOrigin;
use super::resolver::AUTO_INSTALL_PREFIX;
use super::scanner::scan_mod_archive;
use super::validator::list_jar_files;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;

/// Suffix marking a mod file the user has switched off.
pub const DISABLED_SUFFIX: &str = ".disabled";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModCleanup {
    pub removed: Vec<String>,
}

/// One row of the UI mods panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModEntry {
    pub file_name: String,
    pub id: Option<String>,
    pub version: Option<String>,
    pub enabled: bool,
    pub auto_installed: bool,
}

/// Remove redundant copies of mods that share a top-level id, keeping the
/// most recently modified file of each group. Deletion is best-effort per
/// file. Invoked on a `duplicate-mod-id` issue or a diagnosed launch
/// failure, never automatically.
pub async fn fix_duplicates(instance: &Instance) -> LauncherResult<ModCleanup> {
    let mods_dir = instance.mods_dir();
    let mut cleanup = ModCleanup::default();
    if !mods_dir.exists() {
        return Ok(cleanup);
    }

    let mut by_id: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in list_jar_files(&mods_dir).await? {
        let top = scan_mod_archive(&path)
            .into_iter()
            .find(|m| m.origin == ModOrigin::Top);
        if let Some(id) = top.and_then(|m| m.id) {
            by_id.entry(id).or_default().push(path);
        }
    }

    for (id, mut files) in by_id {
        if files.len() < 2 {
            continue;
        }
        // Newest modification time wins; everything older goes.
        files.sort_by_key(|p| modified_time(p));
        let keep = files.pop();
        info!("Duplicate mod '{}': keeping {:?}", id, keep);
        for path in files {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => cleanup.removed.push(file_name_of(&path)),
                Err(e) => warn!("Could not remove duplicate {:?}: {}", path, e),
            }
        }
    }

    Ok(cleanup)
}

/// Delete every mod file the auto-resolver installed (recognized by its
/// filename marker). Best-effort per file.
pub async fn remove_auto_installed(instance: &Instance) -> LauncherResult<ModCleanup> {
    let mods_dir = instance.mods_dir();
    let mut cleanup = ModCleanup::default();
    if !mods_dir.exists() {
        return Ok(cleanup);
    }

    for path in mod_files(&mods_dir).await? {
        let name = file_name_of(&path);
        if !name.starts_with(AUTO_INSTALL_PREFIX) {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => cleanup.removed.push(name),
            Err(e) => warn!("Could not remove {:?}: {}", path, e),
        }
    }

    Ok(cleanup)
}

/// Enumerate the mods folder for the UI, including disabled files.
pub async fn list_mods(instance: &Instance) -> LauncherResult<Vec<ModEntry>> {
    let mods_dir = instance.mods_dir();
    if !mods_dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for path in mod_files(&mods_dir).await? {
        let file_name = file_name_of(&path);
        let top = scan_mod_archive(&path)
            .into_iter()
            .find(|m| m.origin == ModOrigin::Top);
        entries.push(ModEntry {
            enabled: !file_name.ends_with(DISABLED_SUFFIX),
            auto_installed: file_name.starts_with(AUTO_INSTALL_PREFIX),
            id: top.as_ref().and_then(|m| m.id.clone()),
            version: top.as_ref().and_then(|m| m.version.clone()),
            file_name,
        });
    }

    entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(entries)
}

/// Toggle a mod file between `x.jar` and `x.jar.disabled`. Returns the
/// file's new name.
pub async fn set_mod_enabled(
    instance: &Instance,
    file_name: &str,
    enabled: bool,
) -> LauncherResult<String> {
    let mods_dir = instance.mods_dir();
    let current = mods_dir.join(file_name);
    if !current.exists() {
        return Err(LauncherError::Other(format!(
            "no mod file named '{}' in {:?}",
            file_name, mods_dir
        )));
    }

    let target_name = if enabled {
        file_name
            .strip_suffix(DISABLED_SUFFIX)
            .unwrap_or(file_name)
            .to_string()
    } else if file_name.ends_with(DISABLED_SUFFIX) {
        file_name.to_string()
    } else {
        format!("{}{}", file_name, DISABLED_SUFFIX)
    };

    if target_name != file_name {
        let target = mods_dir.join(&target_name);
        tokio::fs::rename(&current, &target)
            .await
            .map_err(|e| LauncherError::Io {
                path: current,
                source: e,
            })?;
    }

    Ok(target_name)
}

/// Every mod file in the directory, enabled or disabled.
async fn mod_files(mods_dir: &Path) -> LauncherResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(mods_dir)
        .await
        .map_err(|e| LauncherError::Io {
            path: mods_dir.to_path_buf(),
            source: e,
        })?;

    while let Some(entry) = entries.next_entry().await.map_err(|e| LauncherError::Io {
        path: mods_dir.to_path_buf(),
        source: e,
    })? {
        let path = entry.path();
        let name = file_name_of(&path);
        if path.is_file() && (name.ends_with(".jar") || name.ends_with(".jar.disabled")) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn modified_time(path: &Path) -> SystemTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::LoaderType;
    use crate::core::mods::scanner::tests::write_jar;
    use std::time::Duration;

    fn test_instance(base: &Path) -> Instance {
        let instance = Instance::new(
            "Test".to_string(),
            "1.20.4".to_string(),
            LoaderType::Fabric,
            None,
            base,
        );
        std::fs::create_dir_all(instance.mods_dir()).unwrap();
        instance
    }

    fn manifest(id: &str) -> String {
        serde_json::json!({ "id": id, "version": "1.0.0" }).to_string()
    }

    fn backdate(path: &Path, seconds: u64) {
        let older = SystemTime::now() - Duration::from_secs(seconds);
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(older)
            .unwrap();
    }

    #[tokio::test]
    async fn fix_duplicates_keeps_the_newest_file() {
        let dir = tempfile::tempdir().unwrap();
        let instance = test_instance(dir.path());
        let mods = instance.mods_dir();
        let old = write_jar(&mods, "sodium-0.5.jar", &manifest("sodium"));
        let new = write_jar(&mods, "sodium-0.6.jar", &manifest("sodium"));
        write_jar(&mods, "lithium.jar", &manifest("lithium"));
        backdate(&old, 3600);

        let cleanup = fix_duplicates(&instance).await.unwrap();

        assert_eq!(cleanup.removed, vec!["sodium-0.5.jar".to_string()]);
        assert!(!old.exists());
        assert!(new.exists());
        assert!(mods.join("lithium.jar").exists());
    }

    #[tokio::test]
    async fn fix_duplicates_without_duplicates_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let instance = test_instance(dir.path());
        write_jar(&instance.mods_dir(), "sodium.jar", &manifest("sodium"));

        let cleanup = fix_duplicates(&instance).await.unwrap();
        assert!(cleanup.removed.is_empty());
    }

    #[tokio::test]
    async fn remove_auto_installed_only_touches_marked_files() {
        let dir = tempfile::tempdir().unwrap();
        let instance = test_instance(dir.path());
        let mods = instance.mods_dir();
        write_jar(&mods, "ember-auto.clothconfig.jar", &manifest("cloth-config"));
        write_jar(&mods, "sodium.jar", &manifest("sodium"));

        let cleanup = remove_auto_installed(&instance).await.unwrap();

        assert_eq!(cleanup.removed, vec!["ember-auto.clothconfig.jar".to_string()]);
        assert!(mods.join("sodium.jar").exists());
    }

    #[tokio::test]
    async fn list_mods_reports_state_and_identity() {
        let dir = tempfile::tempdir().unwrap();
        let instance = test_instance(dir.path());
        let mods = instance.mods_dir();
        write_jar(&mods, "sodium.jar", &manifest("sodium"));
        write_jar(&mods, "lithium.jar.disabled", &manifest("lithium"));
        write_jar(&mods, "ember-auto.indium.jar", &manifest("indium"));

        let entries = list_mods(&instance).await.unwrap();

        assert_eq!(entries.len(), 3);
        let sodium = entries.iter().find(|e| e.file_name == "sodium.jar").unwrap();
        assert!(sodium.enabled);
        assert!(!sodium.auto_installed);
        assert_eq!(sodium.id.as_deref(), Some("sodium"));
        let lithium = entries
            .iter()
            .find(|e| e.file_name == "lithium.jar.disabled")
            .unwrap();
        assert!(!lithium.enabled);
        let indium = entries
            .iter()
            .find(|e| e.file_name == "ember-auto.indium.jar")
            .unwrap();
        assert!(indium.auto_installed);
    }

    #[tokio::test]
    async fn toggling_renames_the_file_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        let instance = test_instance(dir.path());
        let mods = instance.mods_dir();
        write_jar(&mods, "sodium.jar", &manifest("sodium"));

        let disabled = set_mod_enabled(&instance, "sodium.jar", false).await.unwrap();
        assert_eq!(disabled, "sodium.jar.disabled");
        assert!(mods.join("sodium.jar.disabled").exists());
        assert!(!mods.join("sodium.jar").exists());

        let enabled = set_mod_enabled(&instance, "sodium.jar.disabled", true)
            .await
            .unwrap();
        assert_eq!(enabled, "sodium.jar");
        assert!(mods.join("sodium.jar").exists());

        // Already in the requested state: a no-op.
        let unchanged = set_mod_enabled(&instance, "sodium.jar", true).await.unwrap();
        assert_eq!(unchanged, "sodium.jar");
    }
}
