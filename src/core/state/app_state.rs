use std::path::PathBuf;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::error::LauncherResult;
use crate::core::http::build_http_client;
use crate::core::instance::{InstanceManager, LoaderType};
use crate::core::mods::maintenance;
use crate::core::mods::resolver::{resolve_missing, AutoResolveOutcome, ResolveContext};
use crate::core::mods::validator::{validate_mods, ValidationResult};
use crate::core::mods::{CompatRules, ModrinthRegistry};

const APP_DIR_NAME: &str = "EmberLauncher";
const SETTINGS_FILE: &str = "launcher_settings.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherSettings {
    /// The instance the UI currently operates on.
    pub active_instance_id: Option<String>,
}

/// Summary row of `list_instances`.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSummary {
    pub id: String,
    pub name: String,
    pub minecraft_version: String,
    pub loader: LoaderType,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceIndex {
    pub active_id: Option<String>,
    pub instances: Vec<InstanceSummary>,
}

/// Global application state, built once at startup. The compatibility
/// rule tables live here as immutable data and are passed by reference
/// into the validator and resolver.
pub struct AppState {
    pub data_dir: PathBuf,
    pub instance_manager: InstanceManager,
    pub http_client: Client,
    pub registry: ModrinthRegistry,
    pub rules: CompatRules,
    pub launcher_settings: LauncherSettings,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_data_dir(default_data_dir())
    }

    /// Build the state rooted at an explicit data directory (tests,
    /// portable installs).
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        let instance_manager = InstanceManager::new(data_dir.join("instances"));
        let http_client = build_http_client().expect("Failed to build HTTP client");
        let registry = ModrinthRegistry::new(http_client.clone());
        let launcher_settings = load_settings_from_disk(&data_dir).unwrap_or_default();

        Self {
            data_dir,
            instance_manager,
            http_client,
            registry,
            rules: CompatRules::builtin(),
            launcher_settings,
        }
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.data_dir.join("instances")
    }

    /// Shared content cache for resolver downloads. Append-only, keyed by
    /// project + content identity, reused across instances and runs.
    pub fn mod_cache_dir(&self) -> PathBuf {
        self.data_dir.join("mod-cache")
    }

    pub fn save_settings(&self) -> std::io::Result<()> {
        let settings_path = self.data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(&self.launcher_settings)?;
        std::fs::write(settings_path, json)
    }

    /// The instance index consumed by the UI.
    pub async fn list_instances(&self) -> LauncherResult<InstanceIndex> {
        let instances = self
            .instance_manager
            .list()
            .await?
            .into_iter()
            .map(|inst| InstanceSummary {
                id: inst.id,
                name: inst.name,
                minecraft_version: inst.minecraft_version,
                loader: inst.loader,
            })
            .collect();

        Ok(InstanceIndex {
            active_id: self.launcher_settings.active_instance_id.clone(),
            instances,
        })
    }

    // ── Mod engine entry points ─────────────────────────
    // Each resolves the instance first; an unknown id raises
    // `InstanceNotFound`, the engine's single fatal condition.

    pub async fn validate_instance_mods(&self, instance_id: &str) -> LauncherResult<ValidationResult> {
        let instance = self.instance_manager.load(instance_id).await?;
        validate_mods(&instance, &self.rules).await
    }

    pub async fn resolve_missing_mods(
        &self,
        instance_id: &str,
        validation: &ValidationResult,
        on_log: Option<&(dyn Fn(&str) + Send + Sync)>,
    ) -> LauncherResult<AutoResolveOutcome> {
        let instance = self.instance_manager.load(instance_id).await?;
        let cache_dir = self.mod_cache_dir();
        let ctx = ResolveContext {
            instance: &instance,
            registry: &self.registry,
            rules: &self.rules,
            cache_dir: &cache_dir,
            on_log,
        };
        resolve_missing(&ctx, validation).await
    }

    pub async fn fix_duplicate_mods(
        &self,
        instance_id: &str,
    ) -> LauncherResult<maintenance::ModCleanup> {
        let instance = self.instance_manager.load(instance_id).await?;
        maintenance::fix_duplicates(&instance).await
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn load_settings_from_disk(data_dir: &PathBuf) -> Option<LauncherSettings> {
    let path = data_dir.join(SETTINGS_FILE);
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

fn default_data_dir() -> PathBuf {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME);

    if !dir.exists() {
        let _ = std::fs::create_dir_all(&dir);
    }

    dir
}
