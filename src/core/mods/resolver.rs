use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::metadata::{normalize_id, ModOrigin};
use super::registry::{ModRegistry, ResolvedModFile};
use super::rules::CompatRules;
use super::scanner::scan_mod_archive;
use super::validator::{IssueCode, ValidationResult};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;

/// Filename prefix applied to every mod the resolver installs, so re-runs
/// and cleanup tooling can tell auto-installed files from the user's own.
pub const AUTO_INSTALL_PREFIX: &str = "ember-auto.";

/// What one resolution run did. Partial progress is always preserved:
/// per-id errors land in `failed`, they never abort the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoResolveOutcome {
    /// `"id (version)"` per newly installed mod.
    pub installed: Vec<String>,
    /// Ids that were already satisfied when their turn came.
    pub skipped: Vec<String>,
    /// `"id (reason)"` per id that could not be resolved or installed.
    pub failed: Vec<String>,
}

/// Everything one resolution run needs.
pub struct ResolveContext<'a> {
    pub instance: &'a Instance,
    pub registry: &'a dyn ModRegistry,
    pub rules: &'a CompatRules,
    /// Shared content cache, append-only, keyed by project + content.
    pub cache_dir: &'a Path,
    pub on_log: Option<&'a (dyn Fn(&str) + Send + Sync)>,
}

/// A pending id in the resolution queue. Entries discovered transitively
/// already carry their registry project and resolved version, so
/// processing them repeats no search or version query.
struct QueueItem {
    mod_id: String,
    resolved: Option<(String, ResolvedModFile)>,
}

impl QueueItem {
    fn plain(mod_id: String) -> Self {
        Self {
            mod_id,
            resolved: None,
        }
    }
}

enum StepOutcome {
    Installed {
        id: String,
        version: String,
        required_projects: Vec<String>,
    },
    /// The downloaded artifact turned out to be a mod that is already
    /// installed under another id.
    AlreadyPresent,
}

/// Resolve every missing dependency reported by `validation` (plus the
/// static dependency hints) into installed mod files.
///
/// Breadth-first over a queue of normalized ids; each id is processed at
/// most once per run no matter how often it is enqueued. The only
/// run-aborting failures are an unknown instance (raised by the caller's
/// instance lookup) and failure to create the mods/cache directories.
pub async fn resolve_missing(
    ctx: &ResolveContext<'_>,
    validation: &ValidationResult,
) -> LauncherResult<AutoResolveOutcome> {
    let mut outcome = AutoResolveOutcome::default();

    // Other loaders keep their own manifest formats; nothing to do here.
    if !ctx.instance.loader.uses_fabric_manifests() {
        return Ok(outcome);
    }

    let loader = ctx.instance.loader.to_string();
    let minecraft_version = ctx.instance.minecraft_version.clone();
    let mods_dir = ctx.instance.mods_dir();

    for dir in [mods_dir.as_path(), ctx.cache_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| LauncherError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
    }

    // Installed state straight from the on-disk manifests, tolerant of a
    // partial or failed earlier validation.
    let mut installed = installed_norm_ids(&mods_dir);

    let mut queue: VecDeque<QueueItem> = VecDeque::new();
    for issue in &validation.issues {
        if issue.code == IssueCode::MissingDependency {
            if let Some(dep) = issue.involved_ids.get(1) {
                queue.push_back(QueueItem::plain(dep.clone()));
            }
        }
    }
    for (owner, hinted) in &ctx.rules.dependency_hints {
        if !installed.contains(owner) {
            continue;
        }
        for dep in hinted {
            if !installed.contains(&normalize_id(dep)) {
                queue.push_back(QueueItem::plain(dep.clone()));
            }
        }
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut visited_projects: HashSet<String> = HashSet::new();

    while let Some(item) = queue.pop_front() {
        let norm = normalize_id(&item.mod_id);
        if !visited.insert(norm.clone()) {
            continue;
        }
        if installed.contains(&norm) {
            outcome.skipped.push(item.mod_id);
            continue;
        }

        match install_one(ctx, &item, &loader, &minecraft_version, &mods_dir, &mut installed).await
        {
            Ok(StepOutcome::Installed {
                id,
                version,
                required_projects,
            }) => {
                let line = format!("Installed {} ({})", id, version);
                info!("{}", line);
                if let Some(log) = ctx.on_log {
                    log(&line);
                }
                outcome.installed.push(format!("{} ({})", id, version));

                // Transitive requirements surface as registry project ids.
                // Fetch them into the cache now and enqueue under the real
                // mod id from their manifest, so a dependency reached via
                // two different paths still resolves exactly once.
                for project_id in required_projects {
                    if !visited_projects.insert(project_id.clone()) {
                        continue;
                    }
                    match prefetch_transitive(ctx, &project_id, &minecraft_version, &loader).await {
                        Ok(next) => {
                            if !visited.contains(&normalize_id(&next.mod_id)) {
                                queue.push_back(next);
                            }
                        }
                        Err(e) => {
                            warn!("Transitive dependency {} failed: {}", project_id, e);
                            outcome.failed.push(format!("{} ({})", project_id, e));
                        }
                    }
                }
            }
            Ok(StepOutcome::AlreadyPresent) => outcome.skipped.push(item.mod_id),
            Err(e) => {
                warn!("Could not resolve {}: {}", item.mod_id, e);
                outcome.failed.push(format!("{} ({})", item.mod_id, e));
            }
        }
    }

    Ok(outcome)
}

async fn install_one(
    ctx: &ResolveContext<'_>,
    item: &QueueItem,
    loader: &str,
    minecraft_version: &str,
    mods_dir: &Path,
    installed: &mut HashSet<String>,
) -> LauncherResult<StepOutcome> {
    // Registry project: already known for transitive entries; the alias
    // table beats fuzzy search for everything well-known.
    let (project_id, prefetched) = match &item.resolved {
        Some((project_id, file)) => (project_id.clone(), Some(file.clone())),
        None => {
            let norm = normalize_id(&item.mod_id);
            let project_id = match ctx.rules.registry_aliases.get(&norm) {
                Some(project_id) => project_id.clone(),
                None => find_project(ctx.registry, &item.mod_id, loader).await?,
            };
            (project_id, None)
        }
    };

    let file = match prefetched {
        Some(file) => file,
        None => latest_compatible(ctx.registry, &project_id, minecraft_version, loader).await?,
    };

    let cache_path = ensure_cached(ctx, &project_id, &file).await?;

    // The downloaded artifact's own manifest wins over the requested id;
    // this catches renames and aliases before a redundant copy happens.
    let top_meta = scan_mod_archive(&cache_path)
        .into_iter()
        .find(|m| m.origin == ModOrigin::Top);
    let resolved_id = top_meta
        .as_ref()
        .and_then(|m| m.id.clone())
        .unwrap_or_else(|| item.mod_id.clone());
    let resolved_norm = normalize_id(&resolved_id);
    if installed.contains(&resolved_norm) {
        return Ok(StepOutcome::AlreadyPresent);
    }

    let dest = mods_dir.join(format!("{}{}.jar", AUTO_INSTALL_PREFIX, resolved_norm));
    tokio::fs::copy(&cache_path, &dest)
        .await
        .map_err(|e| LauncherError::Io {
            path: dest.clone(),
            source: e,
        })?;

    installed.insert(resolved_norm);
    if let Some(meta) = &top_meta {
        for alias in &meta.provides {
            installed.insert(normalize_id(alias));
        }
    }

    Ok(StepOutcome::Installed {
        id: resolved_id,
        version: file.version_number.clone(),
        required_projects: file.required_project_ids.clone(),
    })
}

/// Fuzzy project lookup: exact slug/title match beats a substring title
/// match beats the first hit.
async fn find_project(
    registry: &dyn ModRegistry,
    query: &str,
    loader: &str,
) -> LauncherResult<String> {
    let hits = registry.search(query, loader, 10).await?;
    let norm_query = normalize_id(query);
    let lower_query = query.to_ascii_lowercase();

    let chosen = hits
        .iter()
        .find(|h| {
            h.slug == lower_query
                || normalize_id(&h.slug) == norm_query
                || normalize_id(&h.title) == norm_query
        })
        .or_else(|| {
            hits.iter()
                .find(|h| h.title.to_ascii_lowercase().contains(&lower_query))
        })
        .or_else(|| hits.first());

    chosen
        .map(|h| h.project_id.clone())
        .ok_or_else(|| LauncherError::Other("project not found".to_string()))
}

async fn latest_compatible(
    registry: &dyn ModRegistry,
    project_id: &str,
    minecraft_version: &str,
    loader: &str,
) -> LauncherResult<ResolvedModFile> {
    registry
        .latest_version(project_id, minecraft_version, loader)
        .await
        .ok()
        .flatten()
        .ok_or_else(|| {
            LauncherError::Other(format!("no compatible version for {}", minecraft_version))
        })
}

/// Download `file` into the content cache unless an identical artifact is
/// already there. The cache key is the content hash when the registry
/// supplies one, the registry file name otherwise; a verification failure
/// leaves the cache untouched.
async fn ensure_cached(
    ctx: &ResolveContext<'_>,
    project_id: &str,
    file: &ResolvedModFile,
) -> LauncherResult<PathBuf> {
    let cache_name = match &file.sha1 {
        Some(hash) => format!("{}-{}.jar", project_id, hash),
        None => format!("{}-{}", project_id, file.file_name),
    };
    let cache_path = ctx.cache_dir.join(cache_name);
    if !cache_path.exists() {
        ctx.registry
            .download_file(&file.download_url, &cache_path, file.sha1.as_deref())
            .await?;
    }
    Ok(cache_path)
}

async fn prefetch_transitive(
    ctx: &ResolveContext<'_>,
    project_id: &str,
    minecraft_version: &str,
    loader: &str,
) -> LauncherResult<QueueItem> {
    let file = latest_compatible(ctx.registry, project_id, minecraft_version, loader).await?;
    let cache_path = ensure_cached(ctx, project_id, &file).await?;
    let mod_id = scan_mod_archive(&cache_path)
        .into_iter()
        .find(|m| m.origin == ModOrigin::Top)
        .and_then(|m| m.id)
        .unwrap_or_else(|| {
            Path::new(&file.file_name)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| project_id.to_string())
        });

    Ok(QueueItem {
        mod_id,
        resolved: Some((project_id.to_string(), file)),
    })
}

/// Normalized ids (and provided aliases) of everything currently in the
/// mods directory.
fn installed_norm_ids(mods_dir: &Path) -> HashSet<String> {
    let mut ids = HashSet::new();
    let Ok(entries) = std::fs::read_dir(mods_dir) else {
        return ids;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jar") {
            continue;
        }
        for meta in scan_mod_archive(&path) {
            if let Some(id) = &meta.id {
                ids.insert(normalize_id(id));
            }
            for alias in &meta.provides {
                ids.insert(normalize_id(alias));
            }
        }
    }
    ids
}
