use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constraint;
use super::metadata::{normalize_id, ModMetadata, ModOrigin};
use super::rules::{CompatRules, MINECRAFT_ID};
use super::scanner::scan_mod_archive;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::instance::Instance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    DuplicateModId,
    MissingDependency,
    IncompatibleMinecraftVersion,
    NonConformingMod,
    KnownConflict,
    ExperimentalMod,
}

/// `Critical` issues are expected to break the launch; `Warning` issues
/// may degrade it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub severity: Severity,
    pub title: String,
    pub detail: String,
    pub affected_files: BTreeSet<String>,
    pub involved_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSummary {
    None,
    Warnings,
    Critical,
}

/// The full outcome of one validation pass over an instance's mods
/// directory. Pure function of on-disk state at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub summary: ValidationSummary,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn empty() -> Self {
        Self {
            summary: ValidationSummary::None,
            issues: Vec::new(),
        }
    }
}

/// Validate every mod installed in `instance` against the instance's
/// Minecraft version and the static compatibility tables.
///
/// Never fails on mod content: unreadable archives and manifests degrade
/// to warnings. The caller already resolved the instance, which is the
/// engine's single fatal lookup.
pub async fn validate_mods(
    instance: &Instance,
    rules: &CompatRules,
) -> LauncherResult<ValidationResult> {
    let mods_dir = instance.mods_dir();
    if !mods_dir.exists() {
        return Ok(ValidationResult::empty());
    }

    let files = list_jar_files(&mods_dir).await?;
    let mut all: Vec<ModMetadata> = Vec::new();
    for file in &files {
        all.extend(scan_mod_archive(file));
    }
    debug!(
        "Validating {} mod files ({} manifests) in {:?}",
        files.len(),
        all.len(),
        mods_dir
    );

    // Top-origin metadata grouped by raw id: the basis for duplicate and
    // conflict detection. Nested (embedded) copies never count here.
    let mut by_primary_id: BTreeMap<String, Vec<&ModMetadata>> = BTreeMap::new();
    for meta in all.iter().filter(|m| m.origin == ModOrigin::Top) {
        if let Some(id) = &meta.id {
            by_primary_id.entry(id.clone()).or_default().push(meta);
        }
    }

    // Availability spans every origin: a dependency satisfied by an
    // embedded jar or a declared alias is satisfied.
    let mut available_ids: HashSet<&str> = HashSet::new();
    let mut available_norm: HashSet<String> = HashSet::new();
    for meta in &all {
        for id in meta.id.iter().chain(meta.provides.iter()) {
            available_ids.insert(id.as_str());
            available_norm.insert(normalize_id(id));
        }
    }

    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut seen: HashSet<(IssueCode, String, String)> = HashSet::new();
    let mut push = |issue: ValidationIssue| {
        let key = (issue.code, issue.title.clone(), issue.detail.clone());
        if seen.insert(key) {
            issues.push(issue);
        }
    };

    // ── Unidentifiable files ────────────────────────────
    for meta in all.iter().filter(|m| m.id.is_none()) {
        push(ValidationIssue {
            code: IssueCode::NonConformingMod,
            severity: Severity::Warning,
            title: "Unrecognized mod file".to_string(),
            detail: format!(
                "{} does not declare a mod id and may not be a {} mod",
                meta.file, instance.loader
            ),
            affected_files: BTreeSet::from([meta.file.clone()]),
            involved_ids: Vec::new(),
        });
    }

    // ── Duplicate identities ────────────────────────────
    for (id, group) in by_primary_id.iter().filter(|(_, g)| g.len() > 1) {
        let files: BTreeSet<String> = group.iter().map(|m| m.file.clone()).collect();
        push(ValidationIssue {
            code: IssueCode::DuplicateModId,
            severity: Severity::Critical,
            title: format!("Duplicate mod '{}'", id),
            detail: format!(
                "'{}' is installed {} times: {}",
                id,
                files.len(),
                files.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            affected_files: files,
            involved_ids: vec![id.clone()],
        });
    }

    // ── Declared dependencies ───────────────────────────
    for meta in &all {
        let Some(owner) = &meta.id else { continue };
        for (dep_id, constraint_expr) in &meta.depends {
            let dep_norm = normalize_id(dep_id);

            if dep_norm == MINECRAFT_ID {
                if !constraint::matches(constraint_expr, &instance.minecraft_version) {
                    push(ValidationIssue {
                        code: IssueCode::IncompatibleMinecraftVersion,
                        severity: Severity::Critical,
                        title: format!(
                            "'{}' is incompatible with Minecraft {}",
                            owner, instance.minecraft_version
                        ),
                        detail: format!(
                            "'{}' requires Minecraft matching '{}'",
                            owner, constraint_expr
                        ),
                        affected_files: BTreeSet::from([meta.file.clone()]),
                        involved_ids: vec![owner.clone()],
                    });
                }
                continue;
            }

            // Satisfied by the loader / runtime itself.
            if rules.builtin_provided.contains(&dep_norm) {
                continue;
            }

            if !available_ids.contains(dep_id.as_str()) && !available_norm.contains(&dep_norm) {
                push(ValidationIssue {
                    code: IssueCode::MissingDependency,
                    severity: Severity::Critical,
                    title: format!("'{}' requires '{}'", owner, dep_id),
                    detail: format!(
                        "no installed mod provides '{}' (wanted: '{}')",
                        dep_id, constraint_expr
                    ),
                    affected_files: BTreeSet::from([meta.file.clone()]),
                    involved_ids: vec![owner.clone(), dep_id.clone()],
                });
            }
        }
    }

    // ── Known mutual conflicts ──────────────────────────
    let top_by_norm: BTreeMap<String, &str> = by_primary_id
        .keys()
        .map(|id| (normalize_id(id), id.as_str()))
        .collect();
    for rule in &rules.conflicts {
        let a = top_by_norm.get(&normalize_id(&rule.id_a)).copied();
        let b = top_by_norm.get(&normalize_id(&rule.id_b)).copied();
        if let (Some(a), Some(b)) = (a, b) {
            let affected: BTreeSet<String> = [a, b]
                .iter()
                .flat_map(|id| by_primary_id[*id].iter().map(|m| m.file.clone()))
                .collect();
            push(ValidationIssue {
                code: IssueCode::KnownConflict,
                severity: Severity::Critical,
                title: format!("'{}' conflicts with '{}'", a, b),
                detail: rule.reason.clone(),
                affected_files: affected,
                involved_ids: vec![a.to_string(), b.to_string()],
            });
        }
    }

    // ── Experimental mods ───────────────────────────────
    for (id, group) in &by_primary_id {
        if rules.experimental_ids.contains(&normalize_id(id)) {
            push(ValidationIssue {
                code: IssueCode::ExperimentalMod,
                severity: Severity::Warning,
                title: format!("'{}' is experimental", id),
                detail: format!(
                    "'{}' is known to be unstable; remove it first if the game fails to launch",
                    id
                ),
                affected_files: group.iter().map(|m| m.file.clone()).collect(),
                involved_ids: vec![id.clone()],
            });
        }
    }

    let summary = match issues.iter().map(|i| i.severity).max() {
        Some(Severity::Critical) => ValidationSummary::Critical,
        Some(Severity::Warning) => ValidationSummary::Warnings,
        None => ValidationSummary::None,
    };

    Ok(ValidationResult { summary, issues })
}

/// Enabled mod archives in a mods directory, sorted for deterministic
/// output.
pub(crate) async fn list_jar_files(mods_dir: &std::path::Path) -> LauncherResult<Vec<PathBuf>> {
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
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("jar") {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
