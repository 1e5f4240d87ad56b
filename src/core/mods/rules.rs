use std::collections::{HashMap, HashSet};

use super::metadata::normalize_id;

/// The version pseudo-dependency every mod declares against the game
/// itself.
pub const MINECRAFT_ID: &str = "minecraft";

/// Dependency ids satisfied by the runtime rather than by an installed
/// mod: the loaders themselves and the Java runtime.
const BUILTIN_PROVIDED: &[&str] = &["fabricloader", "quilt_loader", "java"];

/// Well-known dependency id → Modrinth project id. Bypasses fuzzy search
/// for the dependencies mods ask for most.
const REGISTRY_ALIASES: &[(&str, &str)] = &[
    ("fabric", "P7dR8mSH"),
    ("fabric-api", "P7dR8mSH"),
    ("cloth-config", "9s6osm5g"),
    ("clothconfig", "9s6osm5g"),
    ("modmenu", "mOgUt4GM"),
    ("architectury", "lhGA9TYQ"),
    ("sodium", "AANobbMI"),
    ("lithium", "gvQqBUqZ"),
    ("iris", "YL57xq9U"),
    ("indium", "Orvt0mRa"),
    ("ferritecore", "uXXizFIs"),
    ("krypton", "fQEb0iXm"),
];

/// Dependencies a mod is known to need but does not declare in its
/// manifest. A correctness patch for upstream metadata gaps.
const DEPENDENCY_HINTS: &[(&str, &[&str])] = &[
    // Connected textures silently require Indium when Sodium is present.
    ("continuity", &["indium"]),
];

/// Mod pairs that break each other's launch no matter the versions.
const KNOWN_CONFLICTS: &[(&str, &str, &str)] = &[
    (
        "sodium",
        "embeddium",
        "Sodium and Embeddium both replace the vanilla renderer; keep only one",
    ),
    (
        "optifabric",
        "sodium",
        "OptiFine (via OptiFabric) and Sodium patch the same rendering internals",
    ),
    (
        "phosphor",
        "starlight",
        "Phosphor and Starlight are competing lighting-engine rewrites",
    ),
];

/// Mods flagged as experimental: they load, but are a known crash source.
const EXPERIMENTAL_IDS: &[&str] = &["nvidium", "c2me"];

/// A known mutual conflict between two mod ids.
#[derive(Debug, Clone)]
pub struct ConflictRule {
    pub id_a: String,
    pub id_b: String,
    pub reason: String,
}

/// Immutable compatibility knowledge consulted by the validator and the
/// auto-resolver. Constructed once at startup and passed by reference —
/// never a mutable global. All keys and set members are normalized ids.
#[derive(Debug, Clone)]
pub struct CompatRules {
    pub registry_aliases: HashMap<String, String>,
    pub dependency_hints: HashMap<String, Vec<String>>,
    pub conflicts: Vec<ConflictRule>,
    pub builtin_provided: HashSet<String>,
    pub experimental_ids: HashSet<String>,
}

impl CompatRules {
    /// The built-in rule tables shipped with the launcher.
    pub fn builtin() -> Self {
        Self {
            registry_aliases: REGISTRY_ALIASES
                .iter()
                .map(|(id, project)| (normalize_id(id), project.to_string()))
                .collect(),
            dependency_hints: DEPENDENCY_HINTS
                .iter()
                .map(|(owner, deps)| {
                    (
                        normalize_id(owner),
                        deps.iter().map(|d| d.to_string()).collect(),
                    )
                })
                .collect(),
            conflicts: KNOWN_CONFLICTS
                .iter()
                .map(|(a, b, reason)| ConflictRule {
                    id_a: a.to_string(),
                    id_b: b.to_string(),
                    reason: reason.to_string(),
                })
                .collect(),
            builtin_provided: BUILTIN_PROVIDED.iter().map(|id| normalize_id(id)).collect(),
            experimental_ids: EXPERIMENTAL_IDS.iter().map(|id| normalize_id(id)).collect(),
        }
    }
}

impl Default for CompatRules {
    fn default() -> Self {
        Self::builtin()
    }
}
