use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Where inside an archive a manifest was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModOrigin {
    /// The archive's own manifest.
    Top,
    /// A manifest inside an embedded (JAR-in-JAR) archive.
    Nested,
}

/// Metadata extracted from one mod manifest.
///
/// Produced transiently per validation/resolution run, never persisted.
/// A single JAR can yield several of these: one `Top` record plus one per
/// embedded JAR that carries its own manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModMetadata {
    /// File name, or `outer.jar!inner.jar` for nested manifests.
    pub file: String,
    pub id: Option<String>,
    pub version: Option<String>,
    /// Declared dependency id → version constraint expression.
    pub depends: BTreeMap<String, String>,
    /// Extra ids this mod can satisfy beyond its primary id.
    pub provides: Vec<String>,
    pub origin: ModOrigin,
}

impl ModMetadata {
    /// Record for a file whose manifest could not be read. Downstream
    /// consumers treat an id-less record as "unidentifiable mod", not as
    /// an error.
    pub fn unidentified(file: String) -> Self {
        Self {
            file,
            id: None,
            version: None,
            depends: BTreeMap::new(),
            provides: Vec::new(),
            origin: ModOrigin::Top,
        }
    }
}

/// Parse a `fabric.mod.json` body.
///
/// The schema is treated as strictly optional: a missing or wrong-typed
/// field degrades to "absent", only a body that is not a JSON object at
/// all fails the parse. `depends` values may be a single constraint
/// string or an array of alternatives, which collapse into one `||`
/// expression.
pub fn parse_manifest(file: String, raw: &[u8], origin: ModOrigin) -> Option<ModMetadata> {
    let value: serde_json::Value = serde_json::from_slice(raw).ok()?;
    let obj = value.as_object()?;

    let id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let version = obj
        .get("version")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let depends = obj
        .get("depends")
        .and_then(|v| v.as_object())
        .map(|deps| {
            deps.iter()
                .filter_map(|(dep_id, constraint)| {
                    constraint_expression(constraint).map(|expr| (dep_id.clone(), expr))
                })
                .collect()
        })
        .unwrap_or_default();

    let provides = obj
        .get("provides")
        .and_then(|v| v.as_array())
        .map(|aliases| {
            aliases
                .iter()
                .filter_map(|a| a.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();

    Some(ModMetadata {
        file,
        id,
        version,
        depends,
        provides,
        origin,
    })
}

fn constraint_expression(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        // An array of constraints means "any of these".
        serde_json::Value::Array(alternatives) => {
            let parts: Vec<&str> = alternatives.iter().filter_map(|v| v.as_str()).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" || "))
            }
        }
        _ => None,
    }
}

/// Canonical form of a mod/dependency id: case-folded with every
/// separator character stripped. All duplicate and availability checks
/// compare normalized ids only.
pub fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_manifest() {
        let raw = serde_json::json!({
            "id": "worldview",
            "version": "2.1.0",
            "depends": {
                "fabricloader": ">=0.15.0",
                "minecraft": "1.20.x",
                "clothconfig": "*"
            },
            "provides": ["worldview-core"]
        });
        let meta = parse_manifest(
            "worldview.jar".into(),
            raw.to_string().as_bytes(),
            ModOrigin::Top,
        )
        .unwrap();

        assert_eq!(meta.id.as_deref(), Some("worldview"));
        assert_eq!(meta.version.as_deref(), Some("2.1.0"));
        assert_eq!(meta.depends.len(), 3);
        assert_eq!(meta.depends["clothconfig"], "*");
        assert_eq!(meta.provides, vec!["worldview-core"]);
    }

    #[test]
    fn wrong_typed_fields_degrade_to_absent() {
        let raw = serde_json::json!({
            "id": 42,
            "version": ["2.1.0"],
            "depends": "not-a-map",
            "provides": "not-a-list"
        });
        let meta = parse_manifest("odd.jar".into(), raw.to_string().as_bytes(), ModOrigin::Top)
            .unwrap();

        assert_eq!(meta.id, None);
        assert_eq!(meta.version, None);
        assert!(meta.depends.is_empty());
        assert!(meta.provides.is_empty());
    }

    #[test]
    fn array_constraints_collapse_to_alternatives() {
        let raw = serde_json::json!({
            "id": "m",
            "depends": { "minecraft": ["1.20.1", "1.20.4"] }
        });
        let meta = parse_manifest("m.jar".into(), raw.to_string().as_bytes(), ModOrigin::Top)
            .unwrap();

        assert_eq!(meta.depends["minecraft"], "1.20.1 || 1.20.4");
    }

    #[test]
    fn non_object_body_is_rejected() {
        assert!(parse_manifest("m.jar".into(), b"[1, 2, 3]", ModOrigin::Top).is_none());
        assert!(parse_manifest("m.jar".into(), b"not json", ModOrigin::Top).is_none());
    }

    #[test]
    fn normalization_strips_case_and_separators() {
        assert_eq!(normalize_id("Cloth-Config"), "clothconfig");
        assert_eq!(normalize_id("quilt_loader"), "quiltloader");
        assert_eq!(normalize_id("fabric-api"), "fabricapi");
        assert_eq!(normalize_id("sodium"), "sodium");
    }
}
