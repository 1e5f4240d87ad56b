use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use super::metadata::{parse_manifest, ModMetadata, ModOrigin};

/// Well-known manifest entry at the root of every Fabric-style mod JAR.
pub const MANIFEST_ENTRY: &str = "fabric.mod.json";

/// Read every mod manifest out of an archive: the top-level manifest plus
/// any manifests inside embedded JAR-in-JAR entries.
///
/// Always returns at least one record. An unreadable archive or top-level
/// manifest yields a single unidentified record (callers surface that as
/// "non-conforming mod", never as an error); unreadable nested entries are
/// dropped silently.
pub fn scan_mod_archive(path: &Path) -> Vec<ModMetadata> {
    let file_label = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    let mut archive = match File::open(path).map_err(|e| e.to_string()).and_then(|f| {
        ZipArchive::new(f).map_err(|e| e.to_string())
    }) {
        Ok(archive) => archive,
        Err(e) => {
            debug!("Cannot open {:?} as an archive: {}", path, e);
            return vec![ModMetadata::unidentified(file_label)];
        }
    };

    let mut results = vec![
        read_manifest(&mut archive, file_label.clone(), ModOrigin::Top)
            .unwrap_or_else(|| ModMetadata::unidentified(file_label.clone())),
    ];

    // One level of nesting: every entry sharing the archive's own extension
    // is tried as an embedded archive.
    let nested_suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".jar".to_string());
    let nested_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.ends_with(&nested_suffix))
        .map(|name| name.to_string())
        .collect();

    for name in nested_names {
        let mut buf = Vec::new();
        {
            let Ok(mut entry) = archive.by_name(&name) else {
                continue;
            };
            if entry.read_to_end(&mut buf).is_err() {
                continue;
            }
        }

        let Ok(mut nested) = ZipArchive::new(Cursor::new(buf)) else {
            continue;
        };
        let label = format!("{}!{}", file_label, name);
        if let Some(meta) = read_manifest(&mut nested, label, ModOrigin::Nested) {
            results.push(meta);
        }
    }

    results
}

fn read_manifest<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    file_label: String,
    origin: ModOrigin,
) -> Option<ModMetadata> {
    let mut raw = Vec::new();
    archive.by_name(MANIFEST_ENTRY).ok()?.read_to_end(&mut raw).ok()?;
    parse_manifest(file_label, &raw, origin)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Build a mod JAR in memory. `nested` embeds further JARs by entry name.
    pub(crate) fn jar_bytes(manifest: Option<&str>, nested: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        if let Some(body) = manifest {
            zip.start_file(MANIFEST_ENTRY, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        for (name, bytes) in nested {
            zip.start_file(*name, options).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    pub(crate) fn write_jar(dir: &Path, name: &str, manifest: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, jar_bytes(Some(manifest), &[])).unwrap();
        path
    }

    fn manifest(id: &str) -> String {
        serde_json::json!({ "id": id, "version": "1.0.0" }).to_string()
    }

    #[test]
    fn reads_top_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_jar(dir.path(), "sodium.jar", &manifest("sodium"));

        let metas = scan_mod_archive(&path);
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].id.as_deref(), Some("sodium"));
        assert_eq!(metas[0].origin, ModOrigin::Top);
        assert_eq!(metas[0].file, "sodium.jar");
    }

    #[test]
    fn reads_nested_manifests() {
        let inner = jar_bytes(Some(&manifest("xplat-core")), &[]);
        let outer = jar_bytes(
            Some(&manifest("bigmod")),
            &[("META-INF/jars/xplat-core.jar", inner)],
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bigmod.jar");
        std::fs::write(&path, outer).unwrap();

        let metas = scan_mod_archive(&path);
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].id.as_deref(), Some("bigmod"));
        assert_eq!(metas[1].id.as_deref(), Some("xplat-core"));
        assert_eq!(metas[1].origin, ModOrigin::Nested);
        assert_eq!(metas[1].file, "bigmod.jar!META-INF/jars/xplat-core.jar");
    }

    #[test]
    fn unreadable_nested_entries_are_dropped() {
        let outer = jar_bytes(
            Some(&manifest("bigmod")),
            &[("META-INF/jars/broken.jar", b"not a zip".to_vec())],
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bigmod.jar");
        std::fs::write(&path, outer).unwrap();

        let metas = scan_mod_archive(&path);
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].id.as_deref(), Some("bigmod"));
    }

    #[test]
    fn garbage_file_yields_unidentified_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jar");
        std::fs::write(&path, b"definitely not a zip").unwrap();

        let metas = scan_mod_archive(&path);
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].id, None);
        assert_eq!(metas[0].file, "broken.jar");
    }

    #[test]
    fn jar_without_manifest_yields_unidentified_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jar");
        std::fs::write(&path, jar_bytes(None, &[])).unwrap();

        let metas = scan_mod_archive(&path);
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].id, None);
    }

    #[test]
    fn invalid_top_manifest_yields_unidentified_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_jar(dir.path(), "odd.jar", "{{{ not json");

        let metas = scan_mod_archive(&path);
        assert_eq!(metas.len(), 1);
        assert_eq!(metas[0].id, None);
    }
}
