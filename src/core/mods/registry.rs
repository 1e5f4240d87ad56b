use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

const MODRINTH_API_BASE: &str = "https://api.modrinth.com/v2";

/// One search hit on the mod registry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectHit {
    pub project_id: String,
    pub slug: String,
    pub title: String,
}

/// The newest registry version of a project compatible with one
/// `(minecraft_version, loader)` pair.
#[derive(Debug, Clone)]
pub struct ResolvedModFile {
    pub version_number: String,
    pub file_name: String,
    pub download_url: String,
    pub sha1: Option<String>,
    /// Projects this version declares as required dependencies.
    pub required_project_ids: Vec<String>,
}

/// The remote mod registry the auto-resolver talks to. A trait so the
/// resolver can run against an in-memory registry in tests.
#[async_trait]
pub trait ModRegistry: Send + Sync {
    async fn search(
        &self,
        query: &str,
        loader: &str,
        limit: usize,
    ) -> LauncherResult<Vec<ProjectHit>>;

    async fn latest_version(
        &self,
        project_id: &str,
        minecraft_version: &str,
        loader: &str,
    ) -> LauncherResult<Option<ResolvedModFile>>;

    /// Download an artifact to `dest`, verifying its SHA-1 when known.
    async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1: Option<&str>,
    ) -> LauncherResult<()>;
}

/// Modrinth v2 API client.
pub struct ModrinthRegistry {
    client: reqwest::Client,
    downloader: Downloader,
    base_url: String,
}

// ── Modrinth wire shapes ────────────────────────────────

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<ProjectHit>,
}

#[derive(Debug, Deserialize)]
struct VersionInfo {
    version_number: String,
    #[serde(default)]
    files: Vec<VersionFile>,
    #[serde(default)]
    dependencies: Vec<VersionDependency>,
}

#[derive(Debug, Deserialize)]
struct VersionFile {
    url: String,
    filename: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    hashes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct VersionDependency {
    project_id: Option<String>,
    dependency_type: String,
}

impl ModrinthRegistry {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            downloader: Downloader::new(client.clone()),
            client,
            base_url: MODRINTH_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API root (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModRegistry for ModrinthRegistry {
    async fn search(
        &self,
        query: &str,
        loader: &str,
        limit: usize,
    ) -> LauncherResult<Vec<ProjectHit>> {
        let facets = format!(r#"[["categories:{}"],["project_type:mod"]]"#, loader);
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("query", query),
                ("facets", facets.as_str()),
                ("limit", limit.to_string().as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::Registry(format!(
                "search returned {} for '{}'",
                status, query
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        debug!("Registry search '{}' -> {} hits", query, parsed.hits.len());
        Ok(parsed.hits)
    }

    async fn latest_version(
        &self,
        project_id: &str,
        minecraft_version: &str,
        loader: &str,
    ) -> LauncherResult<Option<ResolvedModFile>> {
        let loaders = format!(r#"["{}"]"#, loader);
        let game_versions = format!(r#"["{}"]"#, minecraft_version);
        let response = self
            .client
            .get(format!("{}/project/{}/version", self.base_url, project_id))
            .query(&[
                ("loaders", loaders.as_str()),
                ("game_versions", game_versions.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LauncherError::Registry(format!(
                "version listing returned {} for '{}'",
                status, project_id
            )));
        }

        // Modrinth returns versions newest-first.
        let versions: Vec<VersionInfo> = response.json().await?;
        let Some(version) = versions.into_iter().next() else {
            return Ok(None);
        };

        let Some(file) = version
            .files
            .iter()
            .find(|f| f.primary)
            .or_else(|| version.files.first())
        else {
            return Ok(None);
        };

        let required_project_ids = version
            .dependencies
            .iter()
            .filter(|d| d.dependency_type == "required")
            .filter_map(|d| d.project_id.clone())
            .collect();

        Ok(Some(ResolvedModFile {
            version_number: version.version_number.clone(),
            file_name: file.filename.clone(),
            download_url: file.url.clone(),
            sha1: file.hashes.get("sha1").cloned(),
            required_project_ids,
        }))
    }

    async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1: Option<&str>,
    ) -> LauncherResult<()> {
        self.downloader.download_file(url, dest, sha1).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::build_http_client;

    fn registry(server: &mockito::Server) -> ModrinthRegistry {
        ModrinthRegistry::new(build_http_client().unwrap()).with_base_url(server.url())
    }

    #[tokio::test]
    async fn search_parses_hits() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/search")
            .match_query(mockito::Matcher::UrlEncoded(
                "query".into(),
                "cloth config".into(),
            ))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "hits": [
                        { "project_id": "9s6osm5g", "slug": "cloth-config", "title": "Cloth Config API" },
                        { "project_id": "zzzz", "slug": "cloth-armor", "title": "Cloth Armor" }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let hits = registry(&server)
            .search("cloth config", "fabric", 10)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].project_id, "9s6osm5g");
        assert_eq!(hits[0].slug, "cloth-config");
    }

    #[tokio::test]
    async fn latest_version_prefers_primary_file_and_required_deps() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/project/9s6osm5g/version")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                serde_json::json!([
                    {
                        "version_number": "11.1.106",
                        "files": [
                            { "url": "https://cdn.example/sources.jar", "filename": "sources.jar", "primary": false, "hashes": {} },
                            { "url": "https://cdn.example/cloth.jar", "filename": "cloth-config-11.1.106.jar", "primary": true,
                              "hashes": { "sha1": "abc123", "sha512": "ignored" } }
                        ],
                        "dependencies": [
                            { "project_id": "P7dR8mSH", "dependency_type": "required" },
                            { "project_id": "mOgUt4GM", "dependency_type": "optional" },
                            { "project_id": null, "dependency_type": "required" }
                        ]
                    },
                    { "version_number": "11.0.0", "files": [], "dependencies": [] }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let resolved = registry(&server)
            .latest_version("9s6osm5g", "1.20.4", "fabric")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.version_number, "11.1.106");
        assert_eq!(resolved.file_name, "cloth-config-11.1.106.jar");
        assert_eq!(resolved.sha1.as_deref(), Some("abc123"));
        assert_eq!(resolved.required_project_ids, vec!["P7dR8mSH".to_string()]);
    }

    #[tokio::test]
    async fn latest_version_handles_no_match() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/project/unknown/version")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/project/empty/version")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let reg = registry(&server);
        assert!(reg
            .latest_version("unknown", "1.20.4", "fabric")
            .await
            .unwrap()
            .is_none());
        assert!(reg
            .latest_version("empty", "1.20.4", "fabric")
            .await
            .unwrap()
            .is_none());
    }
}
