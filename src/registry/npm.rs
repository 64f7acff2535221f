//! npm registry client: full packument fetch + scoped-name percent-encoding,
//! per spec §4.2.
//!
//! Grounded directly in the teacher's `services::npm_client::NpmClient` —
//! same `dist-tags`/`versions` packument shape, same `NpmDistInfo` fields —
//! generalized to go through [`SharedClients`]/[`MetadataCache`] instead of
//! an ad-hoc `reqwest::Client`, and to carry `peerDependencies` and
//! `optionalDependencies` which the teacher's struct dropped.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::artifact::{Artifact, Checksum, DigestAlgo};
use crate::models::cache_entry::LISTING_TTL_MS;

#[derive(Debug, Error)]
pub enum NpmError {
    #[error(transparent)]
    Http(#[from] crate::http::HttpError),
    #[error("failed to parse packument: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct NpmClient {
    http: SharedClients,
    cache: Arc<MetadataCache>,
    registry_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NpmPackument {
    pub name: String,
    pub versions: HashMap<String, NpmVersionInfo>,
    #[serde(rename = "dist-tags")]
    pub dist_tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NpmVersionInfo {
    pub name: String,
    pub version: String,
    pub dist: NpmDistInfo,
    #[serde(default)]
    pub dependencies: HashMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    pub peer_dependencies: HashMap<String, String>,
    #[serde(default, rename = "peerDependenciesMeta")]
    pub peer_dependencies_meta: HashMap<String, NpmPeerMeta>,
    #[serde(default, rename = "optionalDependencies")]
    pub optional_dependencies: HashMap<String, String>,
    #[serde(default, rename = "engines")]
    pub engines: HashMap<String, String>,
    pub os: Option<Vec<String>>,
    pub cpu: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NpmPeerMeta {
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NpmDistInfo {
    pub tarball: String,
    pub shasum: Option<String>,
    pub integrity: Option<String>,
    #[serde(rename = "unpackedSize")]
    pub unpacked_size: Option<u64>,
}

impl NpmClient {
    pub fn new(http: SharedClients, cache: Arc<MetadataCache>) -> Self {
        Self {
            http,
            cache,
            registry_url: "https://registry.npmjs.org".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_registry_url(http: SharedClients, cache: Arc<MetadataCache>, registry_url: String) -> Self {
        Self { http, cache, registry_url }
    }

    /// Percent-encodes the `/` in a scoped name (`@types/node` -> `@types%2fnode`)
    /// per the registry's own URL scheme, same as the teacher's CLI resolver
    /// worked around by URL-encoding before request construction.
    fn packument_url(&self, name: &str) -> String {
        let encoded = name.replacen('/', "%2f", 1);
        format!("{}/{encoded}", self.registry_url)
    }

    pub async fn get_packument(&self, name: &str) -> Result<NpmPackument, NpmError> {
        let key = format!("npm:packument:{name}");
        let url = self.packument_url(name);
        let http = self.http.clone();
        let bytes = self
            .cache
            .get(&key, Some(LISTING_TTL_MS), || async move {
                let response = http.get_metadata(&url).await.map_err(NpmError::from)?;
                response.bytes().await.map(|b| b.to_vec()).map_err(|e| NpmError::Http(e.into()))
            })
            .await?;
        serde_json::from_slice(&bytes).map_err(|e| NpmError::Parse(e.to_string()))
    }

    pub async fn list_versions(&self, name: &str) -> Result<Vec<String>, NpmError> {
        Ok(self.get_packument(name).await?.versions.into_keys().collect())
    }

    pub async fn get_version(&self, name: &str, version: &str) -> Result<NpmVersionInfo, NpmError> {
        let packument = self.get_packument(name).await?;
        packument
            .versions
            .get(version)
            .cloned()
            .ok_or_else(|| NpmError::Parse(format!("no version entry for {name}@{version}")))
    }

    pub async fn dist_tag(&self, name: &str, tag: &str) -> Result<Option<String>, NpmError> {
        Ok(self.get_packument(name).await?.dist_tags.get(tag).cloned())
    }

    pub async fn fetch_tarball(&self, url: &str) -> Result<Vec<u8>, NpmError> {
        let response = self.http.get_blob(url).await?;
        Ok(response.bytes().await.map_err(|e| NpmError::Http(e.into()))?.to_vec())
    }
}

/// Converts a version's `dist` block into an `Artifact`, preferring the
/// `integrity` SSRI string (sha512 in practice) over the legacy `shasum`
/// (sha1), per spec §4.2 ("ssri integrity strings take priority over shasum").
pub fn dist_to_artifact(version: &NpmVersionInfo) -> Artifact {
    let filename = version
        .dist
        .tarball
        .rsplit('/')
        .next()
        .unwrap_or(&version.dist.tarball)
        .to_string();
    let mut artifact = Artifact::new(version.dist.tarball.clone(), filename);
    if let Some(size) = version.dist.unpacked_size {
        artifact = artifact.with_size(size);
    }
    if let Some(integrity) = &version.dist.integrity {
        if let Some((algo_name, b64)) = integrity.split_once('-') {
            if let Some(algo) = DigestAlgo::from_ssri_prefix(algo_name) {
                use base64::Engine as _;
                if let Ok(raw) = base64::engine::general_purpose::STANDARD.decode(b64) {
                    let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
                    artifact = artifact.with_checksum(Checksum::new(algo, hex));
                }
            }
        }
    }
    if artifact.checksum.is_none() {
        if let Some(shasum) = &version.dist.shasum {
            artifact = artifact.with_checksum(Checksum::new(DigestAlgo::Sha1, shasum));
        }
    }
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packument_url_percent_encodes_scope_slash() {
        let http = SharedClients::new();
        let cache = Arc::new(MetadataCache::new(None));
        let client = NpmClient::with_registry_url(http, cache, "https://registry.npmjs.org".to_string());
        assert_eq!(client.packument_url("@types/node"), "https://registry.npmjs.org/@types%2fnode");
        assert_eq!(client.packument_url("lodash"), "https://registry.npmjs.org/lodash");
    }

    #[test]
    fn dist_to_artifact_prefers_integrity_over_shasum() {
        let version = NpmVersionInfo {
            name: "lodash".to_string(),
            version: "4.17.21".to_string(),
            dist: NpmDistInfo {
                tarball: "https://registry.npmjs.org/lodash/-/lodash-4.17.21.tgz".to_string(),
                shasum: Some("679591c564c3bffaae8454cf0b3df370c3d6911c".to_string()),
                integrity: Some("sha512-v2kDEe57lecTulaDIuNTPy3Ry4/GmFtH4qGY7V4KX5DUyMdYkWZsz6ZDJLmqz+ZBiLWBKZ3R5qkjWJ5GV1iy4DrQ==".to_string()),
                unpacked_size: Some(500000),
            },
            dependencies: HashMap::new(),
            peer_dependencies: HashMap::new(),
            peer_dependencies_meta: HashMap::new(),
            optional_dependencies: HashMap::new(),
            engines: HashMap::new(),
            os: None,
            cpu: None,
        };
        let artifact = dist_to_artifact(&version);
        assert_eq!(artifact.checksum.unwrap().algo, DigestAlgo::Sha512);
    }

    #[tokio::test]
    async fn get_packument_parses_a_served_fixture() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "name": "left-pad",
            "dist-tags": {"latest": "1.3.0"},
            "versions": {
                "1.3.0": {
                    "name": "left-pad",
                    "version": "1.3.0",
                    "dist": {"tarball": format!("{}/left-pad/-/left-pad-1.3.0.tgz", server.url())},
                }
            }
        });
        let mock = server
            .mock("GET", "/left-pad")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = NpmClient::with_registry_url(SharedClients::new(), Arc::new(MetadataCache::new(None)), server.url());
        let packument = client.get_packument("left-pad").await.unwrap();

        mock.assert_async().await;
        assert_eq!(packument.dist_tags.get("latest"), Some(&"1.3.0".to_string()));
        assert!(packument.versions.contains_key("1.3.0"));
    }

    #[tokio::test]
    async fn get_packument_surfaces_not_found() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/missing-pkg").with_status(404).create_async().await;

        let client = NpmClient::with_registry_url(SharedClients::new(), Arc::new(MetadataCache::new(None)), server.url());
        let err = client.get_packument("missing-pkg").await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, NpmError::Http(crate::http::HttpError::NotFound(_))));
    }
}
