//! PyPI registry client: Simple API (PEP 503/691) for version listings,
//! JSON API for per-version metadata, per spec §4.2.
//!
//! Grounded in the teacher's `services::pypi_client::PypiClient` (one
//! `reqwest::Client` field, a `thiserror` error enum, typed
//! `Serialize + Deserialize` response structs), generalized to prefer the
//! ~10x smaller Simple payload for listings and fall back to the JSON API
//! only on an empty result (SPEC_FULL §9 Open Question: narrowed from "any
//! parse failure" to "empty result only").

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::artifact::{Artifact, Checksum, DigestAlgo};
use crate::models::cache_entry::LISTING_TTL_MS;

#[derive(Debug, Error)]
pub enum PypiError {
    #[error(transparent)]
    Http(#[from] crate::http::HttpError),
    #[error("failed to parse {0}: {1}")]
    Parse(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct PypiClient {
    http: SharedClients,
    cache: Arc<MetadataCache>,
    simple_base: String,
    json_base: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimpleIndexResponse {
    pub name: String,
    pub versions: Vec<String>,
    pub files: Vec<SimpleFile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimpleFile {
    pub filename: String,
    pub url: String,
    pub hashes: HashMap<String, String>,
    #[serde(rename = "requires-python")]
    pub requires_python: Option<String>,
    #[serde(default)]
    pub yanked: YankedField,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(untagged)]
pub enum YankedField {
    #[default]
    No,
    Flag(bool),
    Reason(String),
}

impl YankedField {
    pub fn is_yanked(&self) -> bool {
        !matches!(self, YankedField::No | YankedField::Flag(false))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PypiJsonResponse {
    pub info: PypiInfo,
    pub releases: HashMap<String, Vec<PypiFileJson>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PypiInfo {
    pub name: String,
    pub version: String,
    #[serde(rename = "requires_python")]
    pub requires_python: Option<String>,
    #[serde(default)]
    pub requires_dist: Option<Vec<String>>,
}

/// What a resolver needs for one version: the candidate files to pick from
/// and the PEP 508 requirement strings to walk next (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct PypiVersionMetadata {
    pub files: Vec<PypiFileJson>,
    pub requires_dist: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PypiFileJson {
    pub filename: String,
    pub url: String,
    pub digests: HashMap<String, String>,
    pub size: u64,
    #[serde(default)]
    pub yanked: bool,
    pub packagetype: String,
    pub requires_python: Option<String>,
}

impl PypiClient {
    pub fn new(http: SharedClients, cache: Arc<MetadataCache>) -> Self {
        Self {
            http,
            cache,
            simple_base: "https://pypi.org/simple".to_string(),
            json_base: "https://pypi.org/pypi".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_urls(http: SharedClients, cache: Arc<MetadataCache>, simple_base: String, json_base: String) -> Self {
        Self {
            http,
            cache,
            simple_base,
            json_base,
        }
    }

    /// Lists all versions for `name`, preferring the Simple API; retries
    /// against the JSON API only if the Simple response is empty (PEP 691
    /// HTML entities in `data-requires-python` are unescaped by serde_json
    /// when the JSON flavor is requested, sidestepping manual unescaping).
    pub async fn list_versions(&self, name: &str) -> Result<Vec<String>, PypiError> {
        let key = format!("pypi:simple:{name}");
        let norm = crate::models::package_ref::normalize_name(crate::models::ecosystem::EcosystemKind::Pypi, name);
        let url = format!("{}/{norm}/", self.simple_base);
        let http = self.http.clone();
        let bytes = self
            .cache
            .get(&key, Some(LISTING_TTL_MS), || async move {
                let response = http.get_metadata(&url).await.map_err(PypiError::from)?;
                response.bytes().await.map(|b| b.to_vec()).map_err(|e| PypiError::Http(e.into()))
            })
            .await?;

        let parsed: SimpleIndexResponse =
            serde_json::from_slice(&bytes).map_err(|e| PypiError::Parse("simple-index", e.to_string()))?;

        if !parsed.versions.is_empty() {
            return Ok(parsed.versions);
        }

        // Empty-result fallback to the JSON API.
        let full = self.get_all_metadata(name).await?;
        Ok(full.releases.into_keys().collect())
    }

    /// Fetches the full JSON-API document (all releases) for `name`.
    async fn get_all_metadata(&self, name: &str) -> Result<PypiJsonResponse, PypiError> {
        let key = format!("pypi:json:{name}");
        let url = format!("{}/{name}/json", self.json_base);
        let http = self.http.clone();
        let bytes = self
            .cache
            .get(&key, Some(LISTING_TTL_MS), || async move {
                let response = http.get_metadata(&url).await.map_err(PypiError::from)?;
                response.bytes().await.map(|b| b.to_vec()).map_err(|e| PypiError::Http(e.into()))
            })
            .await?;
        serde_json::from_slice(&bytes).map_err(|e| PypiError::Parse("pypi-json", e.to_string()))
    }

    /// Per-version metadata: the candidate file list plus the
    /// `requires_dist` requirement strings a resolver walks next.
    pub async fn get_metadata(&self, name: &str, version: &str) -> Result<PypiVersionMetadata, PypiError> {
        let key = format!("pypi:json:{name}:{version}");
        let url = format!("{}/{name}/{version}/json", self.json_base);
        let http = self.http.clone();
        let bytes = self
            .cache
            .get(&key, None, || async move {
                let response = http.get_metadata(&url).await.map_err(PypiError::from)?;
                response.bytes().await.map(|b| b.to_vec()).map_err(|e| PypiError::Http(e.into()))
            })
            .await?;
        let parsed: PypiJsonResponse =
            serde_json::from_slice(&bytes).map_err(|e| PypiError::Parse("pypi-json", e.to_string()))?;
        let files = parsed
            .releases
            .get(version)
            .cloned()
            .ok_or_else(|| PypiError::Parse("pypi-json", format!("no release entry for {version}")))?;
        Ok(PypiVersionMetadata {
            files,
            requires_dist: parsed.info.requires_dist.unwrap_or_default(),
        })
    }

    pub async fn fetch_blob(&self, url: &str) -> Result<Vec<u8>, PypiError> {
        let response = self.http.get_blob(url).await?;
        Ok(response.bytes().await.map_err(|e| PypiError::Http(e.into()))?.to_vec())
    }
}

/// Converts a JSON-API file entry into an `Artifact`, parsing the
/// `#sha256=...` checksum (spec §4.2: "Parse #sha256= fragments as
/// checksums").
pub fn file_to_artifact(file: &PypiFileJson) -> Artifact {
    let mut artifact = Artifact::new(file.url.clone(), file.filename.clone()).with_size(file.size);
    if let Some(hex) = file.digests.get("sha256") {
        artifact = artifact.with_checksum(Checksum::new(DigestAlgo::Sha256, hex));
    } else if let Some(fragment) = file.url.split("#sha256=").nth(1) {
        artifact = artifact.with_checksum(Checksum::new(DigestAlgo::Sha256, fragment));
    }
    artifact.requires_python = file.requires_python.clone();
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yanked_field_accepts_bool_or_reason_string() {
        assert!(!YankedField::No.is_yanked());
        assert!(!YankedField::Flag(false).is_yanked());
        assert!(YankedField::Flag(true).is_yanked());
        assert!(YankedField::Reason("cve".into()).is_yanked());
    }

    #[test]
    fn file_to_artifact_parses_sha256_digest() {
        let mut digests = HashMap::new();
        digests.insert("sha256".to_string(), "abc123".to_string());
        let file = PypiFileJson {
            filename: "requests-2.28.0-py3-none-any.whl".to_string(),
            url: "https://files.pythonhosted.org/packages/.../requests-2.28.0-py3-none-any.whl".to_string(),
            digests,
            size: 100,
            yanked: false,
            packagetype: "bdist_wheel".to_string(),
            requires_python: Some(">=3.7".to_string()),
        };
        let artifact = file_to_artifact(&file);
        assert_eq!(artifact.checksum.unwrap().hex, "abc123");
    }

    #[tokio::test]
    async fn list_versions_falls_back_to_json_api_on_empty_simple_listing() {
        let mut server = mockito::Server::new_async().await;
        let simple_mock = server
            .mock("GET", "/simple/requests/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"requests","versions":[],"files":[]}"#)
            .create_async()
            .await;
        let json_mock = server
            .mock("GET", "/pypi/requests/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"info":{"name":"requests","version":"2.31.0","requires_python":null},"releases":{"2.31.0":[]}}"#)
            .create_async()
            .await;

        let client = PypiClient::with_base_urls(
            SharedClients::new(),
            Arc::new(MetadataCache::new(None)),
            format!("{}/simple", server.url()),
            format!("{}/pypi", server.url()),
        );
        let versions = client.list_versions("requests").await.unwrap();

        simple_mock.assert_async().await;
        json_mock.assert_async().await;
        assert_eq!(versions, vec!["2.31.0".to_string()]);
    }

    #[tokio::test]
    async fn get_metadata_reads_requires_dist_for_the_requested_version() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pypi/flask/2.3.0/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"info":{"name":"flask","version":"2.3.0","requires_python":">=3.8","requires_dist":["Werkzeug>=2.3.3"]},
                    "releases":{"2.3.0":[{"filename":"flask-2.3.0-py3-none-any.whl","url":"https://files.example/flask-2.3.0-py3-none-any.whl","digests":{"sha256":"deadbeef"},"size":100,"yanked":false,"packagetype":"bdist_wheel","requires_python":">=3.8"}]}}"#,
            )
            .create_async()
            .await;

        let client = PypiClient::with_base_urls(
            SharedClients::new(),
            Arc::new(MetadataCache::new(None)),
            format!("{}/simple", server.url()),
            format!("{}/pypi", server.url()),
        );
        let metadata = client.get_metadata("flask", "2.3.0").await.unwrap();

        mock.assert_async().await;
        assert_eq!(metadata.requires_dist, vec!["Werkzeug>=2.3.3".to_string()]);
        assert_eq!(metadata.files.len(), 1);
    }
}
