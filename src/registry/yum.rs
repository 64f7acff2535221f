//! YUM/DNF registry client: `repomd.xml` -> `primary.xml.gz` per spec §4.2.
//!
//! No teacher precedent; grounded on the repomd/primary document shapes
//! documented across the retrieval pack's packaging-adjacent examples and
//! on `quick-xml::de` for structured XML, the same pattern used in
//! [`crate::registry::maven`].

use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::artifact::{Artifact, Checksum, DigestAlgo};
use crate::models::cache_entry::LISTING_TTL_MS;

#[derive(Debug, Error)]
pub enum YumError {
    #[error(transparent)]
    Http(#[from] crate::http::HttpError),
    #[error("failed to parse {0}: {1}")]
    Parse(&'static str, String),
    #[error("failed to decompress primary.xml.gz: {0}")]
    Decompress(String),
}

#[derive(Debug, Clone)]
pub struct YumClient {
    http: SharedClients,
    cache: Arc<MetadataCache>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Repomd {
    #[serde(default, rename = "data")]
    pub data: Vec<RepomdData>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepomdData {
    #[serde(rename = "@type")]
    pub data_type: String,
    pub location: RepomdLocation,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepomdLocation {
    #[serde(rename = "@href")]
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimaryMetadata {
    #[serde(default, rename = "package")]
    pub package: Vec<PrimaryPackage>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimaryPackage {
    pub name: String,
    pub arch: String,
    pub version: PrimaryVersion,
    pub checksum: PrimaryChecksum,
    pub location: RepomdLocation,
    #[serde(default)]
    pub format: PrimaryFormat,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimaryVersion {
    #[serde(rename = "@epoch")]
    pub epoch: Option<String>,
    #[serde(rename = "@ver")]
    pub ver: String,
    #[serde(rename = "@rel")]
    pub rel: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimaryChecksum {
    #[serde(rename = "@type")]
    pub algo: String,
    #[serde(rename = "$text")]
    pub hex: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimaryFormat {
    #[serde(default, rename = "requires")]
    pub requires: Option<PrimaryRequires>,
    #[serde(default, rename = "provides")]
    pub provides: Option<PrimaryProvides>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimaryRequires {
    #[serde(default, rename = "entry")]
    pub entry: Vec<PrimaryEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimaryProvides {
    #[serde(default, rename = "entry")]
    pub entry: Vec<PrimaryEntry>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PrimaryEntry {
    #[serde(rename = "@name")]
    pub name: String,
}

impl YumClient {
    pub fn new(http: SharedClients, cache: Arc<MetadataCache>) -> Self {
        Self { http, cache }
    }

    pub async fn get_repomd(&self, repo_base_url: &str) -> Result<Repomd, YumError> {
        let key = format!("yum:repomd:{repo_base_url}");
        let url = format!("{repo_base_url}/repodata/repomd.xml");
        let http = self.http.clone();
        let bytes = self
            .cache
            .get(&key, Some(LISTING_TTL_MS), || async move {
                let response = http.get_metadata(&url).await.map_err(YumError::from)?;
                response.bytes().await.map(|b| b.to_vec()).map_err(|e| YumError::Http(e.into()))
            })
            .await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| YumError::Parse("repomd.xml", e.to_string()))?;
        quick_xml::de::from_str(text).map_err(|e| YumError::Parse("repomd.xml", e.to_string()))
    }

    pub async fn get_primary(&self, repo_base_url: &str) -> Result<PrimaryMetadata, YumError> {
        let repomd = self.get_repomd(repo_base_url).await?;
        let primary_href = repomd
            .data
            .iter()
            .find(|d| d.data_type == "primary")
            .map(|d| d.location.href.clone())
            .ok_or_else(|| YumError::Parse("repomd.xml", "no primary data entry".to_string()))?;

        let key = format!("yum:primary:{repo_base_url}:{primary_href}");
        let url = format!("{repo_base_url}/{primary_href}");
        let http = self.http.clone();
        let bytes = self
            .cache
            .get(&key, Some(LISTING_TTL_MS), || async move {
                let response = http.get_metadata(&url).await.map_err(YumError::from)?;
                response.bytes().await.map(|b| b.to_vec()).map_err(|e| YumError::Http(e.into()))
            })
            .await?;

        let mut decoder = GzDecoder::new(bytes.as_slice());
        let mut xml = String::new();
        decoder.read_to_string(&mut xml).map_err(|e| YumError::Decompress(e.to_string()))?;
        quick_xml::de::from_str(&xml).map_err(|e| YumError::Parse("primary.xml", e.to_string()))
    }

    pub async fn fetch_blob(&self, url: &str) -> Result<Vec<u8>, YumError> {
        let response = self.http.get_blob(url).await?;
        Ok(response.bytes().await.map_err(|e| YumError::Http(e.into()))?.to_vec())
    }
}

/// Builds an `evr` (epoch:version-release) string for ordering, per spec
/// §4.4 ("RPM packages compare by epoch, then version, then release").
pub fn evr(version: &PrimaryVersion) -> String {
    match &version.epoch {
        Some(epoch) if epoch != "0" => format!("{epoch}:{}-{}", version.ver, version.rel),
        _ => format!("{}-{}", version.ver, version.rel),
    }
}

pub fn package_to_artifact(package: &PrimaryPackage, repo_base_url: &str) -> Artifact {
    let url = format!("{repo_base_url}/{}", package.location.href);
    let filename = package.location.href.rsplit('/').next().unwrap_or(&package.location.href).to_string();
    let mut artifact = Artifact::new(url, filename);
    let algo = match package.checksum.algo.as_str() {
        "sha256" => Some(DigestAlgo::Sha256),
        "sha" | "sha1" => Some(DigestAlgo::Sha1),
        "md5" => Some(DigestAlgo::Md5),
        _ => None,
    };
    if let Some(algo) = algo {
        artifact = artifact.with_checksum(Checksum::new(algo, &package.checksum.hex));
    }
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evr_omits_zero_epoch() {
        let v = PrimaryVersion { epoch: Some("0".to_string()), ver: "1.2.3".to_string(), rel: "1.el9".to_string() };
        assert_eq!(evr(&v), "1.2.3-1.el9");
        let v = PrimaryVersion { epoch: Some("2".to_string()), ver: "1.2.3".to_string(), rel: "1.el9".to_string() };
        assert_eq!(evr(&v), "2:1.2.3-1.el9");
    }

    #[test]
    fn repomd_parses_data_entries() {
        let xml = r#"
        <repomd>
            <data type="primary">
                <location href="repodata/abcd-primary.xml.gz"/>
            </data>
        </repomd>
        "#;
        let repomd: Repomd = quick_xml::de::from_str(xml).unwrap();
        assert_eq!(repomd.data[0].data_type, "primary");
        assert_eq!(repomd.data[0].location.href, "repodata/abcd-primary.xml.gz");
    }
}
