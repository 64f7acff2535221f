//! Conda registry client: per-subdir repodata with a compression/coverage
//! fallback chain, per spec §4.2 ("repodata.json.zst, then
//! current_repodata.json, then repodata.json").
//!
//! No teacher precedent (`ppm` never spoke conda); grounded on the subdir
//! layout and repodata document shape documented by `rattler_conda_types`
//! in the retrieval pack, hand-rolled rather than depending on that crate
//! directly (per DESIGN.md: kept the parsing surface small and owned).

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::artifact::{Artifact, Checksum, DigestAlgo};
use crate::models::cache_entry::LISTING_TTL_MS;

#[derive(Debug, Error)]
pub enum CondaError {
    #[error(transparent)]
    Http(#[from] crate::http::HttpError),
    #[error("failed to parse repodata: {0}")]
    Parse(String),
    #[error("failed to decompress repodata: {0}")]
    Decompress(String),
}

#[derive(Debug, Clone)]
pub struct CondaClient {
    http: SharedClients,
    cache: Arc<MetadataCache>,
    channel_base: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Repodata {
    #[serde(default)]
    pub packages: HashMap<String, CondaPackageRecord>,
    #[serde(default, rename = "packages.conda")]
    pub packages_conda: HashMap<String, CondaPackageRecord>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CondaPackageRecord {
    pub name: String,
    pub version: String,
    pub build: String,
    pub build_number: u64,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub constrains: Vec<String>,
    pub subdir: String,
    pub sha256: Option<String>,
    pub md5: Option<String>,
    pub size: Option<u64>,
}

impl CondaClient {
    pub fn new(http: SharedClients, cache: Arc<MetadataCache>) -> Self {
        Self {
            http,
            cache,
            channel_base: "https://conda.anaconda.org".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_channel_base(http: SharedClients, cache: Arc<MetadataCache>, channel_base: String) -> Self {
        Self { http, cache, channel_base }
    }

    /// Fetches repodata for `channel`/`subdir`, trying the smallest/newest
    /// document first and falling back on a 404 at each step.
    pub async fn get_repodata(&self, channel: &str, subdir: &str) -> Result<Repodata, CondaError> {
        let key = format!("conda:repodata:{channel}:{subdir}");
        let base = format!("{}/{channel}/{subdir}", self.channel_base);
        let candidates = [
            (format!("{base}/repodata.json.zst"), Format::ZstJson),
            (format!("{base}/current_repodata.json"), Format::Json),
            (format!("{base}/repodata.json"), Format::Json),
        ];

        for (url, format) in candidates {
            let http = self.http.clone();
            let attempt = self
                .cache
                .get(&key, Some(LISTING_TTL_MS), || async move {
                    let response = http.get_metadata(&url).await.map_err(CondaError::from)?;
                    response.bytes().await.map(|b| b.to_vec()).map_err(|e| CondaError::Http(e.into()))
                })
                .await;

            match attempt {
                Ok(bytes) => return decode_repodata(&bytes, format),
                Err(CondaError::Http(crate::http::HttpError::NotFound(_))) => continue,
                Err(err) => return Err(err),
            }
        }

        Err(CondaError::Http(crate::http::HttpError::NotFound(format!("{base}/repodata.json"))))
    }

    pub async fn fetch_blob(&self, url: &str) -> Result<Vec<u8>, CondaError> {
        let response = self.http.get_blob(url).await?;
        Ok(response.bytes().await.map_err(|e| CondaError::Http(e.into()))?.to_vec())
    }
}

enum Format {
    Json,
    ZstJson,
}

fn decode_repodata(bytes: &[u8], format: Format) -> Result<Repodata, CondaError> {
    match format {
        Format::Json => serde_json::from_slice(bytes).map_err(|e| CondaError::Parse(e.to_string())),
        Format::ZstJson => {
            let mut decoder = zstd::stream::Decoder::new(bytes).map_err(|e| CondaError::Decompress(e.to_string()))?;
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(|e| CondaError::Decompress(e.to_string()))?;
            serde_json::from_slice(&out).map_err(|e| CondaError::Parse(e.to_string()))
        }
    }
}

/// Builds the download URL for a package record (conda packages live at
/// `{channel}/{subdir}/{name}-{version}-{build}.tar.bz2` or `.conda`).
pub fn record_to_artifact(record: &CondaPackageRecord, channel: &str, filename: &str) -> Artifact {
    let url = format!("https://conda.anaconda.org/{channel}/{}/{filename}", record.subdir);
    let mut artifact = Artifact::new(url, filename.to_string());
    if let Some(size) = record.size {
        artifact = artifact.with_size(size);
    }
    if let Some(sha256) = &record.sha256 {
        artifact = artifact.with_checksum(Checksum::new(DigestAlgo::Sha256, sha256));
    } else if let Some(md5) = &record.md5 {
        artifact = artifact.with_checksum(Checksum::new(DigestAlgo::Md5, md5));
    }
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CondaPackageRecord {
        CondaPackageRecord {
            name: "numpy".to_string(),
            version: "1.26.0".to_string(),
            build: "py311h0b4df5a_0".to_string(),
            build_number: 0,
            depends: vec!["python >=3.11,<3.12.0a0".to_string()],
            constrains: vec![],
            subdir: "linux-64".to_string(),
            sha256: Some("a".repeat(64)),
            md5: None,
            size: Some(1000),
        }
    }

    #[test]
    fn record_to_artifact_builds_channel_scoped_url() {
        let record = sample_record();
        let artifact = record_to_artifact(&record, "conda-forge", "numpy-1.26.0-py311h0b4df5a_0.conda");
        assert_eq!(artifact.url, "https://conda.anaconda.org/conda-forge/linux-64/numpy-1.26.0-py311h0b4df5a_0.conda");
        assert_eq!(artifact.checksum.unwrap().algo, DigestAlgo::Sha256);
    }

    #[test]
    fn decode_repodata_parses_plain_json() {
        let json = br#"{"packages": {"numpy-1.26.0-0.tar.bz2": {"name":"numpy","version":"1.26.0","build":"0","build_number":0,"depends":[],"constrains":[],"subdir":"linux-64","sha256":null,"md5":null,"size":null}}}"#;
        let repodata = decode_repodata(json, Format::Json).unwrap();
        assert!(repodata.packages.contains_key("numpy-1.26.0-0.tar.bz2"));
    }
}
