//! APT/DEB registry client: `dists/{suite}/{component}/binary-{arch}/Packages.gz`,
//! per spec §4.2. The Debian control-file format (RFC 822-like stanzas,
//! blank-line separated) has no existing struct-mapping crate in the pack,
//! so this is a small hand-rolled stanza parser, grounded on the field
//! names Debian's own `Packages` file documents (`Package`, `Version`,
//! `Architecture`, `Depends`, `Filename`, `SHA256`).

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;
use thiserror::Error;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::artifact::{Artifact, Checksum, DigestAlgo};
use crate::models::cache_entry::LISTING_TTL_MS;

#[derive(Debug, Error)]
pub enum AptError {
    #[error(transparent)]
    Http(#[from] crate::http::HttpError),
    #[error("failed to decompress Packages.gz: {0}")]
    Decompress(String),
}

#[derive(Debug, Clone)]
pub struct AptClient {
    http: SharedClients,
    cache: Arc<MetadataCache>,
}

#[derive(Debug, Clone, Default)]
pub struct DebStanza {
    pub fields: HashMap<String, String>,
}

impl DebStanza {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

impl AptClient {
    pub fn new(http: SharedClients, cache: Arc<MetadataCache>) -> Self {
        Self { http, cache }
    }

    /// Fetches and parses `dists/{suite}/{component}/binary-{arch}/Packages.gz`.
    pub async fn get_packages(&self, repo_base_url: &str, suite: &str, component: &str, deb_arch: &str) -> Result<Vec<DebStanza>, AptError> {
        let key = format!("apt:packages:{repo_base_url}:{suite}:{component}:{deb_arch}");
        let url = format!("{repo_base_url}/dists/{suite}/{component}/binary-{deb_arch}/Packages.gz");
        let http = self.http.clone();
        let bytes = self
            .cache
            .get(&key, Some(LISTING_TTL_MS), || async move {
                let response = http.get_metadata(&url).await.map_err(AptError::from)?;
                response.bytes().await.map(|b| b.to_vec()).map_err(|e| AptError::Http(e.into()))
            })
            .await?;

        let mut decoder = GzDecoder::new(bytes.as_slice());
        let mut text = String::new();
        decoder.read_to_string(&mut text).map_err(|e| AptError::Decompress(e.to_string()))?;
        Ok(parse_stanzas(&text))
    }

    pub async fn fetch_blob(&self, url: &str) -> Result<Vec<u8>, AptError> {
        let response = self.http.get_blob(url).await?;
        Ok(response.bytes().await.map_err(|e| AptError::Http(e.into()))?.to_vec())
    }
}

/// Parses RFC-822-style stanzas separated by blank lines. Continuation
/// lines (starting with a space) are folded into the previous field's
/// value, which matters for multi-line `Depends`/`Description` fields.
fn parse_stanzas(text: &str) -> Vec<DebStanza> {
    let mut stanzas = Vec::new();
    let mut current = DebStanza::default();
    let mut last_key: Option<String> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.fields.is_empty() {
                stanzas.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some(key) = &last_key {
                if let Some(existing) = current.fields.get_mut(key) {
                    existing.push('\n');
                    existing.push_str(rest);
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            current.fields.insert(key.clone(), value.trim().to_string());
            last_key = Some(key);
        }
    }
    if !current.fields.is_empty() {
        stanzas.push(current);
    }
    stanzas
}

pub fn stanza_to_artifact(stanza: &DebStanza, repo_base_url: &str) -> Option<Artifact> {
    let filename = stanza.get("Filename")?;
    let url = format!("{repo_base_url}/{filename}");
    let basename = filename.rsplit('/').next().unwrap_or(filename).to_string();
    let mut artifact = Artifact::new(url, basename);
    if let Some(size) = stanza.get("Size").and_then(|s| s.parse::<u64>().ok()) {
        artifact = artifact.with_size(size);
    }
    if let Some(sha256) = stanza.get("SHA256") {
        artifact = artifact.with_checksum(Checksum::new(DigestAlgo::Sha256, sha256));
    }
    Some(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_stanzas_and_folds_continuations() {
        let text = "\
Package: curl
Version: 7.88.1-1
Architecture: amd64
Depends: libc6 (>= 2.34),
 libssl3 (>= 3.0.0)
Filename: pool/main/c/curl/curl_7.88.1-1_amd64.deb
SHA256: abc123

Package: wget
Version: 1.21.3-1
Architecture: amd64
Filename: pool/main/w/wget/wget_1.21.3-1_amd64.deb
SHA256: def456
";
        let stanzas = parse_stanzas(text);
        assert_eq!(stanzas.len(), 2);
        assert_eq!(stanzas[0].get("Package"), Some("curl"));
        assert!(stanzas[0].get("Depends").unwrap().contains("libssl3"));
        assert_eq!(stanzas[1].get("Package"), Some("wget"));
    }

    #[test]
    fn stanza_to_artifact_reads_filename_and_digest() {
        let mut stanza = DebStanza::default();
        stanza.fields.insert("Filename".to_string(), "pool/main/c/curl/curl_7.88.1-1_amd64.deb".to_string());
        stanza.fields.insert("SHA256".to_string(), "abc123".to_string());
        stanza.fields.insert("Size".to_string(), "500".to_string());
        let artifact = stanza_to_artifact(&stanza, "http://deb.debian.org/debian").unwrap();
        assert_eq!(artifact.filename, "curl_7.88.1-1_amd64.deb");
        assert_eq!(artifact.size_bytes, Some(500));
    }
}
