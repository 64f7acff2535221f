//! Maven registry client: POM fetch + parent/BOM chain resolution over
//! `quick-xml`, per spec §4.2.
//!
//! No teacher precedent (`ppm` never spoke Maven); grounded on the POM
//! element names themselves (`dependencies`, `dependencyManagement`,
//! `parent`, `properties`) and on the `quick-xml::de` deserialize pattern
//! used by sibling example repos in the retrieval pack for XML config
//! formats.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::artifact::{Artifact, Checksum, DigestAlgo};
use crate::models::cache_entry::EXACT_VERSION_TTL_MS;

#[derive(Debug, Error)]
pub enum MavenError {
    #[error(transparent)]
    Http(#[from] crate::http::HttpError),
    #[error("failed to parse POM: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct MavenClient {
    http: SharedClients,
    cache: Arc<MetadataCache>,
    repository_base: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pom {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub parent: Option<PomParent>,
    #[serde(default)]
    pub properties: PomProperties,
    #[serde(default, rename = "dependencies")]
    pub dependencies: PomDependencies,
    #[serde(default, rename = "dependencyManagement")]
    pub dependency_management: Option<PomDependencyManagement>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomParent {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    #[serde(default, rename = "relativePath")]
    pub relative_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PomProperties {
    #[serde(flatten)]
    pub values: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PomDependencies {
    #[serde(default, rename = "dependency")]
    pub dependency: Vec<PomDependency>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PomDependencyManagement {
    #[serde(default)]
    pub dependencies: PomDependencies,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomDependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub optional: Option<String>,
    #[serde(default)]
    pub exclusions: Option<PomExclusions>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PomExclusions {
    #[serde(default, rename = "exclusion")]
    pub exclusion: Vec<PomExclusion>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PomExclusion {
    pub group_id: String,
    pub artifact_id: String,
}

impl MavenClient {
    pub fn new(http: SharedClients, cache: Arc<MetadataCache>) -> Self {
        Self {
            http,
            cache,
            repository_base: "https://repo1.maven.org/maven2".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_repository_base(http: SharedClients, cache: Arc<MetadataCache>, repository_base: String) -> Self {
        Self { http, cache, repository_base }
    }

    fn path_for(group_id: &str, artifact_id: &str, version: &str) -> String {
        format!("{}/{artifact_id}/{version}/{artifact_id}-{version}.pom", group_id.replace('.', "/"))
    }

    pub fn pom_url(&self, group_id: &str, artifact_id: &str, version: &str) -> String {
        format!("{}/{}", self.repository_base, Self::path_for(group_id, artifact_id, version))
    }

    /// Fetches and parses a single POM; does not resolve its parent chain
    /// (callers walk `parent` themselves to bound recursion depth, per spec
    /// §4.5 "resolved-version closure with an explicit max depth").
    pub async fn get_pom(&self, group_id: &str, artifact_id: &str, version: &str) -> Result<Pom, MavenError> {
        let key = format!("maven:pom:{group_id}:{artifact_id}:{version}");
        let url = self.pom_url(group_id, artifact_id, version);
        let http = self.http.clone();
        let bytes = self
            .cache
            .get(&key, EXACT_VERSION_TTL_MS, || async move {
                let response = http.get_metadata(&url).await.map_err(MavenError::from)?;
                response.bytes().await.map(|b| b.to_vec()).map_err(|e| MavenError::Http(e.into()))
            })
            .await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| MavenError::Parse(e.to_string()))?;
        quick_xml::de::from_str(text).map_err(|e| MavenError::Parse(e.to_string()))
    }

    /// Walks the `<parent>` chain, merging `dependencyManagement` entries
    /// from furthest ancestor first so a child's own entry always wins, per
    /// spec §4.4 ("nearest declaration in the POM hierarchy wins").
    pub async fn resolve_dependency_management(&self, pom: &Pom, max_depth: usize) -> Result<HashMap<(String, String), String>, MavenError> {
        let mut chain = vec![pom.clone()];
        let mut current = pom.clone();
        let mut depth = 0;
        while let Some(parent) = current.parent.clone() {
            if depth >= max_depth {
                break;
            }
            let parent_pom = self.get_pom(&parent.group_id, &parent.artifact_id, &parent.version).await?;
            chain.push(parent_pom.clone());
            current = parent_pom;
            depth += 1;
        }

        let mut managed = HashMap::new();
        for ancestor in chain.into_iter().rev() {
            if let Some(dm) = ancestor.dependency_management {
                for dep in dm.dependencies.dependency {
                    if let Some(version) = dep.version {
                        managed.insert((dep.group_id, dep.artifact_id), version);
                    }
                }
            }
        }
        Ok(managed)
    }

    pub async fn fetch_blob(&self, url: &str) -> Result<Vec<u8>, MavenError> {
        let response = self.http.get_blob(url).await?;
        Ok(response.bytes().await.map_err(|e| MavenError::Http(e.into()))?.to_vec())
    }
}

/// Builds the JAR artifact URL/checksum pair for a resolved coordinate. The
/// `.sha1` sidecar is fetched separately since Maven Central does not embed
/// digests in the POM itself.
pub fn jar_artifact(repository_base: &str, group_id: &str, artifact_id: &str, version: &str, sha1_hex: Option<&str>) -> Artifact {
    let path = format!(
        "{}/{artifact_id}/{version}/{artifact_id}-{version}.jar",
        group_id.replace('.', "/")
    );
    let filename = format!("{artifact_id}-{version}.jar");
    let mut artifact = Artifact::new(format!("{repository_base}/{path}"), filename);
    if let Some(hex) = sha1_hex {
        artifact = artifact.with_checksum(Checksum::new(DigestAlgo::Sha1, hex));
    }
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_for_converts_group_id_dots_to_slashes() {
        let path = MavenClient::path_for("org.apache.commons", "commons-lang3", "3.12.0");
        assert_eq!(path, "org/apache/commons/commons-lang3/3.12.0/commons-lang3-3.12.0.pom");
    }

    #[test]
    fn jar_artifact_builds_expected_filename() {
        let artifact = jar_artifact("https://repo1.maven.org/maven2", "com.google.guava", "guava", "32.1.3-jre", Some("deadbeef"));
        assert_eq!(artifact.filename, "guava-32.1.3-jre.jar");
        assert!(artifact.url.ends_with("guava/32.1.3-jre/guava-32.1.3-jre.jar"));
    }

    #[test]
    fn pom_parses_dependency_management_block() {
        let xml = r#"
        <project>
            <groupId>com.example</groupId>
            <artifactId>parent</artifactId>
            <version>1.0</version>
            <dependencyManagement>
                <dependencies>
                    <dependency>
                        <groupId>com.fasterxml.jackson.core</groupId>
                        <artifactId>jackson-databind</artifactId>
                        <version>2.15.2</version>
                    </dependency>
                </dependencies>
            </dependencyManagement>
        </project>
        "#;
        let pom: Pom = quick_xml::de::from_str(xml).unwrap();
        let dm = pom.dependency_management.unwrap();
        assert_eq!(dm.dependencies.dependency[0].artifact_id, "jackson-databind");
    }
}
