//! OCI resolver: the degenerate case. An image reference has no transitive
//! dependency closure to walk (spec §4.5); resolving one just means
//! selecting the platform-matching manifest and turning its config blob and
//! layers into sibling nodes of one root, so the download scheduler still
//! sees a flat list of artifacts to fetch and checksum.

use std::sync::Arc;

use crate::cache::MetadataCache;
use crate::http::SharedClients;
use crate::models::ecosystem::EcosystemKind;
use crate::models::failure::FailureRecord;
use crate::models::package_ref::PackageRef;
use crate::models::resolved_package::ResolvedPackage;
use crate::models::target::TargetDescriptor;
use crate::registry::oci::{descriptor_to_artifact, OciClient};

use super::ResolveOutcome;

pub async fn resolve(roots: &[PackageRef], target: &TargetDescriptor, http: &SharedClients, cache: &Arc<MetadataCache>) -> ResolveOutcome {
    let client = OciClient::new(http.clone(), cache.clone());
    let mut outcome = ResolveOutcome::default();

    for root in roots {
        let Some(registry_host) = root.repository.clone() else {
            outcome.failures.push(FailureRecord::new(root.package_key(), EcosystemKind::Oci, "ConfigError", "no registry host configured"));
            continue;
        };
        let repository = root.name.clone();
        let reference = root.version_spec.clone();

        if let Err(err) = client.get_token(&registry_host, &repository).await {
            outcome
                .failures
                .push(FailureRecord::new(root.package_key(), EcosystemKind::Oci, "AuthFailure", err.to_string()));
            continue;
        }

        let manifest_list = match client.get_manifest_list(&registry_host, &repository, &reference).await {
            Ok(list) => list,
            Err(err) => {
                outcome
                    .failures
                    .push(FailureRecord::new(root.package_key(), EcosystemKind::Oci, "NetworkFailure", err.to_string()));
                continue;
            }
        };

        let entry = match OciClient::select_platform(&manifest_list, target) {
            Ok(entry) => entry,
            Err(err) => {
                outcome
                    .failures
                    .push(FailureRecord::new(root.package_key(), EcosystemKind::Oci, "NoCompatibleArtifact", err.to_string()));
                continue;
            }
        };
        let manifest_digest = entry.digest.clone();

        let manifest = match client.get_image_manifest(&registry_host, &repository, &manifest_digest).await {
            Ok(m) => m,
            Err(err) => {
                outcome
                    .failures
                    .push(FailureRecord::new(root.package_key(), EcosystemKind::Oci, "NetworkFailure", err.to_string()));
                continue;
            }
        };

        let manifest_url = format!("https://{registry_host}/v2/{repository}/manifests/{manifest_digest}");
        let manifest_filename = manifest_digest.replace(':', "-") + ".json";
        let mut manifest_artifact = crate::models::artifact::Artifact::new(manifest_url, manifest_filename);
        if let Some(hex) = manifest_digest.strip_prefix("sha256:") {
            manifest_artifact = manifest_artifact.with_checksum(crate::models::artifact::Checksum::new(crate::models::artifact::DigestAlgo::Sha256, hex));
        }
        let image_node = ResolvedPackage::new(EcosystemKind::Oci, &repository, &reference)
            .with_artifact(manifest_artifact);
        let root_id = outcome.graph.add_node(image_node);
        outcome.graph.mark_root(root_id);

        let config_artifact = descriptor_to_artifact(&manifest.config, &registry_host, &repository);
        let config_node = ResolvedPackage::new(EcosystemKind::Oci, format!("{repository}/config"), &reference).with_artifact(config_artifact);
        let config_id = outcome.graph.add_node(config_node);
        outcome.graph.add_edge(root_id, config_id, "config".to_string());

        for (i, layer) in manifest.layers.iter().enumerate() {
            let artifact = descriptor_to_artifact(layer, &registry_host, &repository);
            let layer_node = ResolvedPackage::new(EcosystemKind::Oci, format!("{repository}/layer{i}"), &reference).with_artifact(artifact);
            let layer_id = outcome.graph.add_node(layer_node);
            outcome.graph.add_edge(root_id, layer_id, format!("layer{i}"));
        }
    }

    outcome
}
