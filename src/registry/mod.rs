//! Registry clients: one per `EcosystemKind`, each exposing `list_versions`,
//! `get_metadata`, `fetch_blob` over the shared HTTP layer and metadata
//! cache, per spec §4.2.

pub mod apk;
pub mod apt;
pub mod conda;
pub mod maven;
pub mod npm;
pub mod oci;
pub mod pypi;
pub mod yum;

use crate::http::HttpError;
use crate::models::ecosystem::EcosystemKind;
use crate::models::error::EngineError;

/// Attaches ecosystem/name context to an ecosystem-agnostic HTTP outcome.
pub fn http_error_to_engine(err: HttpError, ecosystem: EcosystemKind, name: &str, version: Option<&str>) -> EngineError {
    match err {
        HttpError::NotFound(_) => EngineError::NotFound {
            ecosystem,
            name: name.to_string(),
            version: version.map(str::to_string),
        },
        HttpError::UnexpectedStatus { status, url } => EngineError::ProtocolError {
            ecosystem,
            document_kind: "http-response".to_string(),
            name: name.to_string(),
            detail: format!("unexpected status {status} from {url}"),
        },
        HttpError::NetworkFailure { attempts, detail } => EngineError::NetworkFailure {
            operation: format!("{ecosystem}:{name}"),
            attempts,
            detail,
        },
        HttpError::Transport(e) => EngineError::Http(e),
    }
}
