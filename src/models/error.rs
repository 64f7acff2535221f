use thiserror::Error;

use crate::models::ecosystem::EcosystemKind;

/// Closed error taxonomy, per spec §7. Unlike the teacher's stringly-typed
/// `PpmError`, every variant carries structured fields so callers (the
/// scheduler's retry layer, the resolver's optional-dependency downgrade,
/// the engine's `FailureRecord` accumulation) can match on `kind` instead of
/// parsing messages.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Registry returned 404 for a name or version. Surfaced, never retried
    /// as a different shape.
    #[error("{ecosystem}: {name} not found{}", version.as_deref().map(|v| format!(" @ {v}")).unwrap_or_default())]
    NotFound {
        ecosystem: EcosystemKind,
        name: String,
        version: Option<String>,
    },

    /// Candidates existed but none matched the target descriptor.
    #[error("{ecosystem}: no compatible artifact for {name}@{version} (considered {} candidates)", candidates_considered)]
    NoCompatibleArtifact {
        ecosystem: EcosystemKind,
        name: String,
        version: String,
        candidates_considered: usize,
        tags_considered: Vec<String>,
    },

    /// Resolver exhausted backtracking/rounds without a consistent mapping.
    #[error("{ecosystem}: could not resolve a consistent set of versions for {root} ({reason})")]
    VersionUnsatisfiable {
        ecosystem: EcosystemKind,
        root: String,
        reason: String,
    },

    /// Downloaded bytes did not match the declared digest.
    #[error("{ecosystem}: checksum mismatch for {name}@{version}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        ecosystem: EcosystemKind,
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    /// Connection reset, 5xx, timeout — retried with backoff; escalates to
    /// this variant's sibling `NetworkFailure` after the retry budget.
    #[error("transient failure during {operation}: {detail}")]
    Transient { operation: String, detail: String },

    /// Retry budget exhausted after a `Transient` error kept recurring.
    #[error("network failure during {operation} after {attempts} attempts: {detail}")]
    NetworkFailure {
        operation: String,
        attempts: u32,
        detail: String,
    },

    /// Unparseable metadata document (malformed POM, unknown media type).
    #[error("{ecosystem}: could not parse {document_kind} for {name}: {detail}")]
    ProtocolError {
        ecosystem: EcosystemKind,
        document_kind: String,
        name: String,
        detail: String,
    },

    /// Cooperative cancellation; no partial results are committed as success.
    #[error("operation cancelled")]
    Cancelled,

    /// Impossible target descriptor (e.g. conda without a subdir mapping).
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl EngineError {
    /// Per spec §7 propagation policy: transient errors are swallowed by the
    /// retry layer and never recorded directly; everything else becomes a
    /// `FailureRecord` kind name for user-facing reporting.
    pub fn kind_name(&self) -> &'static str {
        match self {
            EngineError::NotFound { .. } => "NotFound",
            EngineError::NoCompatibleArtifact { .. } => "NoCompatibleArtifact",
            EngineError::VersionUnsatisfiable { .. } => "VersionUnsatisfiable",
            EngineError::ChecksumMismatch { .. } => "ChecksumMismatch",
            EngineError::Transient { .. } => "Transient",
            EngineError::NetworkFailure { .. } => "NetworkFailure",
            EngineError::ProtocolError { .. } => "ProtocolError",
            EngineError::Cancelled => "Cancelled",
            EngineError::ConfigError(_) => "ConfigError",
            EngineError::Io(_) => "Io",
            EngineError::Http(_) => "Http",
        }
    }

    /// Whether the retry layer should attempt this operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Transient { .. })
    }
}
