use serde::{Deserialize, Serialize};

/// A single downloadable blob, per spec §3. Invariant: `checksum` is always
/// populated when the upstream registry exposes one — a missing checksum
/// must be surfaced to the caller, never silently skipped, so this type
/// makes the checksum optional only to model "registry genuinely has none".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub url: String,
    pub filename: String,
    pub size_bytes: Option<u64>,
    pub checksum: Option<Checksum>,
    pub media_type: Option<String>,
    pub requires_python: Option<String>,
    pub wheel_tag: Option<String>,
    pub subdir: Option<String>,
}

impl Artifact {
    pub fn new(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
            size_bytes: None,
            checksum: None,
            media_type: None,
            requires_python: None,
            wheel_tag: None,
            subdir: None,
        }
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgo {
    Sha256,
    Sha512,
    Sha1,
    Md5,
}

impl DigestAlgo {
    pub fn from_ssri_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "sha256" => Some(DigestAlgo::Sha256),
            "sha512" => Some(DigestAlgo::Sha512),
            "sha1" => Some(DigestAlgo::Sha1),
            "md5" => Some(DigestAlgo::Md5),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub algo: DigestAlgo,
    pub hex: String,
}

impl Checksum {
    pub fn new(algo: DigestAlgo, hex: impl Into<String>) -> Self {
        Self {
            algo,
            hex: hex.into().to_lowercase(),
        }
    }
}
