use serde::{Deserialize, Serialize};

use crate::models::ecosystem::EcosystemKind;

/// Per-item failure, accumulated rather than aborting the whole run, per
/// spec §7: "every other kind is recorded in FailureRecord[] and allows the
/// pipeline to continue for independent items."
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub package_key: String,
    pub ecosystem: EcosystemKind,
    pub kind: String,
    pub message: String,
    /// Set when this failure was downgraded from fatal because the
    /// originating `PackageRef` was optional.
    pub is_warning: bool,
}

impl FailureRecord {
    pub fn new(package_key: impl Into<String>, ecosystem: EcosystemKind, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            package_key: package_key.into(),
            ecosystem,
            kind: kind.into(),
            message: message.into(),
            is_warning: false,
        }
    }

    pub fn as_warning(mut self) -> Self {
        self.is_warning = true;
        self
    }
}
