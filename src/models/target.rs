use serde::{Deserialize, Serialize};
use std::fmt;

/// The platform the resolved bundle must run on, per spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub os: Os,
    pub arch: Arch,
    pub interpreter: Option<Interpreter>,
    pub distro: Option<Distro>,
}

impl TargetDescriptor {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self {
            os,
            arch,
            interpreter: None,
            distro: None,
        }
    }

    pub fn with_interpreter(mut self, interpreter: Interpreter) -> Self {
        self.interpreter = Some(interpreter);
        self
    }

    pub fn with_distro(mut self, distro: Distro) -> Self {
        self.distro = Some(distro);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Linux,
    Macos,
    Windows,
    Any,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Os::Linux => write!(f, "linux"),
            Os::Macos => write!(f, "macos"),
            Os::Windows => write!(f, "windows"),
            Os::Any => write!(f, "any"),
        }
    }
}

/// Normalized architecture with equivalence classes folded at construction
/// time per spec §3 (`x86_64<->amd64`, `aarch64<->arm64`, `i686<->i386`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arch {
    X86_64,
    Aarch64,
    I686,
    Armv7,
    Noarch,
}

impl Arch {
    /// Parses any of an architecture's common aliases into its canonical form.
    pub fn normalize(raw: &str) -> Option<Arch> {
        match raw.to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Arch::X86_64),
            "aarch64" | "arm64" => Some(Arch::Aarch64),
            "i686" | "i386" | "x86" => Some(Arch::I686),
            "armv7" | "armv7l" | "arm" => Some(Arch::Armv7),
            "noarch" | "all" | "any" | "universal" => Some(Arch::Noarch),
            _ => None,
        }
    }

    /// Docker/OCI platform architecture name, per spec §4.3.
    pub fn oci_name(&self) -> &'static str {
        match self {
            Arch::X86_64 => "amd64",
            Arch::Aarch64 => "arm64",
            Arch::I686 => "386",
            Arch::Armv7 => "arm/v7",
            Arch::Noarch => "amd64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Arch::X86_64 => "x86_64",
            Arch::Aarch64 => "aarch64",
            Arch::I686 => "i686",
            Arch::Armv7 => "armv7",
            Arch::Noarch => "noarch",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpreter {
    pub implementation: InterpreterImpl,
    /// "3.N" form, e.g. "3.11".
    pub version: String,
}

impl Interpreter {
    pub fn cpython(version: impl Into<String>) -> Self {
        Self {
            implementation: InterpreterImpl::CPython,
            version: version.into(),
        }
    }

    /// The (major, minor) pair parsed out of `version`.
    pub fn major_minor(&self) -> Option<(u32, u32)> {
        let mut parts = self.version.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        Some((major, minor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpreterImpl {
    CPython,
    PyPy,
}

impl InterpreterImpl {
    pub fn tag(&self) -> &'static str {
        match self {
            InterpreterImpl::CPython => "cp",
            InterpreterImpl::PyPy => "pp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distro {
    pub family: DistroFamily,
    pub major_version: String,
    pub codename: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistroFamily {
    Rhel,
    Debian,
    Alpine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arch_aliases_fold_to_one_equivalence_class() {
        assert_eq!(Arch::normalize("amd64"), Some(Arch::X86_64));
        assert_eq!(Arch::normalize("x86_64"), Some(Arch::X86_64));
        assert_eq!(Arch::normalize("arm64"), Some(Arch::Aarch64));
        assert_eq!(Arch::normalize("i386"), Some(Arch::I686));
    }

    #[test]
    fn interpreter_major_minor_parses() {
        let interp = Interpreter::cpython("3.11");
        assert_eq!(interp.major_minor(), Some((3, 11)));
    }
}
