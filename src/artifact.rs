//! Download coordinates for the external artifacts the plugin stages.
//!
//! Resolution is a pure table lookup keyed by artifact, release version and
//! architecture. Adding a platform means adding a row to [`FSGUARD_RELEASES`].

use std::fmt;

use crate::error::{ModuleError, Result};

/// FsGuard release the plugin ships with unless configured otherwise.
pub const DEFAULT_FSGUARD_VERSION: &str = "0.1.2-2";

/// The artifacts this plugin knows how to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// Prebuilt FsGuard verification tool.
    FsGuard,
    /// `genfilelist.py`, the manifest generator run inside the container.
    FilelistScript,
}

impl Artifact {
    pub fn name(&self) -> &'static str {
        match self {
            Artifact::FsGuard => "FsGuard",
            Artifact::FilelistScript => "genfilelist.py",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a downloaded artifact is placed into the module's source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// A single file, moved into place under its staged name.
    Single,
    /// A tarball, extracted into the source directory.
    Tar,
}

/// Target CPU architectures, named the way Debian-based images name them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    /// Parse an architecture label. Kernel spellings are accepted as aliases.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" | "x86-64" => Some(Arch::Amd64),
            "arm64" | "aarch64" => Some(Arch::Arm64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }
}

/// Resolved download coordinates for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub artifact: Artifact,
    pub url: String,
    pub kind: ArchiveKind,
    /// Expected SHA256 of the downloaded file (lowercase hex).
    pub sha256: String,
    /// File name the artifact is staged under in the module source directory.
    /// Tarballs keep their download name until extracted.
    pub staged_name: String,
}

impl ArtifactDescriptor {
    /// Last path segment of the URL.
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

struct Release {
    version: &'static str,
    arch: Arch,
    url: &'static str,
    sha256: &'static str,
}

const FSGUARD_RELEASES: &[Release] = &[Release {
    version: "0.1.2-2",
    arch: Arch::Amd64,
    url: "https://github.com/linux-immutability-tools/FsGuard/releases/download/v0.1.2-2/FsGuard_0.1.2-2_linux_amd64.tar.gz",
    sha256: "b4aa058e4c4828ac57335e8cabd6b3baeff660ff524aa71069c3f56fd0445335",
}];

// Pinned to a commit so the digest stays valid.
const FILELIST_SCRIPT_URL: &str = "https://raw.githubusercontent.com/Vanilla-OS/vib-fsguard/3323f7c3c3f8459a64b97ad408d805edc5520c8d/genfilelist.py";
const FILELIST_SCRIPT_SHA256: &str =
    "22658b7246d7a38c71d0c0fa64fd073ea7867da08344365242873f003abff8c5";

/// Resolve the download coordinates for `artifact`.
///
/// `arch` is an architecture label such as `amd64` or `aarch64`. `version`
/// selects the FsGuard release and is ignored for the filelist script, which
/// is architecture independent.
///
/// # Errors
/// `UnsupportedArchitecture` when the table has no row for the label.
pub fn resolve(artifact: Artifact, arch: &str, version: &str) -> Result<ArtifactDescriptor> {
    let unsupported = || ModuleError::UnsupportedArchitecture {
        artifact: artifact.name(),
        arch: arch.to_string(),
        version: version.to_string(),
    };

    match artifact {
        Artifact::FsGuard => {
            let target = Arch::parse(arch).ok_or_else(unsupported)?;
            let release = FSGUARD_RELEASES
                .iter()
                .find(|r| r.arch == target && r.version == version)
                .ok_or_else(unsupported)?;
            let url = release.url.to_string();
            let staged_name = url.rsplit('/').next().unwrap_or(release.url).to_string();
            Ok(ArtifactDescriptor {
                artifact,
                url,
                kind: ArchiveKind::Tar,
                sha256: release.sha256.to_string(),
                staged_name,
            })
        }
        Artifact::FilelistScript => Ok(ArtifactDescriptor {
            artifact,
            url: FILELIST_SCRIPT_URL.to_string(),
            kind: ArchiveKind::Single,
            sha256: FILELIST_SCRIPT_SHA256.to_string(),
            staged_name: Artifact::FilelistScript.name().to_string(),
        }),
    }
}
