//! Module and recipe records handed over by the orchestrator.
//!
//! Both records arrive as JSON. Field names follow the orchestrator's
//! lower-camel convention. The capitalised spelling it emits for Go-style
//! structs and the all-lowercase spelling common in hand-written recipes are
//! accepted as aliases.

use serde::Deserialize;
use std::path::PathBuf;

use crate::error::{ModuleError, Result};

/// Configuration of one `fsguard` module in a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsGuardModule {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(rename = "type", alias = "Type")]
    pub module_type: String,

    /// Reserved switch between the bundled FsGuard release and a
    /// caller-provided binary. Not acted upon yet.
    #[serde(
        rename = "customFsGuard",
        alias = "CustomFsGuard",
        alias = "customfsguard",
        alias = "useCustomArtifact",
        default
    )]
    pub custom_fsguard: bool,

    /// Where the signed FsGuard binary ends up inside the image.
    #[serde(
        rename = "fsGuardLocation",
        alias = "FsGuardLocation",
        alias = "fsguardlocation"
    )]
    pub fsguard_location: String,

    #[serde(rename = "generateKey", alias = "GenerateKey", alias = "generatekey", default)]
    pub generate_key: bool,

    #[serde(rename = "keyPath", alias = "KeyPath", alias = "keypath", default)]
    pub key_path: String,

    /// Directories scanned into the filelist, in order.
    #[serde(
        rename = "filelistPaths",
        alias = "FilelistPaths",
        alias = "filelistpaths",
        alias = "filelistTargets",
        default
    )]
    pub filelist_paths: Vec<String>,
}

impl FsGuardModule {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| ModuleError::Deserialization {
            what: "invalid module",
            source,
        })
    }
}

/// The slice of the recipe this plugin reads. Everything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Recipe {
    /// Host directory where sources are downloaded.
    #[serde(rename = "downloadsPath", alias = "DownloadsPath", alias = "downloadspath")]
    pub downloads_path: PathBuf,

    /// Host directory mounted as `/sources` in the build container.
    #[serde(rename = "sourcesPath", alias = "SourcesPath", alias = "sourcespath")]
    pub sources_path: PathBuf,

    #[serde(alias = "Arch", default)]
    pub arch: Option<String>,
}

impl Recipe {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| ModuleError::Deserialization {
            what: "invalid recipe",
            source,
        })
    }

    /// Private staging directory for a module: `{sourcesPath}/{name}`.
    pub fn module_sources(&self, module: &str) -> PathBuf {
        self.sources_path.join(module)
    }

    /// Download directory for a module: `{downloadsPath}/{name}`.
    pub fn module_downloads(&self, module: &str) -> PathBuf {
        self.downloads_path.join(module)
    }
}
