//! Plugin boundary.
//!
//! The orchestrator hands over a module record and a recipe as JSON and gets
//! back a single string: either the command line to run in the build
//! container, or `ERROR: <message>`. No partial command line is ever returned
//! alongside an error.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::artifact::{self, Artifact};
use crate::command::CommandSequence;
use crate::compose;
use crate::config::Config;
use crate::error::Result;
use crate::fetch::{DownloadOptions, FetchStage, Fetcher, HttpDownloader, VerifiedFetcher};
use crate::module::{FsGuardModule, Recipe};
use crate::policy;

/// Plugin type reported to the orchestrator for build-time plugins.
pub const BUILD_PLUGIN: u8 = 0;

/// Metadata the orchestrator reads to decide when to call the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub plugin_type: u8,
    #[serde(rename = "usecontainercmds")]
    pub use_container_cmds: bool,
}

impl PluginInfo {
    pub fn to_json(&self) -> String {
        // Plain struct of primitives, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn plugin_info() -> PluginInfo {
    PluginInfo {
        name: "fsguard",
        plugin_type: BUILD_PLUGIN,
        use_container_cmds: false,
    }
}

/// One plugin instance: configuration plus the fetch collaborator.
pub struct Plugin<F = VerifiedFetcher<HttpDownloader>> {
    config: Config,
    fetcher: F,
}

impl Plugin {
    /// Plugin configured from `.env` and the environment, downloading over HTTP.
    pub fn from_env() -> Self {
        let config = Config::load();
        let downloader = HttpDownloader::new(DownloadOptions::from_config(&config));
        Self {
            config,
            fetcher: VerifiedFetcher::new(downloader),
        }
    }
}

impl<F: Fetcher> Plugin<F> {
    pub fn new(config: Config, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    /// Decode the payloads, build the module, and encode the outcome.
    pub fn build(&self, module_json: &str, recipe_json: &str, cancel: &CancellationToken) -> String {
        match self.try_build(module_json, recipe_json, cancel) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "fsguard module failed");
                e.to_response()
            }
        }
    }

    pub fn try_build(
        &self,
        module_json: &str,
        recipe_json: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let module = FsGuardModule::from_json(module_json)?;
        let recipe = Recipe::from_json(recipe_json)?;
        self.run(&module, &recipe, cancel)
    }

    /// Validate, fetch, compose. Stops at the first failure.
    pub fn run(
        &self,
        module: &FsGuardModule,
        recipe: &Recipe,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let key = policy::validate(module)?;

        if module.custom_fsguard {
            tracing::warn!(
                module = %module.name,
                "customFsGuard is not supported yet, using the bundled FsGuard release"
            );
        }

        let arch = self.config.arch_for(recipe.arch.as_deref());
        let version = &self.config.fsguard_version;
        let tool = artifact::resolve(Artifact::FsGuard, arch, version)?;
        let script = artifact::resolve(Artifact::FilelistScript, arch, version)?;
        tracing::debug!(module = %module.name, arch, url = %tool.url, "resolved FsGuard release");

        let mut seq = CommandSequence::new();
        let stage = FetchStage::new(&self.fetcher, recipe, &module.name, cancel);
        stage.fetch_tool(&tool)?;
        stage.fetch_filelist_script(&script, &mut seq)?;

        Ok(compose::compose(module, &key, &mut seq))
    }
}

/// Build a module with the default, environment-configured plugin.
pub fn build_module(module_json: &str, recipe_json: &str) -> String {
    <Plugin>::from_env().build(module_json, recipe_json, &CancellationToken::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactDescriptor;
    use crate::error::ERROR_MARKER;
    use std::path::PathBuf;

    struct Unreachable;

    impl Fetcher for Unreachable {
        fn fetch(
            &self,
            descriptor: &ArtifactDescriptor,
            _: &Recipe,
            _: &str,
            _: &CancellationToken,
        ) -> Result<PathBuf> {
            panic!("no fetch expected, got {}", descriptor.url);
        }
    }

    const RECIPE: &str = r#"{"DownloadsPath":"/nonexistent/downloads","SourcesPath":"/nonexistent/sources"}"#;

    #[test]
    fn test_plugin_info_json() {
        assert_eq!(
            plugin_info().to_json(),
            r#"{"name":"fsguard","type":0,"usecontainercmds":false}"#
        );
    }

    #[test]
    fn test_missing_key_fails_before_fetch() {
        let plugin = Plugin::new(Config::default(), Unreachable);
        let out = plugin.build(
            r#"{"name":"m1","type":"fsguard","fsGuardLocation":"/out","generateKey":false,"keyPath":"","filelistPaths":["/bin"]}"#,
            RECIPE,
            &CancellationToken::new(),
        );
        assert_eq!(
            out,
            "ERROR: Keypath not specified and GenerateKey set to false. Cannot proceed"
        );
    }

    #[test]
    fn test_bad_module_json() {
        let plugin = Plugin::new(Config::default(), Unreachable);
        let out = plugin.build("{", RECIPE, &CancellationToken::new());
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("invalid module"));
    }

    #[test]
    fn test_bad_recipe_json() {
        let plugin = Plugin::new(Config::default(), Unreachable);
        let out = plugin.build(
            r#"{"name":"m1","type":"fsguard","fsGuardLocation":"/out","generateKey":true}"#,
            r#"{"Name":"no paths"}"#,
            &CancellationToken::new(),
        );
        assert!(out.starts_with("ERROR: invalid recipe"));
    }

    #[test]
    fn test_unsupported_arch_fails_before_fetch() {
        let plugin = Plugin::new(Config::default(), Unreachable);
        let out = plugin.build(
            r#"{"name":"m1","type":"fsguard","fsGuardLocation":"/out","generateKey":true}"#,
            r#"{"downloadsPath":"/d","sourcesPath":"/s","arch":"s390x"}"#,
            &CancellationToken::new(),
        );
        assert!(out.starts_with(ERROR_MARKER));
        assert!(out.contains("s390x"));
    }
}
