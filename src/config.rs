//! Runtime configuration for the plugin.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file.

use std::collections::HashMap;
use std::time::Duration;

use crate::artifact::DEFAULT_FSGUARD_VERSION;

/// Architecture assumed when the recipe does not name one.
pub const DEFAULT_ARCH: &str = "amd64";

/// Default number of retries for transient download failures.
pub const DEFAULT_DOWNLOAD_RETRIES: u32 = 3;

/// Plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Target architecture used when the recipe has none (FSGUARD_ARCH)
    pub default_arch: String,
    /// FsGuard release to fetch (FSGUARD_VERSION)
    pub fsguard_version: String,
    /// Retry attempts for transient download failures (FSGUARD_DOWNLOAD_RETRIES)
    pub download_retries: u32,
    /// Per-request timeout (FSGUARD_DOWNLOAD_TIMEOUT, seconds). None waits forever.
    pub download_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_arch: DEFAULT_ARCH.to_string(),
            fsguard_version: DEFAULT_FSGUARD_VERSION.to_string(),
            download_retries: DEFAULT_DOWNLOAD_RETRIES,
            download_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from .env file and environment.
    pub fn load() -> Self {
        // A missing .env is the common case.
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from key/value pairs, falling back to defaults.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env_vars: HashMap<String, String> = vars.into_iter().collect();
        let defaults = Self::default();

        let default_arch = env_vars
            .get("FSGUARD_ARCH")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(defaults.default_arch);

        let fsguard_version = env_vars
            .get("FSGUARD_VERSION")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or(defaults.fsguard_version);

        let download_retries = parse_or(
            &env_vars,
            "FSGUARD_DOWNLOAD_RETRIES",
            defaults.download_retries,
        );

        let download_timeout = match env_vars.get("FSGUARD_DOWNLOAD_TIMEOUT") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    tracing::warn!(
                        value = %raw,
                        "FSGUARD_DOWNLOAD_TIMEOUT is not a number of seconds, ignoring"
                    );
                    None
                }
            },
            None => None,
        };

        Self {
            default_arch,
            fsguard_version,
            download_retries,
            download_timeout,
        }
    }

    /// Architecture for a recipe: the recipe's own value, else the default.
    pub fn arch_for<'a>(&'a self, recipe_arch: Option<&'a str>) -> &'a str {
        recipe_arch
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(&self.default_arch)
    }
}

fn parse_or(vars: &HashMap<String, String>, key: &str, default: u32) -> u32 {
    match vars.get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(value = %raw, "{} is not a number, using {}", key, default);
            default
        }),
        None => default,
    }
}
