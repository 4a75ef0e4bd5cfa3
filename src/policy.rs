//! Key-material policy.
//!
//! A module either asks for a throwaway minisign key pair generated during
//! the image build, or points at a directory holding an existing pair.
//! Exactly one of the two must hold; anything else is rejected before a
//! single command is emitted.

use crate::command::CommandSequence;
use crate::error::{ModuleError, Result};
use crate::module::FsGuardModule;

/// Key directory used when the key pair is generated in the build container.
pub const GENERATED_KEY_DIR: &str = "./";

/// Where the signing key pair comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// Fresh pair created in [`GENERATED_KEY_DIR`] and removed after use.
    Generated,
    /// Existing pair in the given directory, interpolated literally.
    Supplied(String),
}

impl KeyMaterial {
    /// Directory containing `minisign.key` and `minisign.pub`.
    pub fn key_dir(&self) -> &str {
        match self {
            KeyMaterial::Generated => GENERATED_KEY_DIR,
            KeyMaterial::Supplied(path) => path,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, KeyMaterial::Generated)
    }

    /// Queue key generation in `prep`. Must run after the fetch stage so the
    /// generation command follows the staging commands.
    pub fn register_generation(&self, seq: &mut CommandSequence) {
        if self.is_generated() {
            seq.prep.push("minisign -WG -s ./minisign.key".to_string());
        }
    }

    /// Queue removal of a generated pair in `cleanup`. Must run after the
    /// final move so the key outlives every signing command.
    pub fn register_removal(&self, seq: &mut CommandSequence) {
        if self.is_generated() {
            seq.cleanup
                .push("rm ./minisign.key ./minisign.pub".to_string());
        }
    }
}

/// Validate the module's name and key configuration.
///
/// The name becomes a directory under the recipe's sources and is pasted
/// unquoted into shell commands, so it must be a single path component
/// without whitespace. `generateKey` wins over any supplied
/// `keyPath`; the supplied path is only consulted when generation is off and
/// must not be blank.
pub fn validate(module: &FsGuardModule) -> Result<KeyMaterial> {
    validate_name(&module.name)?;

    if module.generate_key {
        if !module.key_path.trim().is_empty() {
            tracing::debug!(
                module = %module.name,
                key_path = %module.key_path,
                "generateKey set, ignoring keyPath"
            );
        }
        return Ok(KeyMaterial::Generated);
    }

    if module.key_path.trim().is_empty() {
        return Err(ModuleError::missing_key());
    }

    Ok(KeyMaterial::Supplied(module.key_path.clone()))
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.chars().any(char::is_whitespace)
    {
        return Err(ModuleError::Configuration(format!(
            "Invalid module name '{}': must be a single directory name without whitespace",
            name
        )));
    }
    Ok(())
}
