//! vib-fsguard - FsGuard build module for Vib image recipes.
//!
//! Given an `fsguard` module and its recipe, produces the command line that,
//! inside the container build:
//! - generates a filelist (path, checksum, setuid flag) for each target directory
//! - signs it with minisign
//! - appends signature and public key to the FsGuard binary and installs it
//!
//! The plugin only stages the FsGuard release and `genfilelist.py` on the
//! host; every command it returns is executed later by the orchestrator.
//!
//! ```no_run
//! let line = vib_fsguard::build_module(
//!     r#"{"name":"fsguard","type":"fsguard","fsGuardLocation":"/usr/sbin/FsGuard",
//!         "generateKey":true,"filelistPaths":["/usr/bin"]}"#,
//!     r#"{"downloadsPath":"/tmp/downloads","sourcesPath":"/tmp/sources"}"#,
//! );
//! assert!(!line.starts_with("ERROR: "));
//! ```

pub mod artifact;
pub mod command;
pub mod compose;
pub mod config;
pub mod error;
pub mod ffi;
pub mod fetch;
pub mod logging;
pub mod module;
pub mod plugin;
pub mod policy;
pub mod process;

pub use command::CommandSequence;
pub use config::Config;
pub use error::{ModuleError, ERROR_MARKER};
pub use module::{FsGuardModule, Recipe};
pub use plugin::{build_module, plugin_info, Plugin, PluginInfo};
