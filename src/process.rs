//! Host-side process execution.
//!
//! Only staging runs on the host (unpacking the FsGuard release). The
//! commands the plugin *emits* are never executed here.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;

/// Captured stdout of a successful host command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
}

/// Small builder around [`std::process::Command`] that turns a non-zero
/// exit into an error carrying the command's stderr.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    failure: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            failure: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Message used instead of `'<program>' failed` when the command exits non-zero.
    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.failure = Some(msg.into());
        self
    }

    pub fn run(self) -> Result<CommandOutput> {
        tracing::trace!(program = %self.program, args = ?self.args, "running host command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let what = self
                .failure
                .unwrap_or_else(|| format!("'{}' failed", self.program));
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            match stderr.trim() {
                "" => bail!("{} (exit {})", what, code),
                detail => bail!("{} (exit {}):\n{}", what, code, detail),
            }
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// `tar` mode for an archive, picked from its extension.
fn tar_mode(archive: &Path) -> &'static str {
    let name = archive.to_string_lossy();
    [
        (".tar.gz", "xzf"),
        (".tgz", "xzf"),
        (".tar.xz", "xJf"),
        (".txz", "xJf"),
        (".tar.bz2", "xjf"),
        (".tbz2", "xjf"),
    ]
    .iter()
    .find(|(ext, _)| name.ends_with(ext))
    .map_or("xf", |&(_, mode)| mode)
}

/// Unpack `archive` into `dest_dir`, creating the directory first.
pub fn extract_tarball(archive: &Path, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)
        .with_context(|| format!("Failed to create directory {}", dest_dir.display()))?;

    Cmd::new("tar")
        .arg(tar_mode(archive))
        .arg_path(archive)
        .arg("-C")
        .arg_path(dest_dir)
        .error_msg(format!("tar extraction failed for {}", archive.display()))
        .run()?;
    tracing::debug!(archive = %archive.display(), dest = %dest_dir.display(), "extracted");
    Ok(())
}
