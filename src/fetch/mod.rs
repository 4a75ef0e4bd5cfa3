//! Artifact fetch stage.
//!
//! The stage hands each artifact to a [`Fetcher`], the download-and-verify
//! collaborator, and records the container-side setup the staged files need.
//!
//! [`VerifiedFetcher`] is the production collaborator. Every artifact follows
//! the same path:
//! 1. Reuse `{downloadsPath}/{module}/{file}` if its digest already matches
//! 2. Otherwise download it through the [`Downloader`]
//! 3. Verify the SHA256 digest
//! 4. Stage it into `{sourcesPath}/{module}/` (extract tarballs, move single files)
//!
//! Nothing is retried here; retry policy belongs to the downloader.

pub mod download;

use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use crate::artifact::{ArchiveKind, ArtifactDescriptor};
use crate::command::CommandSequence;
use crate::compose::{script_path, WORK_DIR};
use crate::error::{ModuleError, Result};
use crate::module::Recipe;
use crate::process;

pub use download::{DownloadCancelled, DownloadOptions, Downloader, HttpDownloader};

/// Downloads, verifies and stages one artifact for a module.
pub trait Fetcher {
    /// Make `descriptor` available under the module's source directory and
    /// return the staged path (the file itself, or the extraction directory).
    fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        recipe: &Recipe,
        module: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;
}

/// Fetches and stages the artifacts of one module.
pub struct FetchStage<'a> {
    fetcher: &'a dyn Fetcher,
    recipe: &'a Recipe,
    module: &'a str,
    cancel: &'a CancellationToken,
}

impl<'a> FetchStage<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        recipe: &'a Recipe,
        module: &'a str,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            recipe,
            module,
            cancel,
        }
    }

    /// Fetch the FsGuard release into the module's sources.
    pub fn fetch_tool(&self, descriptor: &ArtifactDescriptor) -> Result<PathBuf> {
        let staged = self.fetch(descriptor)?;
        tracing::info!(module = %self.module, path = %staged.display(), "staged FsGuard");
        Ok(staged)
    }

    /// Fetch `genfilelist.py` and queue the container-side setup: the
    /// working directory and the script's executable bit.
    pub fn fetch_filelist_script(
        &self,
        descriptor: &ArtifactDescriptor,
        seq: &mut CommandSequence,
    ) -> Result<PathBuf> {
        let staged = self.fetch(descriptor)?;

        seq.prep.push(format!("mkdir {}", WORK_DIR));
        seq.prep.push(format!("chmod +x {}", script_path(self.module)));

        tracing::info!(module = %self.module, script = %staged.display(), "staged filelist script");
        Ok(staged)
    }

    fn fetch(&self, descriptor: &ArtifactDescriptor) -> Result<PathBuf> {
        if self.cancel.is_cancelled() {
            return Err(ModuleError::Cancelled);
        }
        self.fetcher
            .fetch(descriptor, self.recipe, self.module, self.cancel)
    }
}

/// Production collaborator: cached download, SHA256 check, staging.
#[derive(Debug, Clone, Default)]
pub struct VerifiedFetcher<D = HttpDownloader> {
    downloader: D,
}

impl<D: Downloader> VerifiedFetcher<D> {
    pub fn new(downloader: D) -> Self {
        Self { downloader }
    }

    /// Make a verified copy of the artifact available in the downloads area.
    fn acquire(
        &self,
        descriptor: &ArtifactDescriptor,
        recipe: &Recipe,
        module: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let dir = recipe.module_downloads(module);
        fs::create_dir_all(&dir).map_err(|e| {
            ModuleError::filesystem(format!("Failed to create directory {}", dir.display()), e)
        })?;
        let dest = dir.join(descriptor.file_name());

        if dest.is_file() {
            match download::verify_sha256(&dest, &descriptor.sha256) {
                Ok(()) => {
                    tracing::debug!(artifact = %descriptor.artifact, path = %dest.display(), "reusing cached download");
                    return Ok(dest);
                }
                Err(e) => {
                    tracing::warn!(artifact = %descriptor.artifact, error = %e, "discarding stale download");
                    remove_if_exists(&dest)?;
                }
            }
        }

        tracing::info!(artifact = %descriptor.artifact, url = %descriptor.url, "downloading");
        self.downloader
            .download(&descriptor.url, &dest, cancel)
            .map_err(|e| {
                if e.is::<DownloadCancelled>() {
                    ModuleError::Cancelled
                } else {
                    ModuleError::Download {
                        url: descriptor.url.clone(),
                        source: e,
                    }
                }
            })?;

        if let Err(e) = download::verify_sha256(&dest, &descriptor.sha256) {
            // Never keep a file that failed verification.
            let _ = fs::remove_file(&dest);
            return Err(e);
        }

        Ok(dest)
    }
}

impl<D: Downloader> Fetcher for VerifiedFetcher<D> {
    fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        recipe: &Recipe,
        module: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let downloaded = self.acquire(descriptor, recipe, module, cancel)?;

        let sources = recipe.module_sources(module);
        fs::create_dir_all(&sources).map_err(|e| {
            ModuleError::filesystem(format!("Failed to create directory {}", sources.display()), e)
        })?;

        match descriptor.kind {
            ArchiveKind::Tar => {
                process::extract_tarball(&downloaded, &sources).map_err(|e| {
                    ModuleError::filesystem(format!("Failed to stage {}", descriptor.artifact), e)
                })?;
                Ok(sources)
            }
            ArchiveKind::Single => {
                let target = sources.join(&descriptor.staged_name);
                move_file(&downloaded, &target)?;
                Ok(target)
            }
        }
    }
}

/// Rename, falling back to copy + remove when crossing filesystems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| {
        ModuleError::filesystem(
            format!("Failed to move {} to {}", from.display(), to.display()),
            e,
        )
    })?;
    remove_if_exists(from)
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ModuleError::filesystem(
            format!("Failed to remove {}", path.display()),
            e,
        )),
    }
}
