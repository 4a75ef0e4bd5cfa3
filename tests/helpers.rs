//! Shared test utilities for vib-fsguard tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use vib_fsguard::artifact::{ArchiveKind, ArtifactDescriptor};
use vib_fsguard::error::Result;
use vib_fsguard::fetch::{Downloader, Fetcher};
use vib_fsguard::Recipe;

/// Test environment with temporary downloads and sources directories.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub downloads: PathBuf,
    pub sources: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let downloads = temp_dir.path().join("downloads");
        let sources = temp_dir.path().join("sources");

        fs::create_dir_all(&downloads).expect("Failed to create downloads dir");
        fs::create_dir_all(&sources).expect("Failed to create sources dir");

        Self {
            _temp_dir: temp_dir,
            downloads,
            sources,
        }
    }

    /// Recipe JSON shaped like the orchestrator's, with this env's paths.
    pub fn recipe_json(&self) -> String {
        serde_json::json!({
            "Name": "fsguard unit test",
            "Id": "fsguard",
            "Stages": [{
                "id": "test",
                "base": "test:latest",
                "singlelayer": false,
                "modules": [{}],
            }],
            "Path": "/fakepath/recipe.yml",
            "ParentPath": "/fakepath",
            "DownloadsPath": self.downloads,
            "SourcesPath": self.sources,
            "PluginPath": "/plugins",
            "Containerfile": "/Containerfile",
        })
        .to_string()
    }
}

/// Fetch collaborator that stages placeholder files instead of downloading.
#[derive(Default)]
pub struct StubFetcher {
    pub fetched: RefCell<Vec<String>>,
}

impl Fetcher for StubFetcher {
    fn fetch(
        &self,
        descriptor: &ArtifactDescriptor,
        recipe: &Recipe,
        module: &str,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        self.fetched.borrow_mut().push(descriptor.url.clone());

        let dir = recipe.module_sources(module);
        fs::create_dir_all(&dir).expect("Failed to create module sources");
        match descriptor.kind {
            ArchiveKind::Tar => {
                fs::write(dir.join("FsGuard"), b"stub").expect("Failed to write stub tool");
                Ok(dir)
            }
            ArchiveKind::Single => {
                let path = dir.join(&descriptor.staged_name);
                fs::write(&path, b"#!/usr/bin/env python3\n").expect("Failed to write stub script");
                Ok(path)
            }
        }
    }
}

/// Downloader that writes the same bytes for every URL.
pub struct FixedBytesDownloader(pub &'static [u8]);

impl Downloader for FixedBytesDownloader {
    fn download(&self, _url: &str, dest: &Path, _cancel: &CancellationToken) -> anyhow::Result<()> {
        fs::write(dest, self.0)?;
        Ok(())
    }
}

/// Module JSON the way the orchestrator marshals a Go-style struct.
pub fn module_json(
    name: &str,
    custom: bool,
    location: &str,
    generate_key: bool,
    key_path: &str,
    filelists: &[&str],
) -> String {
    serde_json::json!({
        "name": name,
        "type": "fsguard",
        "CustomFsGuard": custom,
        "FsGuardLocation": location,
        "GenerateKey": generate_key,
        "KeyPath": key_path,
        "FilelistPaths": filelists,
    })
    .to_string()
}
