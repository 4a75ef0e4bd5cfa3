//! Download and checksum primitives.
//!
//! The fetch stage talks to the network only through [`Downloader`], so the
//! transport can be swapped out (tests write fixture bytes instead). The
//! production implementation streams over HTTP with retries for transient
//! failures and stops as soon as the cancellation token fires.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

pub use checksum::{sha256_file, verify_sha256};

/// Fetches a URL into a local file.
pub trait Downloader {
    /// Download `url` to `dest`, replacing any existing file.
    ///
    /// Implementations must return [`DownloadCancelled`] (wrapped in the
    /// `anyhow::Error`) when `cancel` fires before the download completes.
    fn download(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> Result<()>;
}

impl<T: Downloader + ?Sized> Downloader for &T {
    fn download(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> Result<()> {
        (**self).download(url, dest, cancel)
    }
}

/// Marker error for a download interrupted by its cancellation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("download cancelled")]
pub struct DownloadCancelled;

/// Transport settings for [`HttpDownloader`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Per-request timeout. `None` lets large releases take as long as they need.
    pub timeout: Option<Duration>,
    /// Extra attempts after a transient failure.
    pub retries: u32,
    /// First backoff step; doubles on every retry.
    pub retry_delay: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            retries: crate::config::DEFAULT_DOWNLOAD_RETRIES,
            retry_delay: Duration::from_secs(2),
        }
    }
}

impl DownloadOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.download_timeout,
            retries: config.download_retries,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (1-based). Exponential, capped at 16x.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay * (1 << (attempt.saturating_sub(1)).min(4))
    }
}

/// HTTP downloader backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpDownloader {
    options: DownloadOptions,
}

impl HttpDownloader {
    pub fn new(options: DownloadOptions) -> Self {
        Self { options }
    }
}

impl HttpDownloader {
    /// Run one download on a fresh current-thread runtime.
    fn block_on(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> Result<()> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create tokio runtime")?;
        rt.block_on(http(url, dest, &self.options, cancel))
    }
}

impl Downloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> Result<()> {
        if tokio::runtime::Handle::try_current().is_err() {
            return self.block_on(url, dest, cancel);
        }

        // A runtime cannot be started from a thread that already drives one,
        // so the download gets its own thread.
        std::thread::scope(|scope| {
            scope
                .spawn(|| self.block_on(url, dest, cancel))
                .join()
                .map_err(|_| anyhow::anyhow!("download thread for {} panicked", url))?
        })
    }
}

/// Download `url` to `dest`, retrying transient failures.
///
/// The body is streamed into `{dest}.part` and renamed into place once
/// complete, so `dest` only ever holds a whole response.
///
/// # Errors
/// The last attempt's error (with URL and HTTP status), or [`DownloadCancelled`].
pub async fn http(
    url: &str,
    dest: &Path,
    options: &DownloadOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("vib-fsguard/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let part = part_path(dest);

    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = options.backoff(attempt);
            tracing::info!(%url, attempt, retries = options.retries, ?delay, "retrying download");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadCancelled.into()),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DownloadCancelled.into()),
            res = fetch_once(&client, url, &part, options.timeout) => res,
        };

        match outcome {
            Ok(bytes) => {
                tokio::fs::rename(&part, dest).await.with_context(|| {
                    format!("Failed to move {} into place", part.display())
                })?;
                tracing::debug!(%url, bytes, dest = %dest.display(), "download complete");
                return Ok(());
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                if e.is::<DownloadCancelled>() || !is_transient(&e) || attempt >= options.retries {
                    return Err(e);
                }
                tracing::warn!(%url, error = %e, "download attempt failed");
            }
        }
        attempt += 1;
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// One GET into `part`. Returns the number of bytes written.
async fn fetch_once(
    client: &reqwest::Client,
    url: &str,
    part: &Path,
    timeout: Option<Duration>,
) -> Result<u64> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let mut request = client.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }
    let response = request
        .send()
        .await
        .with_context(|| format!("HTTP request failed: {}", url))?;

    let status = response.status();
    if !status.is_success() {
        bail!(
            "HTTP {} for {}: {}",
            status.as_u16(),
            url,
            status.canonical_reason().unwrap_or("Unknown error")
        );
    }

    if let Some(parent) = part.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let mut out = tokio::io::BufWriter::new(
        tokio::fs::File::create(part)
            .await
            .with_context(|| format!("Failed to create {}", part.display()))?,
    );

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.with_context(|| format!("Connection dropped while reading {}", url))?;
        out.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", part.display()))?;
        written += chunk.len() as u64;
    }
    out.flush()
        .await
        .with_context(|| format!("Failed to flush {}", part.display()))?;

    Ok(written)
}

/// Failure texts that indicate the next attempt may succeed.
const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "connection dropped",
    "temporarily unavailable",
    "try again",
    "http 429",
    "http 502",
    "http 503",
    "http 504",
];

fn is_transient(e: &anyhow::Error) -> bool {
    let msg = format!("{:#}", e).to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| msg.contains(marker))
}

pub mod checksum {
    use anyhow::Context;
    use sha2::{Digest, Sha256};
    use std::fs::File;
    use std::path::Path;

    use crate::error::{ModuleError, Result};

    /// SHA256 of a file as lowercase hex.
    pub fn sha256_file(path: &Path) -> anyhow::Result<String> {
        let mut file = File::open(path)
            .with_context(|| format!("Failed to open {} for hashing", path.display()))?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Check `path` against an expected hex digest (case-insensitive).
    ///
    /// # Errors
    /// `IntegrityMismatch` carrying both digests, or `Filesystem` when the
    /// file cannot be read.
    pub fn verify_sha256(path: &Path, expected: &str) -> Result<()> {
        let actual = sha256_file(path)
            .map_err(|e| ModuleError::filesystem(format!("Failed to hash {}", path.display()), e))?;

        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(ModuleError::IntegrityMismatch {
                path: path.to_path_buf(),
                expected: expected.to_string(),
                actual,
            });
        }
        Ok(())
    }
}
