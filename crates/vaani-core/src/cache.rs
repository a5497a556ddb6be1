//! Durable asset cache keyed by source URL.
//!
//! Downloaded model assets are large and immutable, so they are written once
//! to disk and read back on every later request for the same URL. Entries are
//! never updated or invalidated by this crate; eviction is left to whoever
//! owns the cache directory.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{VaaniError, VaaniResult};

/// Persistent content cache mapping a source URL to a byte buffer on disk.
///
/// File names are the SHA-256 digest of the URL, which keeps arbitrary URLs
/// (including ones with embedded paths) addressable on every filesystem.
#[derive(Debug, Clone)]
pub struct AssetCache {
    dir: PathBuf,
}

impl AssetCache {
    /// Create a cache rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns a cache error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> VaaniResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| VaaniError::cache(format!("failed to create {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Create a cache in the platform cache directory for this application.
    ///
    /// # Errors
    ///
    /// Returns a cache error if no project directory can be determined or the
    /// directory cannot be created.
    pub fn with_default_dir() -> VaaniResult<Self> {
        let proj_dirs = ProjectDirs::from("in", "Vaani", "vaani")
            .ok_or_else(|| VaaniError::cache("failed to determine project directories"))?;
        Self::new(proj_dirs.cache_dir().join("assets"))
    }

    /// Directory this cache stores its entries under.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// On-disk path for the entry keyed by `url`.
    #[must_use]
    pub fn entry_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        let mut name = String::with_capacity(64);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(name, "{byte:02x}");
        }
        self.dir.join(name)
    }

    /// Read the cached bytes for `url`, if present.
    ///
    /// # Errors
    ///
    /// Returns a cache error when the entry exists but cannot be read; a
    /// missing entry is `Ok(None)`, not an error.
    pub async fn read(&self, url: &str) -> VaaniResult<Option<Vec<u8>>> {
        let path = self.entry_path(url);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("cache hit for {url} ({} bytes)", bytes.len());
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(VaaniError::cache(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Store `bytes` under `url`, replacing nothing: an existing entry for the
    /// same URL carries identical content and is left alone.
    ///
    /// The write goes to a sibling `.part` file first and is renamed into
    /// place, so readers never observe a torn entry.
    ///
    /// # Errors
    ///
    /// Returns a cache error when the bytes cannot be persisted.
    pub async fn write(&self, url: &str, bytes: &[u8]) -> VaaniResult<()> {
        let path = self.entry_path(url);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("cache entry for {url} already present");
            return Ok(());
        }

        let part = path.with_extension("part");
        tokio::fs::write(&part, bytes)
            .await
            .map_err(|e| VaaniError::cache(format!("failed to write {}: {e}", part.display())))?;
        tokio::fs::rename(&part, &path)
            .await
            .map_err(|e| VaaniError::cache(format!("failed to commit {}: {e}", path.display())))?;

        debug!("cached {url} ({} bytes)", bytes.len());
        Ok(())
    }
}
