//! Streaming asset fetcher with cache read-through and progress reporting.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::AssetCache;
use crate::error::{VaaniError, VaaniResult};

/// Byte-level progress of a single asset download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes received so far.
    pub loaded: u64,
    /// Declared total size, or 0 when the server did not report one.
    pub total: u64,
    /// Asset name the progress belongs to.
    pub file: String,
}

/// Callback invoked for every received chunk of a network download.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// Retrieves remote assets, serving them from [`AssetCache`] when possible
/// and writing fresh downloads back into it.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    cache: AssetCache,
    cancel: CancellationToken,
}

impl AssetFetcher {
    /// Create a fetcher over the given cache.
    #[must_use]
    pub fn new(cache: AssetCache) -> Self {
        Self::with_cancellation(cache, CancellationToken::new())
    }

    /// Create a fetcher whose downloads observe `cancel`.
    #[must_use]
    pub fn with_cancellation(cache: AssetCache, cancel: CancellationToken) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
            cancel,
        }
    }

    /// The cache this fetcher reads through.
    #[must_use]
    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Fetch `url`, preferring the cache over the network.
    ///
    /// On a cache hit the bytes are returned immediately and `on_progress` is
    /// never invoked. On a miss the response body is consumed incrementally,
    /// `on_progress` fires once per received chunk, and the assembled buffer
    /// is written back to the cache on a best-effort basis: a cache write
    /// failure is logged and the downloaded bytes are still returned.
    ///
    /// There are no retries; a failed download surfaces on the first error.
    ///
    /// # Errors
    ///
    /// Returns [`VaaniError::Fetch`] for a non-success response status,
    /// [`VaaniError::Network`] for transport failures, and
    /// [`VaaniError::Cancelled`] when the cancellation token fires mid
    /// download.
    pub async fn fetch(
        &self,
        url: &str,
        file_name: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> VaaniResult<Vec<u8>> {
        // Warm path first. A cache failure must not abort the fetch.
        match self.cache.read(url).await {
            Ok(Some(bytes)) => return Ok(bytes),
            Ok(None) => {}
            Err(e) => warn!("cache read failed for {url}: {e}"),
        }

        if self.cancel.is_cancelled() {
            return Err(VaaniError::cancelled(file_name));
        }

        info!("downloading {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VaaniError::network(format!("request for {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VaaniError::fetch(url, status.as_u16()));
        }

        let total = response.content_length().unwrap_or(0);
        let mut buffer: Vec<u8> = Vec::with_capacity(total as usize);
        let mut stream = response.bytes_stream();

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("download of {file_name} cancelled after {} bytes", buffer.len());
                    return Err(VaaniError::cancelled(file_name));
                }
                chunk = stream.next() => match chunk {
                    Some(chunk) => {
                        let chunk = chunk.map_err(|e| {
                            VaaniError::network(format!("read from {url} failed: {e}"))
                        })?;
                        buffer.extend_from_slice(&chunk);
                        if let Some(callback) = on_progress {
                            callback(DownloadProgress {
                                loaded: buffer.len() as u64,
                                total,
                                file: file_name.to_string(),
                            });
                        }
                    }
                    None => break,
                },
            }
        }

        if let Err(e) = self.cache.write(url, &buffer).await {
            warn!("cache write failed for {url}: {e}");
        }

        debug!("downloaded {file_name}: {} bytes", buffer.len());
        Ok(buffer)
    }
}
