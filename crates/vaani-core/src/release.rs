//! Release asset locations.
//!
//! Model assets are published as GitHub release artifacts. The download URL
//! is a fixed template over (repository, tag, file name); the same string is
//! used as the asset cache key, so it must stay byte-stable.

/// Release repository that hosts the default model assets.
pub const DEFAULT_REPO: &str = "h2210316651/indic-tts";

/// Release tag that hosts the default model assets.
pub const DEFAULT_TAG: &str = "v1.0.0";

/// Build the download URL for a release asset.
///
/// `repo` is in `owner/name` form. The result is deterministic and free of
/// I/O; callers use it both for fetching and as the cache key.
#[must_use]
pub fn release_url(repo: &str, tag: &str, file_name: &str) -> String {
    format!("https://github.com/{repo}/releases/download/{tag}/{file_name}")
}

/// Default content-delivery location for the external speech runtime.
///
/// Points at the `assets/` tree of this project's own release coordinates,
/// served through a CDN that allows cross-origin fetches of the runtime
/// payload files.
#[must_use]
pub fn default_runtime_base_url() -> String {
    format!("https://cdn.jsdelivr.net/gh/{DEFAULT_REPO}@{DEFAULT_TAG}/assets/")
}
