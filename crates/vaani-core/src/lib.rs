//! # Vaani Core
//!
//! Multilingual text-to-speech dispatcher with on-demand model delivery.
//!
//! ## Features
//!
//! - Eleven languages across three model families behind one `speak` call
//! - Lazy asset acquisition from release stores, with a durable local cache
//!   and byte-level download progress
//! - Direct in-process ONNX inference for the Indic VITS models
//! - Host-pluggable external speech runtime for the Kokoro and Piper models
//! - Normalized output: raw f32 samples, a WAV container, deferred playback
//!
//! ## Example
//!
//! ```rust,no_run
//! use vaani_core::{Language, SpeakRequest, VaaniEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = VaaniEngine::builder().build()?;
//!     let request = SpeakRequest::new("नमस्ते", Language::Hindi);
//!     let response = engine.speak(&request).await?;
//!     response.write_wav(std::path::Path::new("namaste.wav"))?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audio;
pub mod cache;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod registry;
pub mod release;
pub mod runtime;
pub mod text;
pub mod vits;

// Re-export main types for convenience
pub use audio::{encode_wav, write_wav, AudioSink};
pub use cache::AssetCache;
pub use engine::{EngineBuilder, SpeakRequest, SpeakResponse, VaaniEngine};
pub use error::{VaaniError, VaaniResult};
pub use fetch::{AssetFetcher, DownloadProgress, ProgressCallback};
pub use registry::{AssetSet, BackendKind, Language, ModelSpec, DEFAULT_VITS_SAMPLE_RATE};
pub use release::{default_runtime_base_url, release_url, DEFAULT_REPO, DEFAULT_TAG};
pub use runtime::{
    GenerateRequest, GeneratedAudio, KokoroTtsConfig, OfflineTtsConfig, PiperTtsConfig,
    RuntimeHost, RuntimePhase, SpeechModule, SpeechRuntime, SpeechSession, VfsWriteError,
};
pub use text::{tokenize_vits, Vocabulary, BLANK_ID};
pub use vits::{LoadedVits, VitsBackend};

/// Version information for the vaani-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
