//! The synthesis dispatcher: request in, playable audio out.
//!
//! [`VaaniEngine::speak`] resolves the language's registry entry, makes sure
//! the backend behind it has its assets and a live session, runs inference,
//! and normalizes the result into a [`SpeakResponse`] regardless of which
//! backend produced it.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audio::{encode_wav, write_wav, AudioSink};
use crate::cache::AssetCache;
use crate::error::{VaaniError, VaaniResult};
use crate::fetch::{AssetFetcher, ProgressCallback};
use crate::registry::{BackendKind, Language, ModelSpec};
use crate::release::{default_runtime_base_url, release_url};
use crate::runtime::{GenerateRequest, OfflineTtsConfig, RuntimeHost, SpeechRuntime};
use crate::vits::VitsBackend;

/// A single synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakRequest {
    /// Text to synthesize.
    pub text: String,
    /// Language to synthesize in.
    pub language: Language,
    /// Speed multiplier; 1.0 is the model's native pace.
    pub speed: f32,
}

impl SpeakRequest {
    /// Create a request with the default speed of 1.0.
    #[must_use]
    pub fn new(text: impl Into<String>, language: Language) -> Self {
        Self {
            text: text.into(),
            language,
            speed: 1.0,
        }
    }

    /// Create a request from a BCP-47 language tag.
    ///
    /// # Errors
    ///
    /// Returns an unsupported-language error for a tag outside the registry.
    /// No I/O happens on that path.
    pub fn from_tag(text: impl Into<String>, tag: &str) -> VaaniResult<Self> {
        let language =
            Language::from_tag(tag).ok_or_else(|| VaaniError::unsupported_language(tag))?;
        Ok(Self::new(text, language))
    }

    /// Set the speed multiplier.
    ///
    /// # Errors
    ///
    /// Returns an error if speed is not in valid range (0.1 to 3.0)
    pub fn with_speed(mut self, speed: f32) -> VaaniResult<Self> {
        if !(0.1..=3.0).contains(&speed) {
            return Err(VaaniError::invalid_input(format!(
                "Speed must be between 0.1 and 3.0, got {speed}"
            )));
        }
        self.speed = speed;
        Ok(self)
    }
}

/// Normalized synthesis result, identical in shape for every backend.
pub struct SpeakResponse {
    samples: Vec<f32>,
    sample_rate: u32,
    wav: Vec<u8>,
    sink: Option<Arc<dyn AudioSink>>,
}

impl SpeakResponse {
    /// Raw mono f32 PCM samples.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate of [`samples`](Self::samples).
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// RIFF/WAVE encoding of the samples (16-bit PCM, mono).
    #[must_use]
    pub fn wav(&self) -> &[u8] {
        &self.wav
    }

    /// Consume the response, keeping only the WAV bytes.
    #[must_use]
    pub fn into_wav(self) -> Vec<u8> {
        self.wav
    }

    /// Duration of the audio in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Play the audio through the engine's configured sink.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the engine has no audio sink, and
    /// an audio device error when the sink itself fails.
    pub async fn play(&self) -> VaaniResult<()> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| VaaniError::configuration("no audio sink configured"))?;
        sink.play(&self.samples, self.sample_rate)
            .await
            .map_err(|e| VaaniError::audio_device(e.to_string()))
    }

    /// Write the audio to a 16-bit PCM WAV file.
    ///
    /// # Errors
    ///
    /// Returns a file error when the file cannot be written.
    pub fn write_wav(&self, path: &std::path::Path) -> VaaniResult<()> {
        write_wav(path, &self.samples, self.sample_rate)
    }
}

impl std::fmt::Debug for SpeakResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeakResponse")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("wav_bytes", &self.wav.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`VaaniEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    cache_dir: Option<PathBuf>,
    runtime: Option<Arc<dyn SpeechRuntime>>,
    runtime_base_url: Option<String>,
    on_progress: Option<ProgressCallback>,
    sink: Option<Arc<dyn AudioSink>>,
    cancel: Option<CancellationToken>,
}

impl EngineBuilder {
    /// Store downloaded assets under `dir` instead of the platform cache
    /// directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Provide the loader for the external speech runtime. Without one, only
    /// direct-backend languages can be synthesized.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Arc<dyn SpeechRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Override the base location the external runtime's payload files are
    /// resolved against. A missing trailing slash is appended.
    #[must_use]
    pub fn with_runtime_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.runtime_base_url = Some(normalize_base_url(base_url.into()));
        self
    }

    /// Receive byte-level progress for every asset download.
    #[must_use]
    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Attach the playback sink used by [`SpeakResponse::play`].
    #[must_use]
    pub fn with_audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Use an externally-owned cancellation token for in-flight downloads.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns a cache error when the asset cache directory cannot be set up.
    pub fn build(self) -> VaaniResult<VaaniEngine> {
        let cache = match self.cache_dir {
            Some(dir) => AssetCache::new(dir)?,
            None => AssetCache::with_default_dir()?,
        };
        let cancel = self.cancel.unwrap_or_default();
        let fetcher = AssetFetcher::with_cancellation(cache, cancel.clone());

        let runtime = self.runtime.map(|loader| {
            let base_url = self
                .runtime_base_url
                .unwrap_or_else(default_runtime_base_url);
            RuntimeHost::new(loader, base_url)
        });

        Ok(VaaniEngine {
            fetcher,
            vits: VitsBackend::new(),
            runtime,
            on_progress: self.on_progress,
            sink: self.sink,
            cancel,
        })
    }
}

impl std::fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("cache_dir", &self.cache_dir)
            .field("runtime_base_url", &self.runtime_base_url)
            .field("has_runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

/// Multilingual TTS engine dispatching across heterogeneous backends.
pub struct VaaniEngine {
    fetcher: AssetFetcher,
    vits: VitsBackend,
    runtime: Option<RuntimeHost>,
    on_progress: Option<ProgressCallback>,
    sink: Option<Arc<dyn AudioSink>>,
    cancel: CancellationToken,
}

impl VaaniEngine {
    /// Start building an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Token that aborts in-flight downloads when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel all in-flight downloads.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Synthesize text identified by a BCP-47 language tag.
    ///
    /// # Errors
    ///
    /// Returns an unsupported-language error for unknown tags (with no I/O
    /// performed), otherwise behaves like [`speak`](Self::speak).
    pub async fn speak_tag(&self, text: &str, tag: &str) -> VaaniResult<SpeakResponse> {
        let request = SpeakRequest::from_tag(text, tag)?;
        self.speak(&request).await
    }

    /// Synthesize a request, lazily acquiring whatever the language's backend
    /// needs.
    ///
    /// # Errors
    ///
    /// Surfaces every error class from the underlying layers: fetch and
    /// network failures, model load failures, bootstrap failures for the
    /// external runtime, and inference failures. A failed request produces no
    /// audio; assets that finished downloading before the failure stay
    /// cached.
    pub async fn speak(&self, request: &SpeakRequest) -> VaaniResult<SpeakResponse> {
        let spec = ModelSpec::for_language(request.language);
        debug!(
            "dispatching {} request for {}",
            spec.backend.name(),
            request.language
        );

        let (samples, sample_rate) = match spec.backend {
            BackendKind::VitsRasa => self.speak_direct(request, &spec).await?,
            BackendKind::Kokoro | BackendKind::Piper => {
                self.speak_external(request, &spec).await?
            }
        };

        info!(
            "synthesized {} samples at {sample_rate} Hz for {}",
            samples.len(),
            request.language
        );
        let wav = encode_wav(&samples, sample_rate);
        Ok(SpeakResponse {
            samples,
            sample_rate,
            wav,
            sink: self.sink.clone(),
        })
    }

    /// Direct path: load-once session, tokenize, run the graph in process.
    async fn speak_direct(
        &self,
        request: &SpeakRequest,
        spec: &ModelSpec,
    ) -> VaaniResult<(Vec<f32>, u32)> {
        let loaded = self
            .vits
            .ensure_loaded(
                request.language,
                spec,
                &self.fetcher,
                self.on_progress.as_ref(),
            )
            .await?;
        let sample_rate = loaded.sample_rate();
        let samples = self.vits.synthesize(loaded, &request.text).await?;
        Ok((samples, sample_rate))
    }

    /// External path: bootstrap the runtime, materialize every declared
    /// asset, then run a fresh session.
    async fn speak_external(
        &self,
        request: &SpeakRequest,
        spec: &ModelSpec,
    ) -> VaaniResult<(Vec<f32>, u32)> {
        let host = self.runtime.as_ref().ok_or_else(|| {
            VaaniError::configuration(format!(
                "language {} needs the external speech runtime, but none is configured",
                request.language
            ))
        })?;

        let module = host.ensure_bootstrapped().await?;

        for file_name in spec.files.iter() {
            let url = release_url(spec.repo, spec.release_tag, file_name);
            host.ensure_materialized(
                &module,
                &self.fetcher,
                &url,
                file_name,
                self.on_progress.as_ref(),
            )
            .await?;
        }

        let config = OfflineTtsConfig::for_spec(spec)?;
        let audio = host
            .synthesize(
                spec.backend,
                &config,
                GenerateRequest {
                    text: request.text.clone(),
                    speaker_id: 0,
                    speed: request.speed,
                },
            )
            .await?;
        Ok((audio.samples, audio.sample_rate))
    }
}

impl std::fmt::Debug for VaaniEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaaniEngine")
            .field("cache_dir", &self.fetcher.cache().dir())
            .field("has_runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

/// Append the trailing slash base URLs are joined against.
fn normalize_base_url(mut base_url: String) -> String {
    if !base_url.ends_with('/') {
        base_url.push('/');
    }
    base_url
}
