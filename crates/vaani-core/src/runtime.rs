//! External speech runtime: loading, virtual filesystem, and sessions.
//!
//! The Kokoro and Piper backends are not executed in-process. They run inside
//! an externally-loaded virtual-machine speech engine that exposes three
//! narrow capabilities: a one-time asynchronous load, a virtual filesystem
//! that assets must be materialized into, and a session factory whose
//! sessions generate audio. This module owns the lifecycle around that black
//! box: single-flight bootstrap with a bounded wait, idempotent asset
//! materialization, and exclusive per-request session management.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{VaaniError, VaaniResult};
use crate::fetch::{AssetFetcher, ProgressCallback};
use crate::registry::{BackendKind, ModelSpec};

/// How long a bootstrap may take before it fails with a timeout.
const BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Voice bank used when a Kokoro entry does not declare one.
const KOKORO_DEFAULT_VOICES: &str = "kokoro-en-v0_19/voices.bin";

/// Data directory the Piper models expect inside the virtual filesystem.
const PIPER_DATA_DIR: &str = "./espeak-ng-data";

/// Lifecycle of the process-wide external runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimePhase {
    /// No bootstrap has been attempted yet.
    Uninitialized,
    /// A bootstrap is in flight; callers are waiting on its completion.
    Bootstrapping,
    /// The runtime signalled ready. This phase is never left.
    Ready,
    /// The last bootstrap attempt failed; the next use retries.
    Failed,
}

/// Loader for the external speech runtime.
///
/// Implementations resolve the runtime's binary payload files relative to
/// `base_url` and resolve once the runtime has signalled ready. The loader is
/// invoked at most once per successful bootstrap; failures may be retried by
/// a later call.
#[async_trait]
pub trait SpeechRuntime: Send + Sync {
    /// Load the runtime from `base_url` and wait for its ready signal.
    async fn load(&self, base_url: &str) -> anyhow::Result<Arc<dyn SpeechModule>>;
}

/// A bootstrapped speech runtime instance.
pub trait SpeechModule: Send + Sync {
    /// Create a directory subtree inside the virtual filesystem.
    fn create_path(&self, parent: &str, path: &str) -> anyhow::Result<()>;

    /// Write a file into the virtual filesystem.
    fn create_data_file(&self, dir: &str, name: &str, contents: &[u8]) -> Result<(), VfsWriteError>;

    /// Construct a synthesis session from a variant-specific configuration.
    fn create_tts(&self, config: &OfflineTtsConfig) -> anyhow::Result<Box<dyn SpeechSession>>;
}

impl std::fmt::Debug for dyn SpeechModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SpeechModule")
    }
}

/// A live synthesis session inside the external runtime.
///
/// Sessions hold runtime-side resources; dropping one releases them.
pub trait SpeechSession: Send {
    /// Generate audio for a request.
    fn generate(&mut self, request: GenerateRequest) -> anyhow::Result<GeneratedAudio>;
}

/// Error from a virtual filesystem write.
#[derive(Debug, thiserror::Error)]
pub enum VfsWriteError {
    /// The file already exists; treated as success by the caller.
    #[error("file already exists")]
    AlreadyExists,
    /// Any other write failure.
    #[error("{0}")]
    Other(String),
}

/// Input to [`SpeechSession::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Text to synthesize.
    pub text: String,
    /// Speaker index inside the loaded voice bank.
    pub speaker_id: i64,
    /// Speed multiplier, 1.0 for the model's native pace.
    pub speed: f32,
}

/// Output of [`SpeechSession::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAudio {
    /// Mono f32 PCM samples.
    pub samples: Vec<f32>,
    /// Sample rate the backend produced, reported per generation.
    pub sample_rate: u32,
}

/// Configuration handed to the runtime's session factory, one shape per
/// external backend variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfflineTtsConfig {
    /// Multi-voice codec configuration.
    Kokoro(KokoroTtsConfig),
    /// Phoneme-based configuration.
    Piper(PiperTtsConfig),
}

/// Session configuration for the Kokoro variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KokoroTtsConfig {
    /// Model file path inside the virtual filesystem.
    pub model: String,
    /// Token table path.
    pub tokens: String,
    /// Voice bank path.
    pub voices: String,
    /// Data directory path.
    pub data_dir: String,
    /// Execution provider.
    pub provider: String,
    /// Worker thread count.
    pub num_threads: u32,
}

/// Session configuration for the Piper variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiperTtsConfig {
    /// Model file path inside the virtual filesystem.
    pub model: String,
    /// Model JSON configuration path (doubles as the token table).
    pub tokens: String,
    /// Data directory path.
    pub data_dir: String,
    /// Execution provider.
    pub provider: String,
    /// Worker thread count.
    pub num_threads: u32,
}

impl OfflineTtsConfig {
    /// Build the session configuration for an external-backend registry
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the entry is for the direct backend
    /// or is missing a file the variant requires.
    pub fn for_spec(spec: &ModelSpec) -> VaaniResult<Self> {
        match spec.backend {
            BackendKind::Kokoro => Ok(Self::Kokoro(KokoroTtsConfig {
                model: spec.files.model.to_string(),
                tokens: spec
                    .files
                    .tokens
                    .ok_or_else(|| {
                        VaaniError::configuration("kokoro entry declares no tokens file")
                    })?
                    .to_string(),
                voices: spec.files.voices.unwrap_or(KOKORO_DEFAULT_VOICES).to_string(),
                data_dir: spec.files.data.unwrap_or("").to_string(),
                provider: spec.provider.unwrap_or("cpu").to_string(),
                num_threads: 1,
            })),
            BackendKind::Piper => Ok(Self::Piper(PiperTtsConfig {
                model: spec.files.model.to_string(),
                tokens: spec
                    .files
                    .config
                    .ok_or_else(|| {
                        VaaniError::configuration("piper entry declares no config file")
                    })?
                    .to_string(),
                data_dir: PIPER_DATA_DIR.to_string(),
                provider: spec
                    .provider
                    .ok_or_else(|| {
                        VaaniError::configuration("piper entry declares no execution provider")
                    })?
                    .to_string(),
                num_threads: 1,
            })),
            BackendKind::VitsRasa => Err(VaaniError::configuration(
                "direct backend entries have no external runtime configuration",
            )),
        }
    }
}

/// Owns the external runtime's process-wide lifecycle.
///
/// Bootstrap is single-flight: concurrent first users share one loader call
/// and all observe its outcome. Materialized virtual files are tracked in an
/// explicit set so each file is written at most once per process. At most one
/// session is live at any instant; creating the next one releases the
/// previous first, under one lock, so release and create never interleave
/// across requests.
pub struct RuntimeHost {
    loader: Arc<dyn SpeechRuntime>,
    base_url: String,
    module: OnceCell<Arc<dyn SpeechModule>>,
    phase: RwLock<RuntimePhase>,
    materialized: Mutex<HashSet<String>>,
    session: tokio::sync::Mutex<Option<Box<dyn SpeechSession>>>,
}

impl RuntimeHost {
    /// Create a host that loads the runtime from `base_url` on first use.
    #[must_use]
    pub fn new(loader: Arc<dyn SpeechRuntime>, base_url: String) -> Self {
        Self {
            loader,
            base_url,
            module: OnceCell::new(),
            phase: RwLock::new(RuntimePhase::Uninitialized),
            materialized: Mutex::new(HashSet::new()),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Current lifecycle phase, for observability.
    #[must_use]
    pub fn phase(&self) -> RuntimePhase {
        *self.phase.read()
    }

    /// Resource location the runtime is loaded from.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ensure the runtime is bootstrapped, loading it on first use.
    ///
    /// Idempotent and single-flight: the loader runs at most once at a time
    /// and a completed bootstrap is never repeated. A failed attempt leaves
    /// the host re-attemptable.
    ///
    /// # Errors
    ///
    /// Returns [`VaaniError::BootstrapTimeout`] when the runtime does not
    /// signal ready within the bounded wait, or [`VaaniError::Bootstrap`]
    /// when the loader reports a failure.
    pub async fn ensure_bootstrapped(&self) -> VaaniResult<Arc<dyn SpeechModule>> {
        let module = self
            .module
            .get_or_try_init(|| async {
                *self.phase.write() = RuntimePhase::Bootstrapping;
                info!("bootstrapping speech runtime from {}", self.base_url);

                let loaded =
                    tokio::time::timeout(BOOTSTRAP_TIMEOUT, self.loader.load(&self.base_url)).await;
                match loaded {
                    Err(_) => {
                        *self.phase.write() = RuntimePhase::Failed;
                        Err(VaaniError::BootstrapTimeout)
                    }
                    Ok(Err(e)) => {
                        *self.phase.write() = RuntimePhase::Failed;
                        Err(VaaniError::bootstrap(&self.base_url, e.to_string()))
                    }
                    Ok(Ok(module)) => {
                        *self.phase.write() = RuntimePhase::Ready;
                        info!("speech runtime ready");
                        Ok(module)
                    }
                }
            })
            .await?;
        Ok(Arc::clone(module))
    }

    /// Fetch an asset and write it into the runtime's virtual filesystem,
    /// creating intermediate directories as needed.
    ///
    /// Idempotent by file name: a file already recorded as materialized is
    /// skipped without any I/O, and an "already exists" write error from the
    /// virtual filesystem is logged and treated as success.
    ///
    /// # Errors
    ///
    /// Surfaces fetch errors from the downloader and bootstrap errors for
    /// other virtual filesystem write failures.
    pub async fn ensure_materialized(
        &self,
        module: &Arc<dyn SpeechModule>,
        fetcher: &AssetFetcher,
        url: &str,
        file_name: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> VaaniResult<()> {
        if self.materialized.lock().contains(file_name) {
            debug!("{file_name} already materialized");
            return Ok(());
        }

        let bytes = fetcher.fetch(url, file_name, on_progress).await?;

        let (dir, name) = match file_name.rsplit_once('/') {
            Some((dir, name)) => {
                if let Err(e) = module.create_path("/", dir) {
                    // The subtree may exist from an earlier file.
                    debug!("create_path {dir} reported: {e}");
                }
                (dir, name)
            }
            None => ("/", file_name),
        };

        match module.create_data_file(dir, name, &bytes) {
            Ok(()) => {}
            Err(VfsWriteError::AlreadyExists) => {
                warn!("virtual file {file_name} already exists, keeping it");
            }
            Err(VfsWriteError::Other(message)) => {
                return Err(VaaniError::bootstrap(
                    &self.base_url,
                    format!("virtual filesystem write of {file_name} failed: {message}"),
                ));
            }
        }

        self.materialized.lock().insert(file_name.to_string());
        debug!("materialized {file_name} ({} bytes)", bytes.len());
        Ok(())
    }

    /// Run one synthesis request against a fresh session.
    ///
    /// The previous session, if any, is released before the new one is
    /// constructed; release, construction, and generation happen under one
    /// lock so concurrent requests never observe a torn session. On success
    /// the session is retained for release by the next request.
    ///
    /// # Errors
    ///
    /// Returns [`VaaniError::RuntimeNotReady`] when called before bootstrap,
    /// a model load error when the session cannot be constructed, and an
    /// inference error when generation fails.
    pub async fn synthesize(
        &self,
        backend: BackendKind,
        config: &OfflineTtsConfig,
        request: GenerateRequest,
    ) -> VaaniResult<GeneratedAudio> {
        let module = self
            .module
            .get()
            .cloned()
            .ok_or(VaaniError::RuntimeNotReady)?;

        let mut slot = self.session.lock().await;
        if let Some(previous) = slot.take() {
            debug!("releasing previous external session");
            drop(previous);
        }

        let mut session = module.create_tts(config).map_err(|e| {
            VaaniError::model_load(format!("{} session construction failed: {e}", backend.name()))
        })?;

        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = session.generate(request);
            (session, result)
        })
        .await
        .map_err(|e| VaaniError::inference(backend.name(), format!("generation task died: {e}")))?;

        match result {
            Ok(audio) => {
                *slot = Some(session);
                Ok(audio)
            }
            Err(e) => Err(VaaniError::inference(backend.name(), e.to_string())),
        }
    }
}

impl std::fmt::Debug for RuntimeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHost")
            .field("base_url", &self.base_url)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
