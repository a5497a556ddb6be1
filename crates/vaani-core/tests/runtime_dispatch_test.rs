//! External-runtime lifecycle and dispatch behavior against a mock runtime.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vaani_core::{
    release_url, AssetCache, BackendKind, GenerateRequest, GeneratedAudio, Language, ModelSpec,
    OfflineTtsConfig, RuntimeHost, RuntimePhase, SpeakRequest, SpeechModule, SpeechRuntime,
    SpeechSession, VaaniEngine, VaaniError, VfsWriteError,
};

const MOCK_SAMPLES: [f32; 4] = [0.0, 0.25, -0.25, 0.5];
const MOCK_SAMPLE_RATE: u32 = 16_000;

/// Shared observable state behind the mock runtime.
#[derive(Default)]
struct ModuleState {
    dirs: Mutex<Vec<String>>,
    files: Mutex<Vec<(String, String, usize)>>,
    configs: Mutex<Vec<OfflineTtsConfig>>,
    requests: Mutex<Vec<GenerateRequest>>,
    sessions_created: AtomicUsize,
    live_sessions: AtomicUsize,
    max_live_sessions: AtomicUsize,
    reject_writes_as_existing: std::sync::atomic::AtomicBool,
}

struct MockModule {
    state: Arc<ModuleState>,
}

impl SpeechModule for MockModule {
    fn create_path(&self, _parent: &str, path: &str) -> anyhow::Result<()> {
        self.state.dirs.lock().unwrap().push(path.to_string());
        Ok(())
    }

    fn create_data_file(&self, dir: &str, name: &str, contents: &[u8]) -> Result<(), VfsWriteError> {
        if self.state.reject_writes_as_existing.load(Ordering::SeqCst) {
            return Err(VfsWriteError::AlreadyExists);
        }
        self.state
            .files
            .lock()
            .unwrap()
            .push((dir.to_string(), name.to_string(), contents.len()));
        Ok(())
    }

    fn create_tts(&self, config: &OfflineTtsConfig) -> anyhow::Result<Box<dyn SpeechSession>> {
        self.state.configs.lock().unwrap().push(config.clone());
        self.state.sessions_created.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live_sessions.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSession {
    state: Arc<ModuleState>,
}

impl SpeechSession for MockSession {
    fn generate(&mut self, request: GenerateRequest) -> anyhow::Result<GeneratedAudio> {
        self.state.requests.lock().unwrap().push(request);
        Ok(GeneratedAudio {
            samples: MOCK_SAMPLES.to_vec(),
            sample_rate: MOCK_SAMPLE_RATE,
        })
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.state.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Loader that counts invocations and hands out one shared module.
struct CountingRuntime {
    loads: Arc<AtomicUsize>,
    state: Arc<ModuleState>,
    delay: Duration,
}

#[async_trait]
impl SpeechRuntime for CountingRuntime {
    async fn load(&self, _base_url: &str) -> anyhow::Result<Arc<dyn SpeechModule>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Arc::new(MockModule {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Loader that never signals ready.
struct NeverReadyRuntime;

#[async_trait]
impl SpeechRuntime for NeverReadyRuntime {
    async fn load(&self, _base_url: &str) -> anyhow::Result<Arc<dyn SpeechModule>> {
        std::future::pending().await
    }
}

/// Loader that fails on the first attempt and succeeds afterwards.
struct FlakyRuntime {
    attempts: Arc<AtomicUsize>,
    state: Arc<ModuleState>,
}

#[async_trait]
impl SpeechRuntime for FlakyRuntime {
    async fn load(&self, base_url: &str) -> anyhow::Result<Arc<dyn SpeechModule>> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            anyhow::bail!("loader script unreachable at {base_url}");
        }
        Ok(Arc::new(MockModule {
            state: Arc::clone(&self.state),
        }))
    }
}

async fn seed_assets(cache_dir: &std::path::Path, language: Language) {
    let cache = AssetCache::new(cache_dir).unwrap();
    let spec = ModelSpec::for_language(language);
    for file_name in spec.files.iter() {
        let url = release_url(spec.repo, spec.release_tag, file_name);
        cache.write(&url, b"asset bytes").await.unwrap();
    }
}

fn engine_with_runtime(cache_dir: &std::path::Path, state: &Arc<ModuleState>) -> VaaniEngine {
    let runtime = CountingRuntime {
        loads: Arc::default(),
        state: Arc::clone(state),
        delay: Duration::ZERO,
    };
    VaaniEngine::builder()
        .with_cache_dir(cache_dir)
        .with_runtime(Arc::new(runtime))
        .with_runtime_base_url("https://cdn.example.com/assets")
        .build()
        .unwrap()
}

#[tokio::test]
async fn concurrent_first_uses_share_one_bootstrap() {
    let loads = Arc::new(AtomicUsize::new(0));
    let host = Arc::new(RuntimeHost::new(
        Arc::new(CountingRuntime {
            loads: Arc::clone(&loads),
            state: Arc::default(),
            delay: Duration::from_millis(50),
        }),
        "https://cdn.example.com/assets/".to_string(),
    ));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let host = Arc::clone(&host);
        tasks.push(tokio::spawn(async move {
            host.ensure_bootstrapped().await.map(|_| ())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(host.phase(), RuntimePhase::Ready);

    // A later call reuses the bootstrapped module without reloading.
    host.ensure_bootstrapped().await.unwrap();
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_times_out_instead_of_waiting_forever() {
    let host = RuntimeHost::new(
        Arc::new(NeverReadyRuntime),
        "https://cdn.example.com/assets/".to_string(),
    );

    let err = host.ensure_bootstrapped().await.unwrap_err();
    assert_eq!(err, VaaniError::BootstrapTimeout);
    assert_eq!(host.phase(), RuntimePhase::Failed);
}

#[tokio::test]
async fn failed_bootstrap_names_the_location_and_can_be_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let host = RuntimeHost::new(
        Arc::new(FlakyRuntime {
            attempts: Arc::clone(&attempts),
            state: Arc::default(),
        }),
        "https://cdn.example.com/assets/".to_string(),
    );

    let err = host.ensure_bootstrapped().await.unwrap_err();
    match err {
        VaaniError::Bootstrap { base_url, message } => {
            assert_eq!(base_url, "https://cdn.example.com/assets/");
            assert!(message.contains("cdn.example.com"));
        }
        other => panic!("expected bootstrap error, got {other:?}"),
    }
    assert_eq!(host.phase(), RuntimePhase::Failed);

    host.ensure_bootstrapped().await.unwrap();
    assert_eq!(host.phase(), RuntimePhase::Ready);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn session_use_before_bootstrap_is_rejected() {
    let host = RuntimeHost::new(
        Arc::new(NeverReadyRuntime),
        "https://cdn.example.com/assets/".to_string(),
    );

    let spec = ModelSpec::for_language(Language::EnglishUs);
    let config = OfflineTtsConfig::for_spec(&spec).unwrap();
    let err = host
        .synthesize(
            BackendKind::Kokoro,
            &config,
            GenerateRequest {
                text: "hello".to_string(),
                speaker_id: 0,
                speed: 1.0,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err, VaaniError::RuntimeNotReady);
}

#[tokio::test]
async fn kokoro_dispatch_materializes_assets_and_generates() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    seed_assets(temp_dir.path(), Language::EnglishUs).await;

    let state = Arc::new(ModuleState::default());
    let engine = engine_with_runtime(temp_dir.path(), &state);

    let request = SpeakRequest::new("hello world", Language::EnglishUs)
        .with_speed(1.5)
        .unwrap();
    let response = engine.speak(&request).await.unwrap();

    assert_eq!(response.samples(), &MOCK_SAMPLES[..]);
    assert_eq!(response.sample_rate(), MOCK_SAMPLE_RATE);
    assert_eq!(response.wav().len(), 44 + 2 * MOCK_SAMPLES.len());
    assert!((response.duration_secs() - 4.0 / 16_000.0).abs() < 1e-9);

    let files = state.files.lock().unwrap();
    assert_eq!(
        *files,
        vec![
            ("kokoro-en-v0_19".to_string(), "model.onnx".to_string(), 11),
            ("kokoro-en-v0_19".to_string(), "tokens.txt".to_string(), 11),
            ("kokoro-en-v0_19".to_string(), "voices.bin".to_string(), 11),
        ]
    );
    assert!(state
        .dirs
        .lock()
        .unwrap()
        .contains(&"kokoro-en-v0_19".to_string()));

    let configs = state.configs.lock().unwrap();
    assert_eq!(configs.len(), 1);
    match &configs[0] {
        OfflineTtsConfig::Kokoro(kokoro) => {
            assert_eq!(kokoro.model, "kokoro-en-v0_19/model.onnx");
            assert_eq!(kokoro.voices, "kokoro-en-v0_19/voices.bin");
        }
        OfflineTtsConfig::Piper(_) => panic!("expected kokoro config"),
    }

    let requests = state.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "hello world");
    assert_eq!(requests[0].speaker_id, 0);
    assert!((requests[0].speed - 1.5).abs() < f32::EPSILON);
}

#[tokio::test]
async fn repeated_requests_materialize_each_file_once() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    seed_assets(temp_dir.path(), Language::EnglishUs).await;

    let state = Arc::new(ModuleState::default());
    let engine = engine_with_runtime(temp_dir.path(), &state);

    let request = SpeakRequest::new("once", Language::EnglishUs);
    engine.speak(&request).await.unwrap();
    engine.speak(&request).await.unwrap();

    assert_eq!(state.files.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn switching_external_languages_swaps_the_single_session() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    seed_assets(temp_dir.path(), Language::EnglishUs).await;
    seed_assets(temp_dir.path(), Language::Hindi).await;

    let state = Arc::new(ModuleState::default());
    let engine = engine_with_runtime(temp_dir.path(), &state);

    engine
        .speak(&SpeakRequest::new("hello", Language::EnglishUs))
        .await
        .unwrap();
    engine
        .speak(&SpeakRequest::new("नमस्ते", Language::Hindi))
        .await
        .unwrap();

    assert_eq!(state.sessions_created.load(Ordering::SeqCst), 2);
    assert_eq!(state.max_live_sessions.load(Ordering::SeqCst), 1);
    assert_eq!(state.live_sessions.load(Ordering::SeqCst), 1);

    let configs = state.configs.lock().unwrap();
    match &configs[1] {
        OfflineTtsConfig::Piper(piper) => {
            assert_eq!(piper.model, "hi_IN-pratham-medium.onnx");
            assert_eq!(piper.data_dir, "./espeak-ng-data");
        }
        OfflineTtsConfig::Kokoro(_) => panic!("expected piper config"),
    }
}

#[tokio::test]
async fn already_existing_virtual_files_are_tolerated() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    seed_assets(temp_dir.path(), Language::EnglishUs).await;

    let state = Arc::new(ModuleState::default());
    state.reject_writes_as_existing.store(true, Ordering::SeqCst);
    let engine = engine_with_runtime(temp_dir.path(), &state);

    // Every virtual write reports "already exists"; synthesis proceeds.
    let response = engine
        .speak(&SpeakRequest::new("hello", Language::EnglishUs))
        .await
        .unwrap();
    assert_eq!(response.sample_rate(), MOCK_SAMPLE_RATE);
    assert!(state.files.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_tag_fails_before_any_io() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let loads = Arc::new(AtomicUsize::new(0));
    let engine = VaaniEngine::builder()
        .with_cache_dir(temp_dir.path())
        .with_runtime(Arc::new(CountingRuntime {
            loads: Arc::clone(&loads),
            state: Arc::default(),
            delay: Duration::ZERO,
        }))
        .build()
        .unwrap();

    let err = engine.speak_tag("hello", "xx-XX").await.unwrap_err();
    assert!(matches!(err, VaaniError::UnsupportedLanguage { .. }));
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn external_language_without_runtime_is_a_configuration_error() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let engine = VaaniEngine::builder()
        .with_cache_dir(temp_dir.path())
        .build()
        .unwrap();

    let err = engine
        .speak(&SpeakRequest::new("hello", Language::EnglishUs))
        .await
        .unwrap_err();
    assert!(matches!(err, VaaniError::Configuration { .. }));
}
