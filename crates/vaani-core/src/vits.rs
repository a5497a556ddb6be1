//! Direct neural backend: in-process ONNX sessions for the VITS models.
//!
//! Sessions are loaded lazily, once per language, and kept for the process
//! lifetime. Concurrent first requests for the same language share a single
//! in-flight load instead of downloading the model twice.

use std::collections::HashMap;
use std::sync::Arc;

use ndarray::Array2;
use ort::execution_providers::CPU;
use ort::inputs;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use tracing::{debug, info};

use crate::error::{VaaniError, VaaniResult};
use crate::fetch::{AssetFetcher, ProgressCallback};
use crate::registry::{Language, ModelSpec, DEFAULT_VITS_SAMPLE_RATE};
use crate::release::release_url;
use crate::text::{tokenize_vits, Vocabulary};

/// Model input carrying the token-id sequence.
const INPUT_IDS: &str = "input_ids";
/// Model input carrying the speaker index.
const SPEAKER_ID: &str = "speaker_id";
/// Model input carrying the emotion category, fixed at 0.
const EMOTION_ID: &str = "emotion_id";
/// Model output carrying the synthesized waveform.
const WAVEFORM: &str = "waveform";

/// A loaded VITS model: ONNX session plus the per-language vocabulary and
/// parameters resolved from the registry entry.
pub struct LoadedVits {
    session: parking_lot::Mutex<Session>,
    vocab: Vocabulary,
    speaker_id: i64,
    sample_rate: u32,
}

impl LoadedVits {
    /// Output sample rate of this model.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl std::fmt::Debug for LoadedVits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedVits")
            .field("speaker_id", &self.speaker_id)
            .field("sample_rate", &self.sample_rate)
            .field("vocab_len", &self.vocab.len())
            .finish_non_exhaustive()
    }
}

/// Lifecycle manager for the direct backend's per-language sessions.
#[derive(Debug, Default)]
pub struct VitsBackend {
    cells: tokio::sync::Mutex<HashMap<Language, Arc<tokio::sync::OnceCell<Arc<LoadedVits>>>>>,
}

impl VitsBackend {
    /// Create an empty backend; models load on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure the model for `language` is loaded, downloading its assets on
    /// first use.
    ///
    /// Idempotent: once a language has loaded, later calls return the same
    /// session without touching the network. Concurrent callers for a not yet
    /// loaded language await one shared load. A failed load registers
    /// nothing, so the next call starts fresh.
    ///
    /// # Errors
    ///
    /// Surfaces fetch errors from the downloader and a model load error when
    /// the model bytes cannot be turned into a session or the vocabulary
    /// cannot be parsed.
    pub async fn ensure_loaded(
        &self,
        language: Language,
        spec: &ModelSpec,
        fetcher: &AssetFetcher,
        on_progress: Option<&ProgressCallback>,
    ) -> VaaniResult<Arc<LoadedVits>> {
        let cell = {
            let mut cells = self.cells.lock().await;
            Arc::clone(cells.entry(language).or_default())
        };

        let loaded = cell
            .get_or_try_init(|| Self::load(language, spec, fetcher, on_progress))
            .await?;
        Ok(Arc::clone(loaded))
    }

    /// Whether the model for `language` has finished loading.
    pub async fn is_loaded(&self, language: Language) -> bool {
        let cells = self.cells.lock().await;
        cells
            .get(&language)
            .is_some_and(|cell| cell.initialized())
    }

    async fn load(
        language: Language,
        spec: &ModelSpec,
        fetcher: &AssetFetcher,
        on_progress: Option<&ProgressCallback>,
    ) -> VaaniResult<Arc<LoadedVits>> {
        info!("loading {} model for {language}", spec.backend.name());

        let model_url = release_url(spec.repo, spec.release_tag, spec.files.model);
        let model_bytes = fetcher.fetch(&model_url, spec.files.model, on_progress).await?;

        let vocab_name = spec.files.vocab.ok_or_else(|| {
            VaaniError::model_load(format!("{language} entry declares no vocabulary file"))
        })?;
        let vocab_url = release_url(spec.repo, spec.release_tag, vocab_name);
        let vocab_bytes = fetcher.fetch(&vocab_url, vocab_name, on_progress).await?;
        let vocab = Vocabulary::from_json_bytes(&vocab_bytes)?;
        debug!("parsed vocabulary for {language}: {} tokens", vocab.len());

        let session = tokio::task::spawn_blocking(move || build_session(&model_bytes))
            .await
            .map_err(|e| VaaniError::model_load(format!("session build task died: {e}")))??;

        Ok(Arc::new(LoadedVits {
            session: parking_lot::Mutex::new(session),
            vocab,
            speaker_id: spec.speaker_id.unwrap_or(0),
            sample_rate: spec.fixed_sample_rate.unwrap_or(DEFAULT_VITS_SAMPLE_RATE),
        }))
    }

    /// Synthesize `text` with an already-loaded model.
    ///
    /// Tokenizes against the model's vocabulary, builds the input tensors,
    /// and extracts the f32 waveform output.
    ///
    /// # Errors
    ///
    /// Returns an inference error when the session fails or the output is
    /// missing or malformed.
    pub async fn synthesize(&self, loaded: Arc<LoadedVits>, text: &str) -> VaaniResult<Vec<f32>> {
        let ids = tokenize_vits(text, &loaded.vocab);
        tokio::task::spawn_blocking(move || run_inference(&loaded, &ids))
            .await
            .map_err(|e| {
                VaaniError::inference("vits_rasa", format!("inference task died: {e}"))
            })?
    }
}

/// Build an ONNX session from in-memory model bytes.
fn build_session(model_bytes: &[u8]) -> VaaniResult<Session> {
    let threads = num_cpus::get_physical().min(8);
    let build = || -> Result<Session, ort::Error> {
        Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers([CPU::default().build()])?
            .with_intra_threads(threads)?
            .commit_from_memory(model_bytes)
    };
    build().map_err(|e| VaaniError::model_load(format!("failed to build ONNX session: {e}")))
}

/// Map an ONNX runtime failure into this backend's inference error.
fn inference_error(e: ort::Error) -> VaaniError {
    VaaniError::inference("vits_rasa", e.to_string())
}

/// Run the VITS graph over a token sequence and pull out the waveform.
fn run_inference(loaded: &LoadedVits, ids: &[i64]) -> VaaniResult<Vec<f32>> {
    let sequence = Array2::from_shape_vec((1, ids.len()), ids.to_vec())
        .map_err(|e| VaaniError::inference("vits_rasa", format!("bad token shape: {e}")))?;
    let speaker = ndarray::arr1(&[loaded.speaker_id]);
    let emotion = ndarray::arr1(&[0i64]);

    let sequence_ref = TensorRef::from_array_view(sequence.view()).map_err(inference_error)?;
    let speaker_ref = TensorRef::from_array_view(speaker.view()).map_err(inference_error)?;
    let emotion_ref = TensorRef::from_array_view(emotion.view()).map_err(inference_error)?;
    let inputs = inputs![
        INPUT_IDS => sequence_ref,
        SPEAKER_ID => speaker_ref,
        EMOTION_ID => emotion_ref,
    ];

    let mut session = loaded.session.lock();
    let outputs = session.run(inputs).map_err(inference_error)?;

    let waveform = outputs
        .get(WAVEFORM)
        .ok_or_else(|| {
            VaaniError::inference("vits_rasa", format!("model output '{WAVEFORM}' is missing"))
        })?
        .try_extract_array::<f32>()
        .map_err(|e| {
            VaaniError::inference("vits_rasa", format!("malformed '{WAVEFORM}' output: {e}"))
        })?;

    Ok(waveform.iter().copied().collect())
}
