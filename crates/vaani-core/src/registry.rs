//! Static registry of supported languages and their model assets.
//!
//! The table is fixed at compile time: each language maps to a backend kind,
//! the release coordinates of its assets, and backend-specific parameters.
//! Entries are immutable and never change while the process runs.

use serde::{Deserialize, Serialize};

use crate::release::{DEFAULT_REPO, DEFAULT_TAG};

/// Output sample rate of the bundled VITS models, used when an entry does not
/// override it.
pub const DEFAULT_VITS_SAMPLE_RATE: u32 = 22_050;

/// Supported synthesis languages, identified by BCP-47 tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// English (United States)
    #[serde(rename = "en-US")]
    EnglishUs,
    /// English (United Kingdom)
    #[serde(rename = "en-GB")]
    EnglishUk,
    /// English (India)
    #[serde(rename = "en-IN")]
    EnglishIndia,
    /// Hindi
    #[serde(rename = "hi-IN")]
    Hindi,
    /// Bengali
    #[serde(rename = "bn-IN")]
    Bengali,
    /// Telugu
    #[serde(rename = "te-IN")]
    Telugu,
    /// Tamil
    #[serde(rename = "ta-IN")]
    Tamil,
    /// Marathi
    #[serde(rename = "mr-IN")]
    Marathi,
    /// Kannada
    #[serde(rename = "kn-IN")]
    Kannada,
    /// Malayalam
    #[serde(rename = "ml-IN")]
    Malayalam,
    /// Punjabi
    #[serde(rename = "pa-IN")]
    Punjabi,
}

impl Language {
    /// Every supported language, in registry order.
    pub const ALL: [Self; 11] = [
        Self::EnglishUs,
        Self::EnglishUk,
        Self::EnglishIndia,
        Self::Hindi,
        Self::Bengali,
        Self::Telugu,
        Self::Tamil,
        Self::Marathi,
        Self::Kannada,
        Self::Malayalam,
        Self::Punjabi,
    ];

    /// The language's BCP-47 tag.
    #[must_use]
    pub const fn as_tag(self) -> &'static str {
        match self {
            Self::EnglishUs => "en-US",
            Self::EnglishUk => "en-GB",
            Self::EnglishIndia => "en-IN",
            Self::Hindi => "hi-IN",
            Self::Bengali => "bn-IN",
            Self::Telugu => "te-IN",
            Self::Tamil => "ta-IN",
            Self::Marathi => "mr-IN",
            Self::Kannada => "kn-IN",
            Self::Malayalam => "ml-IN",
            Self::Punjabi => "pa-IN",
        }
    }

    /// Resolve a BCP-47 tag to a supported language.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_tag() == tag)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Which inference backend a language entry drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// Direct in-process ONNX session over the multi-speaker VITS model.
    VitsRasa,
    /// Kokoro multi-voice codec, hosted by the external speech runtime.
    Kokoro,
    /// Piper phoneme-based model, hosted by the external speech runtime.
    Piper,
}

impl BackendKind {
    /// Backend name used in log output and error context.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::VitsRasa => "vits_rasa",
            Self::Kokoro => "kokoro",
            Self::Piper => "piper",
        }
    }
}

/// Named asset files a language entry needs before synthesis can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetSet {
    /// Model weights.
    pub model: &'static str,
    /// JSON model configuration (Piper).
    pub config: Option<&'static str>,
    /// Token-to-id vocabulary (VITS).
    pub vocab: Option<&'static str>,
    /// Token table (Kokoro).
    pub tokens: Option<&'static str>,
    /// Voice bank (Kokoro).
    pub voices: Option<&'static str>,
    /// Runtime data bundle.
    pub data: Option<&'static str>,
}

impl AssetSet {
    const fn model_only(model: &'static str) -> Self {
        Self {
            model,
            config: None,
            vocab: None,
            tokens: None,
            voices: None,
            data: None,
        }
    }

    /// All declared file names, in registry order (model first).
    pub fn iter(&self) -> impl Iterator<Item = &'static str> {
        [
            Some(self.model),
            self.config,
            self.vocab,
            self.tokens,
            self.voices,
            self.data,
        ]
        .into_iter()
        .flatten()
    }
}

/// Immutable description of a language's model: backend, release coordinates,
/// asset files, and backend-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    /// Backend that runs this model.
    pub backend: BackendKind,
    /// Release repository in `owner/name` form.
    pub repo: &'static str,
    /// Release tag the assets live under.
    pub release_tag: &'static str,
    /// Asset files the backend needs.
    pub files: AssetSet,
    /// Speaker index for multi-speaker models.
    pub speaker_id: Option<i64>,
    /// Output sample rate for the direct backend; external backends report
    /// their own rate at generation time.
    pub fixed_sample_rate: Option<u32>,
    /// Execution provider for external-runtime entries. Required for Piper,
    /// where it is build-specific and must be stated per entry.
    pub provider: Option<&'static str>,
}

impl ModelSpec {
    /// Look up the registry entry for a language.
    #[must_use]
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::EnglishUs => Self {
                backend: BackendKind::Kokoro,
                repo: "k2-fsa/sherpa-onnx",
                release_tag: "tts-models",
                files: AssetSet {
                    tokens: Some("kokoro-en-v0_19/tokens.txt"),
                    voices: Some("kokoro-en-v0_19/voices.bin"),
                    ..AssetSet::model_only("kokoro-en-v0_19/model.onnx")
                },
                speaker_id: None,
                fixed_sample_rate: None,
                provider: Some("cpu"),
            },
            Language::EnglishUk => Self {
                backend: BackendKind::Piper,
                repo: "rhasspy/piper-voices",
                release_tag: "v1.0.0",
                files: AssetSet {
                    config: Some("en_GB-alan-medium.onnx.json"),
                    ..AssetSet::model_only("en_GB-alan-medium.onnx")
                },
                speaker_id: None,
                fixed_sample_rate: None,
                provider: Some("cpu"),
            },
            Language::EnglishIndia => Self {
                backend: BackendKind::Piper,
                repo: DEFAULT_REPO,
                release_tag: DEFAULT_TAG,
                files: AssetSet {
                    config: Some("en_GB-alan-medium.onnx.json"),
                    ..AssetSet::model_only("en_GB-alan-medium.onnx")
                },
                speaker_id: None,
                fixed_sample_rate: None,
                provider: Some("cpu"),
            },
            Language::Hindi => Self {
                backend: BackendKind::Piper,
                repo: DEFAULT_REPO,
                release_tag: DEFAULT_TAG,
                files: AssetSet {
                    config: Some("hi_IN-pratham-medium.onnx.json"),
                    ..AssetSet::model_only("hi_IN-pratham-medium.onnx")
                },
                speaker_id: None,
                fixed_sample_rate: None,
                provider: Some("cpu"),
            },
            Language::Bengali => Self::vits_rasa("vits_rasa_13.onnx", 2),
            Language::Telugu => Self::vits_rasa("vits_rasa_13.onnx", 19),
            Language::Tamil => Self::vits_rasa("vits_rasa_13.onnx", 18),
            Language::Marathi => Self::vits_rasa("vits_rasa_13.onnx", 12),
            Language::Kannada => Self::vits_rasa("vits_rasa_13.onnx", 8),
            Language::Malayalam => Self {
                repo: "user/indic-tts-assets",
                ..Self::vits_rasa("vits_rasa_13.onnx", 11)
            },
            Language::Punjabi => Self::vits_rasa("vits_rasa_13_int8.onnx", 15),
        }
    }

    /// Shared shape of the consolidated multi-speaker VITS entries.
    fn vits_rasa(model: &'static str, speaker_id: i64) -> Self {
        Self {
            backend: BackendKind::VitsRasa,
            repo: DEFAULT_REPO,
            release_tag: DEFAULT_TAG,
            files: AssetSet {
                vocab: Some("vocab.json"),
                ..AssetSet::model_only(model)
            },
            speaker_id: Some(speaker_id),
            fixed_sample_rate: Some(DEFAULT_VITS_SAMPLE_RATE),
            provider: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_language_has_an_entry() {
        for language in Language::ALL {
            let spec = ModelSpec::for_language(language);
            assert!(!spec.files.model.is_empty());
            assert!(!spec.repo.is_empty());
            assert!(!spec.release_tag.is_empty());
        }
    }

    #[test]
    fn test_tag_round_trip() {
        for language in Language::ALL {
            assert_eq!(Language::from_tag(language.as_tag()), Some(language));
        }
        assert_eq!(Language::from_tag("xx-XX"), None);
    }

    #[test]
    fn test_vits_entries_carry_vocab_speaker_and_rate() {
        let expected = [
            (Language::Bengali, 2),
            (Language::Telugu, 19),
            (Language::Tamil, 18),
            (Language::Marathi, 12),
            (Language::Kannada, 8),
            (Language::Malayalam, 11),
            (Language::Punjabi, 15),
        ];
        for (language, speaker) in expected {
            let spec = ModelSpec::for_language(language);
            assert_eq!(spec.backend, BackendKind::VitsRasa);
            assert_eq!(spec.files.vocab, Some("vocab.json"));
            assert_eq!(spec.speaker_id, Some(speaker));
            assert_eq!(spec.fixed_sample_rate, Some(DEFAULT_VITS_SAMPLE_RATE));
        }
    }

    #[test]
    fn test_quantized_punjabi_model() {
        let spec = ModelSpec::for_language(Language::Punjabi);
        assert_eq!(spec.files.model, "vits_rasa_13_int8.onnx");
    }

    #[test]
    fn test_external_entries_declare_their_runtime_inputs() {
        let kokoro = ModelSpec::for_language(Language::EnglishUs);
        assert_eq!(kokoro.backend, BackendKind::Kokoro);
        assert!(kokoro.files.tokens.is_some());
        assert!(kokoro.files.voices.is_some());
        assert!(kokoro.fixed_sample_rate.is_none());

        for language in [Language::EnglishUk, Language::EnglishIndia, Language::Hindi] {
            let spec = ModelSpec::for_language(language);
            assert_eq!(spec.backend, BackendKind::Piper);
            assert!(spec.files.config.is_some());
            assert!(spec.provider.is_some());
        }
    }

    #[test]
    fn test_asset_set_iterates_in_declared_order() {
        let spec = ModelSpec::for_language(Language::EnglishUs);
        let files: Vec<_> = spec.files.iter().collect();
        assert_eq!(
            files,
            vec![
                "kokoro-en-v0_19/model.onnx",
                "kokoro-en-v0_19/tokens.txt",
                "kokoro-en-v0_19/voices.bin",
            ]
        );
    }
}
