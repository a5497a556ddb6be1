//! Error types for the Vaani TTS dispatcher.

/// Result type alias for Vaani operations
pub type VaaniResult<T> = Result<T, VaaniError>;

/// Main error type for Vaani TTS operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VaaniError {
    /// The requested language has no registry entry
    #[error("language '{tag}' is not supported")]
    UnsupportedLanguage {
        /// The language tag that was requested
        tag: String,
    },

    /// A download completed with a non-success HTTP status
    #[error("download of '{url}' failed with status {status}")]
    Fetch {
        /// The URL that was requested
        url: String,
        /// The HTTP status code of the response
        status: u16,
    },

    /// A network transport failure before any response arrived
    #[error("network error: {message}")]
    Network {
        /// Error message describing the transport failure
        message: String,
    },

    /// Asset cache read or write failure (recovered by re-fetching)
    #[error("asset cache error: {message}")]
    Cache {
        /// Error message describing the cache failure
        message: String,
    },

    /// Model bytes could not be turned into a usable session
    #[error("model load error: {message}")]
    ModelLoad {
        /// Error message describing the model loading failure
        message: String,
    },

    /// The external speech runtime failed to load
    #[error("speech runtime bootstrap failed from '{base_url}': {message}")]
    Bootstrap {
        /// Resource location the runtime was loaded from
        base_url: String,
        /// Error message reported by the loader
        message: String,
    },

    /// The external speech runtime did not signal ready in time
    #[error("timed out waiting for the speech runtime to become ready")]
    BootstrapTimeout,

    /// A runtime session was requested before bootstrap completed
    #[error("speech runtime is not ready")]
    RuntimeNotReady,

    /// Backend execution failure or malformed inference output
    #[error("{backend} inference failed: {message}")]
    Inference {
        /// Name of the backend that failed
        backend: String,
        /// Error message describing the failure
        message: String,
    },

    /// Invalid input error
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Audio playback error
    #[error("audio device error: {message}")]
    AudioDevice {
        /// Error message describing the playback failure
        message: String,
    },

    /// File I/O error
    #[error("file I/O error: {message}")]
    File {
        /// Error message describing the file operation failure
        message: String,
    },

    /// The operation was abandoned through the cancellation token
    #[error("operation cancelled while processing '{file}'")]
    Cancelled {
        /// Name of the asset being processed when cancellation hit
        file: String,
    },
}

impl VaaniError {
    /// Create a new unsupported-language error
    #[must_use]
    pub fn unsupported_language<S: Into<String>>(tag: S) -> Self {
        Self::UnsupportedLanguage { tag: tag.into() }
    }

    /// Create a new fetch error from a response status
    #[must_use]
    pub fn fetch<S: Into<String>>(url: S, status: u16) -> Self {
        Self::Fetch {
            url: url.into(),
            status,
        }
    }

    /// Create a new network error
    #[must_use]
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new cache error
    #[must_use]
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new model load error
    #[must_use]
    pub fn model_load<S: Into<String>>(message: S) -> Self {
        Self::ModelLoad {
            message: message.into(),
        }
    }

    /// Create a new bootstrap error
    #[must_use]
    pub fn bootstrap<S: Into<String>, M: Into<String>>(base_url: S, message: M) -> Self {
        Self::Bootstrap {
            base_url: base_url.into(),
            message: message.into(),
        }
    }

    /// Create a new inference error
    #[must_use]
    pub fn inference<S: Into<String>, M: Into<String>>(backend: S, message: M) -> Self {
        Self::Inference {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new audio device error
    #[must_use]
    pub fn audio_device<S: Into<String>>(message: S) -> Self {
        Self::AudioDevice {
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::File {
            message: message.into(),
        }
    }

    /// Create a new cancellation error
    #[must_use]
    pub fn cancelled<S: Into<String>>(file: S) -> Self {
        Self::Cancelled { file: file.into() }
    }

    /// Check if this error is retriable by the caller
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Network { .. } | Self::BootstrapTimeout
        )
    }

    /// Check if this error is due to invalid user input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedLanguage { .. }
                | Self::InvalidInput { .. }
                | Self::Configuration { .. }
        )
    }

    /// Get the error category for logging/metrics
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedLanguage { .. } => "language",
            Self::Fetch { .. } => "fetch",
            Self::Network { .. } => "network",
            Self::Cache { .. } => "cache",
            Self::ModelLoad { .. } => "model",
            Self::Bootstrap { .. } | Self::BootstrapTimeout => "bootstrap",
            Self::RuntimeNotReady => "runtime",
            Self::Inference { .. } => "inference",
            Self::InvalidInput { .. } => "input",
            Self::Configuration { .. } => "configuration",
            Self::AudioDevice { .. } => "audio_device",
            Self::File { .. } => "file",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for VaaniError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}
