//! Error taxonomy shared by every engine subsystem.
//!
//! Idempotency conditions (a resource that already exists under its cache key)
//! are not errors; they are logged and the existing resource is returned.

use thiserror::Error;

/// Engine-level error.
#[derive(Debug, Error)]
pub enum ParallaxError {
    /// Invalid descriptor or inconsistent data (missing `fit` dimension,
    /// atlas placement not found, scaling to zero, vertex count mismatch).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The packer cannot place an item even after growing to the size cap.
    #[error("resource exhausted: '{id}' ({width}x{height}) does not fit within {max}x{max}")]
    ResourceExhausted {
        id: String,
        width: u32,
        height: u32,
        max: u32,
    },

    /// The GPU drawing context cannot be created with the requested attributes.
    #[error("context error: {0}")]
    Context(String),

    /// Asset fetch or decode failure, surfaced from the loader unchanged.
    #[error("failed to load '{url}': {message}")]
    Transfer { url: String, message: String },

    /// Shader parse/validation failure carrying the compiler diagnostic.
    #[error("shader compilation failed:\n{diagnostic}")]
    ShaderCompile { diagnostic: String },

    /// GPU buffers are created once; their byte length cannot change afterwards.
    #[error("buffer size changed from {expected} to {actual} bytes; resizing is not supported")]
    BufferResize { expected: u64, actual: u64 },

    /// Another request for the same key is still pending.
    #[error("'{0}' is already being created")]
    InFlight(String),
}

impl ParallaxError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<anyhow::Error> for ParallaxError {
    fn from(err: anyhow::Error) -> Self {
        Self::Context(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, ParallaxError>;
