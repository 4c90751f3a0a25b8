//! Error types for murmur

use thiserror::Error;

/// Result type alias for murmur operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in murmur
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Text generation service error
    #[error("generation error: {0}")]
    Generation(String),

    /// Headline service error
    #[error("news error: {0}")]
    News(String),

    /// Playback requested with no tracks in the catalog
    #[error("music catalog is empty")]
    EmptyCatalog,

    /// Resource not found (app path, voice, ...)
    #[error("not found: {0}")]
    NotFound(String),

    /// Unparsable user input (timer duration, ...)
    #[error("parse error: {0}")]
    Parse(String),

    /// Failed to launch an application or open a URL
    #[error("launch error: {0}")]
    Launch(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
