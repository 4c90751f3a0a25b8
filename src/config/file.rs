//! TOML configuration file loading
//!
//! Supports `~/.config/murmur/config.toml` (or `$MURMUR_CONFIG`) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MurmurConfigFile {
    /// Wake phrases, language and listen timing
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Local LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Headline fetching
    #[serde(default)]
    pub news: NewsFileConfig,

    /// Notes and music locations
    #[serde(default)]
    pub paths: PathsFileConfig,

    /// Launchable applications (name → executable path)
    #[serde(default)]
    pub apps: BTreeMap<String, String>,

    /// Application aliases (spoken alias → app name)
    #[serde(default)]
    pub app_aliases: BTreeMap<String, String>,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Assistant behaviour
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Phrases that wake the assistant from standby
    pub wake_phrases: Option<Vec<String>>,

    /// Recognition language tag (e.g. "en-US")
    pub language: Option<String>,

    /// Short listen used while in standby
    pub wake_listen: Option<ListenFileConfig>,

    /// Listen right after the wake phrase
    pub first_command_listen: Option<ListenFileConfig>,

    /// Listen used while active
    pub active_listen: Option<ListenFileConfig>,
}

/// Timing of one listen profile, in seconds
#[derive(Debug, Default, Deserialize)]
pub struct ListenFileConfig {
    pub timeout_secs: Option<f64>,
    pub phrase_limit_secs: Option<f64>,
    pub pause_threshold_secs: Option<f64>,
    pub trailing_silence_secs: Option<f64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,

    /// Max characters per spoken chunk
    pub chunk_budget: Option<usize>,

    /// Voices tried in order for "female" requests
    pub female_voices: Option<Vec<String>>,

    /// Voices tried in order for "male" requests
    pub male_voices: Option<Vec<String>>,
}

/// Local LLM configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Ollama base URL
    pub base_url: Option<String>,

    /// Model name (e.g. "llama3.2")
    pub model: Option<String>,

    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub num_ctx: Option<u32>,
    pub keep_alive: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Headline configuration
#[derive(Debug, Default, Deserialize)]
pub struct NewsFileConfig {
    pub country: Option<String>,
    pub limit: Option<usize>,
}

/// File locations
#[derive(Debug, Default, Deserialize)]
pub struct PathsFileConfig {
    pub notes_file: Option<String>,
    pub music_dir: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub news: Option<String>,
}

/// Load the TOML config file from `path`
///
/// Returns `MurmurConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: &Path) -> MurmurConfigFile {
    if !path.exists() {
        return MurmurConfigFile::default();
    }

    match read_config_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            MurmurConfigFile::default()
        }
    }
}

/// Read and parse the TOML config file at `path`
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<MurmurConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `$MURMUR_CONFIG` or `~/.config/murmur/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MURMUR_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("murmur").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let fc = load_config_file(Path::new("/definitely/not/here/config.toml"));
        assert!(fc.assistant.wake_phrases.is_none());
        assert!(fc.apps.is_empty());
    }

    #[test]
    fn test_partial_overlay_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[assistant]
wake_phrases = ["hey nova"]

[assistant.wake_listen]
timeout_secs = 5.0

[apps]
notepad = "/usr/bin/gedit"

[app_aliases]
editor = "notepad"
"#,
        )
        .unwrap();

        let fc = load_config_file(&path);
        assert_eq!(fc.assistant.wake_phrases, Some(vec!["hey nova".to_string()]));
        assert_eq!(
            fc.assistant.wake_listen.and_then(|l| l.timeout_secs),
            Some(5.0)
        );
        assert_eq!(fc.apps.get("notepad").map(String::as_str), Some("/usr/bin/gedit"));
        assert_eq!(fc.app_aliases.get("editor").map(String::as_str), Some("notepad"));
    }

    #[test]
    fn test_invalid_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();

        let fc = load_config_file(&path);
        assert!(fc.assistant.language.is_none());
    }

    #[test]
    fn test_read_reports_toml_and_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[assistant\nlanguage = 3").unwrap();

        assert!(matches!(read_config_file(&path), Err(crate::Error::Toml(_))));
        assert!(matches!(
            read_config_file(&dir.path().join("missing.toml")),
            Err(crate::Error::Io(_))
        ));
    }
}
