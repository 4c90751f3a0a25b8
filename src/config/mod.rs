//! Configuration management for murmur
//!
//! Every setting resolves as `env > toml > default`.

pub mod file;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::desktop::AppCatalog;
use crate::session::ListenOptions;
use crate::speech::DEFAULT_CHUNK_BUDGET;
use file::{ListenFileConfig, MurmurConfigFile};

/// Murmur configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Wake phrases, language and listen profiles
    pub assistant: AssistantConfig,

    /// Speech in and out
    pub voice: VoiceConfig,

    /// Local LLM used for free-form questions
    pub llm: LlmConfig,

    /// Headline fetching
    pub news: NewsConfig,

    /// Append-only notes file
    pub notes_file: PathBuf,

    /// Folder scanned for music
    pub music_dir: PathBuf,

    /// Launchable applications
    pub apps: AppCatalog,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Assistant behaviour
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Lowercased phrases that wake the assistant
    pub wake_phrases: Vec<String>,

    /// Recognition language tag (e.g. "en-US")
    pub language: String,

    /// Short listen used in standby
    pub wake_listen: ListenOptions,

    /// Listen right after the wake phrase
    pub first_command_listen: ListenOptions,

    /// Listen used while active
    pub active_listen: ListenOptions,
}

impl AssistantConfig {
    /// The phrase announced to the user as the way to wake the assistant
    #[must_use]
    pub fn primary_wake_phrase(&self) -> &str {
        self.wake_phrases.first().map_or("hey murmur", String::as_str)
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// Max characters per spoken chunk
    pub chunk_budget: usize,

    /// Voice name candidates tried in order for female requests
    pub female_voices: Vec<String>,

    /// Voice name candidates tried in order for male requests
    pub male_voices: Vec<String>,
}

/// Local LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Ollama base URL
    pub base_url: String,

    /// Model name
    pub model: String,

    /// Output token cap for fallback answers
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Context window
    pub num_ctx: u32,

    /// How long Ollama keeps the model loaded
    pub keep_alive: String,

    /// Request timeout
    pub timeout: Duration,
}

/// Headline configuration
#[derive(Debug, Clone)]
pub struct NewsConfig {
    /// Country code for top headlines
    pub country: String,

    /// Number of headlines requested
    pub limit: usize,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<SecretString>,

    /// `NewsAPI` key
    pub news: Option<SecretString>,
}

impl Config {
    /// Load configuration from the config file and process environment
    #[must_use]
    pub fn load() -> Self {
        Self::load_from(None)
    }

    /// Like [`Self::load`], reading `path` instead of the default config file
    #[must_use]
    pub fn load_from(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).or_else(file::config_file_path);
        let fc = path
            .map(|path| file::load_config_file(&path))
            .unwrap_or_default();

        Self::resolve(fc, &|key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn resolve(fc: MurmurConfigFile, env: &dyn Fn(&str) -> Option<String>) -> Self {
        let language = env("MURMUR_LANGUAGE")
            .or(fc.assistant.language)
            .unwrap_or_else(|| "en-US".to_string());

        // An empty list could never wake, so blank sources fall through
        let wake_phrases = env("MURMUR_WAKE_PHRASES")
            .map(|raw| normalize_phrases(raw.split(',')))
            .filter(|phrases| !phrases.is_empty())
            .or_else(|| {
                fc.assistant
                    .wake_phrases
                    .as_deref()
                    .map(|phrases| normalize_phrases(phrases.iter().map(String::as_str)))
                    .filter(|phrases| !phrases.is_empty())
            })
            .unwrap_or_else(|| vec!["hey murmur".to_string(), "murmur".to_string()]);

        let assistant = AssistantConfig {
            wake_listen: listen_options(
                fc.assistant.wake_listen,
                &language,
                8.0,
                Some(3.0),
            ),
            first_command_listen: listen_options(
                fc.assistant.first_command_listen,
                &language,
                20.0,
                None,
            ),
            active_listen: listen_options(fc.assistant.active_listen, &language, 30.0, None),
            wake_phrases,
            language,
        };

        let voice = VoiceConfig {
            stt_model: env("MURMUR_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_model: env("MURMUR_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: env("MURMUR_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0).clamp(0.25, 4.0),
            chunk_budget: fc.voice.chunk_budget.unwrap_or(DEFAULT_CHUNK_BUDGET),
            female_voices: fc.voice.female_voices.unwrap_or_else(|| {
                strings(&["nova", "shimmer", "coral", "sage"])
            }),
            male_voices: fc
                .voice
                .male_voices
                .unwrap_or_else(|| strings(&["onyx", "echo", "ash"])),
        };

        let llm = LlmConfig {
            base_url: env("OLLAMA_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: env("OLLAMA_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| "llama3.2".to_string()),
            max_tokens: fc.llm.max_tokens.unwrap_or(60),
            temperature: fc.llm.temperature.unwrap_or(0.6),
            num_ctx: fc.llm.num_ctx.unwrap_or(2048),
            keep_alive: fc.llm.keep_alive.unwrap_or_else(|| "10m".to_string()),
            timeout: Duration::from_secs(fc.llm.timeout_secs.unwrap_or(120)),
        };

        let news = NewsConfig {
            country: fc.news.country.unwrap_or_else(|| "us".to_string()),
            limit: fc.news.limit.unwrap_or(3),
        };

        let notes_file = env("MURMUR_NOTES_FILE")
            .or(fc.paths.notes_file)
            .map_or_else(|| default_data_dir().join("notes.txt"), PathBuf::from);

        let music_dir = env("MUSIC_FOLDER")
            .or(fc.paths.music_dir)
            .map_or_else(default_music_dir, PathBuf::from);

        let apps = if fc.apps.is_empty() && fc.app_aliases.is_empty() {
            AppCatalog::platform_default()
        } else {
            let paths = fc
                .apps
                .into_iter()
                .map(|(name, path)| (name, PathBuf::from(path)))
                .collect();
            AppCatalog::new(paths, fc.app_aliases)
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY")
                .or(fc.api_keys.openai)
                .map(SecretString::from),
            news: env("NEWS_API_KEY")
                .or(fc.api_keys.news)
                .map(SecretString::from),
        };

        Self {
            assistant,
            voice,
            llm,
            news,
            notes_file,
            music_dir,
            apps,
            api_keys,
        }
    }
}

/// Build a listen profile from an optional file overlay
fn listen_options(
    overlay: Option<ListenFileConfig>,
    language: &str,
    timeout_secs: f64,
    phrase_limit_secs: Option<f64>,
) -> ListenOptions {
    let overlay = overlay.unwrap_or_default();
    ListenOptions {
        timeout: secs(overlay.timeout_secs.unwrap_or(timeout_secs)),
        phrase_limit: overlay.phrase_limit_secs.or(phrase_limit_secs).map(secs),
        language: language.to_string(),
        pause_threshold: secs(overlay.pause_threshold_secs.unwrap_or(1.8)),
        trailing_silence: secs(overlay.trailing_silence_secs.unwrap_or(0.3)),
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Trim and lowercase wake phrases, dropping blanks
fn normalize_phrases<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    raw.map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Data directory: `~/.local/share/murmur` on Linux
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("murmur"))
}

/// Music directory: the user's audio folder, else `~/Music`
fn default_music_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|d| d.audio_dir().map(PathBuf::from))
        .or_else(|| directories::BaseDirs::new().map(|d| d.home_dir().join("Music")))
        .unwrap_or_else(|| PathBuf::from("music"))
}

/// Build a map of owned strings
#[must_use]
pub fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
