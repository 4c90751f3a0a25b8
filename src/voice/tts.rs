//! Text-to-speech via the `OpenAI` speech API

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use tokio::runtime::Handle;

use super::playback::AudioPlayback;
use crate::config::VoiceConfig;
use crate::speech::VoiceEngine;
use crate::{Error, Result};

const SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";

/// Installed voices with a short description of each
const VOICES: &[(&str, &str)] = &[
    ("alloy", "neutral, balanced"),
    ("ash", "male, warm"),
    ("ballad", "male, soft"),
    ("coral", "female, warm"),
    ("echo", "male, clear"),
    ("fable", "neutral, expressive"),
    ("nova", "female, bright"),
    ("onyx", "male, deep"),
    ("sage", "female, calm"),
    ("shimmer", "female, soft"),
];

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    speed: f64,
    model: String,
}

impl TextToSpeech {
    /// Create a new TTS client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: Option<SecretString>, model: String, speed: f64) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or_else(|| Error::Config("OpenAI API key required for TTS".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            speed,
            model,
        })
    }

    /// Synthesize `text` with `voice`, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed: self.speed,
            response_format: "mp3",
        };

        let response = self
            .client
            .post(SPEECH_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

/// Voice engine that synthesizes remotely and plays locally
///
/// `speak_once` blocks; call it from a blocking worker, never from an
/// async task.
pub struct OpenAiVoice {
    tts: TextToSpeech,
    playback: AudioPlayback,
    runtime: Handle,
    voice: RwLock<String>,
}

impl OpenAiVoice {
    /// Create the engine from voice settings
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing, no output device exists,
    /// or no runtime is running
    pub fn new(config: &VoiceConfig, api_key: Option<SecretString>) -> Result<Self> {
        let tts = TextToSpeech::new(api_key, config.tts_model.clone(), config.tts_speed)?;
        let playback = AudioPlayback::new()?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::Config(format!("voice engine needs a tokio runtime: {e}")))?;

        tracing::info!(
            voice = %config.tts_voice,
            model = %config.tts_model,
            device = %playback.device_name(),
            "voice engine ready"
        );

        Ok(Self {
            tts,
            playback,
            runtime,
            voice: RwLock::new(config.tts_voice.clone()),
        })
    }

    fn current_voice(&self) -> String {
        self.voice
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl VoiceEngine for OpenAiVoice {
    fn speak_once(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }

        let voice = self.current_voice();
        let audio = self.runtime.block_on(self.tts.synthesize(text, &voice))?;
        self.playback.play_mp3(&audio)
    }

    fn list_voices(&self) -> Vec<String> {
        voice_descriptions()
    }

    fn select_voice(&self, needle: &str) -> Option<String> {
        let (id, description) = find_voice(needle)?;
        *self.voice.write().unwrap_or_else(PoisonError::into_inner) = id.to_string();
        tracing::info!(voice = id, "voice selected");
        Some(description)
    }
}

/// Descriptions of every voice, e.g. "nova (female, bright)"
#[must_use]
pub fn voice_descriptions() -> Vec<String> {
    VOICES
        .iter()
        .map(|(id, traits)| format!("{id} ({traits})"))
        .collect()
}

/// First voice whose description contains `needle`, case-insensitively
#[must_use]
pub fn find_voice(needle: &str) -> Option<(&'static str, String)> {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    VOICES
        .iter()
        .map(|(id, traits)| (*id, format!("{id} ({traits})")))
        .find(|(_, description)| description.contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_voice_by_name() {
        let (id, description) = find_voice("Nova").unwrap();
        assert_eq!(id, "nova");
        assert_eq!(description, "nova (female, bright)");
    }

    #[test]
    fn test_find_voice_by_trait_uses_catalog_order() {
        assert_eq!(find_voice("deep").map(|(id, _)| id), Some("onyx"));
        assert_eq!(find_voice("female").map(|(id, _)| id), Some("coral"));
    }

    #[test]
    fn test_unknown_voice() {
        assert!(find_voice("zira").is_none());
        assert!(find_voice("  ").is_none());
    }

    #[test]
    fn test_descriptions_cover_catalog() {
        assert_eq!(voice_descriptions().len(), VOICES.len());
    }
}
