//! Voice processing module
//!
//! Microphone capture with energy endpointing and Whisper transcription on
//! the way in; `OpenAI` synthesis and local playback on the way out.

mod capture;
mod endpoint;
mod playback;
mod recognizer;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, probe_input, samples_to_wav};
pub use endpoint::{
    Endpoint, EndpointConfig, EndpointState, Endpointer, MIN_SPEECH, calculate_energy,
    calibrate_threshold,
};
pub use playback::{
    AudioPlayback, DecodedAudio, PlaybackControl, decode_file, decode_mp3, play_blocking,
    resample_linear,
};
pub use recognizer::MicRecognizer;
pub use stt::SpeechToText;
pub use tts::{OpenAiVoice, TextToSpeech, find_voice, voice_descriptions};
