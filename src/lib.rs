//! Murmur - hands-free wake-word voice assistant
//!
//! This library provides the core of the murmur assistant:
//! - Session state machine (standby / active / exited)
//! - Ordered intent dispatch with session directives
//! - Interruptible, chunked speech output
//! - Streaming first-sentence segmentation of LLM answers
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Session (loop)                      │
//! │   Standby  ──wake──▶  Active  ──exit──▶  Exited     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ utterance
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Dispatcher                         │
//! │  talk │ session │ info │ voice │ apps │ web │ music  │
//! │  notes/timers │ news │ jokes │ fallback (segmenter)  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ speech jobs
//! ┌────────────────────▼────────────────────────────────┐
//! │          Speech controller (background)              │
//! │      chunking │ stop / pause / resume flags          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod desktop;
pub mod dispatch;
pub mod error;
pub mod jokes;
pub mod llm;
pub mod music;
pub mod news;
pub mod notes;
pub mod segmenter;
pub mod session;
pub mod speech;
pub mod timer;
pub mod voice;

pub use config::Config;
pub use dispatch::{Directive, Dispatcher, DispatcherParts, Intent, Utterance, classify};
pub use error::{Error, Result};
pub use segmenter::{SentenceSegmenter, first_sentence};
pub use session::{ListenOptions, Recognizer, Session, SessionState};
pub use speech::{JobOutcome, SpeechController, SpeechFlags, VoiceEngine};
