//! Session state machine
//!
//! The top-level control loop. In standby it runs short listens waiting for
//! a wake phrase; once woken it takes one long-form command right away and
//! then keeps listening until told to sleep or exit. Listens are strictly
//! sequential, while replies may still be playing when the next listen
//! starts.

use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::config::AssistantConfig;
use crate::dispatch::{Directive, Dispatcher, Utterance};

/// Timing and language for one recognition call
#[derive(Debug, Clone, PartialEq)]
pub struct ListenOptions {
    /// How long to wait for speech to start
    pub timeout: Duration,
    /// Longest phrase accepted; `None` means unlimited
    pub phrase_limit: Option<Duration>,
    /// Recognition language tag
    pub language: String,
    /// Quiet that ends a phrase
    pub pause_threshold: Duration,
    /// Non-speech padding kept around the phrase
    pub trailing_silence: Duration,
}

/// Turns microphone audio into text
///
/// Timeouts, unintelligible audio and device or service failures all come
/// back as `None`; a recognizer never fails the session.
#[async_trait(?Send)]
pub trait Recognizer {
    /// Listen once and return the transcript, if any
    async fn listen(&mut self, options: &ListenOptions) -> Option<String>;
}

/// Where the session loop is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for a wake phrase
    Standby,
    /// Taking commands
    Active,
    /// Loop finished
    Exited,
}

/// The assistant's control loop
pub struct Session<R> {
    recognizer: R,
    dispatcher: Dispatcher,
    assistant: AssistantConfig,
    state: SessionState,
    last_command_at: Option<Instant>,
}

impl<R: Recognizer> Session<R> {
    /// Create a session in standby
    #[must_use]
    pub const fn new(recognizer: R, dispatcher: Dispatcher, assistant: AssistantConfig) -> Self {
        Self {
            recognizer,
            dispatcher,
            assistant,
            state: SessionState::Standby,
            last_command_at: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// When the last command was dispatched
    #[must_use]
    pub const fn last_command_at(&self) -> Option<Instant> {
        self.last_command_at
    }

    #[must_use]
    pub const fn recognizer(&self) -> &R {
        &self.recognizer
    }

    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run until an exit directive
    pub async fn run(&mut self) {
        tracing::info!(wake_phrases = ?self.assistant.wake_phrases, "session started");
        while self.step().await != SessionState::Exited {}
        tracing::info!("session ended");
    }

    /// Run one loop iteration and return the resulting state
    pub async fn step(&mut self) -> SessionState {
        match self.state {
            SessionState::Exited => {}
            SessionState::Standby => {
                let options = self.assistant.wake_listen.clone();
                let Some(heard) = self.recognizer.listen(&options).await else {
                    return self.state;
                };

                if !self.is_wake(&heard) {
                    tracing::debug!(heard = %heard, "no wake phrase");
                    return self.state;
                }

                self.transition(SessionState::Active);

                let options = self.assistant.first_command_listen.clone();
                if let Some(command) = self.recognizer.listen(&options).await {
                    self.handle(&command).await;
                }
            }
            SessionState::Active => {
                let options = self.assistant.active_listen.clone();
                if let Some(command) = self.recognizer.listen(&options).await {
                    self.handle(&command).await;
                }
            }
        }

        self.state
    }

    fn is_wake(&self, heard: &str) -> bool {
        let heard = Utterance::new(heard);
        self.assistant
            .wake_phrases
            .iter()
            .any(|phrase| heard.normalized().contains(phrase.as_str()))
    }

    async fn handle(&mut self, command: &str) {
        let utterance = Utterance::new(command);
        if utterance.is_empty() {
            return;
        }

        self.last_command_at = Some(Instant::now());

        match self.dispatcher.dispatch(&utterance).await {
            Directive::Continue => {}
            Directive::Sleep => self.transition(SessionState::Standby),
            Directive::Exit => self.transition(SessionState::Exited),
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::info!(from = ?self.state, to = ?next, "session state changed");
            self.state = next;
        }
    }
}
