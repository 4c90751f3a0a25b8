//! Energy-based speech endpointing
//!
//! Decides when a listen has captured a complete phrase: waits for speech
//! onset (bounded by the listen timeout), then accumulates audio until a
//! long enough pause or the phrase limit. Non-speech padding around the
//! phrase is kept so the recognizer hears clean word edges.

use std::collections::VecDeque;
use std::time::Duration;

use crate::session::ListenOptions;

/// Length of one analysis frame
const FRAME: Duration = Duration::from_millis(30);

/// Phrases shorter than this are treated as noise
pub const MIN_SPEECH: Duration = Duration::from_millis(150);

/// Lowest energy threshold calibration may produce
const MIN_ENERGY_THRESHOLD: f32 = 0.01;

/// Ambient energy is scaled by this to get the speech threshold
const CALIBRATION_FACTOR: f32 = 1.5;

/// Where the endpointer is within a listen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Waiting for speech onset
    Waiting,
    /// Speech has started, accumulating the phrase
    InPhrase,
    /// A result has been returned; further audio is ignored
    Done,
}

/// Result of feeding audio to the endpointer
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// More audio is needed
    Pending,
    /// A phrase was captured (mono samples, padding included)
    Phrase(Vec<f32>),
    /// No speech started before the timeout
    TimedOut,
}

/// Timing and threshold for one listen, in samples
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub sample_rate: u32,
    pub energy_threshold: f32,
    pub timeout: Duration,
    pub phrase_limit: Option<Duration>,
    pub pause_threshold: Duration,
    pub trailing_silence: Duration,
}

impl EndpointConfig {
    /// Derive endpoint timing from listen options
    #[must_use]
    pub fn from_listen(options: &ListenOptions, sample_rate: u32, energy_threshold: f32) -> Self {
        Self {
            sample_rate,
            energy_threshold,
            timeout: options.timeout,
            phrase_limit: options.phrase_limit,
            pause_threshold: options.pause_threshold,
            trailing_silence: options.trailing_silence,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn samples(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * f64::from(self.sample_rate)).round() as usize
    }
}

/// Streaming endpointer for a single listen
pub struct Endpointer {
    config: EndpointConfig,
    state: EndpointState,
    frame_len: usize,
    padding_len: usize,
    pending: Vec<f32>,
    preroll: VecDeque<f32>,
    phrase: Vec<f32>,
    waited: usize,
    speech: usize,
    silence: usize,
}

impl Endpointer {
    #[must_use]
    pub fn new(config: EndpointConfig) -> Self {
        let frame_len = config.samples(FRAME).max(1);
        let padding_len = config.samples(config.trailing_silence);

        Self {
            config,
            state: EndpointState::Waiting,
            frame_len,
            padding_len,
            pending: Vec::new(),
            preroll: VecDeque::new(),
            phrase: Vec::new(),
            waited: 0,
            speech: 0,
            silence: 0,
        }
    }

    /// Feed newly captured samples
    pub fn push(&mut self, samples: &[f32]) -> Endpoint {
        if self.state == EndpointState::Done {
            return Endpoint::Pending;
        }

        self.pending.extend_from_slice(samples);

        while self.pending.len() >= self.frame_len {
            let frame: Vec<f32> = self.pending.drain(..self.frame_len).collect();
            let result = self.process_frame(&frame);
            if result != Endpoint::Pending {
                self.state = EndpointState::Done;
                return result;
            }
        }

        Endpoint::Pending
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> EndpointState {
        self.state
    }

    fn process_frame(&mut self, frame: &[f32]) -> Endpoint {
        let is_speech = calculate_energy(frame) > self.config.energy_threshold;

        match self.state {
            EndpointState::Waiting => {
                if is_speech {
                    self.state = EndpointState::InPhrase;
                    self.phrase = self.preroll.drain(..).collect();
                    self.phrase.extend_from_slice(frame);
                    self.speech = frame.len();
                    self.silence = 0;
                    tracing::trace!(threshold = self.config.energy_threshold, "speech onset");
                    return Endpoint::Pending;
                }

                self.preroll.extend(frame.iter().copied());
                while self.preroll.len() > self.padding_len {
                    self.preroll.pop_front();
                }

                self.waited += frame.len();
                if self.waited >= self.config.samples(self.config.timeout) {
                    tracing::debug!("no speech before timeout");
                    return Endpoint::TimedOut;
                }
                Endpoint::Pending
            }
            EndpointState::InPhrase => {
                self.phrase.extend_from_slice(frame);
                if is_speech {
                    self.speech += frame.len();
                    self.silence = 0;
                } else {
                    self.silence += frame.len();
                }

                if self.silence >= self.config.samples(self.config.pause_threshold) {
                    if self.speech < self.config.samples(MIN_SPEECH) {
                        tracing::trace!(samples = self.speech, "phrase too short, discarding");
                        self.discard_phrase();
                        return Endpoint::Pending;
                    }

                    let excess = self.silence.saturating_sub(self.padding_len);
                    self.phrase.truncate(self.phrase.len() - excess);
                    tracing::debug!(samples = self.phrase.len(), "phrase complete");
                    return Endpoint::Phrase(std::mem::take(&mut self.phrase));
                }

                if let Some(limit) = self.config.phrase_limit
                    && self.phrase.len() >= self.config.samples(limit)
                {
                    tracing::debug!(samples = self.phrase.len(), "phrase limit reached");
                    return Endpoint::Phrase(std::mem::take(&mut self.phrase));
                }

                Endpoint::Pending
            }
            EndpointState::Done => Endpoint::Pending,
        }
    }

    /// Drop a too-short phrase and go back to waiting; its time counts
    /// against the onset timeout
    fn discard_phrase(&mut self) {
        self.waited += self.phrase.len();
        let keep_from = self.phrase.len().saturating_sub(self.padding_len);
        self.preroll = self.phrase.drain(keep_from..).collect();
        self.phrase.clear();
        self.speech = 0;
        self.silence = 0;
        self.state = EndpointState::Waiting;
    }
}

/// Speech threshold from a sample of ambient noise
#[must_use]
pub fn calibrate_threshold(ambient: &[f32]) -> f32 {
    (calculate_energy(ambient) * CALIBRATION_FACTOR).max(MIN_ENERGY_THRESHOLD)
}

/// Calculate RMS energy of audio samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);
    }

    #[test]
    fn test_calibration_has_floor() {
        assert!((calibrate_threshold(&[0.0; 800]) - MIN_ENERGY_THRESHOLD).abs() < f32::EPSILON);
        assert!(calibrate_threshold(&[0.1; 800]) > 0.14);
    }
}
