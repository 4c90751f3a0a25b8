//! Microphone recognizer: capture, endpoint, transcribe

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
use super::endpoint::{Endpoint, EndpointConfig, Endpointer, calibrate_threshold};
use super::playback::resample_linear;
use super::stt::SpeechToText;
use crate::session::{ListenOptions, Recognizer};
use crate::{Error, Result};

/// Ambient audio sampled before each listen
const CALIBRATION: Duration = Duration::from_millis(500);

/// How often captured audio is handed to the endpointer
const POLL_INTERVAL: Duration = Duration::from_millis(30);

/// No samples from the device for this long means the stream is gone
const INPUT_STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Cap on phrase length when a listen sets no phrase limit
const UNLIMITED_PHRASE_CAP: Duration = Duration::from_secs(30);

/// Extra time on top of the expected listen length
const LISTEN_SLACK: Duration = Duration::from_secs(2);

/// Wall-clock bound on a whole listen
fn listen_deadline(options: &ListenOptions) -> Duration {
    CALIBRATION
        + options.timeout
        + options.phrase_limit.unwrap_or(UNLIMITED_PHRASE_CAP)
        + LISTEN_SLACK
}

/// Feed polled audio to the endpointer until it decides
///
/// # Errors
///
/// Returns error if the source delivers nothing for `INPUT_STALL_TIMEOUT`
async fn run_endpointer(
    endpointer: &mut Endpointer,
    mut take: impl FnMut() -> Vec<f32>,
) -> Result<Option<Vec<f32>>> {
    let mut last_audio = Instant::now();

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let samples = take();
        if samples.is_empty() {
            if last_audio.elapsed() > INPUT_STALL_TIMEOUT {
                tracing::warn!(state = ?endpointer.state(), "input device stalled");
                return Err(Error::Audio("input stalled".to_string()));
            }
        } else {
            last_audio = Instant::now();
        }

        match endpointer.push(&samples) {
            Endpoint::Pending => {}
            Endpoint::TimedOut => return Ok(None),
            Endpoint::Phrase(phrase) => return Ok(Some(phrase)),
        }
    }
}

/// Recognizer backed by the default microphone and Whisper
pub struct MicRecognizer {
    stt: SpeechToText,
}

impl MicRecognizer {
    #[must_use]
    pub const fn new(stt: SpeechToText) -> Self {
        Self { stt }
    }

    /// Record one phrase, or `None` if nothing was said before the timeout
    async fn capture_phrase(&self, options: &ListenOptions) -> Result<Option<(Vec<f32>, u32)>> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        let sample_rate = capture.sample_rate();

        tokio::time::sleep(CALIBRATION).await;
        let threshold = calibrate_threshold(&capture.take_buffer());
        tracing::trace!(threshold, "energy threshold calibrated");

        let mut endpointer =
            Endpointer::new(EndpointConfig::from_listen(options, sample_rate, threshold));

        let phrase = run_endpointer(&mut endpointer, || capture.take_buffer()).await?;
        Ok(phrase.map(|samples| (samples, sample_rate)))
    }

    async fn listen_inner(&self, options: &ListenOptions) -> Result<Option<String>> {
        let deadline = listen_deadline(options);
        let captured = tokio::time::timeout(deadline, self.capture_phrase(options))
            .await
            .unwrap_or_else(|_| {
                tracing::warn!(?deadline, "listen deadline passed");
                Ok(None)
            });

        let Some((samples, sample_rate)) = captured? else {
            return Ok(None);
        };

        let samples = resample_linear(&samples, sample_rate, SAMPLE_RATE);
        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        let text = self.stt.transcribe(&wav, &options.language).await?;

        Ok(Some(text).filter(|t| !t.is_empty()))
    }
}

#[async_trait(?Send)]
impl Recognizer for MicRecognizer {
    async fn listen(&mut self, options: &ListenOptions) -> Option<String> {
        match self.listen_inner(options).await {
            Ok(Some(text)) => {
                tracing::info!(heard = %text, "recognized");
                Some(text)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "listen failed");
                None
            }
        }
    }
}
