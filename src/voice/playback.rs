//! Audio playback to speakers
//!
//! Playback is blocking: the caller's thread owns the output stream and
//! waits until every sample has been consumed or a stop is requested. Both
//! synthesized speech and music tracks go through [`play_blocking`].

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// How often the playing thread checks progress
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Give up if the device stops consuming samples for this long
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Mono PCM samples at a known rate
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Playback length
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Pause/stop requests for one playback
#[derive(Debug, Default)]
pub struct PlaybackControl {
    paused: AtomicBool,
    stopped: AtomicBool,
}

impl PlaybackControl {
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Default output device wrapper used for synthesized speech
pub struct AudioPlayback {
    device_name: String,
}

impl AudioPlayback {
    /// Check that an output device is available
    ///
    /// # Errors
    ///
    /// Returns error if there is no default output device
    pub fn new() -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let device_name = device.name().unwrap_or_default();
        tracing::debug!(device = %device_name, "audio playback initialized");

        Ok(Self { device_name })
    }

    /// Name of the output device found at startup
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Decode and play MP3 bytes, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let audio = decode_mp3(mp3_data)?;
        play_blocking(&audio, &Arc::new(PlaybackControl::default()))
    }
}

/// Play `audio` on the default output device, blocking until it ends
///
/// Returns early when `control` is stopped. While paused the device is fed
/// silence and the position holds.
///
/// # Errors
///
/// Returns error if no usable output stream can be opened
pub fn play_blocking(audio: &DecodedAudio, control: &Arc<PlaybackControl>) -> Result<()> {
    if audio.samples.is_empty() {
        return Ok(());
    }

    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let config = output_config(&device, audio.sample_rate)?;
    let samples = if config.sample_rate.0 == audio.sample_rate {
        audio.samples.clone()
    } else {
        resample_linear(&audio.samples, audio.sample_rate, config.sample_rate.0)
    };

    let channels = usize::from(config.channels);
    let total = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let control = Arc::clone(control);

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    let paused = control.is_paused();

                    for frame in data.chunks_mut(channels) {
                        let sample = if paused {
                            0.0
                        } else {
                            samples.get(pos).copied().unwrap_or(0.0)
                        };
                        frame.fill(sample);
                        if !paused && pos < samples.len() {
                            pos += 1;
                        }
                    }

                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let mut last_pos = 0;
    let mut last_progress = Instant::now();

    loop {
        if control.is_stopped() {
            tracing::debug!("playback stopped");
            break;
        }

        let pos = position.load(Ordering::Relaxed);
        if pos >= total {
            // Let the device drain its final buffer
            std::thread::sleep(Duration::from_millis(100));
            break;
        }

        if pos != last_pos || control.is_paused() {
            last_pos = pos;
            last_progress = Instant::now();
        } else if last_progress.elapsed() > STALL_TIMEOUT {
            tracing::warn!(position = pos, total, "output device stalled");
            break;
        }

        std::thread::sleep(POLL_INTERVAL);
    }

    drop(stream);
    tracing::debug!(samples = total, "playback complete");
    Ok(())
}

/// Pick an output config, preferring the source rate
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);

    let exact = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .filter(|c| c.channels() <= 2)
        .find(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate);

    if let Some(supported) = exact {
        return Ok(supported.with_sample_rate(rate).config());
    }

    // Fallback: device default, resampled
    let default = device
        .default_output_config()
        .map_err(|e| Error::Audio(e.to_string()))?;
    if default.sample_format() != cpal::SampleFormat::F32 {
        return Err(Error::Audio("no f32 output config found".to_string()));
    }
    Ok(default.config())
}

/// Linear-interpolation resampler
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn resample_linear(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || to == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from) / f64::from(to);
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let src = i as f64 * ratio;
            let idx = (src.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (src - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error on a malformed stream
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut audio = DecodedAudio::default();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                audio.sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                let channels = frame.channels.max(1);
                audio.samples.extend(frame.data.chunks(channels).map(|chunk| {
                    let sum: f32 = chunk.iter().map(|&s| f32::from(s) / 32768.0).sum();
                    #[allow(clippy::cast_precision_loss)]
                    let mean = sum / chunk.len() as f32;
                    mean
                }));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(audio)
}

/// Decode a WAV file to mono f32 samples
///
/// # Errors
///
/// Returns error if the file cannot be read or has an unsupported format
pub fn decode_wav(path: &Path) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::open(path).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            #[allow(clippy::cast_precision_loss)]
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| {
                    #[allow(clippy::cast_precision_loss)]
                    let v = v as f32;
                    v / scale
                }))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
    };

    #[allow(clippy::cast_precision_loss)]
    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Decode an audio file by extension (`.mp3` or `.wav`)
///
/// # Errors
///
/// Returns error for unsupported extensions or decode failures
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("mp3") => decode_mp3(&std::fs::read(path)?),
        Some("wav") => decode_wav(path),
        _ => Err(Error::Audio(format!(
            "unsupported audio file: {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_linear(&samples, 16_000, 16_000), samples);
    }

    #[test]
    fn test_resample_changes_length() {
        let samples = vec![0.0; 16_000];
        assert_eq!(resample_linear(&samples, 16_000, 48_000).len(), 48_000);
        assert_eq!(resample_linear(&samples, 16_000, 8_000).len(), 8_000);
    }

    #[test]
    fn test_decode_wav_downmixes_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(16_384_i16).unwrap();
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();

        let audio = decode_file(&path).unwrap();
        assert_eq!(audio.sample_rate, 22_050);
        assert_eq!(audio.samples.len(), 100);
        assert!((audio.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(decode_file(Path::new("song.flac")).is_err());
    }

    #[test]
    fn test_control_flags() {
        let control = PlaybackControl::default();
        control.pause();
        assert!(control.is_paused());
        control.resume();
        assert!(!control.is_paused());
        control.stop();
        assert!(control.is_stopped());
    }
}
