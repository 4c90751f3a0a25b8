//! Output sinks for music tracks

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::voice::{PlaybackControl, decode_file, play_blocking};
use crate::{Error, Result};

/// Plays one track at a time
pub trait TrackSink: Send {
    /// Start playing `path`, replacing any current track
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot start
    fn play(&mut self, path: &Path) -> Result<()>;

    fn pause(&mut self);

    fn resume(&mut self);

    fn stop(&mut self);
}

/// How a music thread ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackEnd {
    DecodeFailed,
    /// Stopped while still decoding; the device was never opened
    StoppedBeforePlay,
    Played,
}

/// Sink that decodes and plays on a dedicated output thread
///
/// Stopping only signals the thread. It is never joined, so a track still
/// decoding cannot hold up the caller.
#[derive(Default)]
pub struct DeviceSink {
    active: Option<Arc<PlaybackControl>>,
}

impl DeviceSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn play_on_thread(path: &Path, control: &Arc<PlaybackControl>) -> TrackEnd {
        let audio = match decode_file(path) {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to decode track");
                return TrackEnd::DecodeFailed;
            }
        };

        if control.is_stopped() {
            tracing::debug!(path = %path.display(), "track stopped during decode");
            return TrackEnd::StoppedBeforePlay;
        }

        tracing::debug!(
            path = %path.display(),
            secs = audio.duration().as_secs(),
            "track decoded"
        );

        if let Err(e) = play_blocking(&audio, control) {
            tracing::warn!(path = %path.display(), error = %e, "track playback failed");
        }
        TrackEnd::Played
    }
}

impl TrackSink for DeviceSink {
    fn play(&mut self, path: &Path) -> Result<()> {
        self.stop();

        let control = Arc::new(PlaybackControl::default());
        let path: PathBuf = path.to_path_buf();
        let thread_control = Arc::clone(&control);

        std::thread::Builder::new()
            .name("murmur-music".to_string())
            .spawn(move || {
                let end = Self::play_on_thread(&path, &thread_control);
                tracing::trace!(?end, "music thread finished");
            })
            .map_err(|e| Error::Audio(format!("failed to start music thread: {e}")))?;

        self.active = Some(control);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(control) = &self.active {
            control.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(control) = &self.active {
            control.resume();
        }
    }

    fn stop(&mut self) {
        if let Some(control) = self.active.take() {
            control.stop();
        }
    }
}

impl Drop for DeviceSink {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn write_wav(path: &Path, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..16_000 * seconds {
            writer.write_sample(0_i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_stop_during_decode_skips_playback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        write_wav(&path, 1);

        let control = Arc::new(PlaybackControl::default());
        control.stop();

        assert_eq!(
            DeviceSink::play_on_thread(&path, &control),
            TrackEnd::StoppedBeforePlay
        );
    }

    #[test]
    fn test_undecodable_track_ends_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"not audio").unwrap();

        let control = Arc::new(PlaybackControl::default());
        assert_eq!(
            DeviceSink::play_on_thread(&path, &control),
            TrackEnd::DecodeFailed
        );
    }

    #[test]
    fn test_stop_does_not_wait_for_the_music_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("long.wav");
        write_wav(&path, 60);

        let mut sink = DeviceSink::new();
        sink.play(&path).unwrap();

        let started = Instant::now();
        sink.stop();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert!(sink.active.is_none());
    }
}
