//! Local music playback
//!
//! A flat, sorted catalog of the audio files under the music folder with a
//! circular cursor. Actual audio output goes through a [`TrackSink`].

mod sink;

use std::path::{Path, PathBuf};

use crate::{Error, Result};

pub use sink::{DeviceSink, TrackSink};

/// File extensions the catalog picks up
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

/// One playable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub path: PathBuf,
    pub title: String,
}

/// Catalog plus cursor over a track sink
pub struct MusicPlayer {
    folder: PathBuf,
    tracks: Vec<Track>,
    index: usize,
    sink: Box<dyn TrackSink>,
}

impl MusicPlayer {
    /// Create a player for `folder`; call [`Self::scan`] to fill the catalog
    #[must_use]
    pub fn new(folder: PathBuf, sink: Box<dyn TrackSink>) -> Self {
        Self {
            folder,
            tracks: Vec::new(),
            index: 0,
            sink,
        }
    }

    /// Rebuild the catalog, creating the folder if missing
    ///
    /// Returns the number of tracks found.
    ///
    /// # Errors
    ///
    /// Returns error if the folder cannot be created
    pub fn scan(&mut self) -> Result<usize> {
        std::fs::create_dir_all(&self.folder)?;

        let mut paths = Vec::new();
        collect_audio_files(&self.folder, &mut paths);
        paths.sort();

        self.tracks = paths
            .into_iter()
            .map(|path| {
                let title = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Track { path, title }
            })
            .collect();
        self.index = 0;

        tracing::info!(folder = %self.folder.display(), tracks = self.tracks.len(), "music catalog scanned");
        Ok(self.tracks.len())
    }

    /// Play the current track, returning its title
    ///
    /// # Errors
    ///
    /// Returns `EmptyCatalog` when there are no tracks, or the sink's error
    pub fn play(&mut self) -> Result<String> {
        let track = self.tracks.get(self.index).ok_or(Error::EmptyCatalog)?;
        tracing::info!(title = %track.title, index = self.index, "playing track");
        self.sink.play(&track.path)?;
        Ok(track.title.clone())
    }

    pub fn pause(&mut self) {
        self.sink.pause();
    }

    pub fn resume(&mut self) {
        self.sink.resume();
    }

    pub fn stop(&mut self) {
        self.sink.stop();
    }

    /// Advance circularly and play
    ///
    /// # Errors
    ///
    /// Returns `EmptyCatalog` when there are no tracks, or the sink's error
    pub fn next(&mut self) -> Result<String> {
        if self.tracks.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        self.index = (self.index + 1) % self.tracks.len();
        self.play()
    }

    /// Step back circularly and play
    ///
    /// # Errors
    ///
    /// Returns `EmptyCatalog` when there are no tracks, or the sink's error
    pub fn previous(&mut self) -> Result<String> {
        if self.tracks.is_empty() {
            return Err(Error::EmptyCatalog);
        }
        self.index = (self.index + self.tracks.len() - 1) % self.tracks.len();
        self.play()
    }

    /// Title at the cursor
    #[must_use]
    pub fn current_title(&self) -> Option<&str> {
        self.tracks.get(self.index).map(|t| t.title.as_str())
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }
}

/// Recursively gather supported audio files; unreadable entries are skipped
fn collect_audio_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_audio_files(&path, out);
        } else if is_supported(&path) {
            out.push(path);
        }
    }
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported(Path::new("a/b/song.MP3")));
        assert!(is_supported(Path::new("clip.wav")));
        assert!(!is_supported(Path::new("cover.jpg")));
        assert!(!is_supported(Path::new("README")));
    }
}
