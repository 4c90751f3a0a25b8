//! Append-only note log

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Durable sink for dictated notes
pub trait NoteSink: Send + Sync {
    /// Append one note
    ///
    /// # Errors
    ///
    /// Returns error if the note cannot be persisted
    fn append(&self, text: &str) -> Result<()>;
}

/// Notes stored one per line in a UTF-8 text file
#[derive(Debug, Clone)]
pub struct NoteLog {
    path: PathBuf,
}

impl NoteLog {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NoteSink for NoteLog {
    fn append(&self, text: &str) -> Result<()> {
        let line = text.trim();
        if line.is_empty() {
            return Err(Error::Parse("empty note".to_string()));
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;

        tracing::info!(path = %self.path.display(), chars = line.chars().count(), "note saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appends_trimmed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = NoteLog::new(dir.path().join("nested").join("notes.txt"));

        log.append("  Buy Milk  ").unwrap();
        log.append("call Ravi at 5").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(content, "Buy Milk\ncall Ravi at 5\n");
    }

    #[test]
    fn test_empty_note_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let log = NoteLog::new(dir.path().join("notes.txt"));
        assert!(log.append("   ").is_err());
        assert!(!log.path().exists());
    }
}
