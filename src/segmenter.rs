//! Streaming first-sentence segmentation
//!
//! Consumes a live token stream and decides, fragment by fragment, when
//! enough text has arrived to speak one complete sentence. Only the first
//! sentence is ever returned; the rest of the stream is dropped.

use futures::{Stream, StreamExt};

/// Length (in characters) past which the buffer is emitted without a terminator
pub const HARD_CAP_CHARS: usize = 140;

/// Characters that terminate a spoken sentence
const TERMINATORS: [char; 4] = ['.', '!', '?', '…'];

/// Accumulates stream fragments until a sentence boundary or the length cap
#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    /// Create an empty segmenter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and check for termination
    ///
    /// Returns the trimmed sentence once the buffer holds a terminator
    /// (text after the first terminator is cut off) or grows past
    /// [`HARD_CAP_CHARS`]. Returns `None` while more input is needed.
    pub fn push(&mut self, fragment: &str) -> Option<String> {
        self.buffer.push_str(fragment);

        if let Some(end) = first_boundary(&self.buffer) {
            let sentence = self.buffer[..end].trim();
            if !sentence.is_empty() {
                return Some(sentence.to_string());
            }
        }

        if self.buffer.chars().count() > HARD_CAP_CHARS {
            let sentence = self.buffer.trim();
            if !sentence.is_empty() {
                return Some(sentence.to_string());
            }
        }

        None
    }

    /// Text accumulated so far
    #[must_use]
    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}

/// Byte offset just past the first sentence terminator, if any
///
/// A terminator counts when it ends the buffer or is followed by whitespace,
/// so "3.5" inside a fragment is not a boundary. Terminators before any word
/// are ignored.
fn first_boundary(text: &str) -> Option<usize> {
    let mut chars = text.char_indices().peekable();
    let mut has_words = false;

    while let Some((idx, ch)) = chars.next() {
        if !TERMINATORS.contains(&ch) {
            has_words |= !ch.is_whitespace();
            continue;
        }
        if !has_words {
            continue;
        }
        match chars.peek() {
            None => return Some(idx + ch.len_utf8()),
            Some((_, next)) if next.is_whitespace() => return Some(idx + ch.len_utf8()),
            _ => {}
        }
    }

    None
}

/// Consume `stream` until the first complete sentence and return it
///
/// Stops polling the stream as soon as a sentence is found. Returns `None`
/// when the stream ends first.
pub async fn first_sentence<S>(stream: S) -> Option<String>
where
    S: Stream<Item = String>,
{
    let mut stream = std::pin::pin!(stream);
    let mut segmenter = SentenceSegmenter::new();

    while let Some(fragment) = stream.next().await {
        if let Some(sentence) = segmenter.push(&fragment) {
            tracing::debug!(chars = sentence.chars().count(), "first sentence ready");
            return Some(sentence);
        }
    }

    tracing::debug!(buffered = segmenter.buffered().len(), "stream ended without a sentence");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waits_for_terminator() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.push("The"), None);
        assert_eq!(seg.push(" sky"), None);
        assert_eq!(seg.push(" is"), None);
        assert_eq!(seg.push(" blue."), Some("The sky is blue.".to_string()));
    }

    #[test]
    fn test_each_terminator_ends_sentence() {
        for term in ["!", "?", "…", "."] {
            let mut seg = SentenceSegmenter::new();
            let out = seg.push(&format!("Really{term}"));
            assert_eq!(out, Some(format!("Really{term}")));
        }
    }

    #[test]
    fn test_text_after_first_terminator_is_dropped() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.push("Yes. And more"), Some("Yes.".to_string()));
    }

    #[test]
    fn test_decimal_point_is_not_a_boundary() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.push("Pi is 3.14"), None);
        assert_eq!(seg.push(" roughly."), Some("Pi is 3.14 roughly.".to_string()));
    }

    #[test]
    fn test_hard_cap_without_punctuation() {
        let mut seg = SentenceSegmenter::new();
        let word = "word ";
        let mut emitted = None;
        for _ in 0..40 {
            emitted = seg.push(word);
            if emitted.is_some() {
                break;
            }
        }
        let sentence = emitted.expect("cap should force emission");
        assert!(seg.buffered().chars().count() > HARD_CAP_CHARS);
        assert!(sentence.chars().count() <= HARD_CAP_CHARS + word.len());
    }

    #[test]
    fn test_leading_terminator_alone_is_ignored() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.push(" ."), None);
    }

    #[tokio::test]
    async fn test_first_sentence_from_stream() {
        let tokens = vec!["The", " sky", " is", " blue."]
            .into_iter()
            .map(String::from);
        let out = first_sentence(futures::stream::iter(tokens)).await;
        assert_eq!(out.as_deref(), Some("The sky is blue."));
    }

    #[tokio::test]
    async fn test_stream_without_terminator_yields_nothing() {
        let tokens = vec!["no", " ending", " here"].into_iter().map(String::from);
        assert_eq!(first_sentence(futures::stream::iter(tokens)).await, None);
    }

    #[tokio::test]
    async fn test_stream_not_polled_after_sentence() {
        let polled = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = std::sync::Arc::clone(&polled);
        let tokens = futures::stream::iter(vec!["Done.", " extra", " tokens"]).map(move |t| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            t.to_string()
        });

        let out = first_sentence(tokens).await;
        assert_eq!(out.as_deref(), Some("Done."));
        assert_eq!(polled.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
