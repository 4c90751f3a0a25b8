//! Text chunking for interruptible speech
//!
//! The voice engine cannot be interrupted mid-utterance, so replies are cut
//! into short sentence-aligned chunks. Stop and pause requests are honoured
//! between chunks, which bounds their latency by the chunk budget.

/// Default chunk budget in characters
pub const DEFAULT_CHUNK_BUDGET: usize = 220;

/// Characters that end a sentence for chunking purposes
const SENTENCE_END: [char; 3] = ['.', '!', '?'];

/// Split `text` into speakable chunks of at most roughly `budget` characters.
///
/// Sentences keep their terminal punctuation. Consecutive short sentences are
/// merged while the merged chunk stays under the budget; a sentence longer
/// than the budget is split at word boundaries. When `budget` is 0 the
/// default budget ([`DEFAULT_CHUNK_BUDGET`]) is used.
///
/// # Examples
///
/// ```
/// use murmur::speech::chunk_for_speech;
///
/// let chunks = chunk_for_speech("Hello there. How are you?", 0);
/// assert_eq!(chunks, vec!["Hello there. How are you?"]);
/// ```
#[must_use]
pub fn chunk_for_speech(text: &str, budget: usize) -> Vec<String> {
    let budget = if budget == 0 { DEFAULT_CHUNK_BUDGET } else { budget };

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        for piece in split_long_sentence(sentence, budget) {
            if current.is_empty() {
                current = piece;
            } else if char_len(&current) + 1 + char_len(&piece) < budget {
                current.push(' ');
                current.push_str(&piece);
            } else {
                chunks.push(std::mem::take(&mut current));
                current = piece;
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split on sentence-ending punctuation, keeping the punctuation.
///
/// A run of terminators ("...", "?!") stays with its sentence. Returned slices
/// are trimmed and never empty.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let next_is_end = chars
            .peek()
            .is_some_and(|(_, next)| SENTENCE_END.contains(next));
        if SENTENCE_END.contains(&ch) && !next_is_end {
            let end = idx + ch.len_utf8();
            push_trimmed(&mut sentences, &text[start..end]);
            start = end;
        }
    }
    push_trimmed(&mut sentences, &text[start..]);

    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, segment: &'a str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        out.push(trimmed);
    }
}

/// Split a sentence longer than `budget` at word boundaries.
fn split_long_sentence(sentence: &str, budget: usize) -> Vec<String> {
    if char_len(sentence) <= budget {
        return vec![sentence.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in sentence.split_whitespace() {
        if !current.is_empty() && char_len(&current) + 1 + char_len(word) > budget {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
