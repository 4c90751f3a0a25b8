//! Streaming text generation via a local Ollama server
//!
//! The fallback intent asks the model for one short sentence and speaks it as
//! soon as it is complete, so the client exposes the raw fragment stream
//! rather than a finished answer.

use std::pin::Pin;

use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::config::LlmConfig;

/// Produces a lazy, finite stream of text fragments for a prompt
///
/// Streams are not restartable; call again for a fresh request. Transport
/// and protocol failures are reported as a single diagnostic fragment.
pub trait TextGenerator: Send + Sync {
    /// Start generating a reply to `prompt`
    fn generate_stream(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
    ) -> BoxStream<'static, String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    keep_alive: &'a str,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
    num_ctx: u32,
}

/// One line of Ollama's newline-delimited streaming response
#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Ollama `/api/chat` streaming client
pub struct OllamaGenerator {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaGenerator {
    /// Create a new Ollama client
    #[must_use]
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }
}

impl TextGenerator for OllamaGenerator {
    fn generate_stream(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
    ) -> BoxStream<'static, String> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            stream: true,
            keep_alive: &self.config.keep_alive,
            options: ChatOptions {
                temperature: self.config.temperature,
                num_predict: max_tokens,
                num_ctx: self.config.num_ctx,
            },
        };

        tracing::debug!(model = %self.config.model, max_tokens, "starting generation stream");

        let send = self
            .client
            .post(self.chat_url())
            .timeout(self.config.timeout)
            .json(&request)
            .send();

        stream::once(send)
            .flat_map(|result| match result {
                Ok(response) if response.status().is_success() => {
                    ndjson_fragments(response.bytes_stream()).boxed()
                }
                Ok(response) => stream::once(async move {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    tracing::warn!(status = %status, "generation request rejected");
                    diagnostic(&rejection(status, &body))
                })
                .boxed(),
                Err(e) => {
                    tracing::warn!(error = %e, "generation request failed");
                    let error = Error::Generation(e.to_string());
                    stream::once(async move { diagnostic(&error) }).boxed()
                }
            })
            .boxed()
    }
}

struct NdjsonState<S> {
    bytes: Pin<Box<S>>,
    line_buf: Vec<u8>,
    pending: std::collections::VecDeque<String>,
    finished: bool,
}

/// Turn an NDJSON byte stream into message content fragments
///
/// Ends on a `done: true` line or when the byte stream closes. A read error
/// yields one diagnostic fragment and ends the stream.
fn ndjson_fragments<S, B, E>(bytes: S) -> impl Stream<Item = String> + Send + 'static
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = NdjsonState {
        bytes: Box::pin(bytes),
        line_buf: Vec::new(),
        pending: std::collections::VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((fragment, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.line_buf.extend_from_slice(chunk.as_ref());
                    drain_lines(&mut state);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    let error = Error::Generation(e.to_string());
                    return Some((diagnostic(&error), state));
                }
                None => {
                    // Flush a final line without a trailing newline
                    if !state.line_buf.is_empty() {
                        state.line_buf.push(b'\n');
                        drain_lines(&mut state);
                    }
                    state.finished = true;
                }
            }
        }
    })
}

/// Parse every complete line in the buffer into pending fragments
fn drain_lines<S>(state: &mut NdjsonState<S>) {
    while let Some(pos) = state.line_buf.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = state.line_buf.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        let line = line.trim();
        if line.is_empty() || state.finished {
            continue;
        }

        match serde_json::from_str::<ChatChunk>(line) {
            Ok(chunk) => {
                if let Some(message) = chunk.message
                    && !message.content.is_empty()
                {
                    state.pending.push_back(message.content);
                }
                if chunk.done {
                    state.finished = true;
                }
            }
            Err(e) => {
                tracing::trace!(error = %e, "skipping malformed stream line");
            }
        }
    }
}

/// Error for a non-success response from the generation server
fn rejection(status: reqwest::StatusCode, body: &str) -> Error {
    Error::Generation(format!("HTTP {status}: {}", truncate(body, 200)))
}

/// Single spoken diagnostic for a failed generation
///
/// Ends in a period so the segmenter treats it as a complete sentence.
fn diagnostic(error: &Error) -> String {
    let detail = match error {
        Error::Generation(detail) => detail.clone(),
        other => other.to_string(),
    };
    format!("Local AI error: {}.", detail.trim().trim_end_matches('.'))
}

fn truncate(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}
