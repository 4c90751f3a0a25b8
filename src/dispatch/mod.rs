//! Command dispatch
//!
//! Turns one recognized utterance into side effects (speech, launches,
//! playback, notes, timers) and a [`Directive`] for the session loop.
//! Matching lives in [`rules`]; this module executes the chosen intent.

mod rules;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Local;
use futures::FutureExt;

use crate::config::NewsConfig;
use crate::desktop::{AppCatalog, Desktop, direct_url, maps_url, search_url};
use crate::jokes::JokeSource;
use crate::llm::TextGenerator;
use crate::music::MusicPlayer;
use crate::news::HeadlineSource;
use crate::notes::NoteSink;
use crate::segmenter::first_sentence;
use crate::speech::{SpeechController, SpeechJob};
use crate::timer::{TimerRequest, Timers};
use crate::{Error, Result};

pub use rules::{Category, MatchContext, RULES, Rule, classify};

/// Spoken when a handler fails unexpectedly
pub const GENERIC_APOLOGY: &str = "Sorry, something went wrong with that.";

/// Latency-hiding cue spoken before asking the language model
pub const THINKING_CUE: &str = "Hmm… let me think.";

/// Instruction that keeps generated answers to one sentence
pub const FALLBACK_SYSTEM_PROMPT: &str =
    "You are a helpful voice assistant. Reply in ONE short sentence.";

const HELP_TEXT: &str = "You can say: open YouTube, search Google for cats, \
    directions to Kathmandu, play music, pause, resume, next, previous, stop music, \
    news or news about technology, what's the time, what's the date, \
    change voice to female or male, list voices, tell me a joke, \
    open app notepad, launch vs code, take a note buy milk, set a timer for two minutes, \
    stop talking, wait, resume speaking, go to sleep, or exit.";

const FEMALE_ALIASES: [&str; 3] = ["female", "girl", "woman"];
const MALE_ALIASES: [&str; 3] = ["male", "man", "boy"];

/// Characters dropped from utterances during normalization
const STRIP_CHARS: [char; 7] = [',', ';', ':', '!', '?', '…', '"'];

/// One recognized utterance
///
/// Keeps the original transcript next to its normalized form; notes and
/// echo read from the original so casing and punctuation survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    raw: String,
    normalized: String,
}

impl Utterance {
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            normalized: normalize(raw),
        }
    }

    /// Transcript as recognized
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Lowercased, trimmed, with clause punctuation removed
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// The original text after skipping `count` leading words, trimmed
    #[must_use]
    pub fn raw_after_words(&self, count: usize) -> &str {
        let mut rest = self.raw.trim_start();
        for _ in 0..count {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            rest = rest[end..].trim_start();
        }
        rest.trim_end()
    }
}

/// Lowercase, drop clause punctuation and trailing periods, collapse spaces
///
/// Inner periods are kept so domains like "github.com" survive.
fn normalize(raw: &str) -> String {
    let cleaned: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| !STRIP_CHARS.contains(c))
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .trim()
        .to_string()
}

/// What the session loop should do after a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Continue,
    Sleep,
    Exit,
}

/// A classified command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Say(String),
    StopTalking,
    PauseTalking,
    ResumeTalking,
    Exit,
    Sleep,
    Help,
    Time,
    Date,
    ChangeVoice(String),
    ListVoices,
    LaunchApp(String),
    Open(String),
    OpenYoutube,
    Directions { place: String, navigate: bool },
    Search(String),
    PlayMusic,
    PauseMusic,
    ResumeMusic,
    NextTrack,
    PreviousTrack,
    StopMusic,
    TakeNote(String),
    SetTimer(Option<TimerRequest>),
    News(Option<String>),
    Joke,
    Ask(String),
}

/// Collaborators the dispatcher drives
pub struct DispatcherParts {
    pub speech: SpeechController,
    pub player: MusicPlayer,
    pub desktop: Box<dyn Desktop>,
    pub apps: AppCatalog,
    pub generator: Arc<dyn TextGenerator>,
    pub max_tokens: u32,
    pub headlines: Arc<dyn HeadlineSource>,
    pub news: NewsConfig,
    pub notes: Box<dyn NoteSink>,
    pub timers: Timers,
    pub jokes: Option<Box<dyn JokeSource>>,
    pub female_voices: Vec<String>,
    pub male_voices: Vec<String>,
    pub wake_phrase: String,
}

/// Executes intents against the assistant's collaborators
pub struct Dispatcher {
    speech: SpeechController,
    player: MusicPlayer,
    desktop: Box<dyn Desktop>,
    apps: AppCatalog,
    generator: Arc<dyn TextGenerator>,
    max_tokens: u32,
    headlines: Arc<dyn HeadlineSource>,
    news: NewsConfig,
    notes: Box<dyn NoteSink>,
    timers: Timers,
    jokes: Option<Box<dyn JokeSource>>,
    female_voices: Vec<String>,
    male_voices: Vec<String>,
    wake_phrase: String,
}

impl Dispatcher {
    #[must_use]
    pub fn new(parts: DispatcherParts) -> Self {
        Self {
            speech: parts.speech,
            player: parts.player,
            desktop: parts.desktop,
            apps: parts.apps,
            generator: parts.generator,
            max_tokens: parts.max_tokens,
            headlines: parts.headlines,
            news: parts.news,
            notes: parts.notes,
            timers: parts.timers,
            jokes: parts.jokes,
            female_voices: parts.female_voices,
            male_voices: parts.male_voices,
            wake_phrase: parts.wake_phrase,
        }
    }

    /// The music player, for catalog inspection
    #[must_use]
    pub const fn player(&self) -> &MusicPlayer {
        &self.player
    }

    /// The speech controller replies go through
    #[must_use]
    pub const fn speech(&self) -> &SpeechController {
        &self.speech
    }

    /// Classify and execute one utterance
    ///
    /// Always returns a directive. Handler errors and panics are logged,
    /// answered with a generic apology, and mapped to `Continue`.
    pub async fn dispatch(&mut self, utterance: &Utterance) -> Directive {
        let (category, intent) = classify(utterance, &MatchContext { apps: &self.apps });
        tracing::info!(?category, heard = %utterance.normalized(), "dispatching");

        let outcome = AssertUnwindSafe(self.execute(intent)).catch_unwind().await;
        match outcome {
            Ok(Ok(directive)) => directive,
            Ok(Err(e)) => {
                tracing::error!(?category, error = %e, "handler failed");
                self.say(GENERIC_APOLOGY);
                Directive::Continue
            }
            Err(_) => {
                tracing::error!(?category, "handler panicked");
                self.say(GENERIC_APOLOGY);
                Directive::Continue
            }
        }
    }

    /// Speak a reply as a background job
    fn say(&self, text: &str) -> SpeechJob {
        tracing::info!(text, "say");
        self.speech.speak(text)
    }

    async fn execute(&mut self, intent: Intent) -> Result<Directive> {
        match intent {
            Intent::Say(text) => {
                self.say(&text);
            }
            Intent::StopTalking => self.speech.stop(),
            Intent::PauseTalking => self.speech.pause(),
            Intent::ResumeTalking => {
                self.speech.resume();
                self.say("Resuming.");
            }
            Intent::Exit => {
                // Release a paused reply so the farewell is not held behind it
                self.speech.stop();
                self.player.stop();
                self.say("Goodbye!").wait().await;
                return Ok(Directive::Exit);
            }
            Intent::Sleep => {
                self.say(&format!(
                    "Going to sleep. Say '{}' to wake me.",
                    self.wake_phrase
                ));
                return Ok(Directive::Sleep);
            }
            Intent::Help => {
                self.say(HELP_TEXT);
            }
            Intent::Time => {
                self.say(&format!("The time is {}", Local::now().format("%I:%M %p")));
            }
            Intent::Date => {
                self.say(&format!("Today is {}", Local::now().format("%A, %B %d, %Y")));
            }
            Intent::ChangeVoice(target) => self.change_voice(&target),
            Intent::ListVoices => {
                self.print_voices();
                self.say("I listed the available voices in the terminal.");
            }
            Intent::LaunchApp(name) => self.launch_app(&name),
            Intent::Open(target) => self.open_target(&target)?,
            Intent::OpenYoutube => {
                self.say("Opening YouTube");
                self.desktop.open_url("https://www.youtube.com")?;
            }
            Intent::Directions { place, navigate } => {
                if place.is_empty() {
                    self.say("Where do you want to go?");
                } else {
                    let verb = if navigate { "Navigating to" } else { "Showing directions to" };
                    self.say(&format!("{verb} {place}"));
                    self.desktop.open_url(&maps_url(&place))?;
                }
            }
            Intent::Search(query) => {
                if query.is_empty() {
                    self.say("What should I search for?");
                } else {
                    self.say("Okay, searching.");
                    self.desktop.open_url(&search_url(&query))?;
                }
            }
            Intent::PlayMusic => match self.player.play() {
                Ok(title) => {
                    self.say(&format!("Playing {title}"));
                }
                Err(Error::EmptyCatalog) => {
                    self.say("Your music folder seems empty.");
                }
                Err(e) => return Err(e),
            },
            Intent::PauseMusic => {
                self.player.pause();
                self.say("Paused");
            }
            Intent::ResumeMusic => {
                self.player.resume();
                self.say("Resumed");
            }
            Intent::NextTrack => {
                let result = self.player.next();
                self.announce_track("Next track", result)?;
            }
            Intent::PreviousTrack => {
                let result = self.player.previous();
                self.announce_track("Previous track", result)?;
            }
            Intent::StopMusic => {
                self.player.stop();
                self.say("Stopped");
            }
            Intent::TakeNote(text) => {
                if text.trim().is_empty() {
                    self.say("What should I note?");
                } else {
                    self.notes.append(&text)?;
                    self.say("Saved.");
                }
            }
            Intent::SetTimer(request) => match request {
                Some(request) => {
                    self.timers.schedule(request.duration());
                    self.say(&format!("Timer set for {}.", request.describe()));
                }
                None => {
                    self.say("Tell me how long.");
                }
            },
            Intent::News(topic) => self.news(topic.as_deref()).await,
            Intent::Joke => self.joke(),
            Intent::Ask(prompt) => self.ask(&prompt).await,
        }

        Ok(Directive::Continue)
    }

    fn change_voice(&self, target: &str) {
        let candidates: Vec<&str> = if FEMALE_ALIASES.contains(&target) {
            self.female_voices.iter().map(String::as_str).collect()
        } else if MALE_ALIASES.contains(&target) {
            self.male_voices.iter().map(String::as_str).collect()
        } else {
            vec![target]
        };

        let chosen = candidates
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .find_map(|candidate| self.speech.select_voice(candidate));

        if let Some(description) = chosen {
            self.say(&format!("Okay, I'll use the {description} voice."));
        } else {
            tracing::warn!(target, "voice not found");
            self.say("I couldn't find that voice. I printed the available voices in the terminal.");
            self.print_voices();
        }
    }

    fn print_voices(&self) {
        println!("\n=== Available voices ===");
        for voice in self.speech.list_voices() {
            println!("{voice}");
        }
    }

    fn launch_app(&self, name: &str) {
        let launched = self
            .apps
            .locate(name)
            .and_then(|(canonical, path)| self.desktop.launch(path).map(|()| canonical));

        match launched {
            Ok(canonical) => {
                self.say(&format!("Opening {canonical}."));
            }
            Err(e) => {
                tracing::warn!(app = name, error = %e, "app launch failed");
                self.say("I couldn't find that app. You can add it to my list.");
            }
        }
    }

    fn open_target(&self, target: &str) -> Result<()> {
        if target.is_empty() {
            self.say("What should I open?");
            return Ok(());
        }

        if let Some(url) = direct_url(target) {
            self.say(&format!("Opening {target}"));
            self.desktop.open_url(&url)
        } else {
            self.say("Okay, searching.");
            self.desktop.open_url(&search_url(target))
        }
    }

    fn announce_track(&self, label: &str, result: Result<String>) -> Result<()> {
        match result {
            Ok(title) => {
                self.say(&format!("{label}: {title}"));
                Ok(())
            }
            Err(Error::EmptyCatalog) => {
                self.say("Your music folder seems empty.");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn news(&self, topic: Option<&str>) {
        match topic {
            Some(topic) => self.say(&format!("Checking headlines about {topic}.")),
            None => self.say("Fetching top headlines."),
        };

        let fetched = self
            .headlines
            .fetch(topic, &self.news.country, self.news.limit)
            .await;

        match fetched {
            Ok(headlines) => match (headlines.first(), topic) {
                (Some(first), _) => {
                    self.say(first);
                }
                (None, Some(topic)) => {
                    self.say(&format!("I couldn't find headlines about {topic}."));
                }
                (None, None) => {
                    self.say("No headlines found.");
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "headline fetch failed");
                self.say("I couldn't fetch the news right now.");
            }
        }
    }

    fn joke(&self) {
        let Some(source) = &self.jokes else {
            self.say("I don't have any jokes installed.");
            return;
        };

        match source.joke() {
            Ok(joke) => {
                self.say(&joke);
            }
            Err(e) => {
                tracing::warn!(error = %e, "joke source failed");
                self.say("I had trouble telling a joke.");
            }
        }
    }

    /// Speak the first sentence of a generated answer
    async fn ask(&self, prompt: &str) {
        if let Err(e) = self.speech.speak_now(THINKING_CUE).await {
            tracing::warn!(error = %e, "thinking cue failed");
        }

        let stream = self
            .generator
            .generate_stream(prompt, FALLBACK_SYSTEM_PROMPT, self.max_tokens);

        match first_sentence(stream).await {
            Some(sentence) => {
                self.say(&sentence);
            }
            None => tracing::debug!("generation ended without a sentence"),
        }
    }
}
