//! Shared test fakes

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use murmur::config::NewsConfig;
use murmur::desktop::{AppCatalog, Desktop};
use murmur::jokes::JokeSource;
use murmur::llm::TextGenerator;
use murmur::music::{MusicPlayer, TrackSink};
use murmur::news::HeadlineSource;
use murmur::notes::NoteSink;
use murmur::timer::Timers;
use murmur::{
    Dispatcher, DispatcherParts, Error, ListenOptions, Recognizer, Result, SpeechController,
    VoiceEngine,
};

/// What the fake voice engine saw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceEvent {
    Started(String),
    Finished(String),
}

/// Counting semaphore that holds `speak_once` until released
#[derive(Default)]
struct Gate {
    permits: Mutex<usize>,
    ready: Condvar,
}

/// Voice engine that records every chunk it renders
pub struct FakeVoice {
    spoken: Mutex<Vec<String>>,
    events: mpsc::UnboundedSender<VoiceEvent>,
    gate: Option<Gate>,
    render_time: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeVoice {
    /// Engine that renders immediately
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<VoiceEvent>) {
        Self::build(None, Duration::ZERO)
    }

    /// Engine where each chunk waits for [`Self::release`]
    pub fn gated() -> (Arc<Self>, mpsc::UnboundedReceiver<VoiceEvent>) {
        Self::build(Some(Gate::default()), Duration::ZERO)
    }

    /// Engine where each chunk takes `render_time`
    pub fn slow(render_time: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<VoiceEvent>) {
        Self::build(None, render_time)
    }

    fn build(
        gate: Option<Gate>,
        render_time: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<VoiceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let voice = Arc::new(Self {
            spoken: Mutex::new(Vec::new()),
            events: tx,
            gate,
            render_time,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        (voice, rx)
    }

    /// Let `n` more chunks render
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            *gate.permits.lock().unwrap() += n;
            gate.ready.notify_all();
        }
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// Highest number of chunks ever rendering at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl VoiceEngine for FakeVoice {
    fn speak_once(&self, text: &str) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _ = self.events.send(VoiceEvent::Started(text.to_string()));

        if let Some(gate) = &self.gate {
            let mut permits = gate.permits.lock().unwrap();
            while *permits == 0 {
                permits = gate.ready.wait(permits).unwrap();
            }
            *permits -= 1;
        }
        if !self.render_time.is_zero() {
            std::thread::sleep(self.render_time);
        }

        self.spoken.lock().unwrap().push(text.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let _ = self.events.send(VoiceEvent::Finished(text.to_string()));
        Ok(())
    }

    fn list_voices(&self) -> Vec<String> {
        vec![
            "alloy (neutral, balanced)".to_string(),
            "nova (female, bright)".to_string(),
            "onyx (male, deep)".to_string(),
        ]
    }

    fn select_voice(&self, needle: &str) -> Option<String> {
        let needle = needle.to_lowercase();
        self.list_voices().into_iter().find(|v| v.contains(&needle))
    }
}

/// Wait for the next finished chunk, failing the test after two seconds
pub async fn next_spoken(rx: &mut mpsc::UnboundedReceiver<VoiceEvent>) -> String {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for speech")
            .expect("voice channel closed");
        if let VoiceEvent::Finished(text) = event {
            return text;
        }
    }
}

/// Wait until a chunk starts rendering
pub async fn next_started(rx: &mut mpsc::UnboundedReceiver<VoiceEvent>) -> String {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for speech")
            .expect("voice channel closed");
        if let VoiceEvent::Started(text) = event {
            return text;
        }
    }
}

/// Assert nothing else gets spoken within a short grace period
pub async fn assert_silent(rx: &mut mpsc::UnboundedReceiver<VoiceEvent>) {
    if let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        panic!("unexpected speech: {event:?}");
    }
}

/// Recognizer that replays a script, then hears nothing
#[derive(Default)]
pub struct ScriptedRecognizer {
    script: VecDeque<Option<String>>,
    pub listens: Vec<ListenOptions>,
}

impl ScriptedRecognizer {
    pub fn new(script: &[Option<&str>]) -> Self {
        Self {
            script: script.iter().map(|s| s.map(ToString::to_string)).collect(),
            listens: Vec::new(),
        }
    }
}

#[async_trait(?Send)]
impl Recognizer for ScriptedRecognizer {
    async fn listen(&mut self, options: &ListenOptions) -> Option<String> {
        self.listens.push(options.clone());
        self.script.pop_front().flatten()
    }
}

/// Generator that streams fixed fragments
#[derive(Default)]
pub struct ScriptedGenerator {
    fragments: Vec<String>,
    pub prompts: Mutex<Vec<(String, String, u32)>>,
}

impl ScriptedGenerator {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(ToString::to_string).collect(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate_stream(
        &self,
        prompt: &str,
        system: &str,
        max_tokens: u32,
    ) -> BoxStream<'static, String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), system.to_string(), max_tokens));
        stream::iter(self.fragments.clone()).boxed()
    }
}

/// Desktop that records instead of launching
#[derive(Default, Clone)]
pub struct RecordingDesktop {
    pub launched: Arc<Mutex<Vec<PathBuf>>>,
    pub urls: Arc<Mutex<Vec<String>>>,
}

impl Desktop for RecordingDesktop {
    fn launch(&self, path: &Path) -> Result<()> {
        self.launched.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

/// Track sink that records calls
#[derive(Default, Clone)]
pub struct MemorySink {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl TrackSink for MemorySink {
    fn play(&mut self, path: &Path) -> Result<()> {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        self.events
            .lock()
            .unwrap()
            .push(format!("play {}", name.unwrap_or_default()));
        Ok(())
    }

    fn pause(&mut self) {
        self.events.lock().unwrap().push("pause".to_string());
    }

    fn resume(&mut self) {
        self.events.lock().unwrap().push("resume".to_string());
    }

    fn stop(&mut self) {
        self.events.lock().unwrap().push("stop".to_string());
    }
}

/// Headline source with a fixed answer
pub struct CannedHeadlines {
    answer: std::result::Result<Vec<String>, String>,
    pub topics: Mutex<Vec<Option<String>>>,
}

impl CannedHeadlines {
    pub fn ok(titles: &[&str]) -> Self {
        Self {
            answer: Ok(titles.iter().map(ToString::to_string).collect()),
            topics: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            answer: Err(message.to_string()),
            topics: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HeadlineSource for CannedHeadlines {
    async fn fetch(&self, topic: Option<&str>, _country: &str, limit: usize) -> Result<Vec<String>> {
        self.topics.lock().unwrap().push(topic.map(ToString::to_string));
        match &self.answer {
            Ok(titles) => Ok(titles.iter().take(limit).cloned().collect()),
            Err(message) => Err(Error::News(message.clone())),
        }
    }
}

/// Notes kept in memory
#[derive(Default, Clone)]
pub struct MemoryNotes {
    pub lines: Arc<Mutex<Vec<String>>>,
}

impl NoteSink for MemoryNotes {
    fn append(&self, text: &str) -> Result<()> {
        self.lines.lock().unwrap().push(text.trim().to_string());
        Ok(())
    }
}

/// Joke source with one joke
pub struct OneJoke;

impl JokeSource for OneJoke {
    fn joke(&self) -> Result<String> {
        Ok("I told a joke once.".to_string())
    }
}

/// Joke source that panics, for liveness tests
pub struct PanickingJokes;

impl JokeSource for PanickingJokes {
    fn joke(&self) -> Result<String> {
        panic!("joke source exploded");
    }
}

/// A dispatcher wired to fakes, plus handles to inspect them
pub struct Harness {
    pub dispatcher: Dispatcher,
    pub voice: Arc<FakeVoice>,
    pub events: mpsc::UnboundedReceiver<VoiceEvent>,
    pub desktop: RecordingDesktop,
    pub sink: MemorySink,
    pub notes: MemoryNotes,
    pub generator: Arc<ScriptedGenerator>,
    pub headlines: Arc<CannedHeadlines>,
    pub music_dir: tempfile::TempDir,
}

/// Options for [`harness`]
pub struct HarnessOptions {
    pub tracks: Vec<&'static str>,
    pub fragments: Vec<&'static str>,
    pub headlines: CannedHeadlines,
    pub apps: AppCatalog,
    pub jokes: Option<Box<dyn JokeSource>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            tracks: vec!["alpha.mp3", "beta.mp3", "gamma.wav"],
            fragments: vec!["The", " sky", " is", " blue."],
            headlines: CannedHeadlines::ok(&["First headline", "Second headline"]),
            apps: AppCatalog::default(),
            jokes: Some(Box::new(OneJoke)),
        }
    }
}

pub fn harness(options: HarnessOptions) -> Harness {
    let (voice, events) = FakeVoice::new();
    let speech = SpeechController::new(voice.clone(), 220);

    let music_dir = tempfile::tempdir().unwrap();
    for track in &options.tracks {
        std::fs::write(music_dir.path().join(track), b"").unwrap();
    }

    let sink = MemorySink::default();
    let mut player = MusicPlayer::new(music_dir.path().to_path_buf(), Box::new(sink.clone()));
    player.scan().unwrap();

    let desktop = RecordingDesktop::default();
    let notes = MemoryNotes::default();
    let generator = Arc::new(ScriptedGenerator::new(&options.fragments));
    let headlines = Arc::new(options.headlines);

    let dispatcher = Dispatcher::new(DispatcherParts {
        speech: speech.clone(),
        player,
        desktop: Box::new(desktop.clone()),
        apps: options.apps,
        generator: generator.clone(),
        max_tokens: 60,
        headlines: headlines.clone(),
        news: NewsConfig {
            country: "us".to_string(),
            limit: 3,
        },
        notes: Box::new(notes.clone()),
        timers: Timers::new(speech),
        jokes: options.jokes,
        female_voices: vec!["zira".to_string(), "nova".to_string()],
        male_voices: vec!["onyx".to_string()],
        wake_phrase: "hey murmur".to_string(),
    });

    Harness {
        dispatcher,
        voice,
        events,
        desktop,
        sink,
        notes,
        generator,
        headlines,
        music_dir,
    }
}
