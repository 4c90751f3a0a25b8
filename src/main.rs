use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use murmur::desktop::SystemDesktop;
use murmur::jokes::BuiltinJokes;
use murmur::llm::OllamaGenerator;
use murmur::music::{DeviceSink, MusicPlayer};
use murmur::news::NewsApi;
use murmur::notes::NoteLog;
use murmur::timer::Timers;
use murmur::voice::{MicRecognizer, OpenAiVoice, SpeechToText, probe_input, voice_descriptions};
use murmur::{Config, Dispatcher, DispatcherParts, Session, SpeechController};

/// Murmur - hands-free voice assistant
///
/// Starts in standby; say a wake phrase to give commands.
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,

    /// Print the available voices and exit
    #[arg(long)]
    list_voices: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_voices {
        for voice in voice_descriptions() {
            println!("{voice}");
        }
        return ExitCode::SUCCESS;
    }

    let filter = std::env::var("MURMUR_LOG")
        .ok()
        .and_then(|f| EnvFilter::try_new(f).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info,murmur=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli.config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = Config::load_from(config_path.as_deref());
    tracing::debug!(?config, "loaded configuration");

    // Voice engine and microphone are the only fatal collaborators
    let engine = OpenAiVoice::new(&config.voice, config.api_keys.openai.clone())?;
    let microphone = probe_input()?;
    tracing::info!(device = %microphone, "microphone ready");

    let stt = SpeechToText::new(config.api_keys.openai.clone(), config.voice.stt_model.clone())?;
    let speech = SpeechController::new(Arc::new(engine), config.voice.chunk_budget);

    let mut player = MusicPlayer::new(config.music_dir.clone(), Box::new(DeviceSink::new()));
    if let Err(e) = player.scan() {
        tracing::warn!(error = %e, "music folder unavailable");
    }

    let wake_phrase = config.assistant.primary_wake_phrase().to_string();

    let dispatcher = Dispatcher::new(DispatcherParts {
        speech: speech.clone(),
        player,
        desktop: Box::new(SystemDesktop),
        apps: config.apps.clone(),
        generator: Arc::new(OllamaGenerator::new(config.llm.clone())),
        max_tokens: config.llm.max_tokens,
        headlines: Arc::new(NewsApi::new(config.api_keys.news.clone())),
        news: config.news.clone(),
        notes: Box::new(NoteLog::new(config.notes_file.clone())),
        timers: Timers::new(speech.clone()),
        jokes: Some(Box::new(BuiltinJokes)),
        female_voices: config.voice.female_voices.clone(),
        male_voices: config.voice.male_voices.clone(),
        wake_phrase: wake_phrase.clone(),
    });

    let greeting = format!("I'm in standby. Say '{wake_phrase}' to wake me.");
    tracing::info!(text = %greeting, "say");
    speech.speak(&greeting);

    let mut session = Session::new(MicRecognizer::new(stt), dispatcher, config.assistant);

    tokio::select! {
        () = session.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("interrupted, shutting down");
            speech.stop();
        }
    }

    Ok(())
}
