//! Ordered intent rules
//!
//! The table is evaluated top to bottom and the first match wins, so the
//! position of a rule is part of its meaning: talk and session control run
//! before anything else, and local apps are tried before generic web opens.

use super::{Intent, Utterance};
use crate::desktop::AppCatalog;
use crate::timer::parse_timer;

/// Intent category, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    TalkControl,
    SessionControl,
    Informational,
    Voice,
    App,
    Web,
    Music,
    Utility,
    News,
    Joke,
    Fallback,
}

/// Lookup tables a matcher may consult
pub struct MatchContext<'a> {
    pub apps: &'a AppCatalog,
}

type Matcher = fn(&Utterance, &MatchContext<'_>) -> Option<Intent>;

/// One (category, predicate) pair
pub struct Rule {
    pub name: &'static str,
    pub category: Category,
    pub matcher: Matcher,
}

const STOP_TALKING: [&str; 4] = ["stop talking", "stop speaking", "be quiet", "shut up"];
const PAUSE_TALKING: [&str; 2] = ["wait", "pause speaking"];
const RESUME_TALKING: [&str; 2] = ["resume speaking", "continue speaking"];
const EXIT: [&str; 4] = ["quit", "exit", "close", "shutdown"];
const SLEEP: [&str; 3] = ["go to sleep", "sleep", "stop listening"];
const HELP: [&str; 3] = ["help", "what can you do", "commands"];
const LIST_VOICES: [&str; 2] = ["list voices", "show voices"];
const APP_KEYWORDS: [&str; 4] = ["open app", "launch", "start", "run"];

/// Every rule in priority order
pub static RULES: &[Rule] = &[
    Rule { name: "say", category: Category::TalkControl, matcher: say },
    Rule { name: "stop_talking", category: Category::TalkControl, matcher: stop_talking },
    Rule { name: "pause_talking", category: Category::TalkControl, matcher: pause_talking },
    Rule { name: "resume_talking", category: Category::TalkControl, matcher: resume_talking },
    Rule { name: "exit", category: Category::SessionControl, matcher: exit },
    Rule { name: "sleep", category: Category::SessionControl, matcher: sleep },
    Rule { name: "help", category: Category::Informational, matcher: help },
    Rule { name: "time", category: Category::Informational, matcher: time },
    Rule { name: "date", category: Category::Informational, matcher: date },
    Rule { name: "change_voice", category: Category::Voice, matcher: change_voice },
    Rule { name: "list_voices", category: Category::Voice, matcher: list_voices },
    Rule { name: "app_keyword", category: Category::App, matcher: app_keyword },
    Rule { name: "open_known_app", category: Category::App, matcher: open_known_app },
    Rule { name: "open_website", category: Category::Web, matcher: open_website },
    Rule { name: "open_youtube", category: Category::Web, matcher: open_youtube },
    Rule { name: "open", category: Category::Web, matcher: open },
    Rule { name: "directions", category: Category::Web, matcher: directions },
    Rule { name: "search", category: Category::Web, matcher: search },
    Rule { name: "play_music", category: Category::Music, matcher: play_music },
    Rule { name: "pause_music", category: Category::Music, matcher: pause_music },
    Rule { name: "resume_music", category: Category::Music, matcher: resume_music },
    Rule { name: "next_track", category: Category::Music, matcher: next_track },
    Rule { name: "previous_track", category: Category::Music, matcher: previous_track },
    Rule { name: "stop_music", category: Category::Music, matcher: stop_music },
    Rule { name: "note", category: Category::Utility, matcher: note },
    Rule { name: "timer", category: Category::Utility, matcher: timer },
    Rule { name: "news", category: Category::News, matcher: news },
    Rule { name: "joke", category: Category::Joke, matcher: joke },
];

/// Pick the intent for an utterance
///
/// Anything no rule claims becomes [`Intent::Ask`].
#[must_use]
pub fn classify(utterance: &Utterance, ctx: &MatchContext<'_>) -> (Category, Intent) {
    RULES
        .iter()
        .find_map(|rule| {
            (rule.matcher)(utterance, ctx).map(|intent| {
                tracing::debug!(rule = rule.name, "rule matched");
                (rule.category, intent)
            })
        })
        .unwrap_or_else(|| {
            (
                Category::Fallback,
                Intent::Ask(utterance.raw().trim().to_string()),
            )
        })
}

/// Whether `phrase` occurs in `text` on word boundaries
fn has_phrase(text: &str, phrase: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    let target: Vec<&str> = phrase.split_whitespace().collect();
    !target.is_empty() && words.windows(target.len()).any(|w| w == target.as_slice())
}

/// Remainder after a prefix that ends on a word boundary
fn after_prefix<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    (rest.is_empty() || rest.starts_with(' ')).then(|| rest.trim())
}

fn say(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    after_prefix(u.normalized(), "say")
        .filter(|rest| !rest.is_empty())
        .map(|_| Intent::Say(u.raw_after_words(1).to_string()))
}

fn stop_talking(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    STOP_TALKING
        .contains(&u.normalized())
        .then_some(Intent::StopTalking)
}

fn pause_talking(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    PAUSE_TALKING
        .contains(&u.normalized())
        .then_some(Intent::PauseTalking)
}

fn resume_talking(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    RESUME_TALKING
        .contains(&u.normalized())
        .then_some(Intent::ResumeTalking)
}

fn exit(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    EXIT.contains(&u.normalized()).then_some(Intent::Exit)
}

fn sleep(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    SLEEP.contains(&u.normalized()).then_some(Intent::Sleep)
}

fn help(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    HELP.contains(&u.normalized()).then_some(Intent::Help)
}

fn time(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    has_phrase(u.normalized(), "time").then_some(Intent::Time)
}

fn date(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    (has_phrase(cmd, "date") || has_phrase(cmd, "day")).then_some(Intent::Date)
}

fn change_voice(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    after_prefix(u.normalized(), "change voice to").map(|target| Intent::ChangeVoice(target.to_string()))
}

fn list_voices(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    LIST_VOICES
        .contains(&u.normalized())
        .then_some(Intent::ListVoices)
}

fn app_keyword(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    APP_KEYWORDS.iter().find_map(|keyword| {
        after_prefix(u.normalized(), keyword)
            .filter(|app| !app.is_empty())
            .map(|app| Intent::LaunchApp(app.to_string()))
    })
}

fn open_known_app(u: &Utterance, ctx: &MatchContext<'_>) -> Option<Intent> {
    let target = after_prefix(u.normalized(), "open")?;
    ctx.apps
        .known_prefix(target)
        .map(|name| Intent::LaunchApp(name.to_string()))
}

fn open_website(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    after_prefix(u.normalized(), "open website").map(|target| Intent::Open(target.to_string()))
}

fn open_youtube(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    has_phrase(u.normalized(), "open youtube").then_some(Intent::OpenYoutube)
}

fn open(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    after_prefix(u.normalized(), "open").map(|target| Intent::Open(target.to_string()))
}

fn directions(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    if let Some(place) = after_prefix(cmd, "directions to") {
        return Some(Intent::Directions {
            place: place.to_string(),
            navigate: false,
        });
    }
    after_prefix(cmd, "navigate to").map(|place| Intent::Directions {
        place: place.to_string(),
        navigate: true,
    })
}

fn search(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    if let Some(pos) = cmd.find("search google for")
        && has_phrase(cmd, "search google for")
    {
        let query = cmd[pos + "search google for".len()..].trim();
        return Some(Intent::Search(query.to_string()));
    }
    after_prefix(cmd, "google").map(|query| Intent::Search(query.to_string()))
}

fn play_music(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    (has_phrase(cmd, "play music") || has_phrase(cmd, "play song")).then_some(Intent::PlayMusic)
}

fn pause_music(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    (cmd == "pause" || has_phrase(cmd, "pause music")).then_some(Intent::PauseMusic)
}

fn resume_music(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    (cmd == "resume" || has_phrase(cmd, "resume music")).then_some(Intent::ResumeMusic)
}

fn next_track(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    (cmd == "next" || has_phrase(cmd, "next song")).then_some(Intent::NextTrack)
}

fn previous_track(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    (has_phrase(cmd, "previous") || has_phrase(cmd, "back")).then_some(Intent::PreviousTrack)
}

fn stop_music(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    (has_phrase(cmd, "stop music") || has_phrase(cmd, "stop song")).then_some(Intent::StopMusic)
}

fn note(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    let prefix_words = if after_prefix(cmd, "take a note").is_some() {
        3
    } else if after_prefix(cmd, "note").is_some() {
        1
    } else {
        return None;
    };
    Some(Intent::TakeNote(u.raw_after_words(prefix_words).to_string()))
}

fn timer(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    ["set a timer for", "set timer for"]
        .iter()
        .find_map(|prefix| after_prefix(cmd, prefix))
        .map(|rest| Intent::SetTimer(parse_timer(rest)))
}

fn news(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    if let Some(topic) = after_prefix(cmd, "news about")
        && !topic.is_empty()
    {
        return Some(Intent::News(Some(topic.to_string())));
    }
    (cmd == "news" || has_phrase(cmd, "headlines")).then_some(Intent::News(None))
}

fn joke(u: &Utterance, _: &MatchContext<'_>) -> Option<Intent> {
    let cmd = u.normalized();
    (has_phrase(cmd, "joke") || has_phrase(cmd, "jokes") || has_phrase(cmd, "make me laugh"))
        .then_some(Intent::Joke)
}
