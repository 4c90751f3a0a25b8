//! One-shot spoken timers

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::task::JoinHandle;

use crate::speech::SpeechController;

/// Announcement spoken when a timer fires
pub const TIMES_UP: &str = "Time's up.";

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+|[a-z]+(?:[ -][a-z]+)?)\s*(seconds?|secs?|minutes?|mins?)\b")
        .expect("valid regex")
});

/// Unit a timer was requested in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerUnit {
    Seconds,
    Minutes,
}

/// A parsed timer request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub amount: u64,
    pub unit: TimerUnit,
}

impl TimerRequest {
    /// Total wait, saturating for absurdly large amounts
    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self.unit {
            TimerUnit::Seconds => Duration::from_secs(self.amount),
            TimerUnit::Minutes => Duration::from_secs(self.amount.saturating_mul(60)),
        }
    }

    /// Spoken form, e.g. "2 minutes"
    #[must_use]
    pub fn describe(&self) -> String {
        let unit = match (self.unit, self.amount) {
            (TimerUnit::Seconds, 1) => "second",
            (TimerUnit::Seconds, _) => "seconds",
            (TimerUnit::Minutes, 1) => "minute",
            (TimerUnit::Minutes, _) => "minutes",
        };
        format!("{} {unit}", self.amount)
    }
}

/// Parse "2 minutes", "forty secs", "twenty-five min" and similar
///
/// `text` is the part of the utterance after "set a timer for".
#[must_use]
pub fn parse_timer(text: &str) -> Option<TimerRequest> {
    let caps = DURATION_RE.captures(text.trim())?;

    let amount_text = caps.get(1)?.as_str();
    let amount = amount_text
        .parse::<u64>()
        .ok()
        .or_else(|| number_word(amount_text))?;
    if amount == 0 {
        return None;
    }

    let unit = if caps.get(2)?.as_str().starts_with("min") {
        TimerUnit::Minutes
    } else {
        TimerUnit::Seconds
    };

    Some(TimerRequest { amount, unit })
}

/// Small English number words (one through sixty, plus "a"/"an")
fn number_word(text: &str) -> Option<u64> {
    const ONES: [&str; 20] = [
        "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
        "eighteen", "nineteen",
    ];
    const TENS: [(&str, u64); 5] = [
        ("twenty", 20),
        ("thirty", 30),
        ("forty", 40),
        ("fifty", 50),
        ("sixty", 60),
    ];

    let ones = |word: &str| ONES.iter().position(|w| *w == word).map(|n| n as u64);
    let tens = |word: &str| TENS.iter().find(|(w, _)| *w == word).map(|(_, n)| *n);

    let mut words = text.split([' ', '-']).filter(|w| !w.is_empty());
    let first = words.next()?;
    let second = words.next();

    match second {
        None if first == "a" || first == "an" => Some(1),
        None => ones(first).or_else(|| tens(first)),
        Some(second) => {
            let base = tens(first).filter(|n| *n < 60)?;
            let unit = ones(second).filter(|n| (1..10).contains(n))?;
            Some(base + unit)
        }
    }
}

/// Schedules delayed announcements on independent tasks
#[derive(Clone)]
pub struct Timers {
    speech: SpeechController,
}

impl Timers {
    #[must_use]
    pub const fn new(speech: SpeechController) -> Self {
        Self { speech }
    }

    /// Speak [`TIMES_UP`] once after `after` has elapsed
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, after: Duration) -> JoinHandle<()> {
        let speech = self.speech.clone();
        tracing::info!(secs = after.as_secs(), "timer scheduled");

        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            tracing::info!("timer fired");
            speech.speak(TIMES_UP).wait().await;
        })
    }
}
