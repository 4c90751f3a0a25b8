//! Joke sources

use rand::seq::SliceRandom;

use crate::{Error, Result};

/// Something that can tell a joke
pub trait JokeSource: Send + Sync {
    /// Produce one joke
    ///
    /// # Errors
    ///
    /// Returns error if no joke is available
    fn joke(&self) -> Result<String>;
}

const JOKES: &[&str] = &[
    "Why do programmers prefer dark mode? Because light attracts bugs.",
    "There are only 10 kinds of people in this world: those who know binary and those who don't.",
    "A SQL query walks into a bar, walks up to two tables and asks, can I join you?",
    "Why did the developer go broke? Because he used up all his cache.",
    "I would tell you a UDP joke, but you might not get it.",
    "Debugging is like being the detective in a crime movie where you are also the murderer.",
    "Why do Java developers wear glasses? Because they don't C sharp.",
    "How many programmers does it take to change a light bulb? None, that's a hardware problem.",
    "The best thing about a boolean is that even if you are wrong, you are only off by a bit.",
    "To understand recursion, you must first understand recursion.",
];

/// Bundled one-liners picked at random
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinJokes;

impl JokeSource for BuiltinJokes {
    fn joke(&self) -> Result<String> {
        JOKES
            .choose(&mut rand::thread_rng())
            .map(|j| (*j).to_string())
            .ok_or_else(|| Error::NotFound("no jokes bundled".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_joke_is_from_list() {
        let joke = BuiltinJokes.joke().unwrap();
        assert!(JOKES.contains(&joke.as_str()));
    }
}
