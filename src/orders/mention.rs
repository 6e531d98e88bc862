use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static MENTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\S+)").expect("hardcoded regex"));

/// Detects messages addressed to the bot.
#[derive(Debug, Clone)]
pub struct MentionDetector {
    names: HashSet<String>,
}

impl MentionDetector {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// True when any `@token` in `text` is exactly one of the bot's names.
    ///
    /// A token runs from the `@` to the next whitespace; matching is
    /// case-sensitive with no partial matches.
    pub fn is_mentioned(&self, text: &str) -> bool {
        if !text.contains('@') {
            return false;
        }
        MENTION_PATTERN
            .captures_iter(text)
            .any(|caps| self.names.contains(&caps[1]))
    }
}
