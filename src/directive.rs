//! Control directives embedded in participant replies
//!
//! The grammar is plain prose with no escaping, checked in priority order:
//! `PASS TO <name>[: <content>]`, then `REDIRECT`, then `END CONVERSATION`.
//! Anything else is an ordinary reply. A participant who happens to write
//! "redirect" in passing will be read as redirecting.

#[cfg(test)]
mod proptests;

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static PASS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)PASS TO (\w+)(?::\s*(.*))?").expect("pass pattern is valid")
});

static PASS_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)PASS TO \w+").expect("pass phrase pattern is valid"));

static PASS_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)PASS TO").expect("pass split pattern is valid"));

static REDIRECT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)REDIRECT").expect("redirect pattern is valid"));

const END_PHRASE: &str = "END CONVERSATION";

/// Parsed control intent of one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Plain reply; the turn moves on in round-robin order
    Respond { content: String },
    /// Hand the next turn to `target` (lowercased)
    Pass {
        target: String,
        content: String,
        /// Content came from an explicit `: <content>` suffix
        inline: bool,
    },
    /// Bounce the turn back to the previous speaker
    Redirect { content: String },
    End { content: String },
}

impl Directive {
    pub fn kind(&self) -> &'static str {
        match self {
            Directive::Respond { .. } => "respond",
            Directive::Pass { .. } => "pass",
            Directive::Redirect { .. } => "redirect",
            Directive::End { .. } => "end",
        }
    }
}

/// A PASS that cannot be honored
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTarget {
    #[error("{speaker} tried to pass to unknown participant \"{target}\"")]
    Unknown { speaker: String, target: String },
    #[error("{speaker} tried to pass to themselves")]
    SelfPass { speaker: String },
    #[error("{speaker} passed to {target} without an inline message")]
    MissingContent { speaker: String, target: String },
}

/// Read the directive out of a completed reply
pub fn parse(text: &str) -> Directive {
    if let Some(caps) = PASS_PATTERN.captures(text) {
        let target = caps[1].to_lowercase();
        let inline = caps
            .get(2)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty());

        return match inline {
            Some(content) => Directive::Pass {
                target,
                content: content.to_string(),
                inline: true,
            },
            None => Directive::Pass {
                target,
                content: non_empty_or(PASS_PHRASE.replace(text, "").trim(), text),
                inline: false,
            },
        };
    }

    if text.to_uppercase().contains("REDIRECT") {
        return Directive::Redirect {
            content: non_empty_or(REDIRECT_TOKEN.replace(text, "").trim(), text),
        };
    }

    if text.to_uppercase().contains(END_PHRASE) {
        return Directive::End {
            content: text.to_string(),
        };
    }

    Directive::Respond {
        content: text.to_string(),
    }
}

/// Reply text before the first `PASS TO`
pub fn preamble(text: &str) -> &str {
    PASS_SPLIT
        .splitn(text, 2)
        .next()
        .unwrap_or(text)
        .trim()
}

fn non_empty_or(candidate: &str, fallback: &str) -> String {
    if candidate.is_empty() {
        fallback.to_string()
    } else {
        candidate.to_string()
    }
}
