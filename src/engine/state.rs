//! Conversation state types

use crate::directive::InvalidTarget;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use thiserror::Error;

/// Replies kept for building continuation messages
pub const HISTORY_WINDOW: usize = 8;

/// Shape of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// Two fixed participants relaying to each other
    Duo,
    /// Round-robin with PASS, REDIRECT and END
    Smart,
    /// Round-robin with inline PASS and END, observers never awaited
    Broadcast,
}

impl Topology {
    fn accepts(self, count: usize) -> bool {
        match self {
            Topology::Duo => count == 2,
            Topology::Smart | Topology::Broadcast => count >= 3,
        }
    }

    fn requirement(self) -> &'static str {
        match self {
            Topology::Duo => "exactly 2",
            Topology::Smart | Topology::Broadcast => "at least 3",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topology::Duo => "duo",
            Topology::Smart => "smart",
            Topology::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

/// Reasons a conversation cannot start
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),
    #[error("Participant listed twice: {0}")]
    Duplicate(String),
    #[error("A {topology} conversation needs {needed} participants, got {got}")]
    WrongCount {
        topology: Topology,
        needed: &'static str,
        got: usize,
    },
    #[error("Starter {0} is not part of the conversation")]
    UnknownStarter(String),
}

/// Participants in their fixed cyclic speaking order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    names: Vec<String>,
}

impl Roster {
    /// Names are matched case-insensitively and stored lowercased
    pub fn new<S: AsRef<str>>(topology: Topology, names: &[S]) -> Result<Self, SetupError> {
        let mut normalized: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if normalized.contains(&name) {
                return Err(SetupError::Duplicate(name));
            }
            normalized.push(name);
        }
        if !topology.accepts(normalized.len()) {
            return Err(SetupError::WrongCount {
                topology,
                needed: topology.requirement(),
                got: normalized.len(),
            });
        }
        Ok(Self { names: normalized })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Next speaker in cyclic order
    pub fn next_after(&self, name: &str) -> &str {
        let next = self
            .names
            .iter()
            .position(|n| n == name)
            .map_or(0, |i| (i + 1) % self.names.len());
        &self.names[next]
    }

    /// Everyone except `excluded`, in roster order
    pub fn others(&self, excluded: &[&str]) -> Vec<String> {
        self.names
            .iter()
            .filter(|n| !excluded.contains(&n.as_str()))
            .cloned()
            .collect()
    }

    pub fn joined(&self) -> String {
        self.names.join(", ")
    }

    /// A PASS is honored only toward another member of the roster
    pub fn check_pass(&self, speaker: &str, target: &str) -> Result<(), InvalidTarget> {
        if target == speaker {
            return Err(InvalidTarget::SelfPass {
                speaker: speaker.to_string(),
            });
        }
        if !self.contains(target) {
            return Err(InvalidTarget::Unknown {
                speaker: speaker.to_string(),
                target: target.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    speaker: String,
    text: String,
}

/// State of the one running conversation
#[derive(Debug)]
pub struct ConversationState {
    topology: Topology,
    roster: Roster,
    current: String,
    previous: Option<String>,
    round: u32,
    round_limit: u32,
    history: VecDeque<HistoryEntry>,
    /// Last reply seen from each participant, so the detector can tell a
    /// new reply from the one already on screen
    last_seen: HashMap<String, String>,
}

impl ConversationState {
    pub fn new(
        topology: Topology,
        roster: Roster,
        starter: Option<&str>,
        round_limit: u32,
    ) -> Result<Self, SetupError> {
        let current = match starter {
            Some(name) => {
                let name = name.trim().to_lowercase();
                if !roster.contains(&name) {
                    return Err(SetupError::UnknownStarter(name));
                }
                name
            }
            None => roster.names[0].clone(),
        };

        Ok(Self {
            topology,
            roster,
            current,
            previous: None,
            round: 0,
            round_limit,
            history: VecDeque::with_capacity(HISTORY_WINDOW),
            last_seen: HashMap::new(),
        })
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn round_limit(&self) -> u32 {
        self.round_limit
    }

    pub fn has_rounds_left(&self) -> bool {
        self.round < self.round_limit
    }

    /// Start the next round and return its number (1-based)
    pub fn begin_round(&mut self) -> u32 {
        debug_assert!(self.has_rounds_left());
        self.round += 1;
        self.round
    }

    /// Record a participant's turn reply
    pub fn record_reply(&mut self, speaker: &str, text: &str) {
        if self.history.len() == HISTORY_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
        self.remember(speaker, text);
    }

    /// Note what is on a participant's screen without adding it to history
    pub fn remember(&mut self, speaker: &str, text: &str) {
        self.last_seen.insert(speaker.to_string(), text.to_string());
    }

    pub fn last_seen(&self, speaker: &str) -> &str {
        self.last_seen.get(speaker).map_or("", String::as_str)
    }

    /// The last `n` replies as `speaker: text` blocks
    pub fn recent(&self, n: usize) -> String {
        let skip = self.history.len().saturating_sub(n);
        self.history
            .iter()
            .skip(skip)
            .map(|e| format!("{}: {}", e.speaker, e.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Round-robin to the next participant
    pub fn advance(&mut self) {
        let next = self.roster.next_after(&self.current).to_string();
        self.hand_to(&next);
    }

    /// Give the turn to `name`, who must be on the roster
    pub fn hand_to(&mut self, name: &str) {
        debug_assert!(self.roster.contains(name));
        let prev = std::mem::replace(&mut self.current, name.to_string());
        self.previous = Some(prev);
    }

    /// Swap current and previous speaker. Returns the new current speaker,
    /// or `None` when nobody has spoken before.
    pub fn bounce_back(&mut self) -> Option<&str> {
        let prev = self.previous.take()?;
        let cur = std::mem::replace(&mut self.current, prev);
        self.previous = Some(cur);
        Some(&self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> Roster {
        Roster::new(Topology::Smart, names).unwrap()
    }

    #[test]
    fn test_roster_normalizes_and_validates() {
        let r = roster(&["ChatGPT", "claude", " Zeph "]);
        assert_eq!(r.names(), &["chatgpt", "claude", "zeph"]);

        assert_eq!(
            Roster::new(Topology::Smart, &["a", "A", "b"]),
            Err(SetupError::Duplicate("a".into()))
        );
        assert!(matches!(
            Roster::new(Topology::Broadcast, &["a", "b"]),
            Err(SetupError::WrongCount { got: 2, .. })
        ));
        assert!(matches!(
            Roster::new(Topology::Duo, &["a", "b", "c"]),
            Err(SetupError::WrongCount { got: 3, .. })
        ));
        assert!(Roster::new(Topology::Duo, &["a", "b"]).is_ok());
    }

    #[test]
    fn test_next_after_wraps() {
        let r = roster(&["a", "b", "c"]);
        assert_eq!(r.next_after("a"), "b");
        assert_eq!(r.next_after("c"), "a");
    }

    #[test]
    fn test_check_pass() {
        let r = roster(&["a", "b", "c"]);
        assert!(r.check_pass("a", "b").is_ok());
        assert!(matches!(r.check_pass("a", "a"), Err(InvalidTarget::SelfPass { .. })));
        assert!(matches!(r.check_pass("a", "z"), Err(InvalidTarget::Unknown { .. })));
    }

    #[test]
    fn test_others_excludes() {
        let r = roster(&["s", "t", "o1", "o2"]);
        assert_eq!(r.others(&["s", "t"]), vec!["o1".to_string(), "o2".to_string()]);
    }

    #[test]
    fn test_starter_must_be_listed() {
        let err = ConversationState::new(Topology::Smart, roster(&["a", "b", "c"]), Some("d"), 3)
            .unwrap_err();
        assert_eq!(err, SetupError::UnknownStarter("d".into()));

        let roster = roster(&["a", "b", "c"]);
        let state = ConversationState::new(Topology::Smart, roster, Some("B"), 3).unwrap();
        assert_eq!(state.current(), "b");
        assert_eq!(state.previous(), None);
    }

    #[test]
    fn test_bounce_back_swaps() {
        let mut state =
            ConversationState::new(Topology::Smart, roster(&["a", "b", "c"]), None, 3).unwrap();
        assert_eq!(state.bounce_back(), None);

        state.advance();
        assert_eq!((state.current(), state.previous()), ("b", Some("a")));
        assert_eq!(state.bounce_back(), Some("a"));
        assert_eq!(state.previous(), Some("b"));
    }

    #[test]
    fn test_recent_window() {
        let mut state =
            ConversationState::new(Topology::Smart, roster(&["a", "b", "c"]), None, 3).unwrap();
        for i in 0..(HISTORY_WINDOW + 3) {
            state.record_reply("a", &format!("msg {i}"));
        }
        assert_eq!(
            state.recent(2),
            format!("a: msg {}\n\na: msg {}", HISTORY_WINDOW + 1, HISTORY_WINDOW + 2)
        );
        assert_eq!(state.recent(100).matches("a: ").count(), HISTORY_WINDOW);
        assert_eq!(state.last_seen("a"), format!("msg {}", HISTORY_WINDOW + 2));
        assert_eq!(state.last_seen("b"), "");
    }

    #[test]
    fn test_rounds_are_bounded() {
        let mut state =
            ConversationState::new(Topology::Smart, roster(&["a", "b", "c"]), None, 2).unwrap();
        assert_eq!(state.begin_round(), 1);
        assert_eq!(state.begin_round(), 2);
        assert!(!state.has_rounds_left());
    }
}
