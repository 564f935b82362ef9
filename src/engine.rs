//! Turn engine
//!
//! Drives one conversation at a time through the duo, smart or broadcast
//! protocol. Every round is: send to the current speaker, wait for the
//! detector to call the reply complete, log it, decide who speaks next.
//!
//! The engine owns its active flag. Conversations never return an error to
//! the caller; every exit path writes a SYSTEM line saying why and then
//! returns a [`ConversationOutcome`].

mod broadcast;
mod duo;
pub mod prompts;
mod smart;
pub mod state;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod testing;

pub use state::{ConversationState, Roster, SetupError, Topology};

use crate::channel::{ChannelAdapter, ChannelError};
use crate::detector::{self, DetectError};
use crate::transcript::{ConversationLog, TranscriptEntry};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

/// Default cap on how long an observer gets to acknowledge a pass
pub const DEFAULT_OBSERVER_ACK_WAIT: Duration = Duration::from_secs(15);

/// Default pause between targets in [`TurnEngine::send_all`]
pub const DEFAULT_SEND_SPACING: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Capped again per channel so it is always shorter than a turn wait
    pub observer_ack_wait: Duration,
    pub send_spacing: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            observer_ack_wait: DEFAULT_OBSERVER_ACK_WAIT,
            send_spacing: DEFAULT_SEND_SPACING,
        }
    }
}

/// Why a conversation never started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    AlreadyActive,
    InvalidSetup(SetupError),
}

/// How a conversation finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    /// Ran out of rounds
    Completed { rounds: u32 },
    /// A participant said END CONVERSATION
    Ended { by: String, rounds: u32 },
    NoResponse { participant: String, rounds: u32 },
    SendFailed { participant: String, rounds: u32 },
    Rejected(Rejection),
}

/// Errors from the one-shot entry points
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("A conversation is already running")]
    ConversationActive,

    #[error("Unknown participant: {0}")]
    UnknownParticipant(String),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// A turn that could not complete. Terminal for the conversation.
#[derive(Debug, Error)]
pub(crate) enum TurnFailure {
    #[error("could not deliver to {participant}: {source}")]
    Send {
        participant: String,
        #[source]
        source: ChannelError,
    },

    #[error("{participant} did not respond: {source}")]
    NoResponse {
        participant: String,
        #[source]
        source: DetectError,
    },
}

/// Normal ways a protocol loop stops
#[derive(Debug)]
pub(crate) enum Exit {
    Exhausted,
    Ended { by: String },
}

/// Clears the active flag when the conversation's future finishes or is
/// dropped.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TurnEngine {
    channels: HashMap<String, Arc<dyn ChannelAdapter>>,
    log: Arc<dyn ConversationLog>,
    settings: EngineSettings,
    active: AtomicBool,
}

impl TurnEngine {
    pub fn new(log: Arc<dyn ConversationLog>) -> Self {
        Self {
            channels: HashMap::new(),
            log,
            settings: EngineSettings::default(),
            active: AtomicBool::new(false),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Register a channel under its lowercased name, replacing any channel
    /// already registered under that name.
    pub fn register(&mut self, channel: Arc<dyn ChannelAdapter>) {
        let name = channel.name().to_lowercase();
        if self.channels.insert(name.clone(), channel).is_some() {
            tracing::warn!(channel = %name, "Replaced existing channel");
        } else {
            tracing::debug!(channel = %name, "Registered channel");
        }
    }

    /// Registered participant names, sorted
    pub fn participants(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.channels.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn try_begin(&self) -> Option<ActiveGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ActiveGuard(&self.active))
    }

    /// Two participants take turns; `starter` (default `a`) opens each round.
    pub async fn start_duo(
        &self,
        a: &str,
        b: &str,
        rounds: u32,
        initial_prompt: Option<&str>,
        starter: Option<&str>,
    ) -> ConversationOutcome {
        self.run_conversation(Topology::Duo, &[a, b], rounds, initial_prompt, starter)
            .await
    }

    /// Round-robin among three or more participants with PASS, REDIRECT and
    /// END directives.
    pub async fn start_smart(
        &self,
        participants: &[&str],
        rounds: u32,
        initial_prompt: Option<&str>,
        starter: Option<&str>,
    ) -> ConversationOutcome {
        self.run_conversation(Topology::Smart, participants, rounds, initial_prompt, starter)
            .await
    }

    /// Like smart mode, but PASS needs inline content and everyone else
    /// gets a notice they are not expected to answer.
    pub async fn start_broadcast(
        &self,
        participants: &[&str],
        rounds: u32,
        initial_prompt: Option<&str>,
    ) -> ConversationOutcome {
        self.run_conversation(Topology::Broadcast, participants, rounds, initial_prompt, None)
            .await
    }

    /// Deliver one message to one participant without waiting for a reply
    pub async fn send_once(&self, participant: &str, text: &str) -> Result<(), EngineError> {
        let _active = self.try_begin().ok_or(EngineError::ConversationActive)?;
        let name = participant.trim().to_lowercase();
        let channel = self
            .channels
            .get(&name)
            .ok_or_else(|| EngineError::UnknownParticipant(name.clone()))?;

        self.deliver(&**channel, &name, text).await?;
        tracing::info!(participant = %name, "Message sent");
        Ok(())
    }

    /// Deliver the same message to each participant in turn, pausing
    /// between targets. A failed target does not stop the sweep.
    pub async fn send_all(
        &self,
        participants: &[&str],
        text: &str,
    ) -> Result<Vec<(String, Result<(), ChannelError>)>, EngineError> {
        let _active = self.try_begin().ok_or(EngineError::ConversationActive)?;

        let mut targets = Vec::with_capacity(participants.len());
        for participant in participants {
            let name = participant.trim().to_lowercase();
            let channel = self
                .channels
                .get(&name)
                .ok_or_else(|| EngineError::UnknownParticipant(name.clone()))?;
            targets.push((name, channel));
        }

        let mut results = Vec::with_capacity(targets.len());
        for (i, (name, channel)) in targets.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.send_spacing).await;
            }
            let result = self.deliver(&**channel, &name, text).await;
            match &result {
                Ok(()) => tracing::info!(participant = %name, "Message sent"),
                Err(e) => tracing::warn!(participant = %name, error = %e, "Send failed"),
            }
            results.push((name, result));
        }
        Ok(results)
    }

    async fn run_conversation(
        &self,
        topology: Topology,
        names: &[&str],
        rounds: u32,
        initial_prompt: Option<&str>,
        starter: Option<&str>,
    ) -> ConversationOutcome {
        let Some(_active) = self.try_begin() else {
            tracing::warn!(%topology, "Conversation already active, ignoring start request");
            return ConversationOutcome::Rejected(Rejection::AlreadyActive);
        };

        let mut state = match self.prepare(topology, names, starter, rounds) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(%topology, error = %e, "Cannot start conversation");
                self.system(format!("Cannot start {topology} conversation: {e}"))
                    .await;
                return ConversationOutcome::Rejected(Rejection::InvalidSetup(e));
            }
        };

        let span = tracing::info_span!(
            "conversation",
            id = %Uuid::new_v4(),
            %topology,
        );

        async {
            tracing::info!(
                participants = %state.roster().joined(),
                rounds,
                starter = state.current(),
                "Conversation started"
            );
            self.system(opening_line(&state)).await;
            if let Some(prompt) = initial_prompt {
                self.system(format!("Initial prompt: {prompt}")).await;
            }

            let result = match topology {
                Topology::Duo => self.run_duo(&mut state, initial_prompt).await,
                Topology::Smart => self.run_smart(&mut state, initial_prompt).await,
                Topology::Broadcast => self.run_broadcast(&mut state, initial_prompt).await,
            };
            self.conclude(&state, result).await
        }
        .instrument(span)
        .await
    }

    fn prepare(
        &self,
        topology: Topology,
        names: &[&str],
        starter: Option<&str>,
        rounds: u32,
    ) -> Result<ConversationState, SetupError> {
        let roster = Roster::new(topology, names)?;
        if let Some(unknown) = roster
            .names()
            .iter()
            .find(|n| !self.channels.contains_key(n.as_str()))
        {
            return Err(SetupError::UnknownParticipant(unknown.clone()));
        }
        ConversationState::new(topology, roster, starter, rounds)
    }

    async fn conclude(
        &self,
        state: &ConversationState,
        result: Result<Exit, TurnFailure>,
    ) -> ConversationOutcome {
        let rounds = state.round();
        match result {
            Ok(Exit::Exhausted) => {
                tracing::info!(rounds, "Conversation completed");
                self.system(format!("Conversation completed after {rounds} rounds"))
                    .await;
                ConversationOutcome::Completed { rounds }
            }
            Ok(Exit::Ended { by }) => {
                tracing::info!(rounds, %by, "Conversation ended by participant");
                self.system(format!("Conversation ended by {by} after {rounds} rounds"))
                    .await;
                ConversationOutcome::Ended { by, rounds }
            }
            Err(failure) => {
                tracing::warn!(rounds, error = %failure, "Conversation aborted");
                self.system(format!("Conversation aborted in round {rounds}: {failure}"))
                    .await;
                match failure {
                    TurnFailure::Send { participant, .. } => {
                        ConversationOutcome::SendFailed { participant, rounds }
                    }
                    TurnFailure::NoResponse { participant, .. } => {
                        ConversationOutcome::NoResponse { participant, rounds }
                    }
                }
            }
        }
    }

    /// Transcript writes never stop a conversation
    async fn record(&self, entry: TranscriptEntry) {
        if let Err(e) = self.log.append(&entry).await {
            tracing::warn!(error = %e, "Failed to write transcript entry");
        }
    }

    async fn system(&self, text: impl Into<String>) {
        self.record(TranscriptEntry::system(text)).await;
    }

    fn channel(&self, name: &str) -> Result<&Arc<dyn ChannelAdapter>, ChannelError> {
        self.channels
            .get(name)
            .ok_or_else(|| ChannelError::send_failure(name, "channel is not registered"))
    }

    /// Focus, send, and log what was sent
    async fn deliver(
        &self,
        channel: &dyn ChannelAdapter,
        name: &str,
        text: &str,
    ) -> Result<(), ChannelError> {
        channel.focus().await;
        tracing::debug!(participant = %name, chars = text.chars().count(), "Sending");
        channel.send(text).await?;
        self.record(TranscriptEntry::sent_to(name, text)).await;
        Ok(())
    }

    /// One full turn: deliver `message` to `name`, wait for the reply,
    /// log it and remember it.
    async fn take_turn(
        &self,
        state: &mut ConversationState,
        name: &str,
        message: &str,
    ) -> Result<String, TurnFailure> {
        let send_failure = |source| TurnFailure::Send {
            participant: name.to_string(),
            source,
        };
        let channel = self.channel(name).map_err(send_failure)?;

        tracing::info!(
            round = state.round(),
            speaker = %name,
            previous = state.previous(),
            "Turn"
        );
        self.deliver(&**channel, name, message)
            .await
            .map_err(send_failure)?;

        let reply = detector::await_response(&**channel, state.last_seen(name))
            .await
            .map_err(|source| TurnFailure::NoResponse {
                participant: name.to_string(),
                source,
            })?;

        self.record(TranscriptEntry::reply_from(name, &reply)).await;
        state.record_reply(name, &reply);
        Ok(reply)
    }

    /// One-way message that is never awaited; failures are only logged
    async fn notify(&self, name: &str, text: &str) {
        let result = match self.channel(name) {
            Ok(channel) => self.deliver(&**channel, name, text).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::debug!(participant = %name, error = %e, "Notice not delivered");
        }
    }

    /// Tell everyone but `speaker` that the conversation is over
    async fn announce_end(&self, state: &ConversationState, speaker: &str, notice: &str) {
        for other in state.roster().others(&[speaker]) {
            self.notify(&other, notice).await;
        }
    }
}

fn opening_line(state: &ConversationState) -> String {
    let rounds = state.round_limit();
    match state.topology() {
        Topology::Duo => {
            let names = state.roster().names();
            format!(
                "Started conversation between {} and {} for {rounds} rounds",
                names[0], names[1]
            )
        }
        topology => format!(
            "Started {topology} conversation with participants: {} for {rounds} rounds",
            state.roster().joined()
        ),
    }
}
