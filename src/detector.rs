//! Response stabilization
//!
//! Chat surfaces never say "done". A reply counts as complete once the same
//! text has been seen on `stability_threshold` consecutive polls after it
//! first appeared. Placeholder text ("thinking...") is skipped without
//! touching the counters.

use crate::channel::{ChannelAdapter, ChannelProfile};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("No response from {channel} (waited {}s)", waited.as_secs())]
    NoResponse { channel: String, waited: Duration },
}

/// What one poll told us
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Placeholder text; keep waiting
    Provisional,
    /// Nothing new (empty, too short, or still the previous reply)
    Waiting,
    /// First sight of new text
    Started,
    /// Text is still changing
    Changed,
    /// Same text as last poll, `n` times in a row
    Stable(u32),
    Complete(String),
}

/// Pure stability tracker, fed one observation per poll
pub struct Stabilizer<'a> {
    prior: &'a str,
    profile: &'a ChannelProfile,
    tracked: String,
    stable: u32,
}

impl<'a> Stabilizer<'a> {
    pub fn new(prior: &'a str, profile: &'a ChannelProfile) -> Self {
        Self {
            prior: prior.trim(),
            profile,
            tracked: String::new(),
            stable: 0,
        }
    }

    pub fn observe(&mut self, text: &str) -> PollOutcome {
        let text = text.trim();

        if self.profile.provisional.is_provisional(text) {
            return PollOutcome::Provisional;
        }
        if text.chars().count() < self.profile.min_response_chars || text == self.prior {
            return PollOutcome::Waiting;
        }

        if !self.tracked.is_empty() && text == self.tracked {
            self.stable += 1;
            if self.stable >= self.profile.stability_threshold {
                return PollOutcome::Complete(std::mem::take(&mut self.tracked));
            }
            return PollOutcome::Stable(self.stable);
        }

        let outcome = if self.tracked.is_empty() {
            PollOutcome::Started
        } else {
            PollOutcome::Changed
        };
        self.tracked = text.to_string();
        self.stable = 0;
        outcome
    }
}

/// Wait for `channel` to finish a reply, using its own profile
pub async fn await_response<C>(channel: &C, prior: &str) -> Result<String, DetectError>
where
    C: ChannelAdapter + ?Sized,
{
    await_with(channel, prior, channel.profile()).await
}

/// Wait for `channel` to finish a reply that differs from `prior`.
///
/// Polls every `profile.poll_interval` until the text holds still for
/// `profile.stability_threshold` polls, or `profile.max_wait` runs out.
pub async fn await_with<C>(
    channel: &C,
    prior: &str,
    profile: &ChannelProfile,
) -> Result<String, DetectError>
where
    C: ChannelAdapter + ?Sized,
{
    let name = channel.name();
    channel.focus().await;

    tracing::debug!(
        channel = %name,
        max_wait_s = profile.max_wait.as_secs(),
        poll_ms = profile.poll_interval.as_millis(),
        threshold = profile.stability_threshold,
        "Waiting for response"
    );

    let start = Instant::now();
    let mut stabilizer = Stabilizer::new(prior, profile);
    let mut empty_polls = 0u32;

    while start.elapsed() < profile.max_wait {
        match channel.observe_latest(prior).await {
            Ok(text) => {
                if text.trim().is_empty() {
                    empty_polls += 1;
                    if empty_polls == 5 || empty_polls % 15 == 0 {
                        tracing::debug!(channel = %name, empty_polls, "No reply text found yet");
                    }
                } else {
                    empty_polls = 0;
                }

                match stabilizer.observe(&text) {
                    PollOutcome::Complete(reply) => {
                        tracing::info!(
                            channel = %name,
                            chars = reply.chars().count(),
                            elapsed_ms = start.elapsed().as_millis(),
                            "Response complete"
                        );
                        return Ok(reply);
                    }
                    PollOutcome::Provisional => {
                        tracing::debug!(channel = %name, "Still thinking");
                    }
                    PollOutcome::Started => {
                        tracing::debug!(channel = %name, chars = text.len(), "Started responding");
                    }
                    PollOutcome::Changed => {
                        tracing::debug!(channel = %name, chars = text.len(), "Still typing");
                    }
                    PollOutcome::Stable(n) => {
                        tracing::debug!(
                            channel = %name,
                            stable = n,
                            threshold = profile.stability_threshold,
                            "Text stable"
                        );
                    }
                    PollOutcome::Waiting => {}
                }
            }
            Err(e) => {
                tracing::warn!(channel = %name, error = %e, "Polling error");
            }
        }

        tokio::time::sleep(profile.poll_interval).await;
    }

    tracing::warn!(
        channel = %name,
        waited_s = profile.max_wait.as_secs(),
        "Timed out waiting for response"
    );
    Err(DetectError::NoResponse {
        channel: name.to_string(),
        waited: profile.max_wait,
    })
}
