//! Conversational endpoints
//!
//! A channel is one chat surface the relay can type into and read back
//! from. The engine only talks to channels through [`ChannelAdapter`];
//! selectors, tabs and text-insertion tricks stay behind the trait.

pub mod browser;
mod provisional;
pub mod sites;

#[cfg(test)]
pub mod testing;

pub use browser::BrowserHub;
pub use provisional::{KeywordFilter, ProvisionalFilter};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default poll interval while waiting for a reply
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Default wait for sites without their own timing
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(40);

/// Default number of identical polls before a reply counts as finished
pub const DEFAULT_STABILITY_THRESHOLD: u32 = 2;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// No reachable input surface after every strategy was tried
    #[error("No usable input surface on {channel}: {reason}")]
    SendFailure { channel: String, reason: String },

    #[error("Failed to read {channel}: {reason}")]
    Observe { channel: String, reason: String },

    #[error("Browser error: {0}")]
    Browser(String),
}

impl ChannelError {
    pub fn send_failure(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SendFailure {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    pub fn observe(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Observe {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for ChannelError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ChannelError::Browser(e.to_string())
    }
}

/// Timing and completion heuristics for one channel.
///
/// Slow or bursty sites get a longer `max_wait` and a higher
/// `stability_threshold`.
#[derive(Clone)]
pub struct ChannelProfile {
    pub max_wait: Duration,
    pub poll_interval: Duration,
    pub stability_threshold: u32,
    /// Replies shorter than this (in chars, after trimming) are treated as
    /// not yet started
    pub min_response_chars: usize,
    pub provisional: Arc<dyn ProvisionalFilter>,
}

impl ChannelProfile {
    pub fn new(max_wait: Duration, stability_threshold: u32) -> Self {
        Self {
            max_wait,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stability_threshold: stability_threshold.max(1),
            min_response_chars: 1,
            provisional: Arc::new(KeywordFilter::default()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_min_response_chars(mut self, min: usize) -> Self {
        self.min_response_chars = min.max(1);
        self
    }

    pub fn with_provisional(mut self, filter: Arc<dyn ProvisionalFilter>) -> Self {
        self.provisional = filter;
        self
    }

    /// Same heuristics with the wait capped at `cap`, and always strictly
    /// shorter than this profile's own wait.
    pub fn bounded(&self, cap: Duration) -> Self {
        let ceiling = self.max_wait.saturating_sub(Duration::from_millis(1));
        Self {
            max_wait: cap.min(ceiling),
            ..self.clone()
        }
    }
}

impl Default for ChannelProfile {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WAIT, DEFAULT_STABILITY_THRESHOLD)
    }
}

impl fmt::Debug for ChannelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelProfile")
            .field("max_wait", &self.max_wait)
            .field("poll_interval", &self.poll_interval)
            .field("stability_threshold", &self.stability_threshold)
            .field("min_response_chars", &self.min_response_chars)
            .finish_non_exhaustive()
    }
}

/// One conversational endpoint
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Participant name this channel answers to
    fn name(&self) -> &str;

    /// Timing used when waiting on this channel
    fn profile(&self) -> &ChannelProfile;

    /// Submit text through the endpoint's input surface
    async fn send(&self, text: &str) -> Result<(), ChannelError>;

    /// Current visible reply text. Must never return the contents of the
    /// outbound input surface.
    async fn observe_latest(&self, prior: &str) -> Result<String, ChannelError>;

    /// Bring the endpoint to the foreground. Best-effort.
    async fn focus(&self);
}

#[async_trait]
impl<T: ChannelAdapter + ?Sized> ChannelAdapter for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn profile(&self) -> &ChannelProfile {
        (**self).profile()
    }

    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        (**self).send(text).await
    }

    async fn observe_latest(&self, prior: &str) -> Result<String, ChannelError> {
        (**self).observe_latest(prior).await
    }

    async fn focus(&self) {
        (**self).focus().await;
    }
}
