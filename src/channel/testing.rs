//! Mock channels for testing
//!
//! These mocks let the detector and the engine run against scripted chat
//! surfaces on virtual time.

use super::{ChannelAdapter, ChannelError, ChannelProfile};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// What the surface does after the next send
#[derive(Debug, Clone)]
pub enum Reply {
    /// Final text shows up on the next poll
    Text(String),
    /// One frame per poll; the last frame stays visible
    Frames(Vec<String>),
    /// Nothing new ever appears
    Silent,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn frames<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Reply::Frames(frames.into_iter().map(Into::into).collect())
    }
}

#[derive(Default)]
struct Surface {
    visible: String,
    frames: VecDeque<String>,
    replies: VecDeque<Reply>,
    sent: Vec<String>,
    observations: usize,
    focus_calls: usize,
}

/// Scripted chat surface: each send consumes the next queued [`Reply`]
pub struct ScriptedChannel {
    name: String,
    profile: ChannelProfile,
    fail_sends: bool,
    surface: Mutex<Surface>,
}

impl ScriptedChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profile: test_profile(),
            fail_sends: false,
            surface: Mutex::new(Surface::default()),
        }
    }

    /// A channel whose input surface can never be found
    pub fn unreachable(name: impl Into<String>) -> Self {
        Self {
            fail_sends: true,
            ..Self::new(name)
        }
    }

    pub fn with_profile(mut self, profile: ChannelProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.surface.lock().unwrap().replies.extend(replies);
        self
    }

    /// Queue plain-text replies
    pub fn replying<I, S>(self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_replies(replies.into_iter().map(Reply::text))
    }

    pub fn sent(&self) -> Vec<String> {
        self.surface.lock().unwrap().sent.clone()
    }

    pub fn observations(&self) -> usize {
        self.surface.lock().unwrap().observations
    }

    pub fn focus_calls(&self) -> usize {
        self.surface.lock().unwrap().focus_calls
    }
}

/// Fast timing so tests on virtual time stay short
pub fn test_profile() -> ChannelProfile {
    ChannelProfile::new(Duration::from_secs(10), 2).with_poll_interval(Duration::from_millis(100))
}

#[async_trait]
impl ChannelAdapter for ScriptedChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn profile(&self) -> &ChannelProfile {
        &self.profile
    }

    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        if self.fail_sends {
            return Err(ChannelError::send_failure(&self.name, "no input found"));
        }
        let mut surface = self.surface.lock().unwrap();
        surface.sent.push(text.to_string());
        match surface.replies.pop_front().unwrap_or(Reply::Silent) {
            Reply::Text(text) => surface.frames = VecDeque::from([text]),
            Reply::Frames(frames) => surface.frames = frames.into(),
            Reply::Silent => surface.frames.clear(),
        }
        Ok(())
    }

    async fn observe_latest(&self, _prior: &str) -> Result<String, ChannelError> {
        let mut surface = self.surface.lock().unwrap();
        surface.observations += 1;
        if let Some(frame) = surface.frames.pop_front() {
            surface.visible = frame;
        }
        Ok(surface.visible.clone())
    }

    async fn focus(&self) {
        self.surface.lock().unwrap().focus_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_frames_then_sticky() {
        let channel = ScriptedChannel::new("a").with_replies([Reply::frames(["one", "two"])]);
        channel.send("hi").await.unwrap();

        assert_eq!(channel.observe_latest("").await.unwrap(), "one");
        assert_eq!(channel.observe_latest("").await.unwrap(), "two");
        assert_eq!(channel.observe_latest("").await.unwrap(), "two");
        assert_eq!(channel.observations(), 3);
        assert_eq!(channel.sent(), vec!["hi".to_string()]);
    }

    #[tokio::test]
    async fn test_unqueued_send_is_silent() {
        let channel = ScriptedChannel::new("a").replying(["first"]);
        channel.send("1").await.unwrap();
        assert_eq!(channel.observe_latest("").await.unwrap(), "first");

        channel.send("2").await.unwrap();
        assert_eq!(channel.observe_latest("first").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn test_unreachable_channel() {
        let channel = ScriptedChannel::unreachable("a");
        let err = channel.send("hi").await.unwrap_err();
        assert!(matches!(err, ChannelError::SendFailure { .. }));
        assert!(channel.sent().is_empty());
    }
}
