//! Engine test harness

use super::{EngineSettings, TurnEngine};
use crate::channel::testing::ScriptedChannel;
use crate::channel::ChannelAdapter;
use crate::transcript::memory::MemoryLog;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// An engine wired to scripted channels and an in-memory transcript
pub struct Harness {
    pub engine: TurnEngine,
    pub log: Arc<MemoryLog>,
    channels: HashMap<String, Arc<ScriptedChannel>>,
}

impl Harness {
    pub fn new(channels: impl IntoIterator<Item = ScriptedChannel>) -> Self {
        let log = Arc::new(MemoryLog::new());
        let mut engine = TurnEngine::new(log.clone()).with_settings(Self::settings());
        let mut by_name = HashMap::new();

        for channel in channels {
            let channel = Arc::new(channel);
            engine.register(channel.clone());
            by_name.insert(channel.name().to_lowercase(), channel);
        }

        Self {
            engine,
            log,
            channels: by_name,
        }
    }

    /// Observer acks get 3s; the scripted turn wait is 10s
    pub fn settings() -> EngineSettings {
        EngineSettings {
            observer_ack_wait: Duration::from_secs(3),
            send_spacing: Duration::from_millis(200),
        }
    }

    pub fn channel(&self, name: &str) -> &ScriptedChannel {
        &self.channels[name]
    }

    /// Messages delivered to `name`, in order
    pub fn sent(&self, name: &str) -> Vec<String> {
        self.channel(name).sent()
    }
}
