//! Built-in chat sites
//!
//! Each site carries its URL, its input and reply selector chains, and the
//! timing that suits how it streams. Everything here can be overridden from
//! a JSON file (see [`crate::config`]).

use super::{ChannelProfile, KeywordFilter, DEFAULT_MAX_WAIT, DEFAULT_STABILITY_THRESHOLD};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Replies this short are usually a streaming artifact, not an answer
const SITE_MIN_RESPONSE_CHARS: usize = 11;

/// Everything needed to drive one chat site
#[derive(Debug, Clone, PartialEq)]
pub struct SiteSpec {
    pub name: String,
    pub url: Option<String>,
    pub input_selectors: Vec<String>,
    pub response_selectors: Vec<String>,
    pub max_wait: Duration,
    pub poll_interval: Duration,
    pub stability_threshold: u32,
    pub min_response_chars: usize,
    pub provisional_keywords: Option<Vec<String>>,
    pub provisional_max_len: Option<usize>,
}

/// Per-site overrides loaded from the sites file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteOverride {
    pub url: Option<String>,
    pub input_selectors: Option<Vec<String>>,
    pub response_selectors: Option<Vec<String>>,
    pub max_wait_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub stability_threshold: Option<u32>,
    pub min_response_chars: Option<usize>,
    pub provisional_keywords: Option<Vec<String>>,
    pub provisional_max_len: Option<usize>,
}

struct BuiltinSite {
    name: &'static str,
    url: &'static str,
    max_wait_secs: u64,
    stability_threshold: u32,
    input: &'static [&'static str],
    response: &'static [&'static str],
}

const BUILTIN_SITES: &[BuiltinSite] = &[
    BuiltinSite {
        name: "chatgpt",
        url: "https://chat.openai.com",
        max_wait_secs: 60,
        stability_threshold: 2,
        input: &[
            "#prompt-textarea",
            "textarea[placeholder*=\"message\"]",
            "div[contenteditable=\"true\"]",
        ],
        response: &[
            "[data-message-author-role=\"assistant\"]",
            "div.markdown.prose",
            "div[class*=\"markdown\"]",
        ],
    },
    BuiltinSite {
        name: "claude",
        url: "https://claude.ai",
        max_wait_secs: 60,
        stability_threshold: 2,
        input: &[
            "div[contenteditable=\"true\"][role=\"textbox\"]",
            ".ProseMirror",
            "div[contenteditable=\"true\"]",
        ],
        response: &["div[data-testid=\"message-content\"]", ".font-claude-message", "div.prose"],
    },
    BuiltinSite {
        name: "zeph",
        url: "https://zeph.symboliccapital.net/",
        max_wait_secs: 90,
        stability_threshold: 3,
        input: &["textarea", "div[contenteditable=\"true\"]"],
        response: &[".markdown-prose", "div[class*=\"markdown\"]", ".message-content"],
    },
    BuiltinSite {
        name: "copilot",
        url: "https://copilot.microsoft.com/",
        max_wait_secs: 45,
        stability_threshold: 2,
        input: &["textarea#userInput", "textarea", "div[contenteditable=\"true\"]"],
        response: &[
            "div[data-content=\"ai-message\"]",
            "div[class*=\"group/ai-message-item\"]",
            "[role=\"article\"]",
        ],
    },
    BuiltinSite {
        name: "gemini",
        url: "https://gemini.google.com/",
        max_wait_secs: 45,
        stability_threshold: 2,
        input: &[
            "div.ql-editor[contenteditable=\"true\"]",
            "rich-textarea div[contenteditable=\"true\"]",
            "textarea",
        ],
        response: &["message-content", ".model-response-text", "div[data-response-index]"],
    },
    BuiltinSite {
        name: "grok",
        url: "https://grok.com/",
        max_wait_secs: 60,
        stability_threshold: 2,
        input: &["textarea[aria-label*=\"Ask\"]", "textarea", "div[contenteditable=\"true\"]"],
        response: &["div.message-bubble", "div[class*=\"prose\"]", "div[class*=\"markdown\"]"],
    },
];

/// Names of the sites known without any configuration
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_SITES.iter().map(|s| s.name)
}

impl SiteSpec {
    /// The built-in definition for `name`, if there is one
    pub fn builtin(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        BUILTIN_SITES
            .iter()
            .find(|s| s.name == name)
            .map(|s| Self {
                name: s.name.to_string(),
                url: Some(s.url.to_string()),
                input_selectors: s.input.iter().map(ToString::to_string).collect(),
                response_selectors: s.response.iter().map(ToString::to_string).collect(),
                max_wait: Duration::from_secs(s.max_wait_secs),
                poll_interval: super::DEFAULT_POLL_INTERVAL,
                stability_threshold: s.stability_threshold,
                min_response_chars: SITE_MIN_RESPONSE_CHARS,
                provisional_keywords: None,
                provisional_max_len: None,
            })
    }

    /// A site with no selectors; only usable once an override fills it in
    pub fn blank(name: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            url: None,
            input_selectors: Vec::new(),
            response_selectors: Vec::new(),
            max_wait: DEFAULT_MAX_WAIT,
            poll_interval: super::DEFAULT_POLL_INTERVAL,
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
            min_response_chars: SITE_MIN_RESPONSE_CHARS,
            provisional_keywords: None,
            provisional_max_len: None,
        }
    }

    pub fn apply(&mut self, over: &SiteOverride) {
        if let Some(url) = &over.url {
            self.url = Some(url.clone());
        }
        if let Some(input) = &over.input_selectors {
            self.input_selectors.clone_from(input);
        }
        if let Some(response) = &over.response_selectors {
            self.response_selectors.clone_from(response);
        }
        if let Some(ms) = over.max_wait_ms {
            self.max_wait = Duration::from_millis(ms);
        }
        if let Some(ms) = over.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(threshold) = over.stability_threshold {
            self.stability_threshold = threshold;
        }
        if let Some(min) = over.min_response_chars {
            self.min_response_chars = min;
        }
        if let Some(keywords) = &over.provisional_keywords {
            self.provisional_keywords = Some(keywords.clone());
        }
        if let Some(max_len) = over.provisional_max_len {
            self.provisional_max_len = Some(max_len);
        }
    }

    /// Whether the adapter has enough to find its way around the page
    pub fn is_drivable(&self) -> bool {
        !self.input_selectors.is_empty() && !self.response_selectors.is_empty()
    }

    pub fn profile(&self) -> ChannelProfile {
        let mut filter = match &self.provisional_keywords {
            Some(keywords) => KeywordFilter::new(keywords.iter().cloned()),
            None => KeywordFilter::default(),
        };
        if let Some(max_len) = self.provisional_max_len {
            filter = filter.with_max_len(max_len);
        }
        ChannelProfile::new(self.max_wait, self.stability_threshold)
            .with_poll_interval(self.poll_interval)
            .with_min_response_chars(self.min_response_chars)
            .with_provisional(Arc::new(filter))
    }
}
