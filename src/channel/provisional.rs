//! Placeholder detection for replies that have not really started yet

/// Decides whether visible text is a "still thinking" placeholder rather
/// than the start of a real reply.
pub trait ProvisionalFilter: Send + Sync {
    fn is_provisional(&self, text: &str) -> bool;
}

impl<F> ProvisionalFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_provisional(&self, text: &str) -> bool {
        self(text)
    }
}

const DEFAULT_KEYWORDS: &[&str] = &[
    "thinking",
    "processing",
    "generating",
    "loading",
    "writing",
    "typing",
];

/// Placeholders are short; anything this long is real output
const DEFAULT_MAX_LEN: usize = 50;

/// Keyword and ellipsis heuristic used by the built-in sites
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
    max_len: usize,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.into().to_lowercase())
                .collect(),
            max_len: DEFAULT_MAX_LEN,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len;
        self
    }
}

impl Default for KeywordFilter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }
}

impl ProvisionalFilter for KeywordFilter {
    fn is_provisional(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.chars().count() >= self.max_len {
            return false;
        }
        if is_ellipsis(trimmed) {
            return true;
        }
        let lower = trimmed.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// A lone ellipsis character or a run of three to five dots
fn is_ellipsis(text: &str) -> bool {
    text == "…" || ((3..=5).contains(&text.len()) && text.bytes().all(|b| b == b'.'))
}
