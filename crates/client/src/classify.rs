//! Traffic classification for search and social crawlers.
//!
//! The classifier is a pure predicate over the user-agent string: no I/O,
//! no state beyond a compiled pattern.

use regex::Regex;

/// User-agent tokens that identify search indexers and link-preview bots.
pub const CRAWLER_TOKENS: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "crawling",
    "slurp",
    "facebookexternalhit",
    "facebot",
    "ia_archiver",
    "embedly",
    "quora link preview",
    "outbrain",
    "pinterest",
    "vkshare",
    "w3c_validator",
    "whatsapp",
    "redditbot",
    "skypeuripreview",
    "nuzzel",
    "bitlybot",
    "tumblr",
    "flipboard",
    "google-inspectiontool",
    "lighthouse",
    "headlesschrome",
    "bingpreview",
    "yandex",
    "baiduspider",
    "duckduckbot",
    "applebot",
    "telegrambot",
    "discordbot",
    "slackbot",
    "linkedinbot",
    "twitterbot",
    "googlebot",
    "gptbot",
];

/// Maximum number of user-agent characters written to logs.
const LOGGED_USER_AGENT_CHARS: usize = 80;

/// Case-insensitive matcher over a fixed token list.
#[derive(Debug, Clone)]
pub struct CrawlerClassifier {
    /// None when built from an empty token list.
    pattern: Option<Regex>,
}

impl CrawlerClassifier {
    /// Compile a classifier from a list of literal tokens.
    pub fn new<I, S>(tokens: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternation = tokens
            .into_iter()
            .map(|t| regex::escape(t.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        if alternation.is_empty() {
            return Ok(Self { pattern: None });
        }
        Ok(Self { pattern: Some(Regex::new(&format!("(?i)(?:{alternation})"))?) })
    }

    /// Whether the given user agent belongs to an automated agent.
    ///
    /// A missing or blank user agent is treated as a regular browser.
    pub fn is_automated_agent(&self, user_agent: Option<&str>) -> bool {
        let Some(pattern) = &self.pattern else {
            return false;
        };
        user_agent.is_some_and(|ua| !ua.trim().is_empty() && pattern.is_match(ua))
    }
}

impl Default for CrawlerClassifier {
    fn default() -> Self {
        Self::new(CRAWLER_TOKENS).expect("escaped crawler tokens always compile")
    }
}

/// The content section a classifier is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentScope {
    prefix: String,
}

impl ContentScope {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self { prefix: if trimmed.is_empty() { "/".into() } else { trimmed.to_string() } }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True for the prefix itself and anything beneath it, not for siblings
    /// that merely share leading characters (`/news` vs `/newsletter`).
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Shorten a user agent for logging, on a character boundary.
pub fn truncate_user_agent(user_agent: &str) -> &str {
    match user_agent.char_indices().nth(LOGGED_USER_AGENT_CHARS) {
        Some((idx, _)) => &user_agent[..idx],
        None => user_agent,
    }
}
