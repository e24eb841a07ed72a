use thiserror::Error;

/// Failures reported by a [`PageSession`](crate::session::PageSession).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The browser or its driver connection is gone.
    #[error("session transport failed: {0}")]
    Transport(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("script evaluation failed: {0}")]
    Script(String),
    #[error("element interaction failed: {0}")]
    Element(String),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl SessionError {
    /// Fatal errors end the run; everything else is local to one strategy
    /// or one pagination attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Transport(_) | SessionError::Navigation { .. })
    }
}

/// Failures inside a single extraction strategy. The chain absorbs these
/// unless they wrap a fatal session error.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
    #[error("malformed extraction result: {0}")]
    Malformed(String),
    #[error("api request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl StrategyError {
    pub fn fatal_session(self) -> Option<SessionError> {
        match self {
            StrategyError::Session(e) if e.is_fatal() => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_pages must be at least 1")]
    ZeroMaxPages,
    #[error("empty_page_limit must be at least 1")]
    ZeroEmptyPageLimit,
    #[error("timeout must be non-zero")]
    ZeroTimeout,
    #[error("site {0:?} has no start_urls")]
    NoStartUrls(String),
    #[error("site {0:?} has no extraction strategies")]
    NoStrategies(String),
    #[error("company name must not be empty")]
    EmptyCompany,
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}
