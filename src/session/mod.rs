pub mod webdriver;

#[cfg(test)]
pub mod mock;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::SessionError;

pub use webdriver::{SessionConfig, WebDriverSession};

/// How to find elements on a rendered page.
///
/// Written as plain strings in site files: `"xpath://a[@rel='next']"`,
/// `"text:Load more"`, anything else is CSS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Locator {
    Css(String),
    XPath(String),
    /// Visible text of a link or button, matched case-insensitively.
    Text(String),
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        if let Some(x) = s.strip_prefix("xpath:") {
            Locator::XPath(x.trim().to_string())
        } else if let Some(t) = s.strip_prefix("text:") {
            Locator::Text(t.trim().to_string())
        } else {
            Locator::Css(s.strip_prefix("css:").unwrap_or(&s).trim().to_string())
        }
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator::from(s.to_string())
    }
}

impl From<Locator> for String {
    fn from(l: Locator) -> Self {
        l.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "{}", s),
            Locator::XPath(s) => write!(f, "xpath:{}", s),
            Locator::Text(s) => write!(f, "text:{}", s),
        }
    }
}

/// Handle to the `index`-th match of `locator` at the time it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub locator: Locator,
    pub index: usize,
    pub text: String,
}

/// One rendered page in one browser context.
#[async_trait]
pub trait PageSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Run a page script and return its JSON-serializable result.
    async fn evaluate(&mut self, script: &str) -> Result<Value, SessionError>;

    async fn find(&mut self, locator: &Locator) -> Result<Vec<Element>, SessionError>;

    async fn click(&mut self, element: &Element) -> Result<(), SessionError>;

    async fn current_url(&mut self) -> Result<String, SessionError>;

    /// Serialized DOM of the current page.
    async fn content(&mut self) -> Result<String, SessionError>;

    /// Release the underlying browser. Called exactly once per run.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Poll until `locator` matches at least one element or `timeout` elapses.
/// Returns whether the element appeared. Only fatal errors propagate.
pub async fn wait_for(
    session: &mut dyn PageSession,
    locator: &Locator,
    timeout: Duration,
    interval: Duration,
) -> Result<bool, SessionError> {
    let deadline = Instant::now() + timeout;
    loop {
        match session.find(locator).await {
            Ok(found) if !found.is_empty() => return Ok(true),
            Ok(_) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => debug!("wait_for {}: {}", locator, e),
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        sleep(interval).await;
    }
}
