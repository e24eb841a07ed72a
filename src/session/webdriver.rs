use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thirtyfour::prelude::*;
use tracing::{info, warn};

use super::{Element, Locator, PageSession};
use crate::error::SessionError;

const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Browser acquisition settings. Anything environment-specific lives here,
/// never in the extraction code.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_headless")]
    pub headless: bool,
    #[serde(default = "default_window_size")]
    pub window_size: String,
    /// Extra Chrome command-line switches.
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_webdriver_url() -> String {
    DEFAULT_WEBDRIVER_URL.to_string()
}

fn default_headless() -> bool {
    true
}

fn default_window_size() -> String {
    "1920,1080".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            window_size: default_window_size(),
            args: Vec::new(),
        }
    }
}

impl SessionConfig {
    fn chrome_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            format!("--window-size={}", self.window_size),
            "--disable-blink-features=AutomationControlled".to_string(),
        ];
        if self.headless {
            args.insert(0, "--headless=new".to_string());
        }
        args.extend(self.args.iter().cloned());
        args
    }
}

/// [`PageSession`] backed by a chromedriver-compatible WebDriver server.
pub struct WebDriverSession {
    driver: Option<WebDriver>,
}

impl WebDriverSession {
    pub async fn connect(config: &SessionConfig) -> Result<Self, SessionError> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_chrome_option("args", config.chrome_args())
            .map_err(|e| SessionError::Transport(e.to_string()))?;

        info!("Connecting to WebDriver at {}", config.webdriver_url);
        let driver = WebDriver::new(&config.webdriver_url, caps)
            .await
            .map_err(|e| SessionError::Transport(format!("failed to connect to WebDriver: {}", e)))?;
        Ok(Self { driver: Some(driver) })
    }

    fn driver(&self) -> Result<&WebDriver, SessionError> {
        self.driver
            .as_ref()
            .ok_or_else(|| SessionError::Transport("session already closed".into()))
    }

    async fn query(&self, locator: &Locator) -> Result<Vec<WebElement>, SessionError> {
        let driver = self.driver()?;
        let found = match locator {
            Locator::Css(css) => driver.find_all(By::Css(css.as_str())).await,
            Locator::XPath(xpath) => driver.find_all(By::XPath(xpath.as_str())).await,
            Locator::Text(text) => driver.find_all(By::XPath(text_xpath(text).as_str())).await,
        };
        found.map_err(|e| classify(e, SessionError::Element))
    }
}

/// XPath for links/buttons whose normalized text contains `text`.
fn text_xpath(text: &str) -> String {
    let needle: String = text.to_lowercase().chars().filter(|c| *c != '\'').collect();
    format!(
        "//*[self::a or self::button or @role='button']\
         [contains(translate(normalize-space(.), 'ABCDEFGHIJKLMNOPQRSTUVWXYZ', 'abcdefghijklmnopqrstuvwxyz'), '{}')]",
        needle
    )
}

/// Lost sessions surface as transport failures; everything else keeps the
/// caller's category.
fn classify(e: WebDriverError, local: fn(String) -> SessionError) -> SessionError {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("invalid session id")
        || lower.contains("session deleted")
        || lower.contains("disconnected")
        || lower.contains("connection refused")
        || lower.contains("chrome not reachable")
    {
        SessionError::Transport(msg)
    } else {
        local(msg)
    }
}

#[async_trait]
impl PageSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.driver()?.goto(url).await.map_err(|e| SessionError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, SessionError> {
        let ret = self
            .driver()?
            .execute(script, Vec::new())
            .await
            .map_err(|e| classify(e, SessionError::Script))?;
        Ok(ret.json().clone())
    }

    async fn find(&mut self, locator: &Locator) -> Result<Vec<Element>, SessionError> {
        let mut out = Vec::new();
        for elem in self.query(locator).await? {
            if !elem.is_displayed().await.unwrap_or(true) {
                continue;
            }
            let text = elem.text().await.unwrap_or_default();
            out.push(Element {
                locator: locator.clone(),
                index: out.len(),
                text: text.trim().to_string(),
            });
        }
        Ok(out)
    }

    async fn click(&mut self, element: &Element) -> Result<(), SessionError> {
        let mut visible = Vec::new();
        for elem in self.query(&element.locator).await? {
            if elem.is_displayed().await.unwrap_or(true) {
                visible.push(elem);
            }
        }
        let target = visible.get(element.index).ok_or_else(|| {
            SessionError::Element(format!("{} #{} is gone", element.locator, element.index))
        })?;
        if let Err(e) = target.scroll_into_view().await {
            warn!("scroll_into_view failed for {}: {}", element.locator, e);
        }
        match target.click().await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Overlays intercept native clicks on many career sites.
                warn!("native click on {} failed ({}), retrying via script", element.locator, e);
                let arg = target.to_json().map_err(|e| classify(e, SessionError::Element))?;
                self.driver()?
                    .execute("arguments[0].click();", vec![arg])
                    .await
                    .map(|_| ())
                    .map_err(|e| classify(e, SessionError::Element))
            }
        }
    }

    async fn current_url(&mut self) -> Result<String, SessionError> {
        self.driver()?
            .current_url()
            .await
            .map(|u| u.to_string())
            .map_err(|e| classify(e, SessionError::Script))
    }

    async fn content(&mut self) -> Result<String, SessionError> {
        self.driver()?
            .source()
            .await
            .map_err(|e| classify(e, SessionError::Script))
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        match self.driver.take() {
            Some(driver) => driver
                .quit()
                .await
                .map_err(|e| SessionError::Transport(format!("failed to quit browser: {}", e))),
            None => Ok(()),
        }
    }
}
