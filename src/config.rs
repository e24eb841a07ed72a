use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::pagination::PaginationConfig;
use crate::session::{Locator, SessionConfig};
use crate::strategy::StrategyKind;

pub const ENV_PREFIX: &str = "JOBHARVEST";

/// Budgets and policy for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    #[serde(default)]
    pub fetch_full_details: bool,
    /// Upper bound for every wait (ready element, page change), in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive pages with no new records before giving up.
    #[serde(default = "default_empty_page_limit")]
    pub empty_page_limit: usize,
}

fn default_max_pages() -> usize {
    10
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_empty_page_limit() -> usize {
    2
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            fetch_full_details: false,
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            empty_page_limit: default_empty_page_limit(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::ZeroMaxPages);
        }
        if self.empty_page_limit == 0 {
            return Err(ConfigError::ZeroEmptyPageLimit);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Declarative description of one career site.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub company: String,
    pub start_urls: Vec<String>,
    #[serde(default)]
    pub default_country: Option<String>,
    /// Element that marks the listing as rendered.
    #[serde(default)]
    pub ready: Option<Locator>,
    /// Tried in order on every page; the first that yields hits wins.
    pub strategies: Vec<StrategyKind>,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

impl SiteConfig {
    /// Load a site file, with `JOBHARVEST__RUN__MAX_PAGES`-style overrides
    /// from the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
            .build()?;
        let site: SiteConfig = settings.try_deserialize()?;
        site.validate()?;
        Ok(site)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let site: SiteConfig = Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        site.validate()?;
        Ok(site)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.company.trim().is_empty() {
            return Err(ConfigError::EmptyCompany);
        }
        if self.start_urls.is_empty() {
            return Err(ConfigError::NoStartUrls(self.company.clone()));
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::NoStrategies(self.company.clone()));
        }
        self.run.validate()
    }
}
