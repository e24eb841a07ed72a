use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::normalize::identity::short_digest;
use crate::session::{Locator, PageSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    HasMore,
    Exhausted,
}

/// Moves a listing to its next page of results.
#[async_trait]
pub trait Paginator: Send {
    fn state(&self) -> PageState;

    /// Trigger the next page and report whether new results appeared.
    /// Once `Exhausted`, stays `Exhausted` until [`Paginator::reset`].
    async fn advance(&mut self, session: &mut dyn PageSession) -> Result<PageState, SessionError>;

    /// Start over for a new listing URL.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationConfig {
    /// Matches one element per visible result. Without it the whole page
    /// content is fingerprinted.
    #[serde(default)]
    pub results: Option<Locator>,
    /// Next-page and numbered-page controls, tried in order.
    #[serde(default)]
    pub next: Vec<Locator>,
    /// Controls that append results in place.
    #[serde(default)]
    pub load_more: Vec<Locator>,
    /// URL template for the following page; `{page}` is 1-based, `{offset}`
    /// is `(page - 1) * offset_step`.
    #[serde(default)]
    pub next_url: Option<String>,
    #[serde(default = "default_offset_step")]
    pub offset_step: usize,
}

fn default_offset_step() -> usize {
    20
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mechanism {
    Next,
    LoadMore,
    OffsetUrl,
}

impl Mechanism {
    fn appends(self) -> bool {
        self == Mechanism::LoadMore
    }
}

/// Snapshot of what the result list currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Fingerprint {
    head: String,
    count: Option<usize>,
}

impl Fingerprint {
    fn changed_from(&self, before: &Fingerprint, appending: bool) -> bool {
        match (appending, self.count, before.count) {
            (true, Some(now), Some(then)) => now > then,
            _ => self.head != before.head,
        }
    }
}

pub struct PaginationController {
    config: PaginationConfig,
    timeout: Duration,
    poll_interval: Duration,
    state: PageState,
    page: usize,
}

impl PaginationController {
    pub fn new(config: PaginationConfig, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            config,
            timeout,
            poll_interval,
            state: PageState::HasMore,
            page: 1,
        }
    }

    /// Current 1-based page number.
    pub fn page(&self) -> usize {
        self.page
    }

    async fn fingerprint(&self, session: &mut dyn PageSession) -> Result<Fingerprint, SessionError> {
        let snapshot = match &self.config.results {
            Some(locator) => session.find(locator).await.map(|found| Fingerprint {
                head: short_digest(found.first().map(|e| e.text.as_str()).unwrap_or("")),
                count: Some(found.len()),
            }),
            None => session.content().await.map(|html| Fingerprint {
                head: short_digest(&html),
                count: None,
            }),
        };
        match snapshot {
            Ok(fp) => Ok(fp),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("fingerprint unavailable: {}", e);
                Ok(Fingerprint::default())
            }
        }
    }

    /// Click the first match of the first locator that has one.
    async fn click_first(session: &mut dyn PageSession, locators: &[Locator]) -> Result<bool, SessionError> {
        for locator in locators {
            let found = match session.find(locator).await {
                Ok(found) => found,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("pagination control {} unusable: {}", locator, e);
                    continue;
                }
            };
            let Some(control) = found.first() else {
                continue;
            };
            match session.click(control).await {
                Ok(()) => {
                    debug!("clicked pagination control {}", locator);
                    return Ok(true);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("click on {} failed: {}", locator, e),
            }
        }
        Ok(false)
    }

    async fn trigger(&self, session: &mut dyn PageSession, mechanism: Mechanism) -> Result<bool, SessionError> {
        match mechanism {
            Mechanism::Next => Self::click_first(session, &self.config.next).await,
            Mechanism::LoadMore => Self::click_first(session, &self.config.load_more).await,
            Mechanism::OffsetUrl => {
                let Some(template) = &self.config.next_url else {
                    return Ok(false);
                };
                let url = template
                    .replace("{page}", &(self.page + 1).to_string())
                    .replace("{offset}", &(self.page * self.config.offset_step).to_string());
                debug!("navigating to next page {}", url);
                session.navigate(&url).await?;
                Ok(true)
            }
        }
    }

    /// Poll the fingerprint until it changes or the timeout elapses.
    async fn await_change(
        &self,
        session: &mut dyn PageSession,
        before: &Fingerprint,
        appending: bool,
    ) -> Result<bool, SessionError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if self.fingerprint(session).await?.changed_from(before, appending) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl Paginator for PaginationController {
    fn state(&self) -> PageState {
        self.state
    }

    async fn advance(&mut self, session: &mut dyn PageSession) -> Result<PageState, SessionError> {
        if self.state == PageState::Exhausted {
            return Ok(PageState::Exhausted);
        }
        let before = self.fingerprint(session).await?;

        for mechanism in [Mechanism::Next, Mechanism::LoadMore, Mechanism::OffsetUrl] {
            match self.trigger(session, mechanism).await {
                Ok(false) => continue,
                Ok(true) => {
                    if self.await_change(session, &before, mechanism.appends()).await? {
                        self.page += 1;
                        info!("advanced to page {} via {:?}", self.page, mechanism);
                        return Ok(PageState::HasMore);
                    }
                    info!("no new results within {:?} after {:?}", self.timeout, mechanism);
                    self.state = PageState::Exhausted;
                    return Ok(PageState::Exhausted);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("pagination via {:?} failed: {}", mechanism, e),
            }
        }

        debug!("no pagination control found on page {}", self.page);
        self.state = PageState::Exhausted;
        Ok(PageState::Exhausted)
    }

    fn reset(&mut self) {
        self.state = PageState::HasMore;
        self.page = 1;
    }
}
