use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{RunConfig, SiteConfig};
use crate::dedup::Deduplicator;
use crate::error::SessionError;
use crate::normalize::RecordNormalizer;
use crate::pagination::{PageState, Paginator};
use crate::record::JobRecord;
use crate::session::{wait_for, Locator, PageSession};
use crate::strategy::{ExtractContext, StrategyChain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxPagesReached,
    PaginationExhausted,
    DiminishingReturns,
    Error,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::MaxPagesReached => "max_pages_reached",
            StopReason::PaginationExhausted => "pagination_exhausted",
            StopReason::DiminishingReturns => "diminishing_returns",
            StopReason::Error => "error",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per start URL bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct ListingSummary {
    pub start_url: String,
    pub pages: usize,
    pub records: usize,
    pub reason: StopReason,
}

#[derive(Debug, Serialize)]
pub struct RunOutcome {
    /// Accepted records in discovery order.
    pub records: Vec<JobRecord>,
    pub reason: StopReason,
    /// Pages processed across all listings.
    pub pages: usize,
    pub listings: Vec<ListingSummary>,
    pub error: Option<String>,
}

/// Drives one site: extract, normalize, dedup, paginate, stop.
pub struct ExtractionOrchestrator {
    chain: StrategyChain,
    normalizer: RecordNormalizer,
    run: RunConfig,
    ready: Option<Locator>,
    http: reqwest::Client,
}

impl ExtractionOrchestrator {
    pub fn new(chain: StrategyChain, normalizer: RecordNormalizer, run: RunConfig) -> Self {
        Self {
            chain,
            normalizer,
            run,
            ready: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_site(site: &SiteConfig) -> Self {
        Self::new(
            StrategyChain::from_kinds(site.strategies.clone()),
            RecordNormalizer::new(&site.company, site.default_country.as_deref()),
            site.run.clone(),
        )
        .with_ready(site.ready.clone())
    }

    pub fn with_ready(mut self, ready: Option<Locator>) -> Self {
        self.ready = ready;
        self
    }

    /// Run every listing in order on one session, then close it. The
    /// session is closed exactly once whatever the outcome; records
    /// gathered before a failure are kept.
    pub async fn run<S: PageSession>(
        &self,
        mut session: S,
        paginator: &mut dyn Paginator,
        start_urls: &[String],
    ) -> RunOutcome {
        let mut outcome = RunOutcome {
            records: Vec::new(),
            reason: StopReason::PaginationExhausted,
            pages: 0,
            listings: Vec::new(),
            error: None,
        };
        let mut dedup = Deduplicator::new();

        for url in start_urls {
            let mut summary = ListingSummary {
                start_url: url.clone(),
                pages: 0,
                records: 0,
                reason: StopReason::Error,
            };
            paginator.reset();
            let result = self
                .run_listing(&mut session, paginator, url, &mut dedup, &mut outcome.records, &mut summary)
                .await;
            outcome.pages += summary.pages;
            match result {
                Ok(reason) => {
                    info!("{}: {} after {} pages, {} records", url, reason, summary.pages, summary.records);
                    summary.reason = reason;
                    outcome.reason = reason;
                    outcome.listings.push(summary);
                }
                Err(e) => {
                    warn!("{}: stopping run after {} pages: {}", url, summary.pages, e);
                    outcome.listings.push(summary);
                    outcome.reason = StopReason::Error;
                    outcome.error = Some(e.to_string());
                    break;
                }
            }
        }

        if let Err(e) = session.close().await {
            warn!("failed to close session: {}", e);
        }
        outcome
    }

    async fn run_listing(
        &self,
        session: &mut dyn PageSession,
        paginator: &mut dyn Paginator,
        start_url: &str,
        dedup: &mut Deduplicator,
        records: &mut Vec<JobRecord>,
        summary: &mut ListingSummary,
    ) -> Result<StopReason, SessionError> {
        info!("Opening {}", start_url);
        session.navigate(start_url).await?;
        if let Some(ready) = &self.ready {
            if !wait_for(session, ready, self.run.timeout(), self.run.poll_interval()).await? {
                warn!("{} did not appear within {:?}", ready, self.run.timeout());
            }
        }

        let mut empty_streak = 0;
        for page in 1..=self.run.max_pages {
            summary.pages = page;
            let ctx = ExtractContext {
                page,
                max_pages: self.run.max_pages,
                fetch_full_details: self.run.fetch_full_details,
                timeout: self.run.timeout(),
                http: self.http.clone(),
            };
            let result = self.chain.run(session, &ctx).await?;
            let page_url = match session.current_url().await {
                Ok(u) => u,
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => start_url.to_string(),
            };

            let found = result.hits.len();
            let mut accepted = 0;
            for (ordinal, hit) in result.hits.into_iter().enumerate() {
                let Some(record) = self.normalizer.normalize(hit, ordinal, &page_url) else {
                    continue;
                };
                if dedup.offer(&record) {
                    records.push(record);
                    accepted += 1;
                }
            }
            summary.records += accepted;
            info!(
                "Page {}: {} hits via {}, {} new",
                page,
                found,
                result.strategy.as_deref().unwrap_or("none"),
                accepted
            );

            empty_streak = if accepted == 0 { empty_streak + 1 } else { 0 };
            if empty_streak >= self.run.empty_page_limit {
                return Ok(StopReason::DiminishingReturns);
            }
            if page == self.run.max_pages {
                return Ok(StopReason::MaxPagesReached);
            }
            if paginator.advance(session).await? == PageState::Exhausted {
                return Ok(StopReason::PaginationExhausted);
            }
        }
        Ok(StopReason::MaxPagesReached)
    }
}
