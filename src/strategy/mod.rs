pub mod adjacency;
pub mod api;
pub mod cards;
pub mod dom;
pub mod links;
pub mod script;
pub mod table;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{SessionError, StrategyError};
use crate::record::RawHit;
use crate::session::PageSession;

/// Per-page inputs shared by every strategy in a chain.
pub struct ExtractContext {
    /// 1-based page number within the current listing.
    pub page: usize,
    pub max_pages: usize,
    pub fetch_full_details: bool,
    pub timeout: Duration,
    pub http: reqwest::Client,
}

/// One extraction heuristic. Must not advance pagination.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(
        &self,
        session: &mut dyn PageSession,
        ctx: &ExtractContext,
    ) -> Result<Vec<RawHit>, StrategyError>;
}

/// Declarative strategy descriptor, one variant per platform family.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyKind {
    Cards(cards::CardSpec),
    Links(links::LinkSpec),
    Adjacency(adjacency::AdjacencySpec),
    Table(table::TableSpec),
    Script(script::ScriptSpec),
    Api(api::ApiSpec),
}

#[async_trait]
impl Strategy for StrategyKind {
    fn name(&self) -> &str {
        match self {
            StrategyKind::Cards(_) => "cards",
            StrategyKind::Links(_) => "links",
            StrategyKind::Adjacency(_) => "adjacency",
            StrategyKind::Table(_) => "table",
            StrategyKind::Script(_) => "script",
            StrategyKind::Api(_) => "api",
        }
    }

    async fn extract(
        &self,
        session: &mut dyn PageSession,
        ctx: &ExtractContext,
    ) -> Result<Vec<RawHit>, StrategyError> {
        match self {
            StrategyKind::Cards(spec) => {
                let html = session.content().await?;
                cards::extract(spec, &html)
            }
            StrategyKind::Links(spec) => {
                let html = session.content().await?;
                links::extract(spec, &html)
            }
            StrategyKind::Adjacency(spec) => {
                let html = session.content().await?;
                adjacency::extract(spec, &html)
            }
            StrategyKind::Table(spec) => {
                let html = session.content().await?;
                table::extract(spec, &html)
            }
            StrategyKind::Script(spec) => {
                let value = session.evaluate(&spec.script).await?;
                script::hits_from_value(spec, &value)
            }
            StrategyKind::Api(spec) => api::fetch(spec, ctx).await,
        }
    }
}

/// Outcome of one chain run.
#[derive(Debug, Default)]
pub struct ChainResult {
    pub hits: Vec<RawHit>,
    /// Name of the strategy that produced `hits`, if any did.
    pub strategy: Option<String>,
}

/// Ordered fallback list of strategies; the first non-empty result wins.
pub struct StrategyChain {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    pub fn from_kinds(kinds: Vec<StrategyKind>) -> Self {
        Self::new(
            kinds
                .into_iter()
                .map(|k| Box::new(k) as Box<dyn Strategy>)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies in order until one yields hits. Strategy failures are
    /// logged and treated as empty; only fatal session errors propagate.
    pub async fn run(
        &self,
        session: &mut dyn PageSession,
        ctx: &ExtractContext,
    ) -> Result<ChainResult, SessionError> {
        for strategy in &self.strategies {
            match strategy.extract(session, ctx).await {
                Ok(hits) if !hits.is_empty() => {
                    debug!("strategy {} produced {} hits on page {}", strategy.name(), hits.len(), ctx.page);
                    return Ok(ChainResult {
                        hits,
                        strategy: Some(strategy.name().to_string()),
                    });
                }
                Ok(_) => debug!("strategy {} found nothing on page {}", strategy.name(), ctx.page),
                Err(e) => {
                    warn!("strategy {} failed on page {}: {}", strategy.name(), ctx.page, e);
                    if let Some(fatal) = e.fatal_session() {
                        return Err(fatal);
                    }
                }
            }
        }
        Ok(ChainResult::default())
    }
}

/// Follow a dotted path (`"data.jobs.0.title"`) into a JSON value.
/// An empty path returns the value itself.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(value, |v, seg| match v {
            Value::Object(map) => map.get(seg),
            Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
