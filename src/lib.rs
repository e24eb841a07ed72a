//! Multi-strategy job listing extraction over rendered career sites.

pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod pagination;
pub mod record;
pub mod session;
pub mod strategy;

pub use config::{RunConfig, SiteConfig};
pub use orchestrator::{ExtractionOrchestrator, RunOutcome, StopReason};
pub use record::{JobRecord, RawHit};
