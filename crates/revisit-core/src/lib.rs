//! revisit-core: shared model for the revisit engagement engine
//!
//! This crate holds what every other revisit crate agrees on:
//! - Data model for feed events, stats, rankings and plans
//! - Unified error type
//! - Configuration loaded once per run
//! - Bounded retry combinators
//! - Collaborator seams (`InteractionPort`, `Assistant`, durable stores)
//!   together with in-memory implementations for tests

pub mod assistant;
pub mod config;
pub mod error;
pub mod mock;
pub mod port;
pub mod retry;
pub mod store;
pub mod types;

pub use assistant::{Assistant, ScriptedAssistant};
pub use config::{
    AssistantConfig, BrowserSettings, CheckpointStrategy, DelayRange, EngagementConfig,
    PacingConfig, RevisitConfig, ScanConfig, ScoringWeights, SelectorConfig, StoreConfig,
};
pub use error::{Result, RevisitError};
pub use mock::{ClickEffect, MockElement, MockPage, MockPort, Submission};
pub use port::{ElementHandle, InteractionPort, LocatorStep};
pub use retry::{fail_open, poll_until, with_retries};
pub use store::{CheckpointStore, MemoryStore, StatsStore, VisitLedger};
pub use types::*;
