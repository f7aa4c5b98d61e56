//! # revisit-engine
//!
//! Feed synchronization and engagement engine for revisit.
//!
//! This crate provides:
//! - Incremental notification scanning with fingerprint or cutoff checkpoints
//! - Weighted reputation ranking
//! - Per-post action planning with a revisit cooldown
//! - A dialog state machine that likes and comments on one post
//! - The two-phase run orchestrator

mod dialog;
mod executor;
mod feed;
mod fingerprint;
mod notifications;
mod observer;
mod orchestrator;
mod pacing;
mod planner;
mod ranking;
mod scanner;
mod stop;
mod text;
mod time_parse;

pub use dialog::{start, transition, DialogAction, DialogEvent, DialogState};
pub use executor::{ActionExecutor, DEFAULT_PROMPT};
pub use feed::{blog_id_from_href, load_feed_page};
pub use fingerprint::fingerprint;
pub use notifications::{classify, DomNotifications, NotificationSource};
pub use observer::{LoggingObserver, NoopObserver, Progress, RunObserver};
pub use orchestrator::{Orchestrator, RunPhase, RunReport, ScanSummary, StopReason};
pub use pacing::Pacer;
pub use planner::{decide, format_plan, ActionPlanner};
pub use ranking::{format_ranking, rank, score, Ranking};
pub use scanner::{FeedScanner, ScanOutcome, ScanTermination};
pub use stop::StopSignal;
pub use text::{squash_whitespace, strip_non_bmp, truncate_chars};
pub use time_parse::{DisplayedTime, TimeParser};
