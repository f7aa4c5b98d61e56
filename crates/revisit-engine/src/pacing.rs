//! Human-like pacing
//!
//! Every wait the engine makes is drawn from a configured range so that
//! clicks and keystrokes do not arrive at machine-regular intervals.

use rand::Rng;
use revisit_core::{DelayRange, PacingConfig};
use std::time::Duration;

/// Randomized sleeps drawn from [`PacingConfig`] ranges
#[derive(Debug, Clone)]
pub struct Pacer {
    config: PacingConfig,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    /// Between two dialog steps
    pub async fn step(&self) {
        sleep_in(self.config.step).await;
    }

    /// After a page or context has been opened
    pub async fn page_load(&self) {
        sleep_in(self.config.page_load).await;
    }

    /// After a scroll, for lazy content to render
    pub async fn scroll_settle(&self) {
        sleep_in(self.config.scroll_settle).await;
    }

    /// Between two plan entries
    pub async fn between_items(&self) {
        sleep_in(self.config.between_items).await;
    }

    /// Between two typed characters
    pub async fn keystroke(&self) {
        sleep_in(self.config.typing).await;
    }

    pub fn verify_interval(&self) -> Duration {
        Duration::from_millis(self.config.verify_interval_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.config.element_timeout_ms)
    }
}

/// Draw a delay from `range`
pub fn sample(range: DelayRange) -> Duration {
    if range.is_zero() {
        return Duration::ZERO;
    }
    let ms = rand::thread_rng().gen_range(range.min_ms()..=range.max_ms());
    Duration::from_millis(ms)
}

async fn sleep_in(range: DelayRange) {
    let delay = sample(range);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
