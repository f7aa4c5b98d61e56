//! Configuration for revisit
//!
//! One immutable [`RevisitConfig`] is loaded at startup from
//! `.revisit/config.toml` and handed to every component by reference.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Result, RevisitError};

/// Repository-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisitConfig {
    #[serde(default)]
    pub scoring: ScoringWeights,

    #[serde(default)]
    pub engagement: EngagementConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub assistant: AssistantConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub selectors: SelectorConfig,

    #[serde(default)]
    pub browser: BrowserSettings,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Reputation weights; must satisfy comment >= reply >= like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_comment_weight")]
    pub comment_weight: u64,
    #[serde(default = "default_reply_weight")]
    pub reply_weight: u64,
    #[serde(default = "default_like_weight")]
    pub like_weight: u64,
}

/// Phase 2 targets and budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Days that must pass before the same counterparty is engaged again
    #[serde(default = "default_cooldown_days")]
    pub cooldown_days: u32,

    /// Successful items after which the run stops
    #[serde(default = "default_target_successes")]
    pub target_successes: usize,

    /// First feed page to walk
    #[serde(default = "default_start_page")]
    pub start_page: usize,

    /// Consecutive item failures after which the run stops
    #[serde(default = "default_failure_budget")]
    pub failure_budget: usize,

    /// Post text shorter than this is not sent to the assistant
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,

    /// Body prefix handed to the assistant
    #[serde(default = "default_content_prefix_chars")]
    pub content_prefix_chars: usize,

    /// Template comments, one picked at random
    #[serde(default = "default_messages")]
    pub messages: Vec<String>,

    /// Alert or notice text containing any of these ends the run
    #[serde(default = "default_limit_phrases")]
    pub limit_phrases: Vec<String>,

    /// Feed pages walked before the run gives up on reaching the target
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

/// Which checkpoint marker bounds a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStrategy {
    /// Stop at any of the last N fingerprints
    #[default]
    Fingerprints,
    /// Stop at the first item not newer than the last sync time
    Cutoff,
}

/// Notification scan settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub strategy: CheckpointStrategy,

    /// Fingerprints retained in the checkpoint
    #[serde(default = "default_checkpoint_size")]
    pub checkpoint_size: usize,

    /// Consecutive scrolls that render nothing before the scan gives up
    #[serde(default = "default_max_empty_scrolls")]
    pub max_empty_scrolls: usize,

    #[serde(default = "default_scroll_step_px")]
    pub scroll_step_px: i64,

    /// Snippet characters that enter the fingerprint
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    #[serde(default = "default_like_keywords")]
    pub like_keywords: Vec<String>,

    #[serde(default = "default_comment_keywords")]
    pub comment_keywords: Vec<String>,

    #[serde(default = "default_reply_keywords")]
    pub reply_keywords: Vec<String>,
}

/// Comment assistant settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_assistant_model")]
    pub model: String,

    #[serde(default = "default_assistant_max_tokens")]
    pub max_tokens: usize,

    /// Instruction placed before the post content
    #[serde(default)]
    pub prompt: String,
}

/// Inclusive millisecond range for randomized waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange(pub u64, pub u64);

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange(0, 0);

    pub fn min_ms(&self) -> u64 {
        self.0.min(self.1)
    }

    pub fn max_ms(&self) -> u64 {
        self.0.max(self.1)
    }

    pub fn is_zero(&self) -> bool {
        self.max_ms() == 0
    }
}

/// Human-like pacing and UI polling bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_typing")]
    pub typing: DelayRange,

    #[serde(default = "default_step")]
    pub step: DelayRange,

    #[serde(default = "default_page_load")]
    pub page_load: DelayRange,

    #[serde(default = "default_scroll_settle")]
    pub scroll_settle: DelayRange,

    #[serde(default = "default_between_items")]
    pub between_items: DelayRange,

    /// Polls after a toggling click before declaring failure
    #[serde(default = "default_verify_attempts")]
    pub verify_attempts: usize,

    #[serde(default = "default_verify_interval_ms")]
    pub verify_interval_ms: u64,

    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,
}

impl PacingConfig {
    /// Pacing with every wait collapsed to zero
    pub fn instant() -> Self {
        Self {
            typing: DelayRange::ZERO,
            step: DelayRange::ZERO,
            page_load: DelayRange::ZERO,
            scroll_settle: DelayRange::ZERO,
            between_items: DelayRange::ZERO,
            verify_attempts: default_verify_attempts(),
            verify_interval_ms: 0,
            element_timeout_ms: 0,
        }
    }
}

/// CSS selectors and URLs for the target site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_notification_url")]
    pub notification_url: String,
    #[serde(default = "default_notification_item")]
    pub notification_item: String,
    #[serde(default = "default_notification_actor")]
    pub notification_actor: String,
    #[serde(default = "default_notification_time")]
    pub notification_time: String,
    /// Rendered only once the notification stream has no more content
    #[serde(default = "default_feed_bottom")]
    pub feed_bottom: String,

    /// Feed page URL with a `{page}` placeholder
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    #[serde(default = "default_feed_item")]
    pub feed_item: String,
    #[serde(default = "default_feed_author_name")]
    pub feed_author_name: String,
    #[serde(default = "default_feed_author_link")]
    pub feed_author_link: String,
    #[serde(default = "default_feed_post_link")]
    pub feed_post_link: String,
    #[serde(default = "default_feed_like_button")]
    pub feed_like_button: String,

    #[serde(default = "default_post_title")]
    pub post_title: String,
    #[serde(default = "default_post_body")]
    pub post_body: String,
    #[serde(default = "default_post_like_button")]
    pub post_like_button: String,
    #[serde(default = "default_comment_open_button")]
    pub comment_open_button: String,
    #[serde(default = "default_comment_input")]
    pub comment_input: String,
    #[serde(default = "default_comment_submit")]
    pub comment_submit: String,

    /// Overlays and toasts where the platform announces limits
    #[serde(default = "default_limit_notice")]
    pub limit_notice: String,

    /// Attribute that reads "true" on a toggled like control
    #[serde(default = "default_pressed_attribute")]
    pub pressed_attribute: String,

    /// Operator's own name on the comment form
    #[serde(default)]
    pub my_nickname: Option<String>,
    /// Author names in the existing comment list
    #[serde(default)]
    pub comment_authors: Option<String>,

    /// Base URL for author blogs when a card has no direct post link
    #[serde(default = "default_blog_base_url")]
    pub blog_base_url: String,
}

impl SelectorConfig {
    pub fn feed_page_url(&self, page: usize) -> String {
        self.feed_url.replace("{page}", &page.to_string())
    }

    pub fn author_blog_url(&self, author_id: &str) -> String {
        format!("{}/{}", self.blog_base_url.trim_end_matches('/'), author_id)
    }
}

/// Browser attachment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Attach to an already authenticated Chrome on this DevTools port
    #[serde(default)]
    pub debug_port: Option<u16>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Durable store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

// Default value providers
fn default_comment_weight() -> u64 {
    10
}

fn default_reply_weight() -> u64 {
    3
}

fn default_like_weight() -> u64 {
    1
}

fn default_cooldown_days() -> u32 {
    3
}

fn default_target_successes() -> usize {
    30
}

fn default_start_page() -> usize {
    1
}

fn default_failure_budget() -> usize {
    3
}

fn default_min_content_chars() -> usize {
    50
}

fn default_content_prefix_chars() -> usize {
    300
}

fn default_messages() -> Vec<String> {
    vec![
        "포스팅 잘 보고 갑니다!".to_string(),
        "좋은 정보 감사합니다~".to_string(),
        "공감 누르고 가요! 오늘도 좋은 하루 보내세요 :)".to_string(),
        "글이 알차네요! 잘 읽었습니다.".to_string(),
        "덕분에 좋은 내용 알아갑니다 ^^".to_string(),
    ]
}

fn default_limit_phrases() -> Vec<String> {
    vec![
        "limit".to_string(),
        "exceeded".to_string(),
        "초과".to_string(),
        "제한".to_string(),
    ]
}

fn default_max_pages() -> usize {
    20
}

fn default_checkpoint_size() -> usize {
    3
}

fn default_max_empty_scrolls() -> usize {
    5
}

fn default_scroll_step_px() -> i64 {
    500
}

fn default_snippet_chars() -> usize {
    40
}

fn default_like_keywords() -> Vec<String> {
    vec!["공감".to_string(), "liked".to_string()]
}

fn default_comment_keywords() -> Vec<String> {
    vec!["댓글".to_string(), "commented".to_string()]
}

fn default_reply_keywords() -> Vec<String> {
    vec!["답글".to_string(), "replied".to_string()]
}

fn default_assistant_model() -> String {
    "claude-haiku-4-5".to_string()
}

fn default_assistant_max_tokens() -> usize {
    300
}

fn default_typing() -> DelayRange {
    DelayRange(50, 150)
}

fn default_step() -> DelayRange {
    DelayRange(500, 1000)
}

fn default_page_load() -> DelayRange {
    DelayRange(2000, 3500)
}

fn default_scroll_settle() -> DelayRange {
    DelayRange(500, 800)
}

fn default_between_items() -> DelayRange {
    DelayRange(500, 1000)
}

fn default_verify_attempts() -> usize {
    3
}

fn default_verify_interval_ms() -> u64 {
    500
}

fn default_element_timeout_ms() -> u64 {
    10_000
}

fn default_notification_url() -> String {
    "https://m.blog.naver.com/News.naver".to_string()
}

fn default_notification_item() -> String {
    "li[class*='item']".to_string()
}

fn default_notification_actor() -> String {
    "strong".to_string()
}

fn default_notification_time() -> String {
    "span[class*='date']".to_string()
}

fn default_feed_bottom() -> String {
    "div[class*='scroll_top']".to_string()
}

fn default_feed_url() -> String {
    "https://section.blog.naver.com/BlogHome.naver?currentPage={page}".to_string()
}

fn default_feed_item() -> String {
    "div.item_inner".to_string()
}

fn default_feed_author_name() -> String {
    ".name_author".to_string()
}

fn default_feed_author_link() -> String {
    "a.author".to_string()
}

fn default_feed_post_link() -> String {
    "a.desc_inner".to_string()
}

fn default_feed_like_button() -> String {
    ".u_likeit_list_btn".to_string()
}

fn default_post_title() -> String {
    ".se-title-text".to_string()
}

fn default_post_body() -> String {
    ".se-main-container, #postViewArea".to_string()
}

fn default_post_like_button() -> String {
    ".u_likeit_button".to_string()
}

fn default_comment_open_button() -> String {
    ".btn_comment".to_string()
}

fn default_comment_input() -> String {
    ".u_cbox_text".to_string()
}

fn default_comment_submit() -> String {
    ".u_cbox_btn_upload".to_string()
}

fn default_limit_notice() -> String {
    "div[class*='layer_alert'], .u_cbox_guide".to_string()
}

fn default_pressed_attribute() -> String {
    "aria-pressed".to_string()
}

fn default_blog_base_url() -> String {
    "https://blog.naver.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    900
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".revisit/revisit.db")
}

impl RevisitConfig {
    /// Load configuration from `.revisit/config.toml` or use defaults
    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = root.join(".revisit/config.toml");

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate configuration from an explicit file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RevisitError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write default configuration to `.revisit/config.toml`
    pub fn write_default(root: &Path) -> Result<PathBuf> {
        let config_dir = root.join(".revisit");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| RevisitError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    /// Reject configurations the engine cannot honor
    pub fn validate(&self) -> Result<()> {
        let w = &self.scoring;
        if !(w.comment_weight >= w.reply_weight && w.reply_weight >= w.like_weight) {
            return Err(RevisitError::Config(format!(
                "scoring weights must satisfy comment >= reply >= like (got {}/{}/{})",
                w.comment_weight, w.reply_weight, w.like_weight
            )));
        }

        let e = &self.engagement;
        if e.messages.iter().all(|m| m.trim().is_empty()) {
            return Err(RevisitError::Config(
                "engagement.messages needs at least one non-empty template".to_string(),
            ));
        }
        if e.max_pages == 0 {
            return Err(RevisitError::Config(
                "engagement.max_pages must be at least 1".to_string(),
            ));
        }
        if e.failure_budget == 0 {
            return Err(RevisitError::Config(
                "engagement.failure_budget must be at least 1".to_string(),
            ));
        }
        if e.start_page == 0 {
            return Err(RevisitError::Config(
                "engagement.start_page is 1-based".to_string(),
            ));
        }

        if self.scan.checkpoint_size == 0 || self.scan.max_empty_scrolls == 0 {
            return Err(RevisitError::Config(
                "scan.checkpoint_size and scan.max_empty_scrolls must be at least 1".to_string(),
            ));
        }

        if self.pacing.verify_attempts == 0 {
            return Err(RevisitError::Config(
                "pacing.verify_attempts must be at least 1".to_string(),
            ));
        }

        if !self.selectors.feed_url.contains("{page}") {
            return Err(RevisitError::Config(
                "selectors.feed_url must contain a {page} placeholder".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            comment_weight: default_comment_weight(),
            reply_weight: default_reply_weight(),
            like_weight: default_like_weight(),
        }
    }
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            cooldown_days: default_cooldown_days(),
            target_successes: default_target_successes(),
            start_page: default_start_page(),
            failure_budget: default_failure_budget(),
            min_content_chars: default_min_content_chars(),
            content_prefix_chars: default_content_prefix_chars(),
            messages: default_messages(),
            limit_phrases: default_limit_phrases(),
            max_pages: default_max_pages(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy: CheckpointStrategy::default(),
            checkpoint_size: default_checkpoint_size(),
            max_empty_scrolls: default_max_empty_scrolls(),
            scroll_step_px: default_scroll_step_px(),
            snippet_chars: default_snippet_chars(),
            like_keywords: default_like_keywords(),
            comment_keywords: default_comment_keywords(),
            reply_keywords: default_reply_keywords(),
        }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_assistant_model(),
            max_tokens: default_assistant_max_tokens(),
            prompt: String::new(),
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            typing: default_typing(),
            step: default_step(),
            page_load: default_page_load(),
            scroll_settle: default_scroll_settle(),
            between_items: default_between_items(),
            verify_attempts: default_verify_attempts(),
            verify_interval_ms: default_verify_interval_ms(),
            element_timeout_ms: default_element_timeout_ms(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            notification_url: default_notification_url(),
            notification_item: default_notification_item(),
            notification_actor: default_notification_actor(),
            notification_time: default_notification_time(),
            feed_bottom: default_feed_bottom(),
            feed_url: default_feed_url(),
            feed_item: default_feed_item(),
            feed_author_name: default_feed_author_name(),
            feed_author_link: default_feed_author_link(),
            feed_post_link: default_feed_post_link(),
            feed_like_button: default_feed_like_button(),
            post_title: default_post_title(),
            post_body: default_post_body(),
            post_like_button: default_post_like_button(),
            comment_open_button: default_comment_open_button(),
            comment_input: default_comment_input(),
            comment_submit: default_comment_submit(),
            limit_notice: default_limit_notice(),
            pressed_attribute: default_pressed_attribute(),
            my_nickname: None,
            comment_authors: None,
            blog_base_url: default_blog_base_url(),
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            debug_port: None,
            headless: true,
            window_width: default_window_width(),
            window_height: default_window_height(),
            user_agent: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}
