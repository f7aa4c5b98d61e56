//! Executes one plan entry against the platform
//!
//! Each dialog state maps to one UI step. Step errors that are not fatal
//! become failure events for the state machine. A lost session escapes as
//! `Err`, and so does a ledger write that still fails after retries, once
//! the context is closed. Rate limits come back as
//! [`ExecutionOutcome::LimitReached`].

use chrono::Utc;
use rand::seq::SliceRandom;
use revisit_core::{
    fail_open, poll_until, with_retries, ActionPlanEntry, Assistant, Decision, ElementHandle,
    ExecutionOutcome, InteractionPort, Result, RevisitConfig, VisitLedger,
};
use tracing::{debug, error, info, warn};

use crate::dialog::{start, transition, DialogAction, DialogEvent, DialogState};
use crate::pacing::Pacer;
use crate::stop::StopSignal;
use crate::text::{strip_non_bmp, truncate_chars};

/// Fallback instruction when none is configured
pub const DEFAULT_PROMPT: &str = "Read the blog post below and write one warm, natural comment \
of one or two sentences in the language of the post, as a neighbor who enjoyed it. \
Do not use emoji, hashtags or quotation marks.";

const UNTITLED: &str = "(untitled)";

/// Upper bound on contexts closed during cleanup
const MAX_CLOSE_ATTEMPTS: usize = 4;

const LEDGER_WRITE_ATTEMPTS: usize = 3;

/// Runs plan entries through the dialog state machine
pub struct ActionExecutor<'a> {
    port: &'a dyn InteractionPort,
    ledger: &'a dyn VisitLedger,
    assistant: Option<&'a dyn Assistant>,
    config: &'a RevisitConfig,
    pacer: &'a Pacer,
    stop: StopSignal,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        port: &'a dyn InteractionPort,
        ledger: &'a dyn VisitLedger,
        assistant: Option<&'a dyn Assistant>,
        config: &'a RevisitConfig,
        pacer: &'a Pacer,
        stop: StopSignal,
    ) -> Self {
        Self {
            port,
            ledger,
            assistant,
            config,
            pacer,
            stop,
        }
    }

    /// Execute one entry. Any secondary context opened for it is closed
    /// before this returns, except when the session itself is gone.
    pub async fn execute(&self, entry: &ActionPlanEntry) -> Result<ExecutionOutcome> {
        let decision = entry.decision;
        let base_depth = self.port.context_depth().await?;
        let mut state = start(decision);
        let mut ledger_error = None;

        debug!(
            "Executing {} for {} (post #{})",
            decision,
            entry.counterparty,
            entry.feed_item_index + 1
        );

        loop {
            let event = match &state {
                DialogState::Done { outcome } => {
                    if let Some(e) = ledger_error.take() {
                        return Err(e);
                    }
                    info!(
                        "[{}] {} -> {}",
                        entry.feed_item_index + 1,
                        entry.counterparty,
                        outcome
                    );
                    return Ok(*outcome);
                }
                DialogState::Close { .. } => {
                    self.close_to(base_depth).await?;
                    DialogEvent::Closed
                }
                _ if self.stop.is_requested() => DialogEvent::StopRequested,
                step => match self.perform(step, entry).await {
                    Ok(event) => event,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("[{}] step failed: {}", entry.feed_item_index + 1, e);
                        failure_event(step)
                    }
                },
            };

            let (next, actions) = transition(state, event, decision);
            for action in actions {
                match action {
                    DialogAction::RecordEngagement => {
                        if let Err(e) = self.record_engagement(&entry.ledger_key).await {
                            error!(
                                "[{}] comment posted but visit to {} not recorded: {}",
                                entry.feed_item_index + 1,
                                entry.counterparty,
                                e
                            );
                            ledger_error = Some(e);
                        }
                    }
                    DialogAction::LogStep { message } => {
                        debug!("[{}] {}", entry.feed_item_index + 1, message)
                    }
                }
            }
            state = next;

            if !matches!(state, DialogState::Close { .. } | DialogState::Done { .. }) {
                self.pacer.step().await;
            }
        }
    }

    async fn record_engagement(&self, key: &str) -> Result<()> {
        let at = Utc::now();
        with_retries(
            "visit ledger update",
            || self.ledger.record_engagement(key, at),
            LEDGER_WRITE_ATTEMPTS,
            self.pacer.verify_interval(),
        )
        .await
    }

    /// Perform the UI step for `state`
    async fn perform(&self, state: &DialogState, entry: &ActionPlanEntry) -> Result<DialogEvent> {
        match state {
            DialogState::OpenTarget => self.open_target(entry).await,
            DialogState::Like => self.like().await,
            DialogState::FindCommentBox => self.find_comment_box().await,
            DialogState::ComposeText => self.compose_text(entry.decision).await,
            DialogState::TypeText { text } => self.type_text(text).await,
            DialogState::Submit => self.submit().await,
            DialogState::Close { .. } | DialogState::Done { .. } => Ok(DialogEvent::Closed),
        }
    }

    /// Open the post in a new context
    async fn open_target(&self, entry: &ActionPlanEntry) -> Result<DialogEvent> {
        let Some(url) = entry.url.as_deref() else {
            warn!("No URL for post by {}", entry.counterparty);
            return Ok(DialogEvent::OpenFailed);
        };

        self.port.open_context(url).await?;
        self.pacer.page_load().await;

        if self.limit_signalled().await? {
            return Ok(DialogEvent::LimitDetected);
        }
        Ok(DialogEvent::Opened)
    }

    async fn like(&self) -> Result<DialogEvent> {
        let selectors = &self.config.selectors;
        let Some(button) = self
            .port
            .wait_until_present(&selectors.post_like_button, self.pacer.element_timeout())
            .await?
        else {
            debug!("Like control not found");
            return Ok(DialogEvent::LikeFailed);
        };

        if self.is_pressed(&button).await? {
            return Ok(DialogEvent::AlreadyLiked);
        }
        if !self.port.click(&button).await? {
            return Ok(DialogEvent::LikeFailed);
        }

        let pacing = self.pacer.config();
        let button = &button;
        let confirmed = poll_until(
            pacing.verify_attempts,
            self.pacer.verify_interval(),
            move || self.is_pressed(button),
        )
        .await?;

        if self.limit_signalled().await? {
            return Ok(DialogEvent::LimitDetected);
        }
        Ok(if confirmed {
            DialogEvent::Liked
        } else {
            DialogEvent::LikeFailed
        })
    }

    async fn is_pressed(&self, handle: &ElementHandle) -> Result<bool> {
        let value = self
            .port
            .attribute(handle, &self.config.selectors.pressed_attribute)
            .await?;
        Ok(value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true")))
    }

    async fn find_comment_box(&self) -> Result<DialogEvent> {
        let selectors = &self.config.selectors;
        let timeout = self.pacer.element_timeout();

        if self.already_commented().await? {
            return Ok(DialogEvent::AlreadyCommented);
        }

        if self.port.locate(&selectors.comment_input).await?.is_some() {
            return Ok(DialogEvent::CommentBoxReady);
        }

        // Some layouts only render the input after the comment button
        if let Some(button) = self.port.locate(&selectors.comment_open_button).await? {
            debug!("Opening comment box");
            self.port.click(&button).await?;
            self.pacer.step().await;
        }

        if self.already_commented().await? {
            return Ok(DialogEvent::AlreadyCommented);
        }

        Ok(
            match self
                .port
                .wait_until_present(&selectors.comment_input, timeout)
                .await?
            {
                Some(_) => DialogEvent::CommentBoxReady,
                None => DialogEvent::CommentBoxMissing,
            },
        )
    }

    /// Whether the operator's name already appears among comment authors
    async fn already_commented(&self) -> Result<bool> {
        let selectors = &self.config.selectors;
        let (Some(nickname), Some(authors)) = (&selectors.my_nickname, &selectors.comment_authors)
        else {
            return Ok(false);
        };
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Ok(false);
        }

        for handle in self.port.locate_all(authors).await? {
            if self.port.text(&handle).await?.trim() == nickname {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Produce comment text; never fails while a template is usable
    async fn compose_text(&self, decision: Decision) -> Result<DialogEvent> {
        if decision == Decision::AiComment {
            match self.assistant_text().await {
                Ok(Some(text)) => {
                    info!("Comment written by assistant");
                    return Ok(DialogEvent::TextReady { text });
                }
                Ok(None) => warn!("Assistant unusable, falling back to a template comment"),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!("Post extraction failed ({}), falling back to a template comment", e),
            }
        }

        Ok(match self.template_text() {
            Some(text) => DialogEvent::TextReady { text },
            None => DialogEvent::NoText,
        })
    }

    /// Assistant comment for the open post, or `None` when the post is too
    /// short or the assistant has nothing usable
    async fn assistant_text(&self) -> Result<Option<String>> {
        let Some(assistant) = self.assistant else {
            return Ok(None);
        };
        if !assistant.is_available() {
            return Ok(None);
        }

        let engagement = &self.config.engagement;
        let Some((title, body)) = self.post_content().await? else {
            return Ok(None);
        };
        if body.chars().count() < engagement.min_content_chars {
            debug!(
                "Post body too short for the assistant ({} chars)",
                body.chars().count()
            );
            return Ok(None);
        }

        let content = format!(
            "Title: {}\n\n{}",
            title,
            truncate_chars(&body, engagement.content_prefix_chars)
        );
        let prompt = if self.config.assistant.prompt.trim().is_empty() {
            DEFAULT_PROMPT
        } else {
            self.config.assistant.prompt.as_str()
        };

        let generated = fail_open("assistant", || assistant.generate(&content, prompt))
            .await
            .flatten();
        Ok(generated
            .map(|text| strip_non_bmp(&text).trim().to_string())
            .filter(|text| !text.is_empty()))
    }

    /// Title and body text of the open post
    async fn post_content(&self) -> Result<Option<(String, String)>> {
        let selectors = &self.config.selectors;

        let title = match self.port.locate(&selectors.post_title).await? {
            Some(handle) => self.port.text(&handle).await?,
            None => String::new(),
        };
        let title = if title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            title.trim().to_string()
        };

        let body = match self.port.locate(&selectors.post_body).await? {
            Some(handle) => self.port.text(&handle).await?,
            None => self.port.page_text().await?,
        };
        let body = body.trim().to_string();
        if body.is_empty() {
            return Ok(None);
        }
        Ok(Some((title, body)))
    }

    /// Random template, stripped of characters the driver cannot type
    fn template_text(&self) -> Option<String> {
        let usable: Vec<String> = self
            .config
            .engagement
            .messages
            .iter()
            .map(|m| strip_non_bmp(m).trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        usable.choose(&mut rand::thread_rng()).cloned()
    }

    async fn type_text(&self, text: &str) -> Result<DialogEvent> {
        let Some(input) = self.port.locate(&self.config.selectors.comment_input).await? else {
            return Ok(DialogEvent::TypeFailed);
        };
        self.port.click(&input).await?;

        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.port.type_text(&input, ch.encode_utf8(&mut buf)).await?;
            self.pacer.keystroke().await;
        }

        let typed = self.port.input_value(&input).await?;
        Ok(if typed.trim().is_empty() {
            DialogEvent::TypeFailed
        } else {
            DialogEvent::Typed
        })
    }

    async fn submit(&self) -> Result<DialogEvent> {
        let selectors = &self.config.selectors;
        let Some(button) = self.port.locate(&selectors.comment_submit).await? else {
            return Ok(DialogEvent::SubmitUnconfirmed);
        };
        let Some(input) = self.port.locate(&selectors.comment_input).await? else {
            return Ok(DialogEvent::SubmitUnconfirmed);
        };

        if !self.port.click(&button).await? {
            return Ok(DialogEvent::SubmitUnconfirmed);
        }

        if self.limit_signalled().await? {
            return Ok(DialogEvent::LimitDetected);
        }

        // The input clears once the platform has accepted the comment
        let pacing = self.pacer.config();
        let input = &input;
        let cleared = poll_until(
            pacing.verify_attempts,
            self.pacer.verify_interval(),
            move || self.is_cleared(input),
        )
        .await?;
        if cleared {
            return Ok(DialogEvent::Submitted);
        }

        if self.limit_signalled().await? {
            return Ok(DialogEvent::LimitDetected);
        }
        Ok(DialogEvent::SubmitUnconfirmed)
    }

    async fn is_cleared(&self, input: &ElementHandle) -> Result<bool> {
        Ok(self.port.input_value(input).await?.trim().is_empty())
    }

    /// Check native alerts and limit notices for a configured limit phrase.
    ///
    /// Alerts that do not match are dismissed and logged.
    async fn limit_signalled(&self) -> Result<bool> {
        while let Some(alert) = self.port.take_alert().await? {
            if self.is_limit_text(&alert) {
                warn!("Platform limit alert: {}", alert.trim());
                return Ok(true);
            }
            debug!("Dismissed alert: {}", alert.trim());
        }

        let notice = &self.config.selectors.limit_notice;
        if notice.trim().is_empty() {
            return Ok(false);
        }
        for handle in self.port.locate_all(notice).await? {
            let text = self.port.text(&handle).await?;
            if self.is_limit_text(&text) {
                warn!("Platform limit notice: {}", text.trim());
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn is_limit_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.config
            .engagement
            .limit_phrases
            .iter()
            .any(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
    }

    /// Close contexts until the depth is back to `base_depth`
    async fn close_to(&self, base_depth: usize) -> Result<()> {
        for _ in 0..MAX_CLOSE_ATTEMPTS {
            match self.port.context_depth().await {
                Ok(depth) if depth <= base_depth => return Ok(()),
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Could not read context depth: {}", e);
                    return Ok(());
                }
            }
            if let Err(e) = self.port.close_context().await {
                if e.is_fatal() {
                    return Err(e);
                }
                warn!("Failed to close context: {}", e);
            }
        }
        warn!("Secondary context still open after cleanup");
        Ok(())
    }
}

/// Event a step degrades to when it errors without losing the session
fn failure_event(state: &DialogState) -> DialogEvent {
    match state {
        DialogState::OpenTarget => DialogEvent::OpenFailed,
        DialogState::Like => DialogEvent::LikeFailed,
        DialogState::FindCommentBox => DialogEvent::CommentBoxMissing,
        DialogState::ComposeText => DialogEvent::NoText,
        DialogState::TypeText { .. } => DialogEvent::TypeFailed,
        DialogState::Submit => DialogEvent::SubmitUnconfirmed,
        DialogState::Close { .. } | DialogState::Done { .. } => DialogEvent::Closed,
    }
}
