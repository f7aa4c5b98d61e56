//! Notification stream access
//!
//! The stream is an infinite-scroll list with no cursor: all the scanner can
//! do is count rendered cards, read one, ask whether the bottom is showing,
//! and scroll for more.

use async_trait::async_trait;
use revisit_core::{
    ElementHandle, EventType, FeedItem, InteractionPort, Result, ScanConfig, SelectorConfig,
};
use tracing::debug;

use crate::pacing::Pacer;
use crate::text::squash_whitespace;

/// Cursorless view of the notification stream, newest first
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Bring the stream into view
    async fn open(&self) -> Result<()>;

    /// Number of cards currently rendered
    async fn rendered_count(&self) -> Result<usize>;

    /// Card at `index`; `None` for cards that are not a tracked engagement
    async fn read(&self, index: usize) -> Result<Option<FeedItem>>;

    /// Whether the "no more content" sentinel is showing
    async fn at_bottom(&self) -> Result<bool>;

    /// Ask the stream to render more cards
    async fn load_more(&self) -> Result<()>;
}

/// Classify card text by keyword.
///
/// Replies are checked before comments since a reply notification usually
/// mentions the comment it answers.
pub fn classify(text: &str, scan: &ScanConfig) -> Option<EventType> {
    let lower = text.to_lowercase();
    let hit = |keywords: &[String]| {
        keywords
            .iter()
            .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
    };

    if hit(&scan.reply_keywords) {
        Some(EventType::Reply)
    } else if hit(&scan.comment_keywords) {
        Some(EventType::Comment)
    } else if hit(&scan.like_keywords) {
        Some(EventType::Like)
    } else {
        None
    }
}

/// Notification stream read through an [`InteractionPort`]
pub struct DomNotifications<'a, P: InteractionPort + ?Sized> {
    port: &'a P,
    selectors: &'a SelectorConfig,
    scan: &'a ScanConfig,
    pacer: &'a Pacer,
}

impl<'a, P: InteractionPort + ?Sized> DomNotifications<'a, P> {
    pub fn new(
        port: &'a P,
        selectors: &'a SelectorConfig,
        scan: &'a ScanConfig,
        pacer: &'a Pacer,
    ) -> Self {
        Self {
            port,
            selectors,
            scan,
            pacer,
        }
    }

    async fn child_text(&self, card: &ElementHandle, selector: &str) -> Result<String> {
        match self.port.locate_within(card, selector).await? {
            Some(handle) => self.port.text(&handle).await,
            None => Ok(String::new()),
        }
    }
}

#[async_trait]
impl<'a, P: InteractionPort + ?Sized> NotificationSource for DomNotifications<'a, P> {
    async fn open(&self) -> Result<()> {
        self.port.navigate(&self.selectors.notification_url).await?;
        self.pacer.page_load().await;
        self.port
            .wait_until_present(
                &self.selectors.notification_item,
                self.pacer.element_timeout(),
            )
            .await?;
        Ok(())
    }

    async fn rendered_count(&self) -> Result<usize> {
        Ok(self
            .port
            .locate_all(&self.selectors.notification_item)
            .await?
            .len())
    }

    async fn read(&self, index: usize) -> Result<Option<FeedItem>> {
        let card = ElementHandle::root(&self.selectors.notification_item, index);
        let card_text = self.port.text(&card).await?;
        let actor = self
            .child_text(&card, &self.selectors.notification_actor)
            .await?;
        let displayed_time = self
            .child_text(&card, &self.selectors.notification_time)
            .await?;

        let Some(event_type) = classify(&card_text, self.scan) else {
            debug!("Skipping untracked notification #{}", index);
            return Ok(None);
        };
        if actor.is_empty() {
            debug!("Skipping notification #{} without actor", index);
            return Ok(None);
        }

        // The time text changes as the card ages, so it never enters the snippet
        let snippet = if displayed_time.is_empty() {
            squash_whitespace(&card_text)
        } else {
            squash_whitespace(&card_text.replace(&displayed_time, " "))
        };

        Ok(Some(FeedItem::new(actor, event_type, snippet, displayed_time)))
    }

    async fn at_bottom(&self) -> Result<bool> {
        Ok(self
            .port
            .locate(&self.selectors.feed_bottom)
            .await?
            .is_some())
    }

    async fn load_more(&self) -> Result<()> {
        self.port.scroll(self.scan.scroll_step_px).await?;
        self.pacer.scroll_settle().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisit_core::{MockElement, MockPage, MockPort, PacingConfig};

    #[test]
    fn test_classify_keywords() {
        let scan = ScanConfig::default();
        assert_eq!(
            classify("alice님이 회원님의 글에 공감했습니다", &scan),
            Some(EventType::Like)
        );
        assert_eq!(
            classify("alice님이 댓글을 남겼습니다", &scan),
            Some(EventType::Comment)
        );
        assert_eq!(
            classify("alice님이 답글을 남겼습니다", &scan),
            Some(EventType::Reply)
        );
        assert_eq!(
            classify("Bob replied to your comment", &scan),
            Some(EventType::Reply)
        );
        assert_eq!(classify("Bob added you as a neighbor", &scan), None);
    }

    #[tokio::test]
    async fn test_read_card_drops_time_from_snippet() {
        let selectors = SelectorConfig::default();
        let scan = ScanConfig::default();
        let pacer = Pacer::new(PacingConfig::instant());

        let card = MockElement::new("alice commented on Trip log 5 minutes ago")
            .with_child(&selectors.notification_actor, MockElement::new("alice"))
            .with_child(&selectors.notification_time, MockElement::new("5 minutes ago"));
        let page = MockPage::new().with(&selectors.notification_item, card);
        let port = MockPort::new().with_page(&selectors.notification_url, page);

        let source = DomNotifications::new(&port, &selectors, &scan, &pacer);
        source.open().await.unwrap();
        assert_eq!(source.rendered_count().await.unwrap(), 1);

        let item = source.read(0).await.unwrap().unwrap();
        assert_eq!(item.actor, "alice");
        assert_eq!(item.event_type, EventType::Comment);
        assert_eq!(item.content_snippet, "alice commented on Trip log");
        assert_eq!(item.displayed_time, "5 minutes ago");
    }
}
