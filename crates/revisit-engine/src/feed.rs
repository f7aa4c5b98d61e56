//! Subscription feed pages

use revisit_core::{ElementHandle, FeedPost, InteractionPort, Result, SelectorConfig};
use tracing::{debug, warn};

use crate::pacing::Pacer;

/// Load feed page `page` and read every post card on it
pub async fn load_feed_page<P: InteractionPort + ?Sized>(
    port: &P,
    selectors: &SelectorConfig,
    pacer: &Pacer,
    page: usize,
) -> Result<Vec<FeedPost>> {
    port.navigate(&selectors.feed_page_url(page)).await?;
    pacer.page_load().await;
    if port
        .wait_until_present(&selectors.feed_item, pacer.element_timeout())
        .await?
        .is_none()
    {
        debug!("Feed page {} has no posts", page);
        return Ok(Vec::new());
    }

    let cards = port.locate_all(&selectors.feed_item).await?;
    let mut posts = Vec::with_capacity(cards.len());
    for (index, card) in cards.iter().enumerate() {
        match read_card(port, selectors, card, index).await {
            Ok(post) => posts.push(post),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Card {} on feed page {} unreadable: {}", index, page, e);
                posts.push(FeedPost::unreadable(index));
            }
        }
    }
    Ok(posts)
}

async fn read_card<P: InteractionPort + ?Sized>(
    port: &P,
    selectors: &SelectorConfig,
    card: &ElementHandle,
    index: usize,
) -> Result<FeedPost> {
    let author = match port.locate_within(card, &selectors.feed_author_name).await? {
        Some(handle) => port.text(&handle).await?,
        None => String::new(),
    };

    let author_id = match port.locate_within(card, &selectors.feed_author_link).await? {
        Some(handle) => port
            .attribute(&handle, "href")
            .await?
            .as_deref()
            .and_then(blog_id_from_href),
        None => None,
    };

    let post_url = match port.locate_within(card, &selectors.feed_post_link).await? {
        Some(handle) => port.attribute(&handle, "href").await?,
        None => None,
    };
    let url = post_url
        .filter(|u| !u.trim().is_empty())
        .or_else(|| author_id.as_deref().map(|id| selectors.author_blog_url(id)));

    Ok(FeedPost {
        index,
        author,
        author_id,
        url,
    })
}

/// Blog id from an author link: the `blogId` query parameter, else the
/// first path segment
pub fn blog_id_from_href(href: &str) -> Option<String> {
    if let Some(pos) = href.find("blogId=") {
        let rest = &href[pos + "blogId=".len()..];
        let id: String = rest.chars().take_while(|c| *c != '&' && *c != '#').collect();
        return (!id.is_empty()).then_some(id);
    }

    let without_query = href.split(['?', '#']).next().unwrap_or(href);
    let path = match without_query.find("://") {
        Some(scheme_end) => {
            let after = &without_query[scheme_end + 3..];
            after.find('/').map(|i| &after[i..]).unwrap_or("")
        }
        None => without_query,
    };
    path.split('/')
        .find(|seg| !seg.is_empty())
        .map(str::to_string)
}
