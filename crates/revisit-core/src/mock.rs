//! Scripted in-memory interaction port for testing
//!
//! Pages are trees of [`MockElement`]s keyed by URL. Selectors match by exact
//! string, and element state (pressed attributes, input values) lives on the
//! page, so it survives closing and reopening a context.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::port::{ElementHandle, InteractionPort, LocatorStep};
use crate::{Result, RevisitError};

const BLANK: &str = "about:blank";

/// What happens when a mock element is clicked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClickEffect {
    /// Click lands, nothing changes
    #[default]
    None,
    /// Flip an attribute between "true" and "false"
    Toggle { attribute: String },
    /// Post the value of the root input `input` and clear it; a set `alert`
    /// rejects the post and raises a native alert instead
    Submit {
        input: String,
        alert: Option<String>,
    },
    /// Insert a new root element, as a "write a comment" button does
    Reveal {
        selector: String,
        element: Box<MockElement>,
    },
    /// Click is refused
    Unresponsive,
}

/// One element on a mock page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockElement {
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub value: String,
    pub on_click: ClickEffect,
    pub children: Vec<(String, MockElement)>,
    /// Reads of this element fail as if it was re-rendered under the handle
    pub stale: bool,
}

impl MockElement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, selector: impl Into<String>, child: MockElement) -> Self {
        self.children.push((selector.into(), child));
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = effect;
        self
    }

    pub fn stale(mut self) -> Self {
        self.stale = true;
        self
    }

    fn collect_text(&self, out: &mut Vec<String>) {
        if !self.text.is_empty() {
            out.push(self.text.clone());
        }
        for (_, child) in &self.children {
            child.collect_text(out);
        }
    }
}

/// Root list that renders `batch` more entries per scroll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyList {
    pub selector: String,
    pub batch: usize,
    pub revealed: usize,
    /// Root selector that only matches once every entry is rendered
    pub sentinel: Option<String>,
}

/// One mock page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockPage {
    pub roots: Vec<(String, MockElement)>,
    /// Free text shown on the page besides element text
    pub banner: String,
    pub lazy: Option<LazyList>,
    /// Opening this page drops the whole session
    pub kills_session: bool,
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: impl Into<String>, element: MockElement) -> Self {
        self.roots.push((selector.into(), element));
        self
    }

    pub fn with_banner(mut self, banner: impl Into<String>) -> Self {
        self.banner = banner.into();
        self
    }

    /// Render entries of `selector` `batch` at a time as the page scrolls
    pub fn lazy(
        mut self,
        selector: impl Into<String>,
        batch: usize,
        sentinel: Option<&str>,
    ) -> Self {
        self.lazy = Some(LazyList {
            selector: selector.into(),
            batch,
            revealed: batch,
            sentinel: sentinel.map(str::to_string),
        });
        self
    }

    pub fn killing_session(mut self) -> Self {
        self.kills_session = true;
        self
    }

    fn total(&self, selector: &str) -> usize {
        self.roots.iter().filter(|(s, _)| s == selector).count()
    }

    /// Root matches currently rendered for `selector`
    fn rendered(&self, selector: &str) -> usize {
        if let Some(lazy) = &self.lazy {
            if lazy.selector == selector {
                return lazy.revealed.min(self.total(selector));
            }
            if lazy.sentinel.as_deref() == Some(selector) {
                let done = lazy.revealed >= self.total(&lazy.selector);
                return if done { 1 } else { 0 };
            }
        }
        self.total(selector)
    }

    fn is_lazy_sentinel(&self, selector: &str) -> bool {
        self.lazy
            .as_ref()
            .and_then(|l| l.sentinel.as_deref())
            .is_some_and(|s| s == selector)
    }

    fn resolve(&self, steps: &[LocatorStep]) -> Option<&MockElement> {
        let (first, rest) = steps.split_first()?;
        if first.index >= self.rendered(&first.selector) || self.is_lazy_sentinel(&first.selector)
        {
            return None;
        }
        let mut current = nth_match(&self.roots, &first.selector, first.index)?;
        for step in rest {
            current = nth_match(&current.children, &step.selector, step.index)?;
        }
        Some(current)
    }

    fn resolve_mut(&mut self, steps: &[LocatorStep]) -> Option<&mut MockElement> {
        let (first, rest) = steps.split_first()?;
        if first.index >= self.rendered(&first.selector) || self.is_lazy_sentinel(&first.selector)
        {
            return None;
        }
        let mut current = nth_match_mut(&mut self.roots, &first.selector, first.index)?;
        for step in rest {
            current = nth_match_mut(&mut current.children, &step.selector, step.index)?;
        }
        Some(current)
    }

    fn text(&self) -> String {
        let mut parts = Vec::new();
        if !self.banner.is_empty() {
            parts.push(self.banner.clone());
        }
        for (_, element) in &self.roots {
            element.collect_text(&mut parts);
        }
        parts.join("\n")
    }
}

fn nth_match<'a>(
    list: &'a [(String, MockElement)],
    selector: &str,
    index: usize,
) -> Option<&'a MockElement> {
    list.iter()
        .filter(|(s, _)| s == selector)
        .nth(index)
        .map(|(_, e)| e)
}

fn nth_match_mut<'a>(
    list: &'a mut [(String, MockElement)],
    selector: &str,
    index: usize,
) -> Option<&'a mut MockElement> {
    list.iter_mut()
        .filter(|(s, _)| s == selector)
        .nth(index)
        .map(|(_, e)| e)
}

/// Text posted through a submit control
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub url: String,
    pub text: String,
}

#[derive(Debug, Default)]
struct MockState {
    pages: HashMap<String, MockPage>,
    contexts: Vec<String>,
    alerts: VecDeque<String>,
    clicks: Vec<String>,
    submissions: Vec<Submission>,
    navigations: Vec<String>,
    opened: usize,
    closed: usize,
    scrolls: usize,
    session_lost: bool,
}

impl MockState {
    fn current_url(&self) -> &str {
        self.contexts.last().map(String::as_str).unwrap_or(BLANK)
    }

    fn check_session(&self) -> Result<()> {
        if self.session_lost {
            return Err(RevisitError::SessionLost("mock session closed".to_string()));
        }
        Ok(())
    }

    fn page(&self) -> Result<&MockPage> {
        self.check_session()?;
        let url = self.current_url();
        self.pages
            .get(url)
            .ok_or_else(|| RevisitError::Navigation(format!("no mock page for {}", url)))
    }

    fn page_mut(&mut self) -> Result<&mut MockPage> {
        self.check_session()?;
        let url = self.current_url().to_string();
        self.pages
            .get_mut(&url)
            .ok_or_else(|| RevisitError::Navigation(format!("no mock page for {}", url)))
    }

    fn enter(&mut self, url: &str) -> Result<()> {
        self.check_session()?;
        let page = self
            .pages
            .get(url)
            .ok_or_else(|| RevisitError::Navigation(format!("no mock page for {}", url)))?;
        let kills_session = page.kills_session;
        if kills_session {
            self.session_lost = true;
            return Err(RevisitError::SessionLost(format!("session died opening {}", url)));
        }
        self.navigations.push(url.to_string());
        Ok(())
    }
}

/// Scripted [`InteractionPort`] for tests
pub struct MockPort {
    state: Mutex<MockState>,
}

impl Default for MockPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPort {
    pub fn new() -> Self {
        let mut state = MockState::default();
        state.pages.insert(BLANK.to_string(), MockPage::new());
        state.contexts.push(BLANK.to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_page(self, url: impl Into<String>, page: MockPage) -> Self {
        self.lock().pages.insert(url.into(), page);
        self
    }

    /// Queue a native alert as if the platform had raised one
    pub fn push_alert(&self, text: impl Into<String>) {
        self.lock().alerts.push_back(text.into());
    }

    /// Drop the session; every later call fails with `SessionLost`
    pub fn lose_session(&self) {
        self.lock().session_lost = true;
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn opened_contexts(&self) -> usize {
        self.lock().opened
    }

    pub fn closed_contexts(&self) -> usize {
        self.lock().closed
    }

    pub fn open_depth(&self) -> usize {
        self.lock().contexts.len()
    }

    pub fn scroll_count(&self) -> usize {
        self.lock().scrolls
    }

    /// Snapshot of a page, including element state changed by clicks
    pub fn page_snapshot(&self, url: &str) -> Option<MockPage> {
        self.lock().pages.get(url).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl InteractionPort for MockPort {
    async fn locate(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let state = self.lock();
        let page = state.page()?;
        Ok((page.rendered(selector) > 0).then(|| ElementHandle::root(selector, 0)))
    }

    async fn locate_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let state = self.lock();
        let page = state.page()?;
        Ok((0..page.rendered(selector))
            .map(|i| ElementHandle::root(selector, i))
            .collect())
    }

    async fn locate_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>> {
        let state = self.lock();
        let page = state.page()?;
        let found = page
            .resolve(parent.steps())
            .and_then(|el| nth_match(&el.children, selector, 0))
            .is_some();
        Ok(found.then(|| parent.child(selector, 0)))
    }

    async fn text(&self, handle: &ElementHandle) -> Result<String> {
        let state = self.lock();
        let page = state.page()?;
        page.resolve(handle.steps())
            .filter(|el| !el.stale)
            .map(|el| el.text.trim().to_string())
            .ok_or_else(|| RevisitError::ElementNotFound(handle.to_string()))
    }

    async fn attribute(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        let page = state.page()?;
        page.resolve(handle.steps())
            .filter(|el| !el.stale)
            .map(|el| el.attributes.get(name).cloned())
            .ok_or_else(|| RevisitError::ElementNotFound(handle.to_string()))
    }

    async fn click(&self, handle: &ElementHandle) -> Result<bool> {
        let mut state = self.lock();
        let url = state.current_url().to_string();
        let mut raised = None;
        let mut posted = None;
        {
            let page = state.page_mut()?;
            let effect = match page.resolve_mut(handle.steps()) {
                Some(el) => el.on_click.clone(),
                None => return Ok(false),
            };

            match effect {
                ClickEffect::Unresponsive => return Ok(false),
                ClickEffect::None => {}
                ClickEffect::Toggle { attribute } => {
                    if let Some(el) = page.resolve_mut(handle.steps()) {
                        let pressed = el.attributes.get(&attribute).is_some_and(|v| v == "true");
                        el.attributes
                            .insert(attribute, if pressed { "false" } else { "true" }.to_string());
                    }
                }
                ClickEffect::Reveal { selector, element } => {
                    page.roots.push((selector, *element));
                }
                ClickEffect::Submit { input, alert } => match alert {
                    Some(message) => raised = Some(message),
                    None => {
                        posted = nth_match_mut(&mut page.roots, &input, 0)
                            .map(|el| std::mem::take(&mut el.value));
                    }
                },
            }
        }

        if let Some(message) = raised {
            state.alerts.push_back(message);
        }
        if let Some(text) = posted {
            state.submissions.push(Submission { url, text });
        }
        state.clicks.push(handle.to_string());
        Ok(true)
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<()> {
        let mut state = self.lock();
        let page = state.page_mut()?;
        let el = page
            .resolve_mut(handle.steps())
            .ok_or_else(|| RevisitError::ElementNotFound(handle.to_string()))?;
        el.value.push_str(text);
        Ok(())
    }

    async fn input_value(&self, handle: &ElementHandle) -> Result<String> {
        let state = self.lock();
        let page = state.page()?;
        page.resolve(handle.steps())
            .map(|el| el.value.clone())
            .ok_or_else(|| RevisitError::ElementNotFound(handle.to_string()))
    }

    async fn scroll(&self, _amount_px: i64) -> Result<()> {
        let mut state = self.lock();
        state.scrolls += 1;
        let page = state.page_mut()?;
        if let Some(lazy) = page.lazy.as_mut() {
            lazy.revealed += lazy.batch;
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.enter(url)?;
        match state.contexts.last_mut() {
            Some(top) => *top = url.to_string(),
            None => state.contexts.push(url.to_string()),
        }
        Ok(())
    }

    async fn open_context(&self, url: &str) -> Result<()> {
        let mut state = self.lock();
        state.enter(url)?;
        state.contexts.push(url.to_string());
        state.opened += 1;
        Ok(())
    }

    async fn close_context(&self) -> Result<()> {
        let mut state = self.lock();
        state.check_session()?;
        if state.contexts.len() > 1 {
            state.contexts.pop();
            state.closed += 1;
        }
        Ok(())
    }

    async fn context_depth(&self) -> Result<usize> {
        let state = self.lock();
        state.check_session()?;
        Ok(state.contexts.len())
    }

    async fn wait_until_present(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<Option<ElementHandle>> {
        self.locate(selector).await
    }

    async fn take_alert(&self) -> Result<Option<String>> {
        let mut state = self.lock();
        state.check_session()?;
        Ok(state.alerts.pop_front())
    }

    async fn page_text(&self) -> Result<String> {
        let state = self.lock();
        Ok(state.page()?.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_page() -> MockPage {
        MockPage::new()
            .with(
                ".like",
                MockElement::new("Like")
                    .with_attr("aria-pressed", "false")
                    .on_click(ClickEffect::Toggle {
                        attribute: "aria-pressed".into(),
                    }),
            )
            .with("textarea", MockElement::new(""))
            .with(
                ".submit",
                MockElement::new("Post").on_click(ClickEffect::Submit {
                    input: "textarea".into(),
                    alert: None,
                }),
            )
    }

    #[tokio::test]
    async fn test_toggle_and_submit() {
        let port = MockPort::new().with_page("https://blog/post", post_page());
        port.open_context("https://blog/post").await.unwrap();

        let like = port.locate(".like").await.unwrap().unwrap();
        assert!(port.click(&like).await.unwrap());
        assert_eq!(
            port.attribute(&like, "aria-pressed").await.unwrap().as_deref(),
            Some("true")
        );

        let input = port.locate("textarea").await.unwrap().unwrap();
        port.type_text(&input, "hi").await.unwrap();
        port.type_text(&input, "!").await.unwrap();
        let submit = port.locate(".submit").await.unwrap().unwrap();
        port.click(&submit).await.unwrap();

        assert_eq!(port.input_value(&input).await.unwrap(), "");
        assert_eq!(port.submissions()[0].text, "hi!");

        port.close_context().await.unwrap();
        assert_eq!(port.open_depth(), 1);
        assert_eq!(port.closed_contexts(), 1);
    }

    #[tokio::test]
    async fn test_lazy_list_reveals_on_scroll() {
        let page = MockPage::new()
            .with("li", MockElement::new("a"))
            .with("li", MockElement::new("b"))
            .with("li", MockElement::new("c"))
            .lazy("li", 2, Some(".bottom"));
        let port = MockPort::new().with_page("https://feed", page);
        port.navigate("https://feed").await.unwrap();

        assert_eq!(port.locate_all("li").await.unwrap().len(), 2);
        assert!(port.locate(".bottom").await.unwrap().is_none());

        port.scroll(500).await.unwrap();
        assert_eq!(port.locate_all("li").await.unwrap().len(), 3);
        assert!(port.locate(".bottom").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_page_is_navigation_error() {
        let port = MockPort::new();
        let err = port.open_context("https://nowhere").await.unwrap_err();
        assert!(matches!(err, RevisitError::Navigation(_)));
        assert_eq!(port.open_depth(), 1);
    }

    #[tokio::test]
    async fn test_lost_session_is_fatal() {
        let port = MockPort::new();
        port.lose_session();
        let err = port.locate("div").await.unwrap_err();
        assert!(err.is_fatal());
    }
}
