//! Interaction port
//!
//! Everything revisit does to the platform goes through [`InteractionPort`]:
//! element lookup, clicks, typing, scrolling and browsing contexts. The engine
//! never touches a browser directly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::Result;

/// One step of an element path: the `index`-th match of `selector`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocatorStep {
    pub selector: String,
    pub index: usize,
}

/// Opaque reference to a rendered element
///
/// A handle is a path of selector matches from the document root, so it
/// stays meaningful across calls without holding a live node reference.
/// Handles are only valid in the context they were located in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    steps: Vec<LocatorStep>,
}

impl ElementHandle {
    pub fn root(selector: impl Into<String>, index: usize) -> Self {
        Self {
            steps: vec![LocatorStep {
                selector: selector.into(),
                index,
            }],
        }
    }

    /// Handle for the `index`-th match of `selector` inside this element
    pub fn child(&self, selector: impl Into<String>, index: usize) -> Self {
        let mut steps = self.steps.clone();
        steps.push(LocatorStep {
            selector: selector.into(),
            index,
        });
        Self { steps }
    }

    pub fn steps(&self) -> &[LocatorStep] {
        &self.steps
    }

    pub fn parent(&self) -> Option<ElementHandle> {
        if self.steps.len() < 2 {
            return None;
        }
        Some(Self {
            steps: self.steps[..self.steps.len() - 1].to_vec(),
        })
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .steps
            .iter()
            .map(|s| format!("{}[{}]", s.selector, s.index))
            .collect();
        f.write_str(&parts.join(" > "))
    }
}

/// Primitive UI operations on one authenticated browsing session
///
/// Lookups return `Ok(None)` when nothing matches; `Err` is reserved for the
/// port itself failing. A lost session must surface as
/// [`RevisitError::SessionLost`](crate::RevisitError::SessionLost).
#[async_trait]
pub trait InteractionPort: Send + Sync {
    /// First element matching `selector` in the current context
    async fn locate(&self, selector: &str) -> Result<Option<ElementHandle>>;

    /// Every element matching `selector`, in document order
    async fn locate_all(&self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// First element matching `selector` inside `parent`
    async fn locate_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>>;

    /// Visible text of an element, trimmed
    async fn text(&self, handle: &ElementHandle) -> Result<String>;

    async fn attribute(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Click an element; `false` when the element could not be clicked
    async fn click(&self, handle: &ElementHandle) -> Result<bool>;

    /// Type text into an input, appending to what is there
    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<()>;

    /// Current value of an input element
    async fn input_value(&self, handle: &ElementHandle) -> Result<String>;

    /// Scroll the current context by `amount_px` pixels
    async fn scroll(&self, amount_px: i64) -> Result<()>;

    /// Load `url` in the current context
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Open `url` in a new context and make it current
    async fn open_context(&self, url: &str) -> Result<()>;

    /// Close the current secondary context and return to the previous one.
    /// Closing with no secondary context open is a no-op.
    async fn close_context(&self) -> Result<()>;

    /// Number of contexts currently open, primary included
    async fn context_depth(&self) -> Result<usize>;

    /// Wait up to `timeout` for `selector` to match
    async fn wait_until_present(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>>;

    /// Dismiss and return the text of a pending native alert, if any
    async fn take_alert(&self) -> Result<Option<String>>;

    /// Full visible text of the current context
    async fn page_text(&self) -> Result<String>;
}
