//! JavaScript snippets evaluated in the page
//!
//! Elements are addressed by [`ElementHandle`] steps: each step narrows the
//! search to the n-th match of a selector inside the previous match.
//! Strings are embedded as JSON literals so selectors and text never need
//! manual escaping.

use revisit_core::ElementHandle;
use serde_json::json;

/// Name of the page-global queue that collects native alert messages
pub const ALERT_QUEUE: &str = "__revisitAlerts";

fn literal(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn steps_literal(handle: &ElementHandle) -> String {
    let steps: Vec<serde_json::Value> = handle
        .steps()
        .iter()
        .map(|s| json!([s.selector, s.index]))
        .collect();
    serde_json::Value::Array(steps).to_string()
}

/// Wrap `body` in a function where `el` is the resolved element, or null
fn with_element(handle: &ElementHandle, body: &str) -> String {
    format!(
        "(() => {{ let scope = document; let el = null; \
         for (const [sel, idx] of {steps}) {{ \
           el = scope.querySelectorAll(sel)[idx] || null; \
           if (!el) break; scope = el; }} \
         {body} }})()",
        steps = steps_literal(handle),
        body = body
    )
}

pub fn count(selector: &str) -> String {
    format!("document.querySelectorAll({}).length", literal(selector))
}

pub fn count_within(parent: &ElementHandle, selector: &str) -> String {
    with_element(
        parent,
        &format!(
            "return el ? el.querySelectorAll({}).length : -1;",
            literal(selector)
        ),
    )
}

pub fn text(handle: &ElementHandle) -> String {
    with_element(
        handle,
        "return el ? (el.innerText || el.textContent || '') : null;",
    )
}

/// JSON `[value]` for a found element (value may be null), null otherwise
pub fn attribute(handle: &ElementHandle, name: &str) -> String {
    with_element(
        handle,
        &format!(
            "return el ? JSON.stringify([el.getAttribute({})]) : null;",
            literal(name)
        ),
    )
}

pub fn click(handle: &ElementHandle) -> String {
    with_element(
        handle,
        "if (!el || el.disabled) return false; \
         el.scrollIntoView({ block: 'center' }); el.click(); return true;",
    )
}

pub fn focus(handle: &ElementHandle) -> String {
    with_element(
        handle,
        "if (!el) return false; el.scrollIntoView({ block: 'center' }); el.focus(); return true;",
    )
}

/// Value of an input, or the text of a contenteditable box
pub fn input_value(handle: &ElementHandle) -> String {
    with_element(
        handle,
        "if (!el) return null; \
         return ('value' in el) ? String(el.value) : (el.innerText || '');",
    )
}

pub fn scroll_by(amount_px: i64) -> String {
    format!("window.scrollBy(0, {}); true", amount_px)
}

pub fn page_text() -> String {
    "document.body ? document.body.innerText : ''".to_string()
}

/// Replace `alert`/`confirm` with hooks that queue the message and never block
pub fn install_alert_hook() -> String {
    format!(
        "(() => {{ if (window.{q}) return false; window.{q} = []; \
         window.alert = (m) => {{ window.{q}.push(String(m)); }}; \
         window.confirm = (m) => {{ window.{q}.push(String(m)); return true; }}; \
         return true; }})()",
        q = ALERT_QUEUE
    )
}

/// Pop the oldest queued alert
pub fn take_alert() -> String {
    format!(
        "(window.{q} && window.{q}.length) ? window.{q}.shift() : null",
        q = ALERT_QUEUE
    )
}
