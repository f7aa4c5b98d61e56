//! Browser lifecycle and the Chrome DevTools interaction port

use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use revisit_core::{BrowserSettings, ElementHandle, InteractionPort, Result, RevisitError};
use serde_json::Value;
use std::ffi::OsStr;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::script;

/// Fragments of DevTools errors that mean the browser or tab is gone
const SESSION_LOST_MARKERS: &[&str] = &[
    "connection is closed",
    "connection closed",
    "target closed",
    "no target with given id",
    "browser closed",
    "websocket",
];

/// Map a DevTools error, promoting a dead connection to `SessionLost`
fn cdp_error(context: &str, err: impl Display, otherwise: fn(String) -> RevisitError) -> RevisitError {
    let message = format!("{}: {}", context, err);
    let lower = message.to_lowercase();
    if SESSION_LOST_MARKERS.iter().any(|m| lower.contains(m)) {
        RevisitError::SessionLost(message)
    } else {
        otherwise(message)
    }
}

/// Authenticated browser session driven over DevTools
///
/// The first tab is the primary context; [`InteractionPort::open_context`]
/// pushes a new tab and every call targets the most recent one.
pub struct BrowserSession {
    /// Kept alive for the lifetime of the tabs
    #[allow(dead_code)]
    browser: Browser,
    tabs: Mutex<Vec<Arc<Tab>>>,
    timeout: Duration,
}

impl BrowserSession {
    /// Attach to the debug port when configured, otherwise launch a browser
    pub async fn start(settings: &BrowserSettings) -> Result<Self> {
        match settings.debug_port {
            Some(port) => Self::connect(port, settings).await,
            None => Self::launch(settings).await,
        }
    }

    /// Launch a new browser instance
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        info!(
            "Launching browser (headless: {}, size: {}x{})",
            settings.headless, settings.window_width, settings.window_height
        );

        let mut launch_options = LaunchOptions::default_builder()
            .headless(settings.headless)
            .window_size(Some((settings.window_width, settings.window_height)))
            .build()
            .map_err(|e| RevisitError::Navigation(format!("Failed to launch browser: {}", e)))?;

        let user_agent_arg: Option<String> = settings
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));
        if let Some(ref ua_arg) = user_agent_arg {
            launch_options.args.push(OsStr::new(ua_arg));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| RevisitError::Navigation(format!("Failed to launch browser: {}", e)))?;

        info!("Browser launched successfully");
        Self::with_browser(browser, settings)
    }

    /// Connect to a browser started with `--remote-debugging-port`
    ///
    /// This is how an already logged-in profile is reused.
    pub async fn connect(port: u16, settings: &BrowserSettings) -> Result<Self> {
        info!("Connecting to existing browser on port {}", port);

        let ws_url = debugger_url(port).await?;
        let browser = Browser::connect(ws_url)
            .map_err(|e| RevisitError::Navigation(format!("Failed to connect to browser: {}", e)))?;

        info!("Connected to browser successfully");
        Self::with_browser(browser, settings)
    }

    fn with_browser(browser: Browser, settings: &BrowserSettings) -> Result<Self> {
        let tab = browser
            .new_tab()
            .map_err(|e| cdp_error("Failed to create tab", e, RevisitError::Navigation))?;
        let timeout = Duration::from_secs(settings.timeout_seconds);
        tab.set_default_timeout(timeout);

        Ok(Self {
            browser,
            tabs: Mutex::new(vec![tab]),
            timeout,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Tab>>> {
        self.tabs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn current(&self) -> Result<Arc<Tab>> {
        self.lock()
            .last()
            .cloned()
            .ok_or_else(|| RevisitError::SessionLost("no open tab".to_string()))
    }

    async fn evaluate(&self, js: &str) -> Result<Value> {
        let tab = self.current()?;
        let result = tab
            .evaluate(js, false)
            .map_err(|e| cdp_error("JavaScript evaluation failed", e, RevisitError::Interaction))?;
        Ok(result.value.unwrap_or(Value::Null))
    }

    async fn count(&self, js: &str) -> Result<i64> {
        Ok(self.evaluate(js).await?.as_i64().unwrap_or(0))
    }

    async fn load(&self, tab: &Tab, url: &str) -> Result<()> {
        tab.navigate_to(url)
            .map_err(|e| cdp_error(&format!("Failed to navigate to {}", url), e, RevisitError::Navigation))?;
        tab.wait_until_navigated()
            .map_err(|e| cdp_error(&format!("Navigation timeout for {}", url), e, RevisitError::Navigation))?;

        // Alerts raised before the hook lands are missed; limit notices still catch them
        if let Err(e) = tab.evaluate(&script::install_alert_hook(), false) {
            warn!("Could not install alert hook on {}: {}", url, e);
        }
        Ok(())
    }

    /// Close every secondary tab; the primary tab stays open
    pub async fn close(self) -> Result<()> {
        info!("Closing browser session");
        while self.lock().len() > 1 {
            self.close_context().await?;
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        debug!("BrowserSession dropped, browser will be cleaned up");
    }
}

/// WebSocket debugger URL advertised on a DevTools port
async fn debugger_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/version", port);
    let version: Value = reqwest::get(&url)
        .await
        .map_err(|e| RevisitError::Navigation(format!("DevTools port {} unreachable: {}", port, e)))?
        .json()
        .await
        .map_err(|e| RevisitError::Navigation(format!("Bad DevTools response: {}", e)))?;

    version
        .get("webSocketDebuggerUrl")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            RevisitError::Navigation(format!("No debugger URL advertised on port {}", port))
        })
}

#[async_trait]
impl InteractionPort for BrowserSession {
    async fn locate(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let n = self.count(&script::count(selector)).await?;
        Ok((n > 0).then(|| ElementHandle::root(selector, 0)))
    }

    async fn locate_all(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let n = self.count(&script::count(selector)).await?.max(0) as usize;
        Ok((0..n).map(|i| ElementHandle::root(selector, i)).collect())
    }

    async fn locate_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>> {
        let n = self.count(&script::count_within(parent, selector)).await?;
        Ok((n > 0).then(|| parent.child(selector, 0)))
    }

    async fn text(&self, handle: &ElementHandle) -> Result<String> {
        match self.evaluate(&script::text(handle)).await? {
            Value::String(text) => Ok(text.trim().to_string()),
            _ => Err(RevisitError::ElementNotFound(handle.to_string())),
        }
    }

    async fn attribute(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
        let Value::String(encoded) = self.evaluate(&script::attribute(handle, name)).await? else {
            return Err(RevisitError::ElementNotFound(handle.to_string()));
        };
        let values: Vec<Option<String>> = serde_json::from_str(&encoded)?;
        Ok(values.into_iter().next().flatten())
    }

    async fn click(&self, handle: &ElementHandle) -> Result<bool> {
        let clicked = self.evaluate(&script::click(handle)).await?;
        Ok(clicked.as_bool().unwrap_or(false))
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<()> {
        let focused = self.evaluate(&script::focus(handle)).await?;
        if !focused.as_bool().unwrap_or(false) {
            return Err(RevisitError::ElementNotFound(handle.to_string()));
        }
        let tab = self.current()?;
        tab.type_str(text)
            .map_err(|e| cdp_error("Typing failed", e, RevisitError::Interaction))?;
        Ok(())
    }

    async fn input_value(&self, handle: &ElementHandle) -> Result<String> {
        match self.evaluate(&script::input_value(handle)).await? {
            Value::String(value) => Ok(value),
            _ => Err(RevisitError::ElementNotFound(handle.to_string())),
        }
    }

    async fn scroll(&self, amount_px: i64) -> Result<()> {
        self.evaluate(&script::scroll_by(amount_px)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn navigate(&self, url: &str) -> Result<()> {
        let tab = self.current()?;
        self.load(&tab, url).await?;
        info!("Navigated to {}", url);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_context(&self, url: &str) -> Result<()> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| cdp_error("Failed to create tab", e, RevisitError::Navigation))?;
        tab.set_default_timeout(self.timeout);

        if let Err(e) = self.load(&tab, url).await {
            if let Err(close_err) = tab.close(true) {
                warn!("Failed to close tab after failed open: {}", close_err);
            }
            return Err(e);
        }

        self.lock().push(tab);
        debug!("Opened context for {}", url);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn close_context(&self) -> Result<()> {
        let tab = {
            let mut tabs = self.lock();
            if tabs.len() <= 1 {
                return Ok(());
            }
            tabs.pop()
        };
        if let Some(tab) = tab {
            tab.close(true)
                .map_err(|e| cdp_error("Failed to close tab", e, RevisitError::Interaction))?;
        }

        // Bring the previous context back to the foreground
        let previous = self.current()?;
        previous
            .bring_to_front()
            .map_err(|e| cdp_error("Failed to activate tab", e, RevisitError::Interaction))?;
        Ok(())
    }

    async fn context_depth(&self) -> Result<usize> {
        Ok(self.lock().len())
    }

    async fn wait_until_present(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>> {
        let tab = self.current()?;
        match tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(_) => Ok(Some(ElementHandle::root(selector, 0))),
            Err(e) => match cdp_error("Waiting for element", e, RevisitError::Interaction) {
                lost @ RevisitError::SessionLost(_) => Err(lost),
                _ => {
                    debug!("Element not found within {:?}: {}", timeout, selector);
                    Ok(None)
                }
            },
        }
    }

    async fn take_alert(&self) -> Result<Option<String>> {
        Ok(self
            .evaluate(&script::take_alert())
            .await?
            .as_str()
            .map(str::to_string))
    }

    async fn page_text(&self) -> Result<String> {
        Ok(self
            .evaluate(&script::page_text())
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dead_connection_is_session_lost() {
        let err = cdp_error(
            "evaluate",
            "Unable to make method calls because underlying connection is closed",
            RevisitError::Interaction,
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_other_errors_keep_category() {
        let err = cdp_error("navigate", "net::ERR_NAME_NOT_RESOLVED", RevisitError::Navigation);
        assert!(matches!(err, RevisitError::Navigation(_)));
        assert!(!err.is_fatal());
    }
}
