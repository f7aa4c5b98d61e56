//! Comment-writing assistant seam

use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use crate::Result;

/// Turns post content into a short comment
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Generate a comment for `content` following `prompt`.
    ///
    /// `Ok(None)` means the assistant had nothing usable to say.
    async fn generate(&self, content: &str, prompt: &str) -> Result<Option<String>>;

    /// Whether calls are currently worth attempting
    fn is_available(&self) -> bool {
        true
    }
}

/// Assistant that replays a fixed answer and records its inputs
#[derive(Debug, Default)]
pub struct ScriptedAssistant {
    reply: Option<String>,
    available: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAssistant {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            available: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answers `None`
    pub fn silent() -> Self {
        Self {
            reply: None,
            available: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            reply: None,
            available: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Content passed to every `generate` call so far
    pub fn calls(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Assistant for ScriptedAssistant {
    async fn generate(&self, content: &str, _prompt: &str) -> Result<Option<String>> {
        self.lock().push(content.to_string());
        Ok(self.reply.clone())
    }

    fn is_available(&self) -> bool {
        self.available
    }
}
