//! API key lookup

use revisit_core::{Result, RevisitError};
use std::env;

/// Environment variable holding the Anthropic API key
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// API key from the environment
pub fn get_api_key() -> Result<String> {
    match env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(RevisitError::Auth(format!(
            "No API key found. Set {}=sk-ant-api03-... or disable the assistant",
            API_KEY_VAR
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to prevent concurrent env var modifications
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_key<R>(value: Option<&str>, f: impl FnOnce() -> R) -> R {
        let _guard = ENV_LOCK.lock().unwrap();
        let original = env::var(API_KEY_VAR).ok();
        match value {
            Some(v) => env::set_var(API_KEY_VAR, v),
            None => env::remove_var(API_KEY_VAR),
        }
        let result = f();
        match original {
            Some(v) => env::set_var(API_KEY_VAR, v),
            None => env::remove_var(API_KEY_VAR),
        }
        result
    }

    #[test]
    fn test_key_is_trimmed() {
        with_key(Some("  test-key \n"), || {
            assert_eq!(get_api_key().unwrap(), "test-key");
        });
    }

    #[test]
    fn test_missing_or_blank_key() {
        with_key(None, || assert!(get_api_key().is_err()));
        with_key(Some("   "), || assert!(get_api_key().is_err()));
    }
}
