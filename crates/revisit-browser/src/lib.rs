//! Chrome DevTools interaction port for revisit
//!
//! [`BrowserSession`] implements [`revisit_core::InteractionPort`] on top of
//! `headless_chrome`. It either launches a fresh browser or attaches to one
//! already running with a logged-in profile.
//!
//! # Example
//!
//! ```no_run
//! use revisit_browser::BrowserSession;
//! use revisit_core::{BrowserSettings, InteractionPort};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = BrowserSettings {
//!         debug_port: Some(9222),
//!         ..Default::default()
//!     };
//!     let session = BrowserSession::start(&settings).await?;
//!     session.navigate("https://m.blog.naver.com/News.naver").await?;
//!     println!("{}", session.page_text().await?);
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - Chrome or Chromium installed
//! - To reuse a session: `chrome --remote-debugging-port=9222`

pub mod browser;
pub mod script;

pub use browser::BrowserSession;
