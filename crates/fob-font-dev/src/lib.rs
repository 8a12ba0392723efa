//! Development integration for fob-font
//!
//! In dev mode fonts are kept in memory. This crate serves them over HTTP,
//! exposes the font manifest as a JavaScript module and watches the project
//! so edited modules and font files are loaded again.
//!
//! ```rust,no_run
//! use fob_font::{FontConfig, FontSession};
//! use fob_font_dev::{DevFontServer, FontWatcher};
//! use std::sync::Arc;
//!
//! # async fn run() -> fob_font_dev::Result<()> {
//! let session = Arc::new(FontSession::new(FontConfig::new("/project").with_dev(true)));
//! let (_watcher, changes) = FontWatcher::with_defaults("/project".into())?;
//! tokio::spawn(fob_font_dev::watcher::run(session.clone(), changes));
//!
//! DevFontServer::new(session, "127.0.0.1:3001".parse().unwrap()).start().await
//! # }
//! ```

use std::sync::Arc;

pub mod error;
pub mod middleware;
pub mod server;
pub mod watcher;

pub use error::{DevError, Result};
pub use middleware::{font_asset_layer, serve_font_asset};
pub use server::{DevFontServer, MANIFEST_ROUTE, with_font_assets};
pub use watcher::{FileChange, FontWatcher, apply_change};

/// Session shared between the server, the watcher and the bundler plugin.
pub type SharedSession = Arc<fob_font::FontSession>;

pub use fob_font::logging::{LogLevel, init_logging};
