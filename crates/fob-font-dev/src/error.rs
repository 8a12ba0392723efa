//! Errors raised while watching files or serving fonts.

use fob_font::FontError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, miette::Diagnostic)]
pub enum DevError {
    /// The file watcher could not be created or attached.
    #[error("File watcher error: {0}")]
    #[diagnostic(code(fob::font_dev::watch))]
    Watch(#[from] notify::Error),

    /// The directory to watch does not exist.
    #[error("Path not found: {}", .0.display())]
    #[diagnostic(
        code(fob::font_dev::file_not_found),
        help("Point the watcher at the project root")
    )]
    FileNotFound(PathBuf),

    /// Binding or serving failed.
    #[error("Server error: {0}")]
    #[diagnostic(code(fob::font_dev::server))]
    Server(String),

    #[error(transparent)]
    #[diagnostic(code(fob::font_dev::font))]
    Font(#[from] FontError),
}

pub type Result<T> = std::result::Result<T, DevError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = DevError::FileNotFound(PathBuf::from("/missing"));
        assert_eq!(err.to_string(), "Path not found: /missing");

        let err = DevError::Server("Failed to bind to 127.0.0.1:1".to_string());
        assert_eq!(err.to_string(), "Server error: Failed to bind to 127.0.0.1:1");

        let err: DevError = FontError::Config("bad base path".to_string()).into();
        assert!(err.to_string().contains("bad base path"));
    }
}
