//! Error types for font loading

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Static-analysis failures raised while rewriting a module's font loader calls.
///
/// These abort the transform of the offending module only. `offset` is the
/// byte offset of the node that triggered the error.
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(fob::font::transform))]
pub struct TransformError {
    pub message: String,
    pub offset: u32,
}

impl TransformError {
    pub fn new(message: impl Into<String>, offset: u32) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Errors produced by a font loader while turning call arguments into CSS.
#[derive(Error, Debug, Diagnostic)]
pub enum LoaderError {
    /// The call arguments are not accepted by the loader
    #[error("{message}")]
    #[diagnostic(code(fob::font::invalid_arguments))]
    InvalidArguments { message: String },

    /// A remote stylesheet or font file could not be fetched
    #[error("{message}")]
    #[diagnostic(code(fob::font::fetch_failed))]
    FetchFailed { message: String },

    /// A local font file could not be read
    #[error("Failed to read font file {}: {reason}", path.display())]
    #[diagnostic(code(fob::font::read_failed))]
    ReadFailed { path: PathBuf, reason: String },

    /// The loader returned CSS the module generator cannot work with
    #[error("{message}")]
    #[diagnostic(code(fob::font::invalid_css))]
    InvalidCss { message: String },
}

impl LoaderError {
    /// Create an InvalidArguments error
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Create a FetchFailed error
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed {
            message: message.into(),
        }
    }

    /// Create an InvalidCss error
    pub fn invalid_css(message: impl Into<String>) -> Self {
        Self::InvalidCss {
            message: message.into(),
        }
    }
}

/// Top-level error for the font session.
#[derive(Error, Debug, Diagnostic)]
pub enum FontError {
    /// The module source could not be parsed
    #[error("Failed to parse {id}: {reason}")]
    #[diagnostic(code(fob::font::parse_failed))]
    Parse { id: String, reason: String },

    /// A font loader call could not be rewritten
    #[error("{id}:{}: {}", source.offset, source.message)]
    #[diagnostic(code(fob::font::transform_failed))]
    Transform {
        id: String,
        #[source]
        source: TransformError,
    },

    /// A font loader failed for the given virtual id
    #[error("Font loader failed for {id}: {source}")]
    #[diagnostic(code(fob::font::loader_failed))]
    Loader {
        id: String,
        #[source]
        source: LoaderError,
    },

    /// A virtual CSS id was missing a required query field or carried malformed JSON
    #[error("Invalid font query in {id}: {reason}")]
    #[diagnostic(code(fob::font::invalid_query))]
    InvalidQuery { id: String, reason: String },

    /// Configuration could not be loaded
    #[error("Invalid font configuration: {0}")]
    #[diagnostic(
        code(fob::font::config),
        help("Check fob-font.json syntax and field types")
    )]
    Config(String),
}

impl FontError {
    pub fn transform(id: impl Into<String>, source: TransformError) -> Self {
        Self::Transform {
            id: id.into(),
            source,
        }
    }

    pub fn loader(id: impl Into<String>, source: LoaderError) -> Self {
        Self::Loader {
            id: id.into(),
            source,
        }
    }

    pub fn invalid_query(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for font operations
pub type Result<T> = std::result::Result<T, FontError>;
