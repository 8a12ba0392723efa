//! Font loaders: turn the arguments of a font call into `@font-face` CSS.
//!
//! Two loaders exist, one per loader module:
//!
//! - [`GoogleFontLoader`] downloads the stylesheet and font files from Google Fonts
//! - [`LocalFontLoader`] reads font files next to the calling module
//!
//! Both emit the font files they use through [`FontFileEmitter`] and get back
//! the public URL to reference from the CSS.

pub mod cache;
pub mod fallback;
pub mod google;
pub mod local;
pub mod metrics;

pub use cache::{CacheSlot, LoaderCache};
pub use google::GoogleFontLoader;
pub use local::LocalFontLoader;
pub use metrics::{FallbackCategory, FontMetricsProvider};

use async_trait::async_trait;
use parking_lot::Mutex;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::LoaderError;
use crate::host::FontFileReader;

/// The loader modules font functions can be imported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LoaderKind {
    Google,
    Local,
}

impl LoaderKind {
    pub const ALL: [LoaderKind; 2] = [LoaderKind::Google, LoaderKind::Local];

    /// Module specifier font functions are imported from after remapping.
    pub fn module(self) -> &'static str {
        match self {
            LoaderKind::Google => "next-font/google",
            LoaderKind::Local => "next-font/local",
        }
    }

    /// Path suffix identifying the loader's virtual stylesheet.
    pub fn target_css(self) -> &'static str {
        match self {
            LoaderKind::Google => "next-font/google/target.css",
            LoaderKind::Local => "next-font/local/target.css",
        }
    }

    /// Match the path part of a (possibly resolved) virtual stylesheet id.
    pub fn from_target_path(path: &str) -> Option<Self> {
        let path = path.replace('\\', "/");
        Self::ALL
            .into_iter()
            .find(|kind| path == kind.target_css() || path.ends_with(&format!("/{}", kind.target_css())))
    }
}

/// Values accepted for the `display` option.
pub const ALLOWED_DISPLAY_VALUES: [&str; 5] = ["auto", "block", "swap", "fallback", "optional"];

/// Render a list of accepted values for an error message.
pub(crate) fn format_available_values(values: &[&str]) -> String {
    values
        .iter()
        .map(|value| format!("`{}`", value))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A string option, or a number rendered as one. Other types are an error.
pub(crate) fn string_option(
    options: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<String>, LoaderError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(Value::Number(value)) => Ok(Some(value.to_string())),
        Some(other) => Err(LoaderError::invalid_arguments(format!(
            "Invalid `{}` value `{}`, expected a string",
            key, other
        ))),
    }
}

/// A list of strings; a single string counts as a list of one.
pub(crate) fn string_list_option(
    options: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<Vec<String>>, LoaderError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| match value {
                Value::String(value) => Ok(value.clone()),
                Value::Number(value) => Ok(value.to_string()),
                other => Err(LoaderError::invalid_arguments(format!(
                    "Invalid `{}` entry `{}`, expected a string",
                    key, other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(Value::String(_) | Value::Number(_)) => {
            Ok(string_option(options, key)?.map(|value| vec![value]))
        }
        Some(other) => Err(LoaderError::invalid_arguments(format!(
            "Invalid `{}` value `{}`, expected a string or an array of strings",
            key, other
        ))),
    }
}

pub(crate) fn bool_option(
    options: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<bool>, LoaderError> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(value)) => Ok(Some(*value)),
        Some(other) => Err(LoaderError::invalid_arguments(format!(
            "Invalid `{}` value `{}`, expected a boolean",
            key, other
        ))),
    }
}

/// Check `display` against [`ALLOWED_DISPLAY_VALUES`], defaulting to `swap`.
pub(crate) fn display_option(
    options: &serde_json::Map<String, Value>,
) -> Result<String, LoaderError> {
    let display = string_option(options, "display")?.unwrap_or_else(|| "swap".to_string());
    if !ALLOWED_DISPLAY_VALUES.contains(&display.as_str()) {
        return Err(LoaderError::invalid_arguments(format!(
            "Invalid display value `{}`.\nAvailable display values: {}",
            display,
            format_available_values(&ALLOWED_DISPLAY_VALUES)
        )));
    }
    Ok(display)
}

/// Check that a `variable` option names a CSS custom property.
pub(crate) fn variable_option(
    options: &serde_json::Map<String, Value>,
) -> Result<Option<String>, LoaderError> {
    let variable = string_option(options, "variable")?;
    match variable {
        Some(variable) if !variable.starts_with("--") => {
            Err(LoaderError::invalid_arguments(format!(
                "Invalid variable `{}`, CSS variables must start with `--`",
                variable
            )))
        }
        variable => Ok(variable),
    }
}

/// Fallback font metric overrides used to limit layout shift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustFontFallback {
    pub fallback_font: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascent_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descent_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_gap_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_adjust: Option<String>,
}

/// What a loader returns for one font call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontLoaderOutput {
    /// `@font-face` rules
    pub css: String,
    pub fallback_fonts: Vec<String>,
    pub weight: Option<String>,
    pub style: Option<String>,
    /// CSS custom property to expose the font family through, e.g. `--font-inter`
    pub variable: Option<String>,
    pub adjust_font_fallback: Option<AdjustFontFallback>,
}

/// Registers an emitted font file and returns its public URL.
pub trait FontFileEmitter: Send + Sync {
    fn emit_font_file(&self, content: &[u8], ext: &str, preload: bool, size_adjust: bool) -> String;
}

/// Everything a loader gets to know about one font call.
pub struct LoaderContext<'c> {
    pub function_name: &'c str,
    pub variable_name: &'c str,
    pub arguments: &'c [Value],
    pub is_dev: bool,
    pub is_server: bool,
    pub cache: &'c LoaderCache,
    pub reader: &'c dyn FontFileReader,
    emitter: &'c dyn FontFileEmitter,
    /// Directory of the calling module
    base_dir: PathBuf,
    resolved_files: Mutex<Vec<PathBuf>>,
    errors: Mutex<Vec<String>>,
}

impl<'c> LoaderContext<'c> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        function_name: &'c str,
        variable_name: &'c str,
        arguments: &'c [Value],
        cache: &'c LoaderCache,
        reader: &'c dyn FontFileReader,
        emitter: &'c dyn FontFileEmitter,
        calling_module: &Path,
    ) -> Self {
        Self {
            function_name,
            variable_name,
            arguments,
            is_dev: false,
            is_server: false,
            cache,
            reader,
            emitter,
            base_dir: calling_module
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            resolved_files: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dev(mut self, is_dev: bool) -> Self {
        self.is_dev = is_dev;
        self
    }

    pub fn with_server(mut self, is_server: bool) -> Self {
        self.is_server = is_server;
        self
    }

    /// The first call argument, the options object of every font function.
    pub fn options(&self) -> Option<&Value> {
        self.arguments.first()
    }

    pub fn emit_font_file(&self, content: &[u8], ext: &str, preload: bool, size_adjust: bool) -> String {
        self.emitter.emit_font_file(content, ext, preload, size_adjust)
    }

    /// Resolve a path written in the calling module against its directory.
    pub fn resolve(&self, src: &str) -> PathBuf {
        let relative = if src.starts_with('.') {
            src.to_string()
        } else {
            format!("./{}", src)
        };
        let resolved = self.base_dir.join(relative).clean();
        self.resolved_files.lock().push(resolved.clone());
        resolved
    }

    /// Surface a non-fatal error for the calling module.
    pub fn report_error(&self, message: impl Into<String>) {
        self.errors.lock().push(message.into());
    }

    /// Files resolved through [`LoaderContext::resolve`] so far.
    pub fn resolved_files(&self) -> Vec<PathBuf> {
        self.resolved_files.lock().clone()
    }

    pub fn take_errors(&self) -> Vec<String> {
        std::mem::take(&mut *self.errors.lock())
    }
}

/// A font loader implementation.
#[async_trait]
pub trait FontLoader: Send + Sync {
    async fn load(&self, ctx: &LoaderContext<'_>) -> Result<FontLoaderOutput, LoaderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NativeFileReader;

    struct NullEmitter;

    impl FontFileEmitter for NullEmitter {
        fn emit_font_file(&self, _: &[u8], ext: &str, _: bool, _: bool) -> String {
            format!("/font.{}", ext)
        }
    }

    #[test]
    fn test_loader_kind_from_target_path() {
        assert_eq!(
            LoaderKind::from_target_path("next-font/google/target.css"),
            Some(LoaderKind::Google)
        );
        assert_eq!(
            LoaderKind::from_target_path("/app/node_modules/next-font/local/target.css"),
            Some(LoaderKind::Local)
        );
        assert_eq!(
            LoaderKind::from_target_path("C:\\app\\node_modules\\next-font\\local\\target.css"),
            Some(LoaderKind::Local)
        );
        assert_eq!(LoaderKind::from_target_path("/app/not-next-font/google/target.css"), None);
        assert_eq!(LoaderKind::from_target_path("/app/styles.css"), None);
    }

    #[test]
    fn test_resolve_against_calling_module() {
        let cache = LoaderCache::default();
        let reader = NativeFileReader;
        let ctx = LoaderContext::new(
            "",
            "myFont",
            &[],
            &cache,
            &reader,
            &NullEmitter,
            Path::new("/project/app/page.tsx"),
        );
        assert_eq!(ctx.resolve("./fonts/a.woff2"), PathBuf::from("/project/app/fonts/a.woff2"));
        assert_eq!(ctx.resolve("fonts/a.woff2"), PathBuf::from("/project/app/fonts/a.woff2"));
        assert_eq!(ctx.resolve("../public/a.woff2"), PathBuf::from("/project/public/a.woff2"));
        assert_eq!(ctx.resolved_files().len(), 3);
    }

    #[test]
    fn test_report_error_collects_messages() {
        let cache = LoaderCache::default();
        let reader = NativeFileReader;
        let ctx = LoaderContext::new("Inter", "inter", &[], &cache, &reader, &NullEmitter, Path::new("a.ts"));
        ctx.report_error("first");
        ctx.report_error("second");
        assert_eq!(ctx.take_errors(), vec!["first", "second"]);
        assert!(ctx.take_errors().is_empty());
    }
}
