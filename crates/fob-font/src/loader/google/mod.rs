//! Loader for Google Fonts families.
//!
//! The stylesheet and every font file it references are downloaded at build
//! time and served from the build output, so pages never request
//! `fonts.googleapis.com` at runtime.

pub mod css;
pub mod fetch;
pub mod options;
pub mod url;

pub use fetch::{GoogleFontsApi, OfflineGoogleFontsApi};
#[cfg(feature = "google-fetch")]
pub use fetch::HttpGoogleFontsApi;
pub use options::{FontAxis, GoogleFontCatalog, GoogleFontFamily, GoogleFontOptions};
pub use url::{FontAxes, get_font_axes, get_google_fonts_url};

use async_trait::async_trait;
use std::sync::Arc;

use self::css::{find_font_files_in_css, font_extension, strip_body_rules};
use super::fallback::fallback_font_face;
use super::metrics::FontMetricsProvider;
use super::{FontLoader, FontLoaderOutput, LoaderContext};
use crate::error::LoaderError;

/// Loader for `next-font/google`.
#[derive(Clone)]
pub struct GoogleFontLoader {
    api: Arc<dyn GoogleFontsApi>,
    catalog: Arc<GoogleFontCatalog>,
    metrics: Option<Arc<dyn FontMetricsProvider>>,
}

impl GoogleFontLoader {
    pub fn new(api: Arc<dyn GoogleFontsApi>) -> Self {
        Self {
            api,
            catalog: Arc::new(GoogleFontCatalog::default()),
            metrics: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<GoogleFontCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn FontMetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn fetch_failed(font_family: &str) -> LoaderError {
        LoaderError::fetch_failed(format!(
            "Failed to fetch `{}` from Google Fonts.",
            font_family
        ))
    }

    /// Download the stylesheet and its font files and rewrite the font URLs
    /// to the self-hosted copies.
    async fn self_host(
        &self,
        ctx: &LoaderContext<'_>,
        options: &GoogleFontOptions,
        url: &str,
        size_adjust: bool,
    ) -> Result<String, LoaderError> {
        let family = options.font_family.as_str();

        let stylesheet = ctx
            .cache
            .css
            .take_or_fetch(url, || async {
                match self.api.fetch_css(url, family, ctx.is_dev).await {
                    Ok(css) => Some(css),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to fetch Google Fonts stylesheet");
                        None
                    }
                }
            })
            .await
            .ok_or_else(|| Self::fetch_failed(family))?;

        let font_face_declarations = strip_body_rules(&stylesheet);
        let preload_subsets = options.preload.then_some(options.subsets.as_slice());
        let font_files = find_font_files_in_css(font_face_declarations, preload_subsets);

        let mut self_hosted = Vec::with_capacity(font_files.len());
        for file in font_files {
            let google_url = file.google_font_file_url.as_str();
            let content = ctx
                .cache
                .font
                .take_or_fetch(google_url, || async {
                    match self.api.fetch_font_file(google_url, ctx.is_dev).await {
                        Ok(content) => Some(content),
                        Err(e) => {
                            tracing::error!(error = %e, "failed to fetch Google Fonts font file");
                            None
                        }
                    }
                })
                .await
                .ok_or_else(|| Self::fetch_failed(family))?;

            let ext = font_extension(google_url).ok_or_else(|| {
                LoaderError::invalid_css(format!("Unexpected font file `{}`", google_url))
            })?;
            let hosted_url = ctx.emit_font_file(&content, ext, file.preload_font_file, size_adjust);
            self_hosted.push((file.google_font_file_url.clone(), hosted_url));
        }

        let mut css = font_face_declarations.to_string();
        for (google_url, hosted_url) in &self_hosted {
            css = css.replace(google_url.as_str(), hosted_url);
        }
        Ok(css)
    }
}

#[async_trait]
impl FontLoader for GoogleFontLoader {
    async fn load(&self, ctx: &LoaderContext<'_>) -> Result<FontLoaderOutput, LoaderError> {
        let options = GoogleFontOptions::validate(ctx.function_name, ctx.options(), &self.catalog)?;
        let axes = get_font_axes(&options, &self.catalog)?;
        let url = get_google_fonts_url(&options.font_family, &axes, &options.display);

        let adjust_font_fallback = if options.adjust_font_fallback {
            self.metrics
                .as_ref()
                .and_then(|metrics| metrics.fallback_metrics(&options.font_family))
        } else {
            None
        };

        let output = FontLoaderOutput {
            css: String::new(),
            fallback_fonts: options.fallback.clone().unwrap_or_default(),
            weight: match options.weights.as_slice() {
                [weight] if weight != "variable" => Some(weight.clone()),
                _ => None,
            },
            style: match options.styles.as_slice() {
                [style] => Some(style.clone()),
                _ => None,
            },
            variable: options.variable.clone(),
            adjust_font_fallback: adjust_font_fallback.clone(),
        };

        match self
            .self_host(ctx, &options, &url, adjust_font_fallback.is_some())
            .await
        {
            Ok(css) => Ok(FontLoaderOutput { css, ..output }),
            Err(err) if ctx.is_dev => {
                tracing::warn!(
                    font_family = %options.font_family,
                    error = %err,
                    "using fallback font"
                );
                if ctx.is_server {
                    ctx.report_error(format!(
                        "Failed to download `{}` from Google Fonts. Using fallback font instead.\n\n{}",
                        options.font_family, err
                    ));
                }
                Ok(FontLoaderOutput {
                    css: fallback_font_face(&options.font_family, adjust_font_fallback.as_ref()),
                    ..output
                })
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NativeFileReader;
    use crate::loader::metrics::{FallbackCategory, FontMetrics, StaticFontMetrics};
    use crate::loader::{FontFileEmitter, LoaderCache};
    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const STYLESHEET: &str = "/* latin */
@font-face {
  font-family: 'Inter';
  font-style: normal;
  font-weight: 400;
  font-display: swap;
  src: url(https://fonts.gstatic.com/s/inter/v12/latin.woff2) format('woff2');
}
body {
  --google-font-color: none;
}
";

    #[derive(Default)]
    struct FakeApi {
        css_requests: AtomicUsize,
        font_requests: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl GoogleFontsApi for FakeApi {
        async fn fetch_css(&self, _: &str, family: &str, _: bool) -> Result<String, LoaderError> {
            self.css_requests.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LoaderError::fetch_failed(format!("offline: {}", family)));
            }
            Ok(STYLESHEET.to_string())
        }

        async fn fetch_font_file(&self, _: &str, _: bool) -> Result<Vec<u8>, LoaderError> {
            self.font_requests.fetch_add(1, Ordering::SeqCst);
            Ok(b"wOF2".to_vec())
        }
    }

    #[derive(Default)]
    struct RecordingEmitter {
        emitted: Mutex<Vec<(String, bool, bool)>>,
    }

    impl FontFileEmitter for RecordingEmitter {
        fn emit_font_file(&self, _: &[u8], ext: &str, preload: bool, size_adjust: bool) -> String {
            self.emitted.lock().push((ext.to_string(), preload, size_adjust));
            format!("/_next/static/media/inter.{}", ext)
        }
    }

    fn arguments() -> Vec<Value> {
        vec![json!({ "weight": "400", "subsets": ["latin"] })]
    }

    #[tokio::test]
    async fn test_self_hosts_font_files() {
        let api = Arc::new(FakeApi::default());
        let loader = GoogleFontLoader::new(api.clone());
        let arguments = arguments();
        let cache = LoaderCache::default();
        let emitter = RecordingEmitter::default();
        let ctx = LoaderContext::new("Inter", "inter", &arguments, &cache, &NativeFileReader, &emitter, Path::new("app/page.tsx"));

        let output = loader.load(&ctx).await.unwrap();
        assert!(output.css.contains("src: url(/_next/static/media/inter.woff2) format('woff2');"));
        assert!(!output.css.contains("fonts.gstatic.com"));
        assert!(!output.css.contains("body {"));
        assert_eq!(output.weight.as_deref(), Some("400"));
        assert_eq!(output.style.as_deref(), Some("normal"));
        assert_eq!(*emitter.emitted.lock(), vec![("woff2".to_string(), true, false)]);
        assert_eq!(api.css_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_build_uses_cached_responses_once() {
        let api = Arc::new(FakeApi::default());
        let loader = GoogleFontLoader::new(api.clone());
        let arguments = arguments();
        let cache = LoaderCache::default();
        let emitter = RecordingEmitter::default();

        for _ in 0..2 {
            let ctx = LoaderContext::new("Inter", "inter", &arguments, &cache, &NativeFileReader, &emitter, Path::new("app/page.tsx"));
            loader.load(&ctx).await.unwrap();
        }
        assert_eq!(api.css_requests.load(Ordering::SeqCst), 1);
        assert_eq!(api.font_requests.load(Ordering::SeqCst), 1);
        assert!(cache.css.is_empty());
        assert!(cache.font.is_empty());
    }

    #[tokio::test]
    async fn test_production_failure_is_an_error() {
        let loader = GoogleFontLoader::new(Arc::new(FakeApi { fail: true, ..Default::default() }));
        let arguments = arguments();
        let cache = LoaderCache::default();
        let emitter = RecordingEmitter::default();
        let ctx = LoaderContext::new("Inter", "inter", &arguments, &cache, &NativeFileReader, &emitter, Path::new("app/page.tsx"));

        let err = loader.load(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch `Inter` from Google Fonts.");
    }

    #[tokio::test]
    async fn test_dev_failure_returns_fallback() {
        let metrics = StaticFontMetrics::new().with_family(
            "Inter",
            FontMetrics {
                ascent: 900.0,
                descent: -300.0,
                line_gap: 0.0,
                units_per_em: 1000.0,
                x_width_avg: None,
                category: FallbackCategory::SansSerif,
            },
        );
        let loader = GoogleFontLoader::new(Arc::new(FakeApi { fail: true, ..Default::default() }))
            .with_metrics(Arc::new(metrics));
        let arguments = arguments();
        let cache = LoaderCache::default();
        let emitter = RecordingEmitter::default();
        let ctx = LoaderContext::new("Inter", "inter", &arguments, &cache, &NativeFileReader, &emitter, Path::new("app/page.tsx"))
            .with_dev(true)
            .with_server(true);

        let output = loader.load(&ctx).await.unwrap();
        assert!(output.css.starts_with("@font-face {\n  font-family: 'Inter Fallback';\n  src: local(\"Arial\");\n  ascent-override:90.00%;"));
        assert!(output.adjust_font_fallback.is_some());
        let errors = ctx.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Failed to download `Inter` from Google Fonts."));
    }

    #[tokio::test]
    async fn test_variable_weight_is_not_reported() {
        let loader = GoogleFontLoader::new(Arc::new(FakeApi::default()));
        let arguments = vec![json!({ "subsets": ["latin"], "variable": "--font-inter" })];
        let cache = LoaderCache::default();
        let emitter = RecordingEmitter::default();
        let ctx = LoaderContext::new("Inter", "inter", &arguments, &cache, &NativeFileReader, &emitter, Path::new("app/page.tsx"));

        let output = loader.load(&ctx).await.unwrap();
        assert_eq!(output.weight, None);
        assert_eq!(output.variable.as_deref(), Some("--font-inter"));
    }
}
