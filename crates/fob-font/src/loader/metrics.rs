//! Fallback font metrics.
//!
//! The overrides make the local fallback font occupy the same space as the web
//! font while it loads. Reading metrics out of binary font data is left to a
//! [`FontMetricsProvider`]; this module only turns raw metrics into the CSS
//! override values.

use rustc_hash::FxHashMap;

use super::AdjustFontFallback;

/// Generic family the fallback font is picked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackCategory {
    #[default]
    SansSerif,
    Serif,
}

impl FallbackCategory {
    fn fallback_font(self) -> SystemFont {
        match self {
            FallbackCategory::SansSerif => SystemFont {
                name: "Arial",
                az_avg_width: 934.5116279069767,
                units_per_em: 2048.0,
            },
            FallbackCategory::Serif => SystemFont {
                name: "Times New Roman",
                az_avg_width: 854.3953488372093,
                units_per_em: 2048.0,
            },
        }
    }
}

struct SystemFont {
    name: &'static str,
    az_avg_width: f64,
    units_per_em: f64,
}

/// Vertical metrics of a font in font units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub ascent: f64,
    pub descent: f64,
    pub line_gap: f64,
    pub units_per_em: f64,
    /// Average glyph width; `None` disables the size adjustment
    pub x_width_avg: Option<f64>,
    pub category: FallbackCategory,
}

fn format_override(value: f64) -> String {
    format!("{:.2}%", (value * 100.0).abs())
}

/// Compute the `@font-face` overrides for the fallback font of `metrics`.
pub fn override_metrics(metrics: &FontMetrics) -> AdjustFontFallback {
    let fallback = metrics.category.fallback_font();
    let size_adjust = match metrics.x_width_avg {
        Some(width) if width > 0.0 => {
            (width / metrics.units_per_em) / (fallback.az_avg_width / fallback.units_per_em)
        }
        _ => 1.0,
    };
    let scale = metrics.units_per_em * size_adjust;

    AdjustFontFallback {
        fallback_font: fallback.name.to_string(),
        ascent_override: Some(format_override(metrics.ascent / scale)),
        descent_override: Some(format_override(metrics.descent / scale)),
        line_gap_override: Some(format_override(metrics.line_gap / scale)),
        size_adjust: Some(format_override(size_adjust)),
    }
}

/// Source of fallback metrics for both loaders.
pub trait FontMetricsProvider: Send + Sync {
    /// Metrics of a Google Fonts family.
    fn fallback_metrics(&self, family: &str) -> Option<AdjustFontFallback>;

    /// Metrics read from a local font file.
    fn metrics_from_font_file(
        &self,
        _content: &[u8],
        _category: FallbackCategory,
    ) -> Option<AdjustFontFallback> {
        None
    }
}

/// A provider backed by a table of known family metrics.
#[derive(Debug, Clone, Default)]
pub struct StaticFontMetrics {
    families: FxHashMap<String, FontMetrics>,
}

impl StaticFontMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_family(mut self, family: impl Into<String>, metrics: FontMetrics) -> Self {
        self.families.insert(family.into(), metrics);
        self
    }
}

impl FontMetricsProvider for StaticFontMetrics {
    fn fallback_metrics(&self, family: &str) -> Option<AdjustFontFallback> {
        self.families.get(family).map(override_metrics)
    }
}
