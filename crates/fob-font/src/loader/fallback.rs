//! The `@font-face` served in dev when a remote font cannot be downloaded.

use super::AdjustFontFallback;

/// Render a fallback `@font-face` for `font_family` that points at a local
/// system font, with the metric overrides when they are known.
pub fn fallback_font_face(font_family: &str, metrics: Option<&AdjustFontFallback>) -> String {
    let local = metrics.map_or("Arial", |m| m.fallback_font.as_str());
    let mut css = format!(
        "@font-face {{\n  font-family: '{} Fallback';\n  src: local(\"{}\");",
        font_family, local
    );
    if let Some(metrics) = metrics {
        let value = |v: &Option<String>| v.clone().unwrap_or_default();
        css.push_str(&format!(
            "\n  ascent-override:{};\n  descent-override:{};\n  line-gap-override:{};\n  size-adjust:{};",
            value(&metrics.ascent_override),
            value(&metrics.descent_override),
            value(&metrics.line_gap_override),
            value(&metrics.size_adjust),
        ));
    }
    css.push_str("\n}");
    css
}
