//! Turns loader output into a scoped CSS module.
//!
//! The loader's `@font-face` rules get an unguessable family name derived from
//! a hash of the CSS, a fallback `@font-face` is added when metric overrides
//! are known, and two classes are generated:
//!
//! ```text
//! .__className_<hash> { font-family: '__Inter_<hash>', '__Inter_Fallback_<hash>'; ... }
//! .__variable_<hash> { --font-inter: '__Inter_<hash>', '__Inter_Fallback_<hash>'; }
//! ```

use lightningcss::{
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions, StyleSheet},
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

use crate::assets::hash_content;
use crate::error::LoaderError;
use crate::loader::{AdjustFontFallback, FontLoaderOutput};

const CLASS_NAME: &str = "className";
const VARIABLE: &str = "variable";

/// Values exported as `style` for inline use.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontStyleExport {
    pub font_family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<serde_json::Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_style: Option<String>,
}

/// The CSS module generated for one font call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetCss {
    pub code: String,
    /// Local class name to scoped class name, `className` and `variable`
    pub class_names: BTreeMap<String, String>,
    pub style: FontStyleExport,
}

impl TargetCss {
    /// Render the ES module that exposes the class names and style object.
    pub fn to_js_module(&self) -> String {
        let mut lines = Vec::new();
        let mut keys = Vec::new();
        for (local, scoped) in &self.class_names {
            lines.push(format!(
                "export const {} = {};",
                local,
                serde_json::Value::String(scoped.clone())
            ));
            keys.push(local.as_str());
        }
        let style = serde_json::to_string(&self.style).unwrap_or_else(|_| "{}".to_string());
        lines.push(format!("export const style = {};", style));
        keys.push("style");
        lines.push(format!("export default {{ {} }};", keys.join(", ")));
        lines.join("\n") + "\n"
    }
}

/// Generates [`TargetCss`] from loader output.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssModuleGenerator {
    minify: bool,
}

impl CssModuleGenerator {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    pub fn generate(
        &self,
        relative_path: &str,
        output: &FontLoaderOutput,
    ) -> Result<TargetCss, LoaderError> {
        let hash = &hash_content(output.css.as_bytes())[..6];
        let format_family = |family: &str| format!("'__{}_{}'", family.replace(' ', "_"), hash);

        let (mut code, font_family) = rename_font_families(&output.css, &format_family)?;

        let fallback_family = output.adjust_font_fallback.as_ref().map(|adjust| {
            let family = format_family(&format!("{} Fallback", font_family));
            code.push_str(&fallback_font_face(&family, adjust));
            family
        });

        let font_families = std::iter::once(format_family(&font_family))
            .chain(fallback_family)
            .chain(output.fallback_fonts.iter().cloned())
            .collect::<Vec<_>>()
            .join(", ");

        let mut class_names = BTreeMap::new();
        let class_name = scoped_name(CLASS_NAME, hash);
        let mut class_rule = vec![("font-family".to_string(), font_families.clone())];
        if let Some(weight) = output.weight.as_ref().filter(|w| !is_range(w)) {
            class_rule.push(("font-weight".to_string(), weight.clone()));
        }
        if let Some(style) = output.style.as_ref().filter(|s| !is_range(s)) {
            class_rule.push(("font-style".to_string(), style.clone()));
        }
        code.push_str(&rule(&format!(".{}", class_name), &class_rule));
        class_names.insert(CLASS_NAME.to_string(), class_name);

        if let Some(variable) = &output.variable {
            let variable_class = scoped_name(VARIABLE, hash);
            code.push_str(&rule(
                &format!(".{}", variable_class),
                &[(variable.clone(), font_families.clone())],
            ));
            class_names.insert(VARIABLE.to_string(), variable_class);
        }

        if self.minify {
            code = minify_css(relative_path, &code)?;
        }

        Ok(TargetCss {
            code,
            class_names,
            style: FontStyleExport {
                font_family: font_families,
                font_weight: output.weight.as_deref().and_then(parse_number),
                font_style: output.style.clone().filter(|s| !is_range(s)),
            },
        })
    }
}

fn scoped_name(local: &str, hash: &str) -> String {
    format!("__{}_{}", local, hash)
}

/// Variable fonts can declare ranges such as `100 900`.
fn is_range(value: &str) -> bool {
    value.trim().contains(' ')
}

fn parse_number(value: &str) -> Option<serde_json::Number> {
    let value = value.trim();
    if let Ok(int) = value.parse::<i64>() {
        return Some(int.into());
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
}

fn rule(selector: &str, declarations: &[(String, String)]) -> String {
    let mut css = format!("\n{} {{\n", selector);
    for (property, value) in declarations {
        css.push_str(&format!("  {}: {};\n", property, value));
    }
    css.push_str("}\n");
    css
}

fn fallback_font_face(family: &str, adjust: &AdjustFontFallback) -> String {
    let mut declarations = vec![
        ("font-family".to_string(), family.to_string()),
        ("src".to_string(), format!("local(\"{}\")", adjust.fallback_font)),
    ];
    for (property, value) in [
        ("ascent-override", &adjust.ascent_override),
        ("descent-override", &adjust.descent_override),
        ("line-gap-override", &adjust.line_gap_override),
        ("size-adjust", &adjust.size_adjust),
    ] {
        if let Some(value) = value {
            declarations.push((property.to_string(), value.clone()));
        }
    }
    rule("@font-face", &declarations)
}

/// Byte ranges of the bodies of all `@font-face` blocks.
fn font_face_bodies(css: &str) -> Vec<Range<usize>> {
    let mut bodies = Vec::new();
    let mut search = 0;
    while let Some(found) = css[search..].find("@font-face") {
        let at = search + found;
        let Some(open) = css[at..].find('{') else {
            break;
        };
        let start = at + open + 1;
        let end = closing_brace(css, start).unwrap_or(css.len());
        bodies.push(start..end);
        search = (end + 1).min(css.len());
    }
    bodies
}

fn closing_brace(css: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (offset, c) in css[from..].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '}') => return Some(from + offset),
            _ => {}
        }
    }
    None
}

/// Range of the `font-family` value inside a declaration block body.
fn family_value(css: &str, body: Range<usize>) -> Option<Range<usize>> {
    let mut quote = None;
    let mut start = body.start;
    let mut declarations = Vec::new();
    for (offset, c) in css[body.clone()].char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, ';') => {
                declarations.push(start..body.start + offset);
                start = body.start + offset + 1;
            }
            _ => {}
        }
    }
    declarations.push(start..body.end);

    declarations.into_iter().find_map(|declaration| {
        let text = &css[declaration.clone()];
        let colon = text.find(':')?;
        if text[..colon].trim() != "font-family" {
            return None;
        }
        let value = &text[colon + 1..];
        let leading = value.len() - value.trim_start().len();
        let value_start = declaration.start + colon + 1 + leading;
        let value_end = declaration.start + colon + 1 + value.trim_end().len();
        (value_start < value_end).then_some(value_start..value_end)
    })
}

/// Replace every `@font-face` family with the scoped name of the first one.
///
/// Returns the rewritten CSS and the unscoped family name.
fn rename_font_families(
    css: &str,
    format_family: &dyn Fn(&str) -> String,
) -> Result<(String, String), LoaderError> {
    let values: Vec<Range<usize>> = font_face_bodies(css)
        .into_iter()
        .filter_map(|body| family_value(css, body))
        .collect();

    let Some(first) = values.first() else {
        return Err(LoaderError::invalid_css(
            "Font loaders must return one or more @font-face's",
        ));
    };
    let font_family = css[first.clone()].replace(['\'', '"'], "");
    let scoped = format_family(&font_family);

    let mut code = String::with_capacity(css.len() + values.len() * scoped.len());
    let mut cursor = 0;
    for value in &values {
        code.push_str(&css[cursor..value.start]);
        code.push_str(&scoped);
        cursor = value.end;
    }
    code.push_str(&css[cursor..]);

    Ok((code, font_family))
}

/// Minify generated CSS with lightningcss.
pub fn minify_css(filename: &str, source: &str) -> Result<String, LoaderError> {
    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: filename.to_string(),
            ..Default::default()
        },
    )
    .map_err(|e| LoaderError::invalid_css(format!("Failed to parse CSS from {}: {}", filename, e)))?;

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| LoaderError::invalid_css(format!("Failed to minify CSS from {}: {}", filename, e)))?;

    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| LoaderError::invalid_css(format!("Failed to print CSS from {}: {}", filename, e)))?;

    Ok(result.code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(css: &str) -> FontLoaderOutput {
        FontLoaderOutput {
            css: css.to_string(),
            ..Default::default()
        }
    }

    const LOCAL_CSS: &str = "@font-face {\nfont-family: myFont;\nsrc: url(/_next/static/media/a.woff2) format('woff2');\nfont-display: swap;\n}\n";

    #[test]
    fn test_renames_family_and_adds_class() {
        let target = CssModuleGenerator::default()
            .generate("app/page.tsx", &output(LOCAL_CSS))
            .unwrap();
        let hash = &hash_content(LOCAL_CSS.as_bytes())[..6];

        assert!(target.code.starts_with(&format!("@font-face {{\nfont-family: '__myFont_{}';\n", hash)));
        assert!(target.code.ends_with(&format!(
            "\n.__className_{} {{\n  font-family: '__myFont_{}';\n}}\n",
            hash, hash
        )));
        assert_eq!(target.class_names.get("className").unwrap(), &format!("__className_{}", hash));
        assert!(!target.class_names.contains_key("variable"));
        assert_eq!(target.style.font_family, format!("'__myFont_{}'", hash));
    }

    #[test]
    fn test_all_font_faces_share_the_first_family() {
        let css = "/* latin */\n@font-face {\n  font-family: 'Roboto Mono';\n  src: url(a.woff2);\n}\n@font-face {\n  font-family: \"Other\";\n  src: url(b.woff2);\n}\n";
        let target = CssModuleGenerator::default()
            .generate("app/page.tsx", &output(css))
            .unwrap();
        let hash = &hash_content(css.as_bytes())[..6];
        let scoped = format!("'__Roboto_Mono_{}'", hash);
        assert_eq!(target.code.matches(&scoped).count(), 3);
        assert!(!target.code.contains("Other"));
        assert!(target.code.starts_with("/* latin */\n@font-face {\n  font-family: '__Roboto_Mono_"));
    }

    #[test]
    fn test_fallback_variable_and_style() {
        let loader_output = FontLoaderOutput {
            css: "@font-face { font-family: 'Inter'; src: url(a.woff2); }".to_string(),
            fallback_fonts: vec!["system-ui".into(), "arial".into()],
            weight: Some("400".into()),
            style: Some("normal".into()),
            variable: Some("--font-inter".into()),
            adjust_font_fallback: Some(AdjustFontFallback {
                fallback_font: "Arial".into(),
                ascent_override: Some("90.00%".into()),
                descent_override: Some("22.43%".into()),
                line_gap_override: Some("0.00%".into()),
                size_adjust: Some("107.40%".into()),
            }),
        };
        let target = CssModuleGenerator::default()
            .generate("app/layout.tsx", &loader_output)
            .unwrap();
        let hash = &hash_content(loader_output.css.as_bytes())[..6];
        let families = format!(
            "'__Inter_{hash}', '__Inter_Fallback_{hash}', system-ui, arial"
        );

        assert!(target.code.contains(&format!(
            "@font-face {{\n  font-family: '__Inter_Fallback_{hash}';\n  src: local(\"Arial\");\n  ascent-override: 90.00%;\n  descent-override: 22.43%;\n  line-gap-override: 0.00%;\n  size-adjust: 107.40%;\n}}\n"
        )));
        assert!(target.code.contains(&format!(
            ".__className_{hash} {{\n  font-family: {families};\n  font-weight: 400;\n  font-style: normal;\n}}\n"
        )));
        assert!(target.code.ends_with(&format!(
            ".__variable_{hash} {{\n  --font-inter: {families};\n}}\n"
        )));
        assert_eq!(target.style.font_weight, Some(400.into()));
        assert_eq!(target.style.font_style.as_deref(), Some("normal"));
    }

    #[test]
    fn test_weight_range_is_not_set_on_class() {
        let loader_output = FontLoaderOutput {
            weight: Some("100 900".into()),
            ..output(LOCAL_CSS)
        };
        let target = CssModuleGenerator::default()
            .generate("a.ts", &loader_output)
            .unwrap();
        assert!(!target.code.contains("font-weight: 100 900;\n}"));
        assert_eq!(target.style.font_weight, None);
    }

    #[test]
    fn test_requires_font_face() {
        let err = CssModuleGenerator::default()
            .generate("a.ts", &output(".a { color: red; }"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Font loaders must return one or more @font-face's");
    }

    #[test]
    fn test_js_module() {
        let mut class_names = BTreeMap::new();
        class_names.insert("className".to_string(), "__className_abc123".to_string());
        class_names.insert("variable".to_string(), "__variable_abc123".to_string());
        let target = TargetCss {
            code: String::new(),
            class_names,
            style: FontStyleExport {
                font_family: "'__Inter_abc123'".into(),
                font_weight: Some(700.into()),
                font_style: None,
            },
        };
        assert_eq!(
            target.to_js_module(),
            "export const className = \"__className_abc123\";\n\
             export const variable = \"__variable_abc123\";\n\
             export const style = {\"fontFamily\":\"'__Inter_abc123'\",\"fontWeight\":700};\n\
             export default { className, variable, style };\n"
        );
    }

    #[test]
    fn test_minified_output() {
        let target = CssModuleGenerator::new(true)
            .generate("app/page.tsx", &output(LOCAL_CSS))
            .unwrap();
        assert!(!target.code.contains('\n'));
        assert!(target.code.contains("@font-face{"));
    }
}
