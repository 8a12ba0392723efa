//! Loader for font files shipped with the project.
//!
//! ```text
//! import localFont from 'next/font/local'
//! const myFont = localFont({ src: './my-font.woff2' })
//! ```
//!
//! Every source file becomes one `@font-face` rule whose family is the name of
//! the const the call is assigned to. The CSS module step renames it later.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::metrics::{FallbackCategory, FontMetricsProvider};
use super::{
    AdjustFontFallback, FontLoader, FontLoaderOutput, LoaderContext, bool_option, display_option,
    string_list_option, string_option, variable_option,
};
use crate::error::LoaderError;

/// Properties a `declarations` entry may not set.
const RESERVED_DECLARATIONS: [&str; 4] = ["src", "font-display", "font-weight", "font-style"];

/// Map a font file extension to its `format()` hint.
pub fn format_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "woff" => Some("woff"),
        "woff2" => Some("woff2"),
        "eot" => Some("embedded-opentype"),
        "ttf" => Some("truetype"),
        "otf" => Some("opentype"),
        _ => None,
    }
}

fn extension_of(path: &str) -> Option<&str> {
    let (_, ext) = path.rsplit_once('.')?;
    format_for_extension(ext).map(|_| ext)
}

/// One entry of `src`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFontSource {
    pub path: String,
    pub weight: Option<String>,
    pub style: Option<String>,
    pub ext: String,
    pub format: &'static str,
}

/// A `declarations` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFaceDeclaration {
    pub prop: String,
    pub value: String,
}

/// `adjustFontFallback` of a local font call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFallback {
    Arial,
    TimesNewRoman,
    Disabled,
}

impl LocalFallback {
    fn category(self) -> Option<FallbackCategory> {
        match self {
            LocalFallback::Arial => Some(FallbackCategory::SansSerif),
            LocalFallback::TimesNewRoman => Some(FallbackCategory::Serif),
            LocalFallback::Disabled => None,
        }
    }
}

/// Validated arguments of a local font call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFontOptions {
    pub src: Vec<LocalFontSource>,
    pub display: String,
    pub weight: Option<String>,
    pub style: Option<String>,
    pub fallback: Option<Vec<String>>,
    pub preload: bool,
    pub variable: Option<String>,
    pub adjust_font_fallback: LocalFallback,
    pub declarations: Vec<FontFaceDeclaration>,
}

impl LocalFontOptions {
    pub fn validate(function_name: &str, options: Option<&Value>) -> Result<Self, LoaderError> {
        if !function_name.is_empty() {
            return Err(LoaderError::invalid_arguments(
                "next/font/local has no named exports",
            ));
        }

        let empty = Map::new();
        let options = match options {
            Some(Value::Object(options)) => options,
            None | Some(Value::Null) => &empty,
            Some(other) => {
                return Err(LoaderError::invalid_arguments(format!(
                    "Unexpected argument `{}`, expected an options object",
                    other
                )));
            }
        };

        let display = display_option(options)?;
        let weight = string_option(options, "weight")?;
        let style = string_option(options, "style")?;

        let src = match options.get("src") {
            None | Some(Value::Null) => {
                return Err(LoaderError::invalid_arguments(
                    "Missing required `src` property",
                ));
            }
            Some(Value::String(path)) => vec![source(path.clone(), weight.clone(), style.clone())?],
            Some(Value::Array(files)) if files.is_empty() => {
                return Err(LoaderError::invalid_arguments(
                    "Unexpected empty `src` array.",
                ));
            }
            Some(Value::Array(files)) => files
                .iter()
                .map(|file| match file {
                    Value::Object(file) => {
                        let path = string_option(file, "path")?.ok_or_else(|| {
                            LoaderError::invalid_arguments("Missing required `path` in `src` entry")
                        })?;
                        source(path, string_option(file, "weight")?, string_option(file, "style")?)
                    }
                    other => Err(LoaderError::invalid_arguments(format!(
                        "Unexpected `src` entry `{}`",
                        other
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(LoaderError::invalid_arguments(format!(
                    "Unexpected `src` value `{}`",
                    other
                )));
            }
        };

        let adjust_font_fallback = match options.get("adjustFontFallback") {
            None | Some(Value::Null) => LocalFallback::Arial,
            Some(Value::Bool(false)) => LocalFallback::Disabled,
            Some(Value::String(name)) if name == "Arial" => LocalFallback::Arial,
            Some(Value::String(name)) if name == "Times New Roman" => LocalFallback::TimesNewRoman,
            Some(other) => {
                return Err(LoaderError::invalid_arguments(format!(
                    "Invalid adjustFontFallback value `{}`.\nAvailable values: `Arial`, `Times New Roman`, `false`",
                    other
                )));
            }
        };

        let declarations = match options.get("declarations") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries
                .iter()
                .map(declaration)
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(LoaderError::invalid_arguments(format!(
                    "Unexpected `declarations` value `{}`",
                    other
                )));
            }
        };

        Ok(Self {
            src,
            display,
            weight,
            style,
            fallback: string_list_option(options, "fallback")?,
            preload: bool_option(options, "preload")?.unwrap_or(true),
            variable: variable_option(options)?,
            adjust_font_fallback,
            declarations,
        })
    }

    fn has_custom_font_family(&self) -> bool {
        self.declarations
            .iter()
            .any(|declaration| declaration.prop == "font-family")
    }
}

fn source(
    path: String,
    weight: Option<String>,
    style: Option<String>,
) -> Result<LocalFontSource, LoaderError> {
    let ext = extension_of(&path)
        .ok_or_else(|| LoaderError::invalid_arguments(format!("Unexpected file `{}`", path)))?
        .to_string();
    let format = format_for_extension(&ext).unwrap_or("woff2");
    Ok(LocalFontSource {
        path,
        weight,
        style,
        ext,
        format,
    })
}

fn declaration(entry: &Value) -> Result<FontFaceDeclaration, LoaderError> {
    let Value::Object(entry) = entry else {
        return Err(LoaderError::invalid_arguments(format!(
            "Unexpected declaration `{}`",
            entry
        )));
    };
    let prop = string_option(entry, "prop")?.unwrap_or_default();
    if RESERVED_DECLARATIONS.contains(&prop.as_str()) {
        return Err(LoaderError::invalid_arguments(format!(
            "Invalid declaration prop: `{}`",
            prop
        )));
    }
    let value = string_option(entry, "value")?.unwrap_or_default();
    Ok(FontFaceDeclaration { prop, value })
}

/// Render one `@font-face` rule, properties in declaration order.
fn font_face(properties: &[(String, String)]) -> String {
    let body = properties
        .iter()
        .map(|(property, value)| format!("{}: {};", property, value))
        .collect::<Vec<_>>()
        .join("\n");
    format!("@font-face {{\n{}\n}}\n", body)
}

/// Distance of a weight (or weight range) from 400.
fn weight_distance(weight: Option<&str>) -> f64 {
    let Some(weight) = weight else {
        return 0.0;
    };
    let bounds: Vec<f64> = weight
        .split_whitespace()
        .filter_map(|part| part.parse().ok())
        .collect();
    match bounds.as_slice() {
        [single] => (single - 400.0).abs(),
        [low, high] if (*low..=*high).contains(&400.0) => 0.0,
        [low, high] => (low - 400.0).abs().min((high - 400.0).abs()),
        _ => 0.0,
    }
}

/// Pick the file whose metrics best represent the family: non-italic first,
/// then the weight closest to 400.
fn fallback_source_index(options: &LocalFontOptions) -> usize {
    let mut best = 0;
    let mut best_key = (true, f64::MAX);
    for (index, file) in options.src.iter().enumerate() {
        let style = file.style.as_deref().or(options.style.as_deref());
        let weight = file.weight.as_deref().or(options.weight.as_deref());
        let key = (style == Some("italic"), weight_distance(weight));
        if key.0 < best_key.0 || (key.0 == best_key.0 && key.1 < best_key.1) {
            best = index;
            best_key = key;
        }
    }
    best
}

/// Loader for `next-font/local`.
#[derive(Clone, Default)]
pub struct LocalFontLoader {
    metrics: Option<Arc<dyn FontMetricsProvider>>,
}

impl LocalFontLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn FontMetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl FontLoader for LocalFontLoader {
    async fn load(&self, ctx: &LoaderContext<'_>) -> Result<FontLoaderOutput, LoaderError> {
        let options = LocalFontOptions::validate(ctx.function_name, ctx.options())?;
        let size_adjust = options.adjust_font_fallback != LocalFallback::Disabled;

        let mut rules = Vec::with_capacity(options.src.len());
        let mut contents = Vec::with_capacity(options.src.len());
        for file in &options.src {
            let resolved = ctx.resolve(&file.path);
            let content = ctx.reader.read(&resolved).await?;
            let url = ctx.emit_font_file(&content, &file.ext, options.preload, size_adjust);

            let mut properties: Vec<(String, String)> = options
                .declarations
                .iter()
                .map(|d| (d.prop.clone(), d.value.clone()))
                .collect();
            if !options.has_custom_font_family() {
                properties.push(("font-family".into(), ctx.variable_name.to_string()));
            }
            properties.push(("src".into(), format!("url({}) format('{}')", url, file.format)));
            properties.push(("font-display".into(), options.display.clone()));
            if let Some(weight) = file.weight.as_ref().or(options.weight.as_ref()) {
                properties.push(("font-weight".into(), weight.clone()));
            }
            if let Some(style) = file.style.as_ref().or(options.style.as_ref()) {
                properties.push(("font-style".into(), style.clone()));
            }

            rules.push(font_face(&properties));
            contents.push(content);
        }

        let adjust_font_fallback: Option<AdjustFontFallback> =
            match (options.adjust_font_fallback.category(), &self.metrics) {
                (Some(category), Some(metrics)) => {
                    let index = fallback_source_index(&options);
                    contents
                        .get(index)
                        .and_then(|content| metrics.metrics_from_font_file(content, category))
                }
                _ => None,
            };

        let single = (options.src.len() == 1).then(|| &options.src[0]);
        tracing::debug!(
            variable_name = ctx.variable_name,
            files = options.src.len(),
            "generated local @font-face rules"
        );

        Ok(FontLoaderOutput {
            css: rules.join("\n"),
            fallback_fonts: options.fallback.clone().unwrap_or_default(),
            weight: single.and_then(|file| file.weight.clone()),
            style: single.and_then(|file| file.style.clone()),
            variable: options.variable.clone(),
            adjust_font_fallback,
        })
    }
}
