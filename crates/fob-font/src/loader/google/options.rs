//! Validation of Google font calls.

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::loader::{
    bool_option, display_option, format_available_values, string_list_option, variable_option,
};
use crate::error::LoaderError;

/// A variable axis of a family, e.g. `wght` from 100 to 900.
#[derive(Debug, Clone, PartialEq)]
pub struct FontAxis {
    pub tag: String,
    pub min: f64,
    pub max: f64,
}

impl FontAxis {
    pub fn new(tag: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            tag: tag.into(),
            min,
            max,
        }
    }

    pub(crate) fn range(&self) -> String {
        format!("{}..{}", self.min, self.max)
    }
}

/// What is known about one Google Fonts family.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoogleFontFamily {
    /// Static weights plus `variable` when the family has a weight axis
    pub weights: Vec<String>,
    pub styles: Vec<String>,
    pub subsets: Vec<String>,
    pub axes: Vec<FontAxis>,
}

/// Known families. Calls for families missing from the catalog are passed
/// through unchecked and Google Fonts reports the problem instead.
#[derive(Debug, Clone, Default)]
pub struct GoogleFontCatalog {
    families: FxHashMap<String, GoogleFontFamily>,
}

impl GoogleFontCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_family(mut self, family: impl Into<String>, data: GoogleFontFamily) -> Self {
        self.families.insert(family.into(), data);
        self
    }

    pub fn get(&self, family: &str) -> Option<&GoogleFontFamily> {
        self.families.get(family)
    }
}

/// Validated arguments of a Google font call.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleFontOptions {
    pub font_family: String,
    pub weights: Vec<String>,
    pub styles: Vec<String>,
    pub display: String,
    pub preload: bool,
    pub selected_variable_axes: Option<Vec<String>>,
    pub fallback: Option<Vec<String>>,
    pub adjust_font_fallback: bool,
    pub variable: Option<String>,
    pub subsets: Vec<String>,
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(values.len());
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

impl GoogleFontOptions {
    pub fn validate(
        function_name: &str,
        options: Option<&Value>,
        catalog: &GoogleFontCatalog,
    ) -> Result<Self, LoaderError> {
        if function_name.is_empty() {
            return Err(LoaderError::invalid_arguments(
                "next/font/google has no default export",
            ));
        }
        let font_family = function_name.replace('_', " ");
        let family_data = catalog.get(&font_family);

        let empty = Map::new();
        let options = match options {
            Some(Value::Object(options)) => options,
            None | Some(Value::Null) => &empty,
            Some(other) => {
                return Err(LoaderError::invalid_arguments(format!(
                    "Unexpected argument `{}` for font `{}`, expected an options object",
                    other, font_family
                )));
            }
        };

        let mut preload = bool_option(options, "preload")?.unwrap_or(true);
        let subsets = string_list_option(options, "subsets")?;
        match family_data {
            Some(data) if data.subsets.is_empty() => preload = false,
            _ if !preload => {}
            data => {
                let Some(subsets) = &subsets else {
                    let available = data
                        .map(|d| d.subsets.iter().map(String::as_str).collect::<Vec<_>>())
                        .unwrap_or_default();
                    return Err(LoaderError::invalid_arguments(format!(
                        "Preload is enabled but no subsets were specified for font `{}`. Please specify subsets or disable preloading if your intended subset can't be preloaded.\nAvailable subsets: {}",
                        font_family,
                        format_available_values(&available)
                    )));
                };
                if let Some(data) = data {
                    for subset in subsets {
                        if !data.subsets.contains(subset) {
                            return Err(LoaderError::invalid_arguments(format!(
                                "Unknown subset `{}` for font `{}`.\nAvailable subsets: {}",
                                subset,
                                font_family,
                                format_available_values(
                                    &data.subsets.iter().map(String::as_str).collect::<Vec<_>>()
                                )
                            )));
                        }
                    }
                }
            }
        }

        let mut weights = dedup(string_list_option(options, "weight")?.unwrap_or_default());
        let mut styles = dedup(string_list_option(options, "style")?.unwrap_or_default());

        if weights.is_empty() {
            match family_data {
                Some(data) if !data.weights.iter().any(|w| w == "variable") => {
                    return Err(LoaderError::invalid_arguments(format!(
                        "Missing weight for font `{}`.\nAvailable weights: {}",
                        font_family,
                        format_available_values(
                            &data.weights.iter().map(String::as_str).collect::<Vec<_>>()
                        )
                    )));
                }
                _ => weights.push("variable".to_string()),
            }
        }
        if weights.len() > 1 && weights.iter().any(|w| w == "variable") {
            return Err(LoaderError::invalid_arguments(format!(
                "Unexpected `variable` in weight array for font `{}`. You only need `variable`, it includes all available weights.",
                font_family
            )));
        }

        if let Some(data) = family_data {
            for weight in &weights {
                if !data.weights.contains(weight) {
                    return Err(LoaderError::invalid_arguments(format!(
                        "Unknown weight `{}` for font `{}`.\nAvailable weights: {}",
                        weight,
                        font_family,
                        format_available_values(
                            &data.weights.iter().map(String::as_str).collect::<Vec<_>>()
                        )
                    )));
                }
            }
        }

        if styles.is_empty() {
            match family_data {
                Some(data) if data.styles.len() == 1 => styles.push(data.styles[0].clone()),
                _ => styles.push("normal".to_string()),
            }
        }
        if let Some(data) = family_data {
            for style in &styles {
                if !data.styles.contains(style) {
                    return Err(LoaderError::invalid_arguments(format!(
                        "Unknown style `{}` for font `{}`.\nAvailable styles: {}",
                        style,
                        font_family,
                        format_available_values(
                            &data.styles.iter().map(String::as_str).collect::<Vec<_>>()
                        )
                    )));
                }
            }
        }

        let display = display_option(options)?;

        let selected_variable_axes = match options.get("axes") {
            None | Some(Value::Null) => None,
            Some(Value::Array(_)) => string_list_option(options, "axes")?,
            Some(_) => {
                return Err(LoaderError::invalid_arguments(format!(
                    "Invalid axes value for font `{}`, expected an array of axes.",
                    font_family
                )));
            }
        };
        if weights[0] != "variable" && selected_variable_axes.is_some() {
            return Err(LoaderError::invalid_arguments(
                "Axes can only be defined for variable fonts",
            ));
        }

        let adjust_font_fallback = match options.get("adjustFontFallback") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(value)) => *value,
            Some(other) => {
                return Err(LoaderError::invalid_arguments(format!(
                    "Invalid adjustFontFallback value `{}` for font `{}`, expected a boolean",
                    other, font_family
                )));
            }
        };

        Ok(Self {
            font_family,
            weights,
            styles,
            display,
            preload,
            selected_variable_axes,
            fallback: string_list_option(options, "fallback")?,
            adjust_font_fallback,
            variable: variable_option(options)?,
            subsets: subsets.unwrap_or_default(),
        })
    }
}
